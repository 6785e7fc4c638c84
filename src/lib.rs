//! storebench
//!
//! Load-generation core for benchmarking storage systems: a fixed cohort
//! of worker threads drives read/write/scan operations against a system
//! under test through pluggable backend adapters, while latencies stream
//! into per-metric time-windowed statistics for reporting.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod measurement;
pub mod utils;
pub mod worker;
