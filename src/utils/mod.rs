//! Utility modules

pub mod error;

pub use error::{BenchError, CoordinationError, InitError, OpError, Result};
