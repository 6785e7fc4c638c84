//! Run configuration surface
//!
//! Parsing of configuration files and command-line arguments happens
//! outside this crate; callers construct a [`RunConfig`] directly.

use std::collections::HashSet;
use std::time::Duration;

use crate::utils::BenchError;

/// Which backend role serves read traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadApi {
    /// Reads go through the worker's write backend (one shared instance).
    #[default]
    Shared,
    /// Reads go through a dedicated read backend instance.
    Dedicated,
}

/// Complete run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of worker threads in the cohort, fixed at run start
    pub workers: usize,
    /// Aggregation window width in milliseconds
    pub granularity_ms: u64,
    /// Which backend role serves reads
    pub read_api: ReadApi,
    /// Prefix for generated field names
    pub field_prefix: String,
    /// Number of known fields (`field0..field{n-1}`)
    pub field_count: usize,
    /// Batch size fact attached to the BATCH_READ metric
    pub read_batch_size: usize,
    /// Batch size fact attached to the BATCH_UPDATE metric
    pub update_batch_size: usize,
    /// Status reporter cadence
    pub status_interval: Duration,
    /// Upper bound on the shutdown rendezvous; `None` waits forever
    pub shutdown_timeout: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            granularity_ms: 1000,
            read_api: ReadApi::Shared,
            field_prefix: "field".to_string(),
            field_count: 10,
            read_batch_size: 1,
            update_batch_size: 1,
            status_interval: Duration::from_secs(10),
            shutdown_timeout: None,
        }
    }
}

impl RunConfig {
    /// Validate the configuration before a run starts.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.workers == 0 {
            return Err(BenchError::Config("worker count must be at least 1".to_string()));
        }
        if self.granularity_ms == 0 {
            return Err(BenchError::Config(
                "window granularity must be at least 1ms".to_string(),
            ));
        }
        if self.field_count == 0 {
            return Err(BenchError::Config("field count must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The full known field-name set, substituted when a read or scan
    /// omits an explicit field list.
    pub fn field_names(&self) -> HashSet<String> {
        (0..self.field_count)
            .map(|i| format!("{}{}", self.field_prefix, i))
            .collect()
    }
}
