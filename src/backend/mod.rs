//! Backend capability interface
//!
//! A backend adapter speaks one system-under-test's native protocol and
//! exposes the fixed operation capability set below. The rest of the
//! crate only ever holds adapters as `Arc<dyn Backend>` trait objects;
//! the concrete kind behind each role is selected by a [`BackendFactory`]
//! at worker initialization time.

pub mod memory;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::utils::{InitError, OpError};

pub use memory::{InMemoryBackend, MemoryBackendFactory};

/// One record: field name to value bytes.
pub type Row = HashMap<String, Vec<u8>>;

/// Set of field names to read.
pub type FieldSet = HashSet<String>;

/// Outcome classification of a dispatched operation.
///
/// `NotImplemented` is distinct from `Error` so reports can separate
/// "not measured" from "failed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Error,
    NotImplemented,
}

impl Status {
    /// Classify an operation outcome.
    pub fn of<T>(outcome: &Result<T, OpError>) -> Status {
        match outcome {
            Ok(_) => Status::Ok,
            Err(OpError::Unsupported) => Status::NotImplemented,
            Err(OpError::Backend(_)) => Status::Error,
        }
    }

    /// Label used in exported status-code counters.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
            Status::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operation capability set implemented by a backend adapter.
///
/// One instance per worker role. Methods take `&self`; when configuration
/// aliases the read and write roles to the same instance, that instance's
/// own interior locking governs the sharing.
pub trait Backend: Send + Sync {
    /// Prepare the backend for traffic (open connections, authenticate).
    fn init(&self) -> Result<(), InitError> {
        Ok(())
    }

    /// Release backend resources. Called only after the cohort shutdown
    /// rendezvous, so no peer is mid-operation on a shared pool.
    fn cleanup(&self) -> Result<(), OpError> {
        Ok(())
    }

    /// Read one record. `Ok(None)` is a clean miss, not a failure.
    fn read(&self, table: &str, key: &str, fields: Option<&FieldSet>)
        -> Result<Option<Row>, OpError>;

    /// Read a batch of records, one slot per key.
    fn batch_read(
        &self,
        table: &str,
        keys: &[String],
        fields: Option<&FieldSet>,
    ) -> Result<Vec<Option<Row>>, OpError> {
        let _ = (table, keys, fields);
        Err(OpError::Unsupported)
    }

    /// Overwrite fields of an existing record.
    fn update(&self, table: &str, key: &str, values: &Row) -> Result<(), OpError>;

    /// Insert a new record.
    fn insert(&self, table: &str, key: &str, values: &Row) -> Result<(), OpError>;

    /// Delete a record.
    fn delete(&self, table: &str, key: &str) -> Result<(), OpError>;

    /// Ordered range scan of `record_count` records starting at `start_key`.
    fn scan(
        &self,
        table: &str,
        start_key: &str,
        record_count: usize,
        fields: Option<&FieldSet>,
    ) -> Result<Vec<Row>, OpError>;

    /// Update a batch of records, `value_sets[i]` applied to `keys[i]`.
    fn batch_update(
        &self,
        table: &str,
        keys: &[String],
        value_sets: &[Row],
    ) -> Result<(), OpError> {
        let _ = (table, keys, value_sets);
        Err(OpError::Unsupported)
    }
}

/// Role a backend instance plays for its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendRole {
    Read,
    Write,
}

impl fmt::Display for BackendRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendRole::Read => f.write_str("read"),
            BackendRole::Write => f.write_str("write"),
        }
    }
}

/// Constructs backend instances for workers at initialization time.
pub trait BackendFactory: Send + Sync {
    /// Create the backend serving `role` for the given worker.
    fn create(&self, role: BackendRole, worker_id: usize) -> Result<Arc<dyn Backend>, InitError>;
}
