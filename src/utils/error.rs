//! Error types for storebench

use std::time::Duration;

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization error: {0}")]
    Init(#[from] InitError),

    #[error("Coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    #[error("Backend teardown failed: {0}")]
    Teardown(#[source] OpError),

    #[error("Worker thread panicked: {0}")]
    WorkerPanic(String),
}

/// Fatal backend construction or `init()` failure.
///
/// Aborts the owning worker's participation in the run. Never retried at
/// this layer.
#[derive(Error, Debug)]
#[error("{context}")]
pub struct InitError {
    context: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl InitError {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            source: None,
        }
    }

    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Failure of a dispatched operation.
///
/// Always handed back as a value; the dispatcher boundary never lets a
/// backend failure escape any other way.
#[derive(Error, Debug)]
pub enum OpError {
    /// The backend does not implement this operation.
    #[error("operation not implemented by backend")]
    Unsupported,

    /// The backend attempted the operation and failed.
    #[error("backend operation failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl OpError {
    pub fn backend(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(source))
    }

    pub fn message(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into().into())
    }
}

/// Shutdown rendezvous failure.
///
/// Fatal to the whole run: a partially drained gate cannot be resumed.
#[derive(Error, Debug)]
pub enum CoordinationError {
    #[error("shutdown rendezvous timed out after {waited:?} with {missing} workers outstanding")]
    RendezvousTimeout { waited: Duration, missing: usize },
}

pub type Result<T> = std::result::Result<T, BenchError>;
