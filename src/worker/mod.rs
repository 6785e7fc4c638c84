//! Worker lifecycle
//!
//! Workers start and stop as a cohort: identity assignment and backend
//! construction at start, a full-cohort rendezvous at shutdown so no
//! worker tears down a connection pool a peer may still be using.

pub mod coordinator;

pub use coordinator::{RunContext, ShutdownGate};

use std::any::Any;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info};

use crate::backend::{BackendFactory, BackendRole};
use crate::config::{ReadApi, RunConfig};
use crate::dispatch::BackendDispatcher;
use crate::measurement::Measurements;
use crate::utils::{BenchError, Result};

/// One benchmark worker: its ordinal identity, its dispatcher, and its
/// seat at the shutdown gate.
pub struct Worker {
    id: usize,
    dispatcher: BackendDispatcher,
    gate: Arc<ShutdownGate>,
    shutdown_timeout: Option<Duration>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("aliased", &self.dispatcher.aliased())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

impl Worker {
    /// Assign an identity and build this worker's backends.
    ///
    /// The write backend is always constructed; the read backend aliases
    /// it under [`ReadApi::Shared`]. Construction or `init()` failure is
    /// fatal to this worker and propagates without retry.
    pub fn initialize(
        ctx: &RunContext,
        factory: &dyn BackendFactory,
        config: &RunConfig,
    ) -> Result<Self> {
        let (id, gate) = ctx.assign_identity();

        let write = factory.create(BackendRole::Write, id)?;
        write.init()?;

        let read = match config.read_api {
            ReadApi::Shared => Arc::clone(&write),
            ReadApi::Dedicated => {
                let read = factory.create(BackendRole::Read, id)?;
                read.init()?;
                read
            }
        };

        let dispatcher = BackendDispatcher::new(read, write, config.field_names());
        Ok(Self {
            id,
            dispatcher,
            gate,
            shutdown_timeout: ctx.shutdown_timeout(),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn dispatcher(&self) -> &BackendDispatcher {
        &self.dispatcher
    }

    /// Rendezvous with the cohort, then release backend resources.
    ///
    /// A rendezvous failure is fatal and surfaced to the caller; backend
    /// teardown is only attempted once every peer has arrived.
    pub fn shutdown(self) -> Result<()> {
        self.gate
            .arrive_and_wait(self.shutdown_timeout)
            .map_err(|e| {
                error!("worker {}: {e}", self.id);
                e
            })?;
        self.dispatcher.cleanup().map_err(BenchError::Teardown)
    }
}

/// Run a fixed cohort of workers to completion.
///
/// Spawns one named thread per worker; each initializes, runs the
/// caller-provided workload, then joins the shutdown rendezvous. All
/// threads are joined and the first worker error is returned.
///
/// A worker that fails initialization never reaches the gate, leaving
/// the rendezvous short one participant; set
/// [`RunConfig::shutdown_timeout`] to bound the wait in that case.
pub fn run_cohort<F>(
    config: &RunConfig,
    factory: Arc<dyn BackendFactory>,
    measurements: Arc<Measurements>,
    workload: F,
) -> Result<()>
where
    F: Fn(&Worker, &Measurements) + Send + Sync + 'static,
{
    config.validate()?;
    info!("starting cohort of {} workers", config.workers);

    let ctx = Arc::new(RunContext::new(config));
    let workload = Arc::new(workload);

    let mut handles = Vec::with_capacity(config.workers);
    for slot in 0..config.workers {
        let ctx = Arc::clone(&ctx);
        let factory = Arc::clone(&factory);
        let measurements = Arc::clone(&measurements);
        let workload = Arc::clone(&workload);
        let config = config.clone();

        let handle = thread::Builder::new()
            .name(format!("worker-{slot}"))
            .spawn(move || -> Result<()> {
                let worker = Worker::initialize(&ctx, factory.as_ref(), &config)?;
                workload(&worker, &measurements);
                worker.shutdown()
            })
            .expect("failed to spawn worker thread");

        handles.push(handle);
    }

    let mut first_err = None;
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("{e}");
                first_err.get_or_insert(e);
            }
            Err(panic) => {
                first_err.get_or_insert(BenchError::WorkerPanic(panic_message(panic)));
            }
        }
    }

    match first_err {
        None => {
            info!("cohort of {} workers finished", config.workers);
            Ok(())
        }
        Some(e) => Err(e),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
