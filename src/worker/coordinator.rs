//! Worker identity and cohort shutdown coordination
//!
//! A run owns one [`RunContext`]; workers draw their ordinal identity
//! from it and rendezvous on its [`ShutdownGate`] before tearing down
//! backend connections.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::RunConfig;
use crate::utils::CoordinationError;

/// Countdown rendezvous for cohort shutdown.
///
/// Workers decrement then block until every participant has arrived, so
/// no worker tears down a connection a peer may still be using. The gate
/// is sized once to the cohort; by contract the size must equal the
/// number of callers, and a mismatch blocks every worker (bounded only
/// by the optional timeout).
pub struct ShutdownGate {
    parties: usize,
    remaining: Mutex<usize>,
    all_arrived: Condvar,
}

impl ShutdownGate {
    fn new(parties: usize) -> Self {
        Self {
            parties,
            remaining: Mutex::new(parties),
            all_arrived: Condvar::new(),
        }
    }

    /// Cohort size the gate was built for.
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Number of workers that have arrived so far.
    pub fn arrived(&self) -> usize {
        self.parties - *self.remaining.lock()
    }

    /// Arrive and block until the whole cohort has arrived.
    ///
    /// Returns the arrived count, equal to the cohort size on success. A
    /// timeout leaves the gate partially drained and unusable; the error
    /// is fatal to the run and must not be retried.
    pub fn arrive_and_wait(&self, timeout: Option<Duration>) -> Result<usize, CoordinationError> {
        let start = Instant::now();
        let mut remaining = self.remaining.lock();

        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.all_arrived.notify_all();
            return Ok(self.parties);
        }

        while *remaining > 0 {
            match timeout {
                None => self.all_arrived.wait(&mut remaining),
                Some(limit) => {
                    let Some(left) = limit.checked_sub(start.elapsed()) else {
                        return Err(CoordinationError::RendezvousTimeout {
                            waited: start.elapsed(),
                            missing: *remaining,
                        });
                    };
                    self.all_arrived.wait_for(&mut remaining, left);
                }
            }
        }
        Ok(self.parties)
    }
}

/// Caller-owned run coordination state: the next-identity counter and the
/// lazily constructed shutdown gate, behind one lock.
pub struct RunContext {
    workers: usize,
    shutdown_timeout: Option<Duration>,
    state: Mutex<CohortState>,
}

struct CohortState {
    next_id: usize,
    gate: Option<Arc<ShutdownGate>>,
}

impl RunContext {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            workers: config.workers,
            shutdown_timeout: config.shutdown_timeout,
            state: Mutex::new(CohortState {
                next_id: 0,
                gate: None,
            }),
        }
    }

    /// Cohort size the context was created for.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub(crate) fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout
    }

    /// Assign the next worker ordinal, constructing the shutdown gate on
    /// the first call. Ordinals are handed out exactly once each, in
    /// order, never reused within a run.
    pub fn assign_identity(&self) -> (usize, Arc<ShutdownGate>) {
        let mut state = self.state.lock();
        let gate = Arc::clone(
            state
                .gate
                .get_or_insert_with(|| Arc::new(ShutdownGate::new(self.workers))),
        );
        let id = state.next_id;
        state.next_id += 1;
        (id, gate)
    }
}
