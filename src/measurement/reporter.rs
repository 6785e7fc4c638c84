//! Periodic status reporter
//!
//! Drains the windowed-only counters of every metric on its own cadence
//! and logs one short human-readable line. Runs independently of window
//! closing; an interval with no samples is suppressed entirely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::info;

use super::Measurements;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Background reporter thread handle.
pub struct StatusReporter {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StatusReporter {
    /// Spawn the reporter thread.
    pub fn start(measurements: Arc<Measurements>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("status-reporter".to_string())
            .spawn(move || {
                let mut next_report = Instant::now() + interval;
                while !stop_flag.load(Ordering::Relaxed) {
                    thread::sleep(POLL_INTERVAL.min(interval));
                    if Instant::now() >= next_report {
                        Self::report(&measurements);
                        next_report += interval;
                    }
                }
                // Final drain so a short run still surfaces its tail.
                Self::report(&measurements);
            })
            .expect("failed to spawn status-reporter thread");

        Self {
            stop,
            handle: Some(handle),
        }
    }

    fn report(measurements: &Measurements) {
        let line = measurements.summary();
        if !line.is_empty() {
            info!("{line}");
        }
    }

    /// Stop the reporter after its final drain.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
