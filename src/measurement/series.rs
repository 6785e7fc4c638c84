//! Windowed latency time series
//!
//! One metric's worth of aggregation: a permanent ordered series of
//! window averages plus transient running statistics for status display.
//! All mutable state sits behind a single mutex per metric; sample rates
//! are high enough that one lock per metric, not per window, is the right
//! granularity.

use std::collections::HashMap;
use std::io;
use std::time::Instant;

use parking_lot::Mutex;

use super::exporter::{ExportValue, MeasurementExporter};
use crate::backend::Status;

/// One closed window: offset in milliseconds since the metric's first
/// sample, and the average latency over that window. Immutable once
/// appended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesUnit {
    pub time: u64,
    pub average: f64,
}

/// Lifetime statistics snapshot for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifetimeStats {
    pub operations: u64,
    pub average: f64,
    pub min: u64,
    pub max: u64,
}

/// Aggregation state for one named metric.
pub struct TimeSeries {
    name: String,
    granularity: u64,
    batch_size: Option<u64>,
    epoch: Instant,
    state: Mutex<SeriesState>,
}

#[derive(Default)]
struct SeriesState {
    /// Millisecond timestamp of the first sample; unset until it arrives.
    start: Option<u64>,
    /// Offset of the currently open window.
    current_unit: u64,
    /// Samples accumulated in the open window.
    count: u64,
    sum: u64,
    /// Lifetime accumulators.
    operations: u64,
    total_latency: u64,
    min: Option<u64>,
    max: Option<u64>,
    /// Windowed-only counters, drained by the status reporter on its own
    /// cadence, independent of window-close bookkeeping.
    window_operations: u64,
    window_total_latency: u64,
    /// Closed windows, ordered by offset.
    units: Vec<SeriesUnit>,
    /// Operation outcomes by status code.
    status_counts: HashMap<Status, u64>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>, granularity_ms: u64) -> Self {
        Self {
            name: name.into(),
            granularity: granularity_ms,
            batch_size: None,
            epoch: Instant::now(),
            state: Mutex::new(SeriesState::default()),
        }
    }

    /// Mark this metric as a batched operation class: export gains a
    /// fixed batch-size fact and `Batch`-prefixed scalar labels.
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Record one successful operation's latency in microseconds.
    ///
    /// Safe under concurrent calls from every worker sharing the metric.
    pub fn record(&self, latency_us: u64) {
        self.record_at(self.now_ms(), latency_us);
    }

    fn record_at(&self, now_ms: u64, latency_us: u64) {
        let mut state = self.state.lock();
        Self::close_boundary(&mut state, self.granularity, now_ms, false);

        state.count += 1;
        state.sum += latency_us;
        state.operations += 1;
        state.total_latency += latency_us;
        state.window_operations += 1;
        state.window_total_latency += latency_us;

        state.max = Some(state.max.map_or(latency_us, |m| m.max(latency_us)));
        state.min = Some(state.min.map_or(latency_us, |m| m.min(latency_us)));
    }

    /// Close the open window if `now_ms` falls past its boundary, or
    /// unconditionally when forced. Samples are never reassigned to the
    /// window they arrived late for; a window with no samples closes
    /// without leaving a record.
    fn close_boundary(state: &mut SeriesState, granularity: u64, now_ms: u64, force: bool) {
        let start = match state.start {
            Some(start) => start,
            None if force => return,
            None => {
                state.start = Some(now_ms);
                now_ms
            }
        };

        let elapsed = now_ms.saturating_sub(start);
        let unit = (elapsed / granularity) * granularity;

        if unit > state.current_unit || force {
            if state.count > 0 {
                let average = state.sum as f64 / state.count as f64;
                state.units.push(SeriesUnit {
                    time: state.current_unit,
                    average,
                });
            }
            state.current_unit = unit;
            state.count = 0;
            state.sum = 0;
        }
    }

    /// Force the currently open window closed so a tail partial window is
    /// not lost. Called at export time; closing with no accumulated
    /// samples leaves the series untouched.
    pub fn finalize(&self) {
        let now = self.now_ms();
        let mut state = self.state.lock();
        Self::close_boundary(&mut state, self.granularity, now, true);
    }

    /// Count one operation outcome by status code.
    pub fn report_status(&self, status: Status) {
        *self.state.lock().status_counts.entry(status).or_insert(0) += 1;
    }

    /// Average latency of the samples since the previous drain, resetting
    /// the windowed-only counters. `None` when nothing arrived.
    pub fn drain_window_summary(&self) -> Option<f64> {
        let mut state = self.state.lock();
        if state.window_operations == 0 {
            return None;
        }
        let average = state.window_total_latency as f64 / state.window_operations as f64;
        state.window_operations = 0;
        state.window_total_latency = 0;
        Some(average)
    }

    /// One status-line fragment, empty (suppressed) when no samples
    /// arrived since the previous drain.
    pub fn summary(&self) -> String {
        match self.drain_window_summary() {
            Some(average) => format!("[{} AverageLatency(us)={:.2}]", self.name, average),
            None => String::new(),
        }
    }

    /// Lifetime statistics; min/max are 0 until the first sample.
    pub fn lifetime(&self) -> LifetimeStats {
        let state = self.state.lock();
        LifetimeStats {
            operations: state.operations,
            average: if state.operations > 0 {
                state.total_latency as f64 / state.operations as f64
            } else {
                0.0
            },
            min: state.min.unwrap_or(0),
            max: state.max.unwrap_or(0),
        }
    }

    /// The closed windows so far, in chronological order.
    pub fn units(&self) -> Vec<SeriesUnit> {
        self.state.lock().units.clone()
    }

    /// Emit this metric's facts in the contractual order: batch-size fact
    /// (batched metrics only), operation count, average, min, max,
    /// status-code counts, then each closed window chronologically. The
    /// open tail window is force-closed first.
    pub fn export(&self, exporter: &mut dyn MeasurementExporter) -> io::Result<()> {
        let now = self.now_ms();
        let mut state = self.state.lock();
        Self::close_boundary(&mut state, self.granularity, now, true);

        let mut prefix = "";
        if let Some(batch_size) = self.batch_size {
            exporter.write(&self.name, "BatchSize", ExportValue::from(batch_size))?;
            prefix = "Batch";
        }

        let average = if state.operations > 0 {
            state.total_latency as f64 / state.operations as f64
        } else {
            0.0
        };

        exporter.write(
            &self.name,
            &format!("{prefix}Operations"),
            state.operations.into(),
        )?;
        exporter.write(
            &self.name,
            &format!("{prefix}AverageLatency(us)"),
            average.into(),
        )?;
        exporter.write(
            &self.name,
            &format!("{prefix}MinLatency(us)"),
            state.min.unwrap_or(0).into(),
        )?;
        exporter.write(
            &self.name,
            &format!("{prefix}MaxLatency(us)"),
            state.max.unwrap_or(0).into(),
        )?;

        for status in [Status::Ok, Status::Error, Status::NotImplemented] {
            if let Some(&count) = state.status_counts.get(&status) {
                exporter.write(&self.name, &format!("Return={}", status.name()), count.into())?;
            }
        }

        for unit in &state.units {
            exporter.write(&self.name, &unit.time.to_string(), unit.average.into())?;
        }
        Ok(())
    }
}
