//! Latency measurement and export
//!
//! Per-metric windowed aggregation, the run-wide registry shared by all
//! workers, export sinks, and the periodic status reporter.

pub mod exporter;
pub mod reporter;
pub mod series;

pub use exporter::{ExportValue, JsonExporter, MeasurementExporter, TextExporter};
pub use reporter::StatusReporter;
pub use series::{LifetimeStats, SeriesUnit, TimeSeries};

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::Status;
use crate::config::RunConfig;

/// Metric names carrying a fixed batch-size fact.
const BATCH_READ: &str = "BATCH_READ";
const BATCH_UPDATE: &str = "BATCH_UPDATE";

/// Registry of per-metric time series, shared by every worker in a run.
pub struct Measurements {
    granularity: u64,
    read_batch_size: u64,
    update_batch_size: u64,
    metrics: RwLock<HashMap<String, Arc<TimeSeries>>>,
}

impl Measurements {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            granularity: config.granularity_ms,
            read_batch_size: config.read_batch_size as u64,
            update_batch_size: config.update_batch_size as u64,
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the series for a metric name.
    pub fn metric(&self, name: &str) -> Arc<TimeSeries> {
        {
            let metrics = self.metrics.read();
            if let Some(series) = metrics.get(name) {
                return Arc::clone(series);
            }
        }

        let mut metrics = self.metrics.write();
        Arc::clone(metrics.entry(name.to_string()).or_insert_with(|| {
            let series = TimeSeries::new(name, self.granularity);
            let series = match name {
                BATCH_READ => series.with_batch_size(self.read_batch_size),
                BATCH_UPDATE => series.with_batch_size(self.update_batch_size),
                _ => series,
            };
            Arc::new(series)
        }))
    }

    /// Record one successful operation's latency in microseconds.
    pub fn record(&self, name: &str, latency_us: u64) {
        self.metric(name).record(latency_us);
    }

    /// Count one operation outcome by status code.
    pub fn report_status(&self, name: &str, status: Status) {
        self.metric(name).report_status(status);
    }

    /// Status line across all metrics in name order; empty when nothing
    /// arrived since the previous drain.
    pub fn summary(&self) -> String {
        let metrics = self.metrics.read();
        let mut names: Vec<&String> = metrics.keys().collect();
        names.sort();

        let mut line = String::new();
        for name in names {
            let fragment = metrics[name].summary();
            if !fragment.is_empty() {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(&fragment);
            }
        }
        line
    }

    /// Export every metric in name order, force-closing tail windows.
    pub fn export(&self, exporter: &mut dyn MeasurementExporter) -> io::Result<()> {
        let metrics = self.metrics.read();
        let mut names: Vec<&String> = metrics.keys().collect();
        names.sort();

        for name in names {
            metrics[name].export(exporter)?;
        }
        Ok(())
    }
}
