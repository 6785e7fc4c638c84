//! Measurement export sinks
//!
//! The export contract is one `write` call per fact: a metric name, a
//! field label, and a value.

use std::fmt;
use std::io::{self, Write};

use serde_json::json;

/// A single exported fact value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportValue {
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl From<u64> for ExportValue {
    fn from(value: u64) -> Self {
        Self::Unsigned(value)
    }
}

impl From<f64> for ExportValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ExportValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ExportValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for ExportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportValue::Unsigned(value) => write!(f, "{value}"),
            ExportValue::Float(value) => write!(f, "{value}"),
            ExportValue::Text(value) => f.write_str(value),
        }
    }
}

/// Key/value sink for measurement export, invoked once per fact.
pub trait MeasurementExporter {
    fn write(&mut self, metric: &str, label: &str, value: ExportValue) -> io::Result<()>;
}

/// Plain-text exporter: one `[METRIC], Label, value` line per fact.
pub struct TextExporter<W: Write> {
    out: W,
}

impl<W: Write> TextExporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MeasurementExporter for TextExporter<W> {
    fn write(&mut self, metric: &str, label: &str, value: ExportValue) -> io::Result<()> {
        writeln!(self.out, "[{metric}], {label}, {value}")
    }
}

/// JSON exporter: accumulates facts and writes one pretty-printed array
/// on [`finish`](JsonExporter::finish).
pub struct JsonExporter<W: Write> {
    out: W,
    entries: Vec<serde_json::Value>,
}

impl<W: Write> JsonExporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            entries: Vec::new(),
        }
    }

    pub fn finish(mut self) -> io::Result<W> {
        let doc = serde_json::Value::Array(std::mem::take(&mut self.entries));
        writeln!(self.out, "{}", serde_json::to_string_pretty(&doc)?)?;
        Ok(self.out)
    }
}

impl<W: Write> MeasurementExporter for JsonExporter<W> {
    fn write(&mut self, metric: &str, label: &str, value: ExportValue) -> io::Result<()> {
        let value = match value {
            ExportValue::Unsigned(v) => json!(v),
            ExportValue::Float(v) => json!(v),
            ExportValue::Text(v) => json!(v),
        };
        self.entries.push(json!({
            "metric": metric,
            "measurement": label,
            "value": value,
        }));
        Ok(())
    }
}
