//! Analytics record sinks
//!
//! Nodes never write files themselves. Each node is handed a [`RecordSink`]
//! at construction and pushes one [`Record`] after every state-affecting
//! event. Sink failures are logged and swallowed: losing an analytics record
//! must never change simulation state or control flow.

use crate::models::record::{Record, RecordLog};
use std::io::Write;
use thiserror::Error;
use tracing::warn;

/// Errors a sink may report while persisting a record
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink closed")]
    Closed,
}

/// Destination for analytics records
pub trait RecordSink {
    fn record(&mut self, record: Record) -> Result<(), SinkError>;
}

/// Push a record, logging (not propagating) any failure.
pub(crate) fn emit<S: RecordSink + ?Sized>(sink: &mut S, record: Record) {
    let node = record.node().to_string();
    let time = record.time();
    if let Err(err) = sink.record(record) {
        warn!(node = %node, time, error = %err, "Analytics record dropped");
    }
}

/// Keeps every record in memory
///
/// # Example
/// ```
/// use queue_simulator_core_rs::sink::{MemorySink, RecordSink};
///
/// let sink = MemorySink::new();
/// assert!(sink.log().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    log: RecordLog,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            log: RecordLog::new(),
        }
    }

    pub fn log(&self) -> &RecordLog {
        &self.log
    }

    pub fn into_log(self) -> RecordLog {
        self.log
    }
}

impl RecordSink for MemorySink {
    fn record(&mut self, record: Record) -> Result<(), SinkError> {
        self.log.log(record);
        Ok(())
    }
}

/// Writes one JSON object per line to any `Write`
///
/// # Example
/// ```
/// use queue_simulator_core_rs::sink::JsonLinesSink;
///
/// let sink = JsonLinesSink::new(Vec::new());
/// assert!(sink.into_inner().is_empty());
/// ```
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of records successfully written
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn record(&mut self, record: Record) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn record(&mut self, record: Record) -> Result<(), SinkError> {
        (**self).record(record)
    }
}
