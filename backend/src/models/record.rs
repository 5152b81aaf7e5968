//! Analytics records for simulation post-processing.
//!
//! Nodes emit one record after each state-affecting event. Records are the
//! durable analytics contract; storing them is the job of a
//! [`RecordSink`](crate::sink::RecordSink).
//!
//! # Record Types
//!
//! - **Sync**: join node waiting-time and throughput statistics
//! - **Turnaround**: end-to-end latency measured by the turnaround tracker
//! - **Markov**: arrival / throughput / loss statistics of Markov-driven nodes
//!
//! # Example
//!
//! ```rust
//! use queue_simulator_core_rs::models::record::{Record, TurnaroundRecord};
//!
//! let record = Record::Turnaround(TurnaroundRecord {
//!     time: 5.0,
//!     node: "transducer".to_string(),
//!     processed_count: 1,
//!     turnaround_time: Some(4.0),
//!     arrival_time: Some(1.0),
//!     arrival_rate: 0.4,
//!     throughput: 0.2,
//!     outstanding_count: 1,
//!     avg_turnaround_time: 4.0,
//! });
//!
//! assert_eq!(record.time(), 5.0);
//! assert_eq!(record.record_type(), "Turnaround");
//! ```

use serde::{Serialize, Serializer};

/// Serialize a missing measurement as the literal `"NA"`
fn na_if_none<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_f64(*v),
        None => serializer.serialize_str("NA"),
    }
}

/// Join node statistics
///
/// Counters are read after the event is applied: the summary record of a
/// merge already includes that merge in `throughput`.
///
/// `branch_index` (1-based, declared port order) and `waited_time` are set
/// only on the per-branch records written when a merge pops its heads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncRecord {
    pub time: f64,
    pub node: String,
    pub total_waiting_time: f64,
    pub total_job_waiting_time: f64,
    pub avg_queue_size: f64,
    pub arrival_rate: f64,
    pub throughput: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waited_time: Option<f64>,
}

/// Turnaround tracker statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnaroundRecord {
    pub time: f64,
    pub node: String,
    pub processed_count: usize,
    #[serde(serialize_with = "na_if_none")]
    pub turnaround_time: Option<f64>,
    #[serde(serialize_with = "na_if_none")]
    pub arrival_time: Option<f64>,
    pub arrival_rate: f64,
    pub throughput: f64,
    pub outstanding_count: usize,
    pub avg_turnaround_time: f64,
}

/// Markov-driven node statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkovRecord {
    pub time: f64,
    pub node: String,
    pub phase: String,
    pub arrival_rate: f64,
    pub throughput: f64,
    pub lost_count: usize,
    pub received_count: usize,
    pub dispatched_count: usize,
}

/// One analytics record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Sync(SyncRecord),
    Turnaround(TurnaroundRecord),
    Markov(MarkovRecord),
}

impl Record {
    /// Simulated time the record was taken
    pub fn time(&self) -> f64 {
        match self {
            Record::Sync(r) => r.time,
            Record::Turnaround(r) => r.time,
            Record::Markov(r) => r.time,
        }
    }

    /// Name of the emitting node
    pub fn node(&self) -> &str {
        match self {
            Record::Sync(r) => &r.node,
            Record::Turnaround(r) => &r.node,
            Record::Markov(r) => &r.node,
        }
    }

    /// Short description of the record type
    pub fn record_type(&self) -> &'static str {
        match self {
            Record::Sync(_) => "Sync",
            Record::Turnaround(_) => "Turnaround",
            Record::Markov(_) => "Markov",
        }
    }
}

/// In-memory record log with query helpers.
#[derive(Debug, Clone, Default)]
pub struct RecordLog {
    records: Vec<Record>,
}

impl RecordLog {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn log(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Records taken at a specific time
    pub fn records_at(&self, time: f64) -> Vec<&Record> {
        self.records.iter().filter(|r| r.time() == time).collect()
    }

    /// Records emitted by a specific node
    pub fn records_for_node(&self, node: &str) -> Vec<&Record> {
        self.records.iter().filter(|r| r.node() == node).collect()
    }

    /// Join node records, in emission order
    pub fn sync_records(&self) -> impl Iterator<Item = &SyncRecord> {
        self.records.iter().filter_map(|r| match r {
            Record::Sync(s) => Some(s),
            _ => None,
        })
    }

    /// Turnaround records, in emission order
    pub fn turnaround_records(&self) -> impl Iterator<Item = &TurnaroundRecord> {
        self.records.iter().filter_map(|r| match r {
            Record::Turnaround(t) => Some(t),
            _ => None,
        })
    }

    /// Markov node records, in emission order
    pub fn markov_records(&self) -> impl Iterator<Item = &MarkovRecord> {
        self.records.iter().filter_map(|r| match r {
            Record::Markov(m) => Some(m),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
