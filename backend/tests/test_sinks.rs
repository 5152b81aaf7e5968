//! Tests for analytics record sinks

use queue_simulator_core_rs::config::{MatchPolicy, SyncConfig, TrackerConfig};
use queue_simulator_core_rs::model::AtomicModel;
use queue_simulator_core_rs::nodes::{SyncNode, TurnaroundTracker};
use queue_simulator_core_rs::sink::{JsonLinesSink, MemorySink, RecordSink, SinkError};
use queue_simulator_core_rs::{Job, Message, MessageBatch, Record};
use serde_json::Value;
use std::io::{self, Write};

fn batch(port: &str, id: u64) -> MessageBatch {
    let mut batch = MessageBatch::new();
    batch.push(port, Message::new(Job::new(id)));
    batch
}

fn lines(bytes: &[u8]) -> Vec<Value> {
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Writer that refuses every write
struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_json_lines_one_object_per_record() {
    let mut tracker = TurnaroundTracker::with_sink(
        TrackerConfig::new("transducer", MatchPolicy::Arbitrary),
        JsonLinesSink::new(Vec::new()),
    )
    .unwrap();

    tracker.external_transition(1.0, batch("inGeneratedJobs", 1)).unwrap();
    tracker.external_transition(4.0, batch("inProcessedJobs", 1)).unwrap();
    tracker.external_transition(1.0, batch("inProcessedJobs", 2)).unwrap();

    assert_eq!(tracker.sink().written(), 3);
    let records = lines(&tracker.into_sink().into_inner());
    assert_eq!(records.len(), 3);

    assert_eq!(records[0]["kind"], "turnaround");
    assert_eq!(records[0]["node"], "transducer");
    assert_eq!(records[0]["turnaround_time"], "NA");
    assert_eq!(records[0]["arrival_time"], 1.0);

    assert_eq!(records[1]["turnaround_time"], 4.0);
    assert_eq!(records[1]["processed_count"], 1);

    assert_eq!(records[2]["turnaround_time"], "NA");
    assert_eq!(records[2]["arrival_time"], "NA");
}

#[test]
fn test_sync_records_carry_branch_fields_only_on_pop() {
    let config = SyncConfig {
        name: "sync".to_string(),
        input_ports: vec!["a".to_string(), "b".to_string()],
        output_ports: vec!["out".to_string()],
        processing_time: 1.0,
    };
    let mut node = SyncNode::with_sink(config, JsonLinesSink::new(Vec::new())).unwrap();

    let mut both = batch("a", 1);
    both.push("b", Message::new(Job::new(2u64)));
    node.external_transition(2.0, both).unwrap();
    node.internal_transition().unwrap();

    let records = lines(&node.into_sink().into_inner());
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["kind"], "sync");
    assert!(records[0].get("branch_index").is_none());
    assert_eq!(records[1]["branch_index"], 1);
    assert_eq!(records[2]["branch_index"], 2);
    assert_eq!(records[2]["waited_time"], 1.0);
}

#[test]
fn test_json_lines_reports_io_errors() {
    let mut sink = JsonLinesSink::new(BrokenPipe);
    let mut memory = MemorySink::new();
    let mut tracker = TurnaroundTracker::new(TrackerConfig::new("t", MatchPolicy::Exact)).unwrap();
    tracker.external_transition(1.0, batch("inGeneratedJobs", 1)).unwrap();
    let record: Record = tracker.sink().log().records()[0].clone();

    assert!(matches!(sink.record(record.clone()), Err(SinkError::Io(_))));
    assert_eq!(sink.written(), 0);
    memory.record(record).unwrap();
    assert_eq!(memory.log().len(), 1);
}

#[test]
fn test_broken_writer_does_not_stop_the_node() {
    let mut tracker = TurnaroundTracker::with_sink(
        TrackerConfig::new("transducer", MatchPolicy::Arbitrary),
        JsonLinesSink::new(BrokenPipe),
    )
    .unwrap();

    tracker.external_transition(1.0, batch("inGeneratedJobs", 1)).unwrap();
    tracker.external_transition(2.0, batch("inProcessedJobs", 1)).unwrap();

    assert_eq!(tracker.avg_turnaround_time(), 2.0);
    assert_eq!(tracker.sink().written(), 0);
}

#[test]
fn test_memory_sink_keeps_emission_order() {
    let mut tracker =
        TurnaroundTracker::new(TrackerConfig::new("t", MatchPolicy::Arbitrary)).unwrap();
    tracker.external_transition(1.0, batch("inGeneratedJobs", 1)).unwrap();
    tracker.external_transition(1.0, batch("inGeneratedJobs", 2)).unwrap();

    let log = tracker.into_sink().into_log();
    let times: Vec<f64> = log.records().iter().map(Record::time).collect();
    assert_eq!(times, vec![1.0, 2.0]);
    assert_eq!(log.records_for_node("t").len(), 2);
}
