//! Synchronization (join) node
//!
//! Merges one job from each of N input branches into one combined output
//! after a fixed processing delay.
//!
//! # Phases
//!
//! ```text
//! passive ──arrival (some, not all, branches hold a job)──▶ waiting (σ = ∞)
//!    │                                                        │
//!    └──────────arrival (every branch holds a job)────────────┴──▶ combining (σ = processing_time)
//!
//! combining ──σ expires──▶ pop one head per branch, then
//!                            every branch non-empty → combining
//!                            every branch empty     → passive
//!                            otherwise              → waiting
//! ```
//!
//! The barrier only requires every branch queue to be non-empty; the heads
//! do not need to share a job identity.
//!
//! # Example
//!
//! ```rust
//! use queue_simulator_core_rs::config::SyncConfig;
//! use queue_simulator_core_rs::model::AtomicModel;
//! use queue_simulator_core_rs::nodes::{SyncNode, SyncPhase};
//! use queue_simulator_core_rs::{Job, Message, MessageBatch};
//!
//! let config = SyncConfig {
//!     name: "sync".to_string(),
//!     input_ports: vec!["inA".to_string(), "inB".to_string()],
//!     output_ports: vec!["out".to_string()],
//!     processing_time: 2.0,
//! };
//! let mut node = SyncNode::new(config).unwrap();
//!
//! let mut batch = MessageBatch::new();
//! batch.push("inA", Message::new(Job::new(1u64)));
//! node.external_transition(1.0, batch).unwrap();
//! assert_eq!(node.sync_phase(), SyncPhase::Waiting);
//!
//! let mut batch = MessageBatch::new();
//! batch.push("inB", Message::new(Job::new(2u64)));
//! node.external_transition(0.5, batch).unwrap();
//! assert_eq!(node.sync_phase(), SyncPhase::Combining);
//! assert_eq!(node.time_advance(), 2.0);
//! ```

use crate::config::{ConfigError, SyncConfig};
use crate::core::time::NodeClock;
use crate::model::{check_input_ports, AtomicModel, ModelError, NodeState};
use crate::models::job::Job;
use crate::models::message::{Message, MessageBatch, OutputBag, Payload, Port};
use crate::models::record::{Record, SyncRecord};
use crate::nodes::to_ports;
use crate::sink::{emit, MemorySink, RecordSink};
use std::collections::VecDeque;
use std::fmt;
use tracing::info;

/// Join node phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Passive,
    Waiting,
    Combining,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Passive => "passive",
            SyncPhase::Waiting => "waiting",
            SyncPhase::Combining => "combining",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job held in a branch queue, stamped with its arrival time
#[derive(Debug, Clone, PartialEq)]
struct QueuedJob {
    enqueued_at: f64,
    job: Job,
}

/// Barrier join over the declared input ports
pub struct SyncNode<S: RecordSink = MemorySink> {
    name: String,
    input_ports: Vec<Port>,
    output_ports: Vec<Port>,

    /// One FIFO per input port, same index as `input_ports`
    branches: Vec<VecDeque<QueuedJob>>,

    processing_time: f64,
    state: NodeState<SyncPhase>,
    clock: NodeClock,

    start_of_wait: f64,
    total_waiting_time: f64,
    total_job_waiting_time: f64,
    arrival_rate: f64,
    throughput: f64,
    jobs_received: usize,
    jobs_created: usize,

    sink: S,
}

impl SyncNode<MemorySink> {
    /// Create a join node that keeps its records in memory
    pub fn new(config: SyncConfig) -> Result<Self, ConfigError> {
        Self::with_sink(config, MemorySink::new())
    }
}

impl<S: RecordSink> SyncNode<S> {
    /// Create a join node writing its records to `sink`
    pub fn with_sink(config: SyncConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;

        let input_ports = to_ports(&config.input_ports);
        let branches = vec![VecDeque::new(); input_ports.len()];

        info!(
            node = %config.name,
            branches = input_ports.len(),
            processing_time = config.processing_time,
            "Created synchronization node"
        );

        Ok(Self {
            name: config.name,
            input_ports,
            output_ports: to_ports(&config.output_ports),
            branches,
            processing_time: config.processing_time,
            state: NodeState::passive(SyncPhase::Passive),
            clock: NodeClock::new(),
            start_of_wait: 0.0,
            total_waiting_time: 0.0,
            total_job_waiting_time: 0.0,
            arrival_rate: 0.0,
            throughput: 0.0,
            jobs_received: 0,
            jobs_created: 0,
            sink,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn sync_phase(&self) -> SyncPhase {
        *self.state.phase()
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    /// Queue length per branch, in declared port order
    pub fn queue_lengths(&self) -> Vec<usize> {
        self.branches.iter().map(VecDeque::len).collect()
    }

    /// Job at the head of each branch, in declared port order
    pub fn heads(&self) -> Vec<Option<&Job>> {
        self.branches
            .iter()
            .map(|queue| queue.front().map(|queued| &queued.job))
            .collect()
    }

    /// Mean branch queue length
    pub fn avg_queue_size(&self) -> f64 {
        let total: usize = self.branches.iter().map(VecDeque::len).sum();
        total as f64 / self.branches.len() as f64
    }

    pub fn jobs_received(&self) -> usize {
        self.jobs_received
    }

    /// Number of merges committed so far
    pub fn jobs_created(&self) -> usize {
        self.jobs_created
    }

    pub fn total_waiting_time(&self) -> f64 {
        self.total_waiting_time
    }

    pub fn total_job_waiting_time(&self) -> f64 {
        self.total_job_waiting_time
    }

    pub fn arrival_rate(&self) -> f64 {
        self.arrival_rate
    }

    pub fn throughput(&self) -> f64 {
        self.throughput
    }

    pub fn processing_time(&self) -> f64 {
        self.processing_time
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn all_branches_ready(&self) -> bool {
        self.branches.iter().all(|queue| !queue.is_empty())
    }

    fn all_branches_empty(&self) -> bool {
        self.branches.iter().all(VecDeque::is_empty)
    }

    fn snapshot(&self, branch_index: Option<usize>, waited_time: Option<f64>) -> Record {
        Record::Sync(SyncRecord {
            time: self.clock.current_time(),
            node: self.name.clone(),
            total_waiting_time: self.total_waiting_time,
            total_job_waiting_time: self.total_job_waiting_time,
            avg_queue_size: self.avg_queue_size(),
            arrival_rate: self.arrival_rate,
            throughput: self.throughput,
            branch_index,
            waited_time,
        })
    }

    /// Every branch holds a job: start a merge cycle
    fn commit(&mut self) -> Result<(), ModelError> {
        let now = self.clock.current_time();
        self.total_waiting_time += now - self.start_of_wait;
        self.jobs_created += 1;
        if let Some(throughput) = self.clock.rate(self.jobs_created) {
            self.throughput = throughput;
        }

        let record = self.snapshot(None, None);
        emit(&mut self.sink, record);

        self.state
            .hold_in(&self.name, SyncPhase::Combining, self.processing_time)?;
        Ok(())
    }

    /// Remove the head of every branch, recording how long each waited
    fn pop_heads(&mut self) {
        let now = self.clock.current_time();
        let mut waits = Vec::with_capacity(self.branches.len());
        for queue in self.branches.iter_mut() {
            if let Some(head) = queue.pop_front() {
                waits.push(now - head.enqueued_at);
            }
        }

        for (index, waited) in waits.into_iter().enumerate() {
            self.total_job_waiting_time += waited;
            let record = self.snapshot(Some(index + 1), Some(waited));
            emit(&mut self.sink, record);
        }
    }
}

impl<S: RecordSink> AtomicModel for SyncNode<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_ports(&self) -> &[Port] {
        &self.input_ports
    }

    fn output_ports(&self) -> &[Port] {
        &self.output_ports
    }

    fn phase(&self) -> String {
        self.state.phase().to_string()
    }

    fn time_advance(&self) -> f64 {
        self.state.sigma()
    }

    fn internal_transition(&mut self) -> Result<(), ModelError> {
        let sigma = self.state.expire()?;
        let now = self.clock.advance(sigma)?;

        self.pop_heads();

        if self.all_branches_ready() {
            // Barrier met again without anyone waiting
            self.start_of_wait = now;
            self.commit()
        } else if self.all_branches_empty() {
            self.state.passivate_in(&self.name, SyncPhase::Passive);
            Ok(())
        } else {
            self.start_of_wait = now;
            self.state.passivate_in(&self.name, SyncPhase::Waiting);
            Ok(())
        }
    }

    fn external_transition(
        &mut self,
        elapsed: f64,
        mut batch: MessageBatch,
    ) -> Result<(), ModelError> {
        check_input_ports(&self.name, &self.input_ports, &batch)?;
        self.state.consume(elapsed)?;
        let now = self.clock.advance(elapsed)?;

        let was_passive = self.state.phase_is(&SyncPhase::Passive);
        if was_passive {
            self.start_of_wait = now;
        }

        for (index, port) in self.input_ports.iter().enumerate() {
            for message in batch.take(port) {
                self.branches[index].push_back(QueuedJob {
                    enqueued_at: now,
                    job: message.job,
                });
                self.jobs_received += 1;
                if let Some(rate) = self.clock.rate(self.jobs_received) {
                    self.arrival_rate = rate;
                }
            }
        }

        if self.all_branches_ready() && !self.state.phase_is(&SyncPhase::Combining) {
            self.commit()?;
        } else if was_passive && !self.all_branches_empty() {
            self.state.passivate_in(&self.name, SyncPhase::Waiting);
        }
        Ok(())
    }

    fn output(&self) -> OutputBag {
        let mut bag = OutputBag::new();
        if self.state.phase_is(&SyncPhase::Combining) {
            let avg_queue_size = self.avg_queue_size();
            for port in &self.output_ports {
                bag.push(
                    port.clone(),
                    Message::with_payload(
                        Job::new(self.jobs_created as u64),
                        Payload::Number(avg_queue_size),
                    ),
                );
            }
        }
        bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(branches: &[&str], processing_time: f64) -> SyncNode {
        SyncNode::new(SyncConfig {
            name: "sync".to_string(),
            input_ports: branches.iter().map(|b| b.to_string()).collect(),
            output_ports: vec!["out".to_string()],
            processing_time,
        })
        .unwrap()
    }

    fn arrive(port: &str, id: u64) -> MessageBatch {
        let mut batch = MessageBatch::new();
        batch.push(port, Message::new(Job::new(id)));
        batch
    }

    #[test]
    fn test_empty_input_ports_rejected() {
        let result = SyncNode::new(SyncConfig {
            name: "sync".to_string(),
            input_ports: vec![],
            output_ports: vec!["out".to_string()],
            processing_time: 1.0,
        });
        assert!(matches!(result, Err(ConfigError::NoInputPorts { .. })));
    }

    #[test]
    fn test_waiting_interval_accumulates() {
        let mut sync = node(&["a", "b"], 1.0);
        sync.external_transition(2.0, arrive("a", 1)).unwrap();
        sync.external_transition(3.0, arrive("b", 2)).unwrap();

        assert_eq!(sync.sync_phase(), SyncPhase::Combining);
        assert_eq!(sync.total_waiting_time(), 3.0);
        assert_eq!(sync.jobs_created(), 1);
        assert_eq!(sync.throughput(), 1.0 / 5.0);
    }

    #[test]
    fn test_pop_records_branch_waits() {
        let mut sync = node(&["a", "b"], 1.0);
        sync.external_transition(1.0, arrive("a", 1)).unwrap();
        sync.external_transition(1.0, arrive("b", 2)).unwrap();
        sync.internal_transition().unwrap();

        assert_eq!(sync.sync_phase(), SyncPhase::Passive);
        assert_eq!(sync.queue_lengths(), vec![0, 0]);
        // a waited 2.0 (t=1 → t=3), b waited 1.0 (t=2 → t=3)
        assert_eq!(sync.total_job_waiting_time(), 3.0);

        let branch_records: Vec<_> = sync
            .sink()
            .log()
            .sync_records()
            .filter(|r| r.branch_index.is_some())
            .map(|r| (r.branch_index, r.waited_time))
            .collect();
        assert_eq!(branch_records, vec![(Some(1), Some(2.0)), (Some(2), Some(1.0))]);
    }

    #[test]
    fn test_recommit_when_backlog_remains() {
        let mut sync = node(&["a", "b"], 1.0);
        let mut batch = arrive("a", 1);
        batch.push("a", Message::new(Job::new(2u64)));
        batch.push("b", Message::new(Job::new(3u64)));
        batch.push("b", Message::new(Job::new(4u64)));
        sync.external_transition(1.0, batch).unwrap();
        assert_eq!(sync.jobs_created(), 1);

        sync.internal_transition().unwrap();
        assert_eq!(sync.sync_phase(), SyncPhase::Combining);
        assert_eq!(sync.jobs_created(), 2);
        assert_eq!(sync.queue_lengths(), vec![1, 1]);

        sync.internal_transition().unwrap();
        assert_eq!(sync.sync_phase(), SyncPhase::Passive);
        assert_eq!(sync.time_advance(), f64::INFINITY);
    }

    #[test]
    fn test_output_only_while_combining() {
        let mut sync = node(&["a", "b"], 1.0);
        assert!(sync.output().is_empty());

        sync.external_transition(1.0, arrive("a", 1)).unwrap();
        assert!(sync.output().is_empty());

        sync.external_transition(1.0, arrive("b", 2)).unwrap();
        let bag = sync.output();
        let messages = bag.messages(&Port::from("out"));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload, Payload::Number(1.0));
    }

    #[test]
    fn test_unknown_port_rejected() {
        let mut sync = node(&["a"], 1.0);
        let result = sync.external_transition(1.0, arrive("z", 1));
        assert!(matches!(result, Err(ModelError::UnknownInputPort { .. })));
    }

    #[test]
    fn test_arrival_at_time_zero_keeps_rates() {
        let mut sync = node(&["a"], 1.0);
        sync.external_transition(0.0, arrive("a", 1)).unwrap();
        assert_eq!(sync.sync_phase(), SyncPhase::Combining);
        assert_eq!(sync.arrival_rate(), 0.0);
        assert_eq!(sync.throughput(), 0.0);
    }
}
