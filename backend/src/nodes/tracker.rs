//! Turnaround tracker
//!
//! Observes job arrivals on its first input port and completions on its
//! second, matches each completion to an outstanding arrival under the
//! active [`MatchPolicy`] and records the turnaround time.
//!
//! The tracker never schedules an event of its own: it is `passive` when
//! nothing is outstanding and `expecting` otherwise, both with an infinite
//! time-advance.
//!
//! Within one batch, arrivals are folded before completions so a job that
//! arrives and completes at the same instant matches with turnaround 0.

use crate::config::{ConfigError, TrackerConfig};
use crate::core::time::NodeClock;
use crate::model::{check_input_ports, AtomicModel, ModelError, NodeState};
use crate::models::job::JobId;
use crate::models::message::{MessageBatch, OutputBag, Port};
use crate::models::record::{Record, TurnaroundRecord};
use crate::nodes::to_ports;
use crate::sink::{emit, MemorySink, RecordSink};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{debug, info};

pub use crate::config::MatchPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    Passive,
    Expecting,
}

impl fmt::Display for TrackerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerPhase::Passive => f.write_str("passive"),
            TrackerPhase::Expecting => f.write_str("expecting"),
        }
    }
}

/// Result of matching one completion
#[derive(Debug, Clone, Copy, PartialEq)]
struct Match {
    arrival_time: f64,
    turnaround_time: f64,
}

/// End-to-end latency tracker
///
/// # Example
///
/// ```rust
/// use queue_simulator_core_rs::config::{MatchPolicy, TrackerConfig};
/// use queue_simulator_core_rs::model::AtomicModel;
/// use queue_simulator_core_rs::nodes::TurnaroundTracker;
/// use queue_simulator_core_rs::{Job, Message, MessageBatch};
///
/// let mut tracker =
///     TurnaroundTracker::new(TrackerConfig::new("transducer", MatchPolicy::Arbitrary)).unwrap();
///
/// let mut batch = MessageBatch::new();
/// batch.push("inGeneratedJobs", Message::new(Job::new(1u64)));
/// tracker.external_transition(1.0, batch).unwrap();
///
/// let mut batch = MessageBatch::new();
/// batch.push("inProcessedJobs", Message::new(Job::new(1u64)));
/// tracker.external_transition(3.0, batch).unwrap();
///
/// assert_eq!(tracker.avg_turnaround_time(), 3.0);
/// assert_eq!(tracker.outstanding_count(), 0);
/// ```
pub struct TurnaroundTracker<S: RecordSink = MemorySink> {
    name: String,
    input_ports: Vec<Port>,
    output_ports: Vec<Port>,
    policy: MatchPolicy,

    state: NodeState<TrackerPhase>,
    clock: NodeClock,

    /// Outstanding arrival times, oldest first (`Arbitrary`, `FifoMerge`)
    arrivals: VecDeque<f64>,

    /// Outstanding arrival time per identity (`Exact`)
    pending: HashMap<JobId, f64>,

    generated_count: usize,
    processed_count: usize,
    total_turnaround_time: f64,
    avg_turnaround_time: f64,
    arrival_rate: f64,
    throughput: f64,

    sink: S,
}

impl TurnaroundTracker<MemorySink> {
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        Self::with_sink(config, MemorySink::new())
    }
}

impl<S: RecordSink> TurnaroundTracker<S> {
    pub fn with_sink(config: TrackerConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(node = %config.name, policy = ?config.policy, "Created turnaround tracker");

        Ok(Self {
            name: config.name,
            input_ports: to_ports(&config.input_ports),
            output_ports: to_ports(&config.output_ports),
            policy: config.policy,
            state: NodeState::passive(TrackerPhase::Passive),
            clock: NodeClock::new(),
            arrivals: VecDeque::new(),
            pending: HashMap::new(),
            generated_count: 0,
            processed_count: 0,
            total_turnaround_time: 0.0,
            avg_turnaround_time: 0.0,
            arrival_rate: 0.0,
            throughput: 0.0,
            sink,
        })
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn tracker_phase(&self) -> TrackerPhase {
        *self.state.phase()
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    /// Arrivals not yet matched by a completion
    pub fn outstanding_count(&self) -> usize {
        match self.policy {
            MatchPolicy::Exact => self.pending.len(),
            MatchPolicy::Arbitrary | MatchPolicy::FifoMerge => self.arrivals.len(),
        }
    }

    pub fn generated_count(&self) -> usize {
        self.generated_count
    }

    pub fn processed_count(&self) -> usize {
        self.processed_count
    }

    pub fn total_turnaround_time(&self) -> f64 {
        self.total_turnaround_time
    }

    pub fn avg_turnaround_time(&self) -> f64 {
        self.avg_turnaround_time
    }

    pub fn arrival_rate(&self) -> f64 {
        self.arrival_rate
    }

    pub fn throughput(&self) -> f64 {
        self.throughput
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn on_arrival(&mut self, id: JobId) {
        let now = self.clock.current_time();
        match self.policy {
            MatchPolicy::Exact => {
                self.pending.insert(id, now);
            }
            MatchPolicy::Arbitrary | MatchPolicy::FifoMerge => self.arrivals.push_back(now),
        }
        self.generated_count += 1;
        if let Some(rate) = self.clock.rate(self.generated_count) {
            self.arrival_rate = rate;
        }

        let record = self.snapshot(None, Some(now));
        emit(&mut self.sink, record);
    }

    fn on_completion(&mut self, id: &JobId) {
        let now = self.clock.current_time();
        self.processed_count += 1;
        if let Some(throughput) = self.clock.rate(self.processed_count) {
            self.throughput = throughput;
        }

        let matched = self.match_completion(id, now);
        match matched {
            Some(m) => {
                self.total_turnaround_time += m.turnaround_time;
                self.avg_turnaround_time =
                    self.total_turnaround_time / self.processed_count as f64;
                let record = self.snapshot(Some(m.turnaround_time), Some(m.arrival_time));
                emit(&mut self.sink, record);
            }
            None => {
                debug!(node = %self.name, job = %id, "Completion with nothing outstanding");
                let record = self.snapshot(None, None);
                emit(&mut self.sink, record);
            }
        }
    }

    /// `None` when nothing at all is outstanding
    fn match_completion(&mut self, id: &JobId, now: f64) -> Option<Match> {
        match self.policy {
            MatchPolicy::Arbitrary | MatchPolicy::FifoMerge => {
                self.arrivals.pop_front().map(|arrival_time| Match {
                    arrival_time,
                    turnaround_time: now - arrival_time,
                })
            }
            MatchPolicy::Exact => {
                if self.pending.is_empty() {
                    return None;
                }
                match self.pending.remove(id) {
                    Some(arrival_time) => Some(Match {
                        arrival_time,
                        turnaround_time: now - arrival_time,
                    }),
                    None => {
                        debug!(node = %self.name, job = %id, "Unmatched completion");
                        Some(Match {
                            arrival_time: now,
                            turnaround_time: 0.0,
                        })
                    }
                }
            }
        }
    }

    fn snapshot(&self, turnaround_time: Option<f64>, arrival_time: Option<f64>) -> Record {
        Record::Turnaround(TurnaroundRecord {
            time: self.clock.current_time(),
            node: self.name.clone(),
            processed_count: self.processed_count,
            turnaround_time,
            arrival_time,
            arrival_rate: self.arrival_rate,
            throughput: self.throughput,
            outstanding_count: self.outstanding_count(),
            avg_turnaround_time: self.avg_turnaround_time,
        })
    }

    fn settle_phase(&mut self) {
        let phase = if self.outstanding_count() > 0 {
            TrackerPhase::Expecting
        } else {
            TrackerPhase::Passive
        };
        if !self.state.phase_is(&phase) {
            self.state.passivate_in(&self.name, phase);
        }
    }
}

impl<S: RecordSink> AtomicModel for TurnaroundTracker<S> {
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

    /// Never scheduled: the time-advance is always infinite
    fn internal_transition(&mut self) -> Result<(), ModelError> {
        self.state.expire()?;
        Ok(())
    }

    fn external_transition(
        &mut self,
        elapsed: f64,
        mut batch: MessageBatch,
    ) -> Result<(), ModelError> {
        check_input_ports(&self.name, &self.input_ports, &batch)?;
        self.state.consume(elapsed)?;
        self.clock.advance(elapsed)?;

        let arrivals = batch.take(&self.input_ports[0]);
        let completions = batch.take(&self.input_ports[1]);

        for message in arrivals {
            self.on_arrival(message.job.into_id());
        }
        for message in completions {
            self.on_completion(message.job.id());
        }

        self.settle_phase();
        Ok(())
    }

    fn output(&self) -> OutputBag {
        OutputBag::new()
    }
}
