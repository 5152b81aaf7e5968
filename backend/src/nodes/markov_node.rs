//! Markov-driven source and action nodes
//!
//! One node type covers every stochastic stage of a network. Its phase walks
//! the states of a [`TransitionTable`]; each step is timed by the node's own
//! [`MarkovScheduler`].
//!
//! # Phases
//!
//! - `Passive`: action node with no job (σ = ∞)
//! - `Dwelling(s)`: decision state `s`; the scheduler either samples a
//!   holding time (epoch 1) or confirms the pending step (epoch 2)
//! - `Arrived(t)`: zero-duration visit to the state just reached. If `t` has
//!   successors the chain continues from it, otherwise `t` is an exit state
//!
//! # Roles
//!
//! - [`MarkovRole::Source`] starts dwelling in the home state and restarts
//!   there after every exit, numbering its jobs 1, 2, 3, ...
//! - [`MarkovRole::Action`] starts passive, accepts one job while passive and
//!   loses every job that arrives while it is busy.
//!
//! Output: while dwelling in `s` with a committed transition pending to a
//! routed state, the node emits its current job on that state's port. A
//! wait clamped to `max_time_advance` announces the continuation state
//! instead, so a routed continuation is dispatched like any other exit.

use crate::config::{ConfigError, MarkovConfig, MarkovRole};
use crate::core::time::NodeClock;
use crate::markov::scheduler::{DwellRecord, MarkovScheduler, MarkovStep, PendingTransition};
use crate::markov::table::{StateId, TransitionTable};
use crate::model::{check_input_ports, AtomicModel, ModelError, NodeState};
use crate::models::job::Job;
use crate::models::message::{Message, MessageBatch, OutputBag, Port};
use crate::models::record::{MarkovRecord, Record};
use crate::nodes::to_ports;
use crate::sink::{emit, MemorySink, RecordSink};
use tracing::{debug, info, warn};

/// Phase of a Markov-driven node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkovPhase {
    Passive,
    Dwelling(StateId),
    Arrived(StateId),
}

impl MarkovPhase {
    /// Table state the phase refers to (`None` when passive)
    pub fn state(&self) -> Option<StateId> {
        match self {
            MarkovPhase::Passive => None,
            MarkovPhase::Dwelling(s) | MarkovPhase::Arrived(s) => Some(*s),
        }
    }
}

/// Stochastic node driven by a transition table
///
/// # Example
///
/// ```rust
/// use queue_simulator_core_rs::config::{MarkovConfig, MarkovRole};
/// use queue_simulator_core_rs::markov::TransitionTable;
/// use queue_simulator_core_rs::model::AtomicModel;
/// use queue_simulator_core_rs::nodes::MarkovNode;
/// use queue_simulator_core_rs::Port;
/// use std::collections::BTreeMap;
///
/// let table = TransitionTable::from_json_str(r#"{ "states": [
///     { "name": "generating", "transitions": [
///         { "to": "emitted", "weight": 1.0, "holding_time": { "kind": "fixed", "value": 2.0 } } ] } ] }"#).unwrap();
///
/// let config = MarkovConfig {
///     name: "generator".to_string(),
///     role: MarkovRole::Source,
///     input_ports: vec![],
///     output_ports: vec!["out".to_string()],
///     table_path: None,
///     home_state: "generating".to_string(),
///     max_time_advance: f64::INFINITY,
///     continuation_state: None,
///     seed: 42,
///     routes: BTreeMap::from([("emitted".to_string(), "out".to_string())]),
/// };
/// let mut node = MarkovNode::from_table(config, table).unwrap();
///
/// node.internal_transition().unwrap(); // decision: dwell 2.0
/// assert_eq!(node.time_advance(), 2.0);
///
/// let bag = node.output();
/// assert_eq!(bag.messages(&Port::from("out")).len(), 1);
/// ```
pub struct MarkovNode<S: RecordSink = MemorySink> {
    name: String,
    role: MarkovRole,
    input_ports: Vec<Port>,
    output_ports: Vec<Port>,

    scheduler: MarkovScheduler,
    home: StateId,

    /// Output port per state, indexed by StateId
    routes: Vec<Option<Port>>,

    state: NodeState<MarkovPhase>,
    clock: NodeClock,

    current_job: Option<Job>,
    generated_count: u64,
    received_count: usize,
    lost_count: usize,
    dispatched_count: usize,
    arrival_rate: f64,
    throughput: f64,

    sink: S,
}

impl MarkovNode<MemorySink> {
    /// Create a node from a config whose `table_path` names a JSON table
    pub fn new(config: MarkovConfig) -> Result<Self, ConfigError> {
        let table = match &config.table_path {
            Some(path) => TransitionTable::from_path(path)?,
            None => {
                return Err(ConfigError::MissingTable {
                    node: config.name.clone(),
                })
            }
        };
        Self::from_table(config, table)
    }

    /// Create a node from an already loaded table (`table_path` is ignored)
    pub fn from_table(config: MarkovConfig, table: TransitionTable) -> Result<Self, ConfigError> {
        Self::with_sink(config, table, MemorySink::new())
    }
}

impl<S: RecordSink> MarkovNode<S> {
    pub fn with_sink(
        config: MarkovConfig,
        table: TransitionTable,
        sink: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let lookup = |state: &str| {
            table.state_id(state).ok_or_else(|| ConfigError::UnknownState {
                node: config.name.clone(),
                state: state.to_string(),
            })
        };

        let home = lookup(config.home_state.as_str())?;
        let continuation = config
            .continuation_state
            .as_deref()
            .map(lookup)
            .transpose()?;

        let mut routes = vec![None; table.len()];
        for (state, port) in &config.routes {
            routes[lookup(state.as_str())?.index()] = Some(Port::new(port.as_str()));
        }

        let fingerprint = table.fingerprint()?;
        info!(
            node = %config.name,
            role = ?config.role,
            states = table.len(),
            table_fingerprint = %fingerprint,
            seed = config.seed,
            "Created Markov node"
        );

        let (state, current_job, generated_count) = match config.role {
            MarkovRole::Source => (
                NodeState::immediate(MarkovPhase::Dwelling(home)),
                Some(Job::new(1u64)),
                1,
            ),
            MarkovRole::Action => (NodeState::passive(MarkovPhase::Passive), None, 0),
        };

        Ok(Self {
            name: config.name,
            role: config.role,
            input_ports: to_ports(&config.input_ports),
            output_ports: to_ports(&config.output_ports),
            scheduler: MarkovScheduler::new(
                table,
                config.seed,
                config.max_time_advance,
                continuation,
            ),
            home,
            routes,
            state,
            clock: NodeClock::new(),
            current_job,
            generated_count,
            received_count: 0,
            lost_count: 0,
            dispatched_count: 0,
            arrival_rate: 0.0,
            throughput: 0.0,
            sink,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn role(&self) -> MarkovRole {
        self.role
    }

    pub fn markov_phase(&self) -> MarkovPhase {
        *self.state.phase()
    }

    pub fn home_state(&self) -> StateId {
        self.home
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    /// Job the node is currently carrying
    pub fn current_job(&self) -> Option<&Job> {
        self.current_job.as_ref()
    }

    /// Jobs started by a source (the id of its current job)
    pub fn generated_count(&self) -> u64 {
        self.generated_count
    }

    pub fn received_count(&self) -> usize {
        self.received_count
    }

    pub fn lost_count(&self) -> usize {
        self.lost_count
    }

    /// Jobs that left through a routed exit state
    pub fn dispatched_count(&self) -> usize {
        self.dispatched_count
    }

    pub fn arrival_rate(&self) -> f64 {
        self.arrival_rate
    }

    pub fn throughput(&self) -> f64 {
        self.throughput
    }

    pub fn pending(&self) -> Option<&PendingTransition> {
        self.scheduler.pending()
    }

    pub fn dwell_records(&self) -> impl Iterator<Item = (StateId, &DwellRecord)> {
        self.scheduler.dwell_records()
    }

    pub fn scheduler(&self) -> &MarkovScheduler {
        &self.scheduler
    }

    pub fn state_name(&self, state: StateId) -> &str {
        self.scheduler.table().state_name(state)
    }

    /// Port on which reaching `state` is announced
    pub fn route(&self, state: StateId) -> Option<&Port> {
        self.routes[state.index()].as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    fn dwell(&mut self, state: StateId) -> Result<(), ModelError> {
        match self.scheduler.advance(state) {
            MarkovStep::Hold { holding_time, .. } => {
                self.state
                    .hold_in(&self.name, MarkovPhase::Dwelling(state), holding_time)?;
            }
            MarkovStep::Confirm { next_state, .. } => {
                self.state
                    .hold_in(&self.name, MarkovPhase::Arrived(next_state), 0.0)?;
            }
            MarkovStep::Absorbing { .. } => {
                debug!(
                    node = %self.name,
                    state = %self.state_name(state),
                    "Absorbing state"
                );
                let ceiling = self.scheduler.max_time_advance();
                self.state
                    .hold_in(&self.name, MarkovPhase::Dwelling(state), ceiling)?;
            }
        }
        Ok(())
    }

    fn arrive(&mut self, state: StateId) -> Result<(), ModelError> {
        if !self.scheduler.table().is_terminal(state) {
            self.state
                .hold_in(&self.name, MarkovPhase::Dwelling(state), 0.0)?;
            return Ok(());
        }

        let routed = self.route(state).is_some();
        if routed {
            self.dispatched_count += 1;
            if let Some(throughput) = self.clock.rate(self.dispatched_count) {
                self.throughput = throughput;
            }
        }

        match self.role {
            MarkovRole::Source => {
                self.generated_count += 1;
                self.current_job = Some(Job::new(self.generated_count));
                self.state
                    .hold_in(&self.name, MarkovPhase::Dwelling(self.home), 0.0)?;
            }
            MarkovRole::Action => {
                if !routed {
                    debug!(
                        node = %self.name,
                        state = %self.state_name(state),
                        "Job left through an unrouted exit"
                    );
                    self.lost_count += 1;
                }
                self.current_job = None;
                self.state.passivate_in(&self.name, MarkovPhase::Passive);
            }
        }

        self.record();
        Ok(())
    }

    fn accept(&mut self, message: Message) -> Result<(), ModelError> {
        self.received_count += 1;
        if let Some(rate) = self.clock.rate(self.received_count) {
            self.arrival_rate = rate;
        }

        if self.current_job.is_none() && self.state.phase_is(&MarkovPhase::Passive) {
            self.current_job = Some(message.job);
            self.state
                .hold_in(&self.name, MarkovPhase::Dwelling(self.home), 0.0)?;
        } else {
            warn!(node = %self.name, job = %message.job.id(), "Job lost while busy");
            self.lost_count += 1;
        }

        self.record();
        Ok(())
    }

    fn record(&mut self) {
        let record = Record::Markov(MarkovRecord {
            time: self.clock.current_time(),
            node: self.name.clone(),
            phase: self.phase(),
            arrival_rate: self.arrival_rate,
            throughput: self.throughput,
            lost_count: self.lost_count,
            received_count: self.received_count,
            dispatched_count: self.dispatched_count,
        });
        emit(&mut self.sink, record);
    }
}

impl<S: RecordSink> AtomicModel for MarkovNode<S> {
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
        match self.state.phase().state() {
            Some(state) => self.state_name(state).to_string(),
            None => "passive".to_string(),
        }
    }

    fn time_advance(&self) -> f64 {
        self.state.sigma()
    }

    fn internal_transition(&mut self) -> Result<(), ModelError> {
        let sigma = self.state.expire()?;
        self.clock.advance(sigma)?;

        match *self.state.phase() {
            MarkovPhase::Dwelling(state) => self.dwell(state),
            MarkovPhase::Arrived(state) => self.arrive(state),
            MarkovPhase::Passive => {
                self.state.passivate_in(&self.name, MarkovPhase::Passive);
                Ok(())
            }
        }
    }

    fn external_transition(
        &mut self,
        elapsed: f64,
        mut batch: MessageBatch,
    ) -> Result<(), ModelError> {
        check_input_ports(&self.name, &self.input_ports, &batch)?;
        self.state.consume(elapsed)?;
        self.clock.advance(elapsed)?;

        for index in 0..self.input_ports.len() {
            let port = self.input_ports[index].clone();
            for message in batch.take(&port) {
                self.accept(message)?;
            }
        }
        Ok(())
    }

    fn output(&self) -> OutputBag {
        let mut bag = OutputBag::new();
        let MarkovPhase::Dwelling(state) = *self.state.phase() else {
            return bag;
        };
        let Some(pending) = self.scheduler.pending() else {
            return bag;
        };
        if pending.source != state {
            return bag;
        }
        // A clamped wait still announces the continuation state, never the sampled one
        let continues = pending.next_state != state
            && self.scheduler.continuation() == Some(pending.next_state);
        if !pending.committed && !continues {
            return bag;
        }
        if let (Some(port), Some(job)) = (self.route(pending.next_state), &self.current_job) {
            bag.push(port.clone(), Message::new(job.clone()));
        }
        bag
    }
}
