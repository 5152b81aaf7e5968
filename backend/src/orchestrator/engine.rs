//! Coordinator Engine
//!
//! Reference single-threaded root coordinator for a flat network of atomic
//! models. It owns the global clock, the couplings between output and input
//! ports, and a queue of externally injected messages.
//!
//! # Architecture
//!
//! ```text
//! For each step:
//! 1. t = min(next internal event of any node, next injection)
//! 2. Query output() of every imminent node (next event == t)
//! 3. Route outputs along couplings; uncoupled outputs become boundary output
//! 4. Add injections due at t
//! 5. For every node with something to do:
//!      imminent + input → confluent_transition(batch)
//!      imminent only    → internal_transition()
//!      input only       → external_transition(t - last_event, batch)
//! 6. Reschedule: next event = t + time_advance()
//! ```
//!
//! Nodes are visited in insertion order, so a run is a pure function of the
//! network, the injections and the node seeds.
//!
//! # Example
//!
//! ```rust
//! use queue_simulator_core_rs::config::{MatchPolicy, TrackerConfig};
//! use queue_simulator_core_rs::nodes::TurnaroundTracker;
//! use queue_simulator_core_rs::orchestrator::Coordinator;
//! use queue_simulator_core_rs::{Job, Message};
//!
//! let mut coordinator = Coordinator::new();
//! let tracker =
//!     TurnaroundTracker::new(TrackerConfig::new("transducer", MatchPolicy::Arbitrary)).unwrap();
//! coordinator.add_node(tracker).unwrap();
//!
//! coordinator
//!     .schedule_input(1.0, "transducer", "inGeneratedJobs", Message::new(Job::new(1u64)))
//!     .unwrap();
//! coordinator
//!     .schedule_input(4.0, "transducer", "inProcessedJobs", Message::new(Job::new(1u64)))
//!     .unwrap();
//!
//! coordinator.run_until(10.0).unwrap();
//!
//! let tracker = coordinator.node::<TurnaroundTracker>("transducer").unwrap();
//! assert_eq!(tracker.avg_turnaround_time(), 3.0);
//! ```

use crate::core::time::TemporalError;
use crate::model::{AtomicModel, ModelError};
use crate::models::message::{Message, MessageBatch, Port};
use std::any::Any;
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that abort a coordinator run
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: ModelError,
    },

    #[error("Temporal invariant violated: {0}")]
    Temporal(#[from] TemporalError),

    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    #[error("Node '{node}' has no {direction} port '{port}'")]
    UnknownPort {
        node: String,
        port: String,
        direction: &'static str,
    },

    #[error("Node '{0}' already exists")]
    DuplicateNode(String),

    #[error("Coupling {from_node}.{from_port} -> {to_node}.{to_port} already exists")]
    DuplicateCoupling {
        from_node: String,
        from_port: String,
        to_node: String,
        to_port: String,
    },
}

// ============================================================================
// Result Types
// ============================================================================

/// A message emitted on an output port with no coupling
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryMessage {
    pub node: String,
    pub port: Port,
    pub message: Message,
}

/// What happened at one simulated instant
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub time: f64,

    /// Nodes whose internal event fired, in insertion order
    pub imminent: Vec<String>,

    /// Nodes that received input, in insertion order
    pub receivers: Vec<String>,

    pub boundary: Vec<BoundaryMessage>,
}

// ============================================================================
// Coordinator
// ============================================================================

/// Node object stored by the coordinator (adds downcasting for inspection)
trait Node: AtomicModel {
    fn as_any(&self) -> &dyn Any;
}

impl<M: AtomicModel + Any> Node for M {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct NodeSlot {
    model: Box<dyn Node>,
    last_event: f64,
    next_event: f64,
}

struct Injection {
    time: f64,
    node: usize,
    port: Port,
    message: Message,
}

/// Root coordinator
#[derive(Default)]
pub struct Coordinator {
    nodes: Vec<NodeSlot>,
    index: HashMap<String, usize>,

    /// (source node, output port) → destinations, in declaration order
    couplings: HashMap<(usize, Port), Vec<(usize, Port)>>,

    /// Sorted by time; ties keep scheduling order
    injections: Vec<Injection>,

    current_time: f64,
    step_count: u64,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, scheduling its first internal event at `time_advance()`
    pub fn add_node<M: AtomicModel + 'static>(&mut self, model: M) -> Result<(), SimulationError> {
        let name = model.name().to_string();
        if self.index.contains_key(&name) {
            return Err(SimulationError::DuplicateNode(name));
        }
        let next_event = self.current_time + model.time_advance();
        self.index.insert(name, self.nodes.len());
        self.nodes.push(NodeSlot {
            model: Box::new(model),
            last_event: self.current_time,
            next_event,
        });
        Ok(())
    }

    /// Route `from_node.from_port` into `to_node.to_port`
    pub fn couple(
        &mut self,
        from_node: &str,
        from_port: &str,
        to_node: &str,
        to_port: &str,
    ) -> Result<(), SimulationError> {
        let from = self.lookup(from_node)?;
        let to = self.lookup(to_node)?;
        let from_port = self.output_port(from, from_port)?;
        let to_port = self.input_port(to, to_port)?;

        let destinations = self.couplings.entry((from, from_port.clone())).or_default();
        if destinations.contains(&(to, to_port.clone())) {
            return Err(SimulationError::DuplicateCoupling {
                from_node: from_node.to_string(),
                from_port: from_port.to_string(),
                to_node: to_node.to_string(),
                to_port: to_port.to_string(),
            });
        }
        destinations.push((to, to_port));
        Ok(())
    }

    /// Deliver `message` to `node.port` at `time`
    pub fn schedule_input(
        &mut self,
        time: f64,
        node: &str,
        port: &str,
        message: Message,
    ) -> Result<(), SimulationError> {
        if time.is_nan() || time < self.current_time {
            return Err(TemporalError::EventInPast {
                event_time: time,
                current_time: self.current_time,
            }
            .into());
        }
        let node = self.lookup(node)?;
        let port = self.input_port(node, port)?;

        let position = self.injections.partition_point(|i| i.time <= time);
        self.injections.insert(
            position,
            Injection {
                time,
                node,
                port,
                message,
            },
        );
        Ok(())
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Time of the next step (`f64::INFINITY` when nothing is scheduled)
    pub fn next_event_time(&self) -> f64 {
        let internal = self
            .nodes
            .iter()
            .map(|slot| slot.next_event)
            .fold(f64::INFINITY, f64::min);
        let injected = self.injections.first().map_or(f64::INFINITY, |i| i.time);
        internal.min(injected)
    }

    /// Node names in insertion order
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|slot| slot.model.name()).collect()
    }

    pub fn phase(&self, node: &str) -> Option<String> {
        self.slot(node).map(|slot| slot.model.phase())
    }

    /// Absolute time of a node's next internal event
    pub fn next_event_of(&self, node: &str) -> Option<f64> {
        self.slot(node).map(|slot| slot.next_event)
    }

    /// Borrow a node as its concrete type
    pub fn node<T: AtomicModel + 'static>(&self, name: &str) -> Option<&T> {
        self.slot(name)
            .and_then(|slot| slot.model.as_any().downcast_ref::<T>())
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Process the next simulated instant. `None` when nothing is scheduled.
    pub fn step(&mut self) -> Result<Option<StepResult>, SimulationError> {
        let time = self.next_event_time();
        if time.is_infinite() {
            return Ok(None);
        }

        let imminent: Vec<bool> = self
            .nodes
            .iter()
            .map(|slot| slot.next_event == time)
            .collect();

        let mut inputs: Vec<MessageBatch> = vec![MessageBatch::new(); self.nodes.len()];
        let mut boundary = Vec::new();

        // Outputs are collected from every imminent node before any transition
        for (index, slot) in self.nodes.iter().enumerate() {
            if !imminent[index] {
                continue;
            }
            for (port, messages) in slot.model.output() {
                match self.couplings.get(&(index, port.clone())) {
                    Some(destinations) => {
                        for (target, target_port) in destinations {
                            for message in &messages {
                                inputs[*target].push(target_port.clone(), message.clone());
                            }
                        }
                    }
                    None => {
                        for message in messages {
                            boundary.push(BoundaryMessage {
                                node: slot.model.name().to_string(),
                                port: port.clone(),
                                message,
                            });
                        }
                    }
                }
            }
        }

        let due = self.injections.partition_point(|i| i.time <= time);
        for injection in self.injections.drain(..due) {
            inputs[injection.node].push(injection.port, injection.message);
        }

        let mut result = StepResult {
            time,
            imminent: Vec::new(),
            receivers: Vec::new(),
            boundary,
        };

        for (index, batch) in inputs.into_iter().enumerate() {
            let slot = &mut self.nodes[index];
            let has_input = !batch.is_empty();
            let outcome = match (imminent[index], has_input) {
                (true, true) => slot.model.confluent_transition(batch),
                (true, false) => slot.model.internal_transition(),
                (false, true) => slot
                    .model
                    .external_transition(time - slot.last_event, batch),
                (false, false) => continue,
            };
            outcome.map_err(|source| SimulationError::Node {
                node: slot.model.name().to_string(),
                source,
            })?;

            slot.last_event = time;
            slot.next_event = time + slot.model.time_advance();
            trace!(
                node = %slot.model.name(),
                time,
                next_event = slot.next_event,
                phase = %slot.model.phase(),
                "Node transitioned"
            );

            let name = slot.model.name().to_string();
            if imminent[index] {
                result.imminent.push(name.clone());
            }
            if has_input {
                result.receivers.push(name);
            }
        }

        self.current_time = time;
        self.step_count += 1;
        Ok(Some(result))
    }

    /// Step while the next event is at or before `end_time`
    pub fn run_until(&mut self, end_time: f64) -> Result<Vec<StepResult>, SimulationError> {
        let mut steps = Vec::new();
        while self.next_event_time() <= end_time {
            match self.step()? {
                Some(step) => steps.push(step),
                None => break,
            }
        }
        Ok(steps)
    }

    // ========================================================================
    // Lookup helpers
    // ========================================================================

    fn slot(&self, name: &str) -> Option<&NodeSlot> {
        self.index.get(name).map(|&index| &self.nodes[index])
    }

    fn lookup(&self, name: &str) -> Result<usize, SimulationError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SimulationError::UnknownNode(name.to_string()))
    }

    fn input_port(&self, node: usize, port: &str) -> Result<Port, SimulationError> {
        let model = &self.nodes[node].model;
        model
            .input_ports()
            .iter()
            .find(|p| p.name() == port)
            .cloned()
            .ok_or_else(|| SimulationError::UnknownPort {
                node: model.name().to_string(),
                port: port.to_string(),
                direction: "input",
            })
    }

    fn output_port(&self, node: usize, port: &str) -> Result<Port, SimulationError> {
        let model = &self.nodes[node].model;
        model
            .output_ports()
            .iter()
            .find(|p| p.name() == port)
            .cloned()
            .ok_or_else(|| SimulationError::UnknownPort {
                node: model.name().to_string(),
                port: port.to_string(),
                direction: "output",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatchPolicy, TrackerConfig};
    use crate::models::job::Job;
    use crate::nodes::TurnaroundTracker;

    fn coordinator() -> Coordinator {
        let mut c = Coordinator::new();
        c.add_node(TurnaroundTracker::new(TrackerConfig::new("t", MatchPolicy::Arbitrary)).unwrap())
            .unwrap();
        c
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut c = coordinator();
        let tracker = TurnaroundTracker::new(TrackerConfig::new("t", MatchPolicy::Exact)).unwrap();
        let result = c.add_node(tracker);
        assert!(matches!(result, Err(SimulationError::DuplicateNode(_))));
    }

    #[test]
    fn test_injection_in_past_rejected() {
        let mut c = coordinator();
        c.schedule_input(2.0, "t", "inGeneratedJobs", Message::new(Job::new(1u64)))
            .unwrap();
        c.run_until(5.0).unwrap();

        let result = c.schedule_input(1.0, "t", "inGeneratedJobs", Message::new(Job::new(2u64)));
        assert!(matches!(
            result,
            Err(SimulationError::Temporal(TemporalError::EventInPast { .. }))
        ));
    }

    #[test]
    fn test_unknown_port_rejected() {
        let mut c = coordinator();
        let result = c.schedule_input(1.0, "t", "nope", Message::new(Job::new(1u64)));
        assert!(matches!(result, Err(SimulationError::UnknownPort { .. })));
    }

    #[test]
    fn test_empty_network_has_no_steps() {
        let mut c = coordinator();
        assert_eq!(c.next_event_time(), f64::INFINITY);
        assert!(c.step().unwrap().is_none());
    }

    #[test]
    fn test_same_time_injections_keep_order() {
        let mut c = coordinator();
        c.schedule_input(1.0, "t", "inGeneratedJobs", Message::new(Job::new(1u64)))
            .unwrap();
        c.schedule_input(1.0, "t", "inGeneratedJobs", Message::new(Job::new(2u64)))
            .unwrap();
        let step = c.step().unwrap().unwrap();
        assert_eq!(step.time, 1.0);
        assert_eq!(step.receivers, vec!["t".to_string()]);

        let tracker = c.node::<TurnaroundTracker>("t").unwrap();
        assert_eq!(tracker.outstanding_count(), 2);
    }
}
