//! Atomic model contract
//!
//! Every node in the network is a DEVS atomic model: a phase, a
//! time-advance (sigma) and three transition functions driven exclusively by
//! the coordinator.
//!
//! # Execution Contract
//!
//! ```text
//! time_advance()            read-only, returns sigma
//! output()                  queried right before internal_transition(),
//!                           computed from the current phase, no mutation
//! internal_transition()     sigma expired, no input pending at that instant
//! external_transition(e, x) input arrived e after the last event, strictly
//!                           before sigma expired; sigma -= e first
//! confluent_transition(x)   input arrived exactly when sigma expired:
//!                           internal_transition() then external_transition(0, x)
//! ```
//!
//! The confluent ordering (internal first) is fixed: output tied to leaving
//! the old phase is generated against the pre-input state.

pub mod state;

pub use state::NodeState;

use crate::core::time::TemporalError;
use crate::models::message::{MessageBatch, OutputBag, Port};
use thiserror::Error;

/// Errors raised by a node while transitioning
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Temporal invariant violated: {0}")]
    Temporal(#[from] TemporalError),

    #[error("Node '{node}' has no input port '{port}'")]
    UnknownInputPort { node: String, port: String },
}

/// The four-operation contract every node implements.
///
/// # Example
///
/// ```rust
/// use queue_simulator_core_rs::model::{AtomicModel, ModelError, NodeState};
/// use queue_simulator_core_rs::{MessageBatch, OutputBag, Port};
///
/// /// Counts messages; never schedules anything itself.
/// struct Counter {
///     state: NodeState<&'static str>,
///     inputs: Vec<Port>,
///     seen: usize,
/// }
///
/// impl AtomicModel for Counter {
///     fn name(&self) -> &str { "counter" }
///     fn input_ports(&self) -> &[Port] { &self.inputs }
///     fn output_ports(&self) -> &[Port] { &[] }
///     fn phase(&self) -> String { self.state.phase().to_string() }
///     fn time_advance(&self) -> f64 { self.state.sigma() }
///     fn internal_transition(&mut self) -> Result<(), ModelError> {
///         self.state.expire()?;
///         self.state.passivate_in("counter", "passive");
///         Ok(())
///     }
///     fn external_transition(
///         &mut self,
///         elapsed: f64,
///         batch: MessageBatch,
///     ) -> Result<(), ModelError> {
///         self.state.consume(elapsed)?;
///         self.seen += batch.len();
///         Ok(())
///     }
///     fn output(&self) -> OutputBag { OutputBag::new() }
/// }
///
/// let mut c = Counter {
///     state: NodeState::passive("passive"),
///     inputs: vec![Port::from("in")],
///     seen: 0,
/// };
/// assert_eq!(c.time_advance(), f64::INFINITY);
/// c.external_transition(1.0, MessageBatch::new()).unwrap();
/// ```
pub trait AtomicModel {
    /// Node name (unique within a network)
    fn name(&self) -> &str;

    /// Declared input ports, in declaration order
    fn input_ports(&self) -> &[Port];

    /// Declared output ports, in declaration order
    fn output_ports(&self) -> &[Port];

    /// Current phase name, from the node kind's closed vocabulary
    fn phase(&self) -> String;

    /// Time remaining in the current phase (`f64::INFINITY` when passive)
    fn time_advance(&self) -> f64;

    /// Sigma expired with no input pending at that instant.
    ///
    /// Must not consume messages.
    fn internal_transition(&mut self) -> Result<(), ModelError>;

    /// Input arrived `elapsed` after the node's last event, strictly before
    /// its sigma expired.
    ///
    /// Implementations decrement sigma by `elapsed` first, then fold the
    /// batch into their queues and counters, then re-derive phase and sigma.
    /// Never produces output.
    fn external_transition(&mut self, elapsed: f64, batch: MessageBatch) -> Result<(), ModelError>;

    /// Input arrived exactly when sigma expired.
    ///
    /// Internal first, then external with zero elapsed time. Nodes should not
    /// override this ordering.
    fn confluent_transition(&mut self, batch: MessageBatch) -> Result<(), ModelError> {
        self.internal_transition()?;
        self.external_transition(0.0, batch)
    }

    /// Outbound messages for the current phase (no state change)
    fn output(&self) -> OutputBag;
}

/// Reject batches that address ports the node never declared.
pub fn check_input_ports(
    node: &str,
    declared: &[Port],
    batch: &MessageBatch,
) -> Result<(), ModelError> {
    for port in batch.ports() {
        if !declared.contains(port) {
            return Err(ModelError::UnknownInputPort {
                node: node.to_string(),
                port: port.to_string(),
            });
        }
    }
    Ok(())
}
