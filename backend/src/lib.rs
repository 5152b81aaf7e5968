//! Queue Simulator Core - Rust Engine
//!
//! Discrete-event (DEVS) simulation of stochastic queueing networks with
//! deterministic execution.
//!
//! # Architecture
//!
//! - **core**: Per-node clock and temporal invariant checks
//! - **models**: Domain types (Job, Message, MessageBatch, analytics records)
//! - **model**: The atomic model contract every node implements
//! - **markov**: Transition tables and the two-epoch Markov phase scheduler
//! - **nodes**: Synchronization node, turnaround tracker, Markov-driven node
//! - **sink**: Analytics record sinks
//! - **orchestrator**: Reference root coordinator
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Sigma is never negative; `passive` always pairs with an infinite sigma
//! 2. Confluent events run the internal transition before the external one
//! 3. All randomness is deterministic (one seeded RNG per node)
//! 4. Losing an analytics record never changes simulation state

// Module declarations
pub mod config;
pub mod core;
pub mod markov;
pub mod model;
pub mod models;
pub mod nodes;
pub mod orchestrator;
pub mod rng;
pub mod sink;

// Re-exports for convenience
pub use config::{ConfigError, MarkovConfig, MarkovRole, MatchPolicy, SyncConfig, TrackerConfig};
pub use core::time::{NodeClock, TemporalError};
pub use markov::{
    DwellRecord, HoldingTime, MarkovScheduler, MarkovStep, PendingTransition, StateId, TableError,
    TransitionTable,
};
pub use model::{AtomicModel, ModelError, NodeState};
pub use models::{
    job::{Job, JobId},
    message::{Message, MessageBatch, OutputBag, Payload, Port},
    record::{MarkovRecord, Record, RecordLog, SyncRecord, TurnaroundRecord},
};
pub use nodes::{MarkovNode, MarkovPhase, SyncNode, SyncPhase, TrackerPhase, TurnaroundTracker};
pub use orchestrator::{BoundaryMessage, Coordinator, SimulationError, StepResult};
pub use rng::RngManager;
pub use sink::{JsonLinesSink, MemorySink, RecordSink, SinkError};
