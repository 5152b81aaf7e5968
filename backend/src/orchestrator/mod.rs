//! Orchestrator - reference DEVS root coordinator
//!
//! See `engine.rs` for the step algorithm.

pub mod engine;

pub use engine::{BoundaryMessage, Coordinator, SimulationError, StepResult};
