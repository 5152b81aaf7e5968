//! Continuous-time Markov phase scheduling
//!
//! - **table**: transition table (successors, weights, holding times)
//! - **scheduler**: two-epoch sample-then-confirm protocol and dwell statistics

pub mod scheduler;
pub mod table;

pub use scheduler::{DwellRecord, MarkovScheduler, MarkovStep, PendingTransition};
pub use table::{HoldingTime, StateId, TableError, Transition, TransitionTable};
