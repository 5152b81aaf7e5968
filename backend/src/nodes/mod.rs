//! Concrete node kinds
//!
//! Each node kind is one parameterized type configured by data: port lists
//! and parameters come from its config struct, never from subclassing.
//!
//! - [`SyncNode`]: barrier join over N input branches
//! - [`TurnaroundTracker`]: arrival/completion matching and latency metrics
//! - [`MarkovNode`]: stochastic source or action node driven by a
//!   [`MarkovScheduler`](crate::markov::MarkovScheduler)

pub mod markov_node;
pub mod sync;
pub mod tracker;

pub use markov_node::{MarkovNode, MarkovPhase};
pub use sync::{SyncNode, SyncPhase};
pub use tracker::{TrackerPhase, TurnaroundTracker};

use crate::models::message::Port;

pub(crate) fn to_ports(names: &[String]) -> Vec<Port> {
    names.iter().map(|name| Port::new(name.as_str())).collect()
}
