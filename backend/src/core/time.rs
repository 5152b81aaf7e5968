//! Time management for a single node
//!
//! The simulation runs in continuous simulated time. Every node keeps its own
//! clock: the coordinator tells it how much time elapsed since its last event
//! (external transitions) or the node advances by its own time-advance
//! (internal transitions). This module owns the temporal invariants.
//!
//! # Critical Invariants
//!
//! 1. Time never moves backwards (elapsed ≥ 0, never NaN)
//! 2. Sigma is never negative (zero means "fire immediately")
//! 3. Violations are errors, never silently clamped

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Violations of the temporal contract between coordinator and node.
///
/// These indicate a coordinator bug and must abort the run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TemporalError {
    #[error("Elapsed time {elapsed} is negative or not a number")]
    InvalidElapsed { elapsed: f64 },

    #[error("Sigma would become negative: sigma {sigma}, elapsed {elapsed}")]
    NegativeSigma { sigma: f64, elapsed: f64 },

    #[error("Event at time {event_time} precedes current time {current_time}")]
    EventInPast { event_time: f64, current_time: f64 },

    #[error("Time-advance {sigma} is negative or not a number")]
    InvalidSigma { sigma: f64 },

    #[error("Internal transition fired with an infinite time-advance")]
    InternalWhilePassive,
}

/// Per-node simulated clock
///
/// # Example
/// ```
/// use queue_simulator_core_rs::NodeClock;
///
/// let mut clock = NodeClock::new();
/// assert_eq!(clock.current_time(), 0.0);
///
/// clock.advance(2.5).unwrap();
/// assert_eq!(clock.current_time(), 2.5);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeClock {
    /// Simulated time of the node's last event
    current_time: f64,
}

impl NodeClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self { current_time: 0.0 }
    }

    /// Advance the clock by `elapsed`
    ///
    /// Returns the new current time.
    ///
    /// # Example
    /// ```
    /// use queue_simulator_core_rs::NodeClock;
    ///
    /// let mut clock = NodeClock::new();
    /// assert!(clock.advance(-1.0).is_err());
    /// assert_eq!(clock.advance(1.0).unwrap(), 1.0);
    /// ```
    pub fn advance(&mut self, elapsed: f64) -> Result<f64, TemporalError> {
        if elapsed.is_nan() || elapsed < 0.0 {
            return Err(TemporalError::InvalidElapsed { elapsed });
        }
        self.current_time += elapsed;
        Ok(self.current_time)
    }

    /// Get the current simulated time
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Divide `count` by the current time, or `None` at time zero.
    ///
    /// Rate statistics (arrival rate, throughput) keep their previous value
    /// while this returns `None`.
    ///
    /// # Example
    /// ```
    /// use queue_simulator_core_rs::NodeClock;
    ///
    /// let mut clock = NodeClock::new();
    /// assert_eq!(clock.rate(3), None);
    /// clock.advance(2.0).unwrap();
    /// assert_eq!(clock.rate(3), Some(1.5));
    /// ```
    pub fn rate(&self, count: usize) -> Option<f64> {
        if self.current_time > 0.0 {
            Some(count as f64 / self.current_time)
        } else {
            None
        }
    }
}

/// Subtract elapsed time from a time-advance.
///
/// Infinite sigma stays infinite. The result may be exactly zero but never
/// negative.
///
/// # Example
/// ```
/// use queue_simulator_core_rs::core::time::consume_sigma;
///
/// assert_eq!(consume_sigma(5.0, 2.0).unwrap(), 3.0);
/// assert_eq!(consume_sigma(2.0, 2.0).unwrap(), 0.0);
/// assert_eq!(consume_sigma(f64::INFINITY, 7.0).unwrap(), f64::INFINITY);
/// assert!(consume_sigma(1.0, 2.0).is_err());
/// ```
pub fn consume_sigma(sigma: f64, elapsed: f64) -> Result<f64, TemporalError> {
    if elapsed.is_nan() || elapsed < 0.0 {
        return Err(TemporalError::InvalidElapsed { elapsed });
    }
    let remaining = sigma - elapsed;
    if remaining < 0.0 {
        return Err(TemporalError::NegativeSigma { sigma, elapsed });
    }
    Ok(remaining)
}

/// Check a freshly computed time-advance before a node holds in it.
pub fn validate_sigma(sigma: f64) -> Result<f64, TemporalError> {
    if sigma.is_nan() || sigma < 0.0 {
        return Err(TemporalError::InvalidSigma { sigma });
    }
    Ok(sigma)
}
