//! Phase / sigma bookkeeping shared by all node kinds
//!
//! Phase and sigma change only through [`NodeState::hold_in`],
//! [`NodeState::passivate_in`], [`NodeState::consume`] and
//! [`NodeState::expire`], which the nodes call from inside their transition
//! functions.

use crate::core::time::{consume_sigma, validate_sigma, TemporalError};
use std::fmt::Debug;
use tracing::debug;

/// Current phase, time-advance and time spent in the phase
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState<P> {
    phase: P,
    sigma: f64,
    elapsed_in_phase: f64,
}

impl<P: Debug + PartialEq> NodeState<P> {
    /// Start in `phase` with an infinite time-advance
    pub fn passive(phase: P) -> Self {
        Self {
            phase,
            sigma: f64::INFINITY,
            elapsed_in_phase: 0.0,
        }
    }

    /// Start in `phase`, due to fire at once
    pub fn immediate(phase: P) -> Self {
        Self {
            phase,
            sigma: 0.0,
            elapsed_in_phase: 0.0,
        }
    }

    /// Start in `phase`, due to fire after `sigma`
    pub fn holding(phase: P, sigma: f64) -> Result<Self, TemporalError> {
        Ok(Self {
            phase,
            sigma: validate_sigma(sigma)?,
            elapsed_in_phase: 0.0,
        })
    }

    pub fn phase(&self) -> &P {
        &self.phase
    }

    pub fn phase_is(&self, phase: &P) -> bool {
        &self.phase == phase
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn is_passive(&self) -> bool {
        self.sigma.is_infinite()
    }

    /// Time spent in the current phase since it was entered
    pub fn elapsed_in_phase(&self) -> f64 {
        self.elapsed_in_phase
    }

    /// Enter `phase` for `sigma` time units
    pub fn hold_in(&mut self, node: &str, phase: P, sigma: f64) -> Result<(), TemporalError> {
        let sigma = validate_sigma(sigma)?;
        debug!(node, phase = ?phase, sigma, "Holding in phase");
        self.phase = phase;
        self.sigma = sigma;
        self.elapsed_in_phase = 0.0;
        Ok(())
    }

    /// Enter `phase` with an infinite time-advance
    pub fn passivate_in(&mut self, node: &str, phase: P) {
        debug!(node, phase = ?phase, "Passivating");
        self.phase = phase;
        self.sigma = f64::INFINITY;
        self.elapsed_in_phase = 0.0;
    }

    /// External event: remove `elapsed` from sigma (may reach zero, never below)
    pub fn consume(&mut self, elapsed: f64) -> Result<(), TemporalError> {
        self.sigma = consume_sigma(self.sigma, elapsed)?;
        self.elapsed_in_phase += elapsed;
        Ok(())
    }

    /// Internal event: the whole sigma elapsed. Returns it.
    ///
    /// The caller must follow with `hold_in` or `passivate_in`.
    pub fn expire(&mut self) -> Result<f64, TemporalError> {
        if self.sigma.is_infinite() {
            return Err(TemporalError::InternalWhilePassive);
        }
        let sigma = self.sigma;
        self.elapsed_in_phase += sigma;
        self.sigma = 0.0;
        Ok(sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_then_expire() {
        let mut state = NodeState::holding("busy", 5.0).unwrap();
        state.consume(2.0).unwrap();
        assert_eq!(state.sigma(), 3.0);
        assert_eq!(state.elapsed_in_phase(), 2.0);

        assert_eq!(state.expire().unwrap(), 3.0);
        assert_eq!(state.elapsed_in_phase(), 5.0);
    }

    #[test]
    fn test_expire_while_passive_is_error() {
        let mut state = NodeState::passive("idle");
        assert_eq!(state.expire(), Err(TemporalError::InternalWhilePassive));
    }

    #[test]
    fn test_hold_in_rejects_negative_sigma() {
        let mut state = NodeState::passive("idle");
        assert!(state.hold_in("n", "busy", -1.0).is_err());
        assert!(state.phase_is(&"idle"));
    }

    #[test]
    fn test_hold_in_resets_phase_clock() {
        let mut state = NodeState::holding("a", 4.0).unwrap();
        state.consume(1.0).unwrap();
        state.hold_in("n", "b", 2.0).unwrap();
        assert_eq!(state.elapsed_in_phase(), 0.0);
        assert!(state.phase_is(&"b"));
    }
}
