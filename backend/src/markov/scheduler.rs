//! Two-epoch Markov phase scheduler
//!
//! A stochastic step takes two scheduler ticks:
//!
//! ```text
//! epoch 1 (decision)      no pending transition for S
//!                         draw u in [0,1), pick successor X whose cumulative
//!                         interval (min, max] contains u, draw holding time t,
//!                         clamp to max_time_advance (→ continuation state),
//!                         record PendingTransition{S → X}, hold in S for t
//!
//! epoch 2 (confirmation)  sigma for S expired and pending.source == S
//!                         clear pending, enter X with sigma 0,
//!                         update DwellRecord[S]
//! ```
//!
//! While the node dwells in S the output function can observe "transition
//! pending to X"; the zero-duration hop to X makes X observable for exactly
//! the triggering instant before the next decision epoch runs.
//!
//! # Determinism
//!
//! One [`RngManager`] per scheduler. The decision epoch draws the selection
//! sample first, then (for random distributions) the holding time. Same seed
//! + same table → same sequence of (state, holding time) pairs.

use crate::markov::table::{HoldingTime, StateId, TransitionTable};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Scratch state between the decision and confirmation epochs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransition {
    /// Decision state the node dwells in
    pub source: StateId,

    /// State entered on confirmation
    pub next_state: StateId,

    /// Holding time scheduled for `source` (after clamping)
    pub holding_time: f64,

    /// False when the sampled transition was not actually taken: the wait
    /// was clamped to `max_time_advance`, or sampling fell back to the
    /// source itself
    pub committed: bool,
}

/// Visits and cumulative dwell time of one state (never reset)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DwellRecord {
    pub visit_count: u64,
    pub cumulative_elapsed_time: f64,
}

/// Outcome of one scheduler invocation
#[derive(Debug, Clone, PartialEq)]
pub enum MarkovStep {
    /// Decision epoch: hold in `state` for `holding_time`
    Hold { state: StateId, holding_time: f64 },

    /// Confirmation epoch: enter `next_state` with sigma 0
    Confirm {
        from: StateId,
        next_state: StateId,
        holding_time: f64,
        committed: bool,
    },

    /// `state` has no successors; nothing was scheduled
    Absorbing { state: StateId },
}

/// Drives stochastic dwell times for one node
#[derive(Debug, Clone)]
pub struct MarkovScheduler {
    table: TransitionTable,
    rng: RngManager,

    /// Ceiling for any single holding time
    max_time_advance: f64,

    /// State entered instead of the sampled one when a wait is clamped
    /// (`None` = stay in the source state)
    continuation: Option<StateId>,

    pending: Option<PendingTransition>,

    /// Indexed by StateId
    dwell: Vec<DwellRecord>,

    /// Sum of all confirmed holding times
    accumulated_lifetime: f64,
}

impl MarkovScheduler {
    /// Create a scheduler
    ///
    /// # Example
    /// ```
    /// use queue_simulator_core_rs::markov::{MarkovScheduler, MarkovStep, TransitionTable};
    ///
    /// let table = TransitionTable::from_json_str(r#"{ "states": [
    ///     { "name": "idle", "transitions": [
    ///         { "to": "done", "weight": 1.0, "holding_time": { "kind": "fixed", "value": 3.0 } } ] } ] }"#).unwrap();
    /// let idle = table.state_id("idle").unwrap();
    /// let done = table.state_id("done").unwrap();
    ///
    /// let mut scheduler = MarkovScheduler::new(table, 7, f64::INFINITY, None);
    /// assert_eq!(scheduler.advance(idle), MarkovStep::Hold { state: idle, holding_time: 3.0 });
    /// assert!(matches!(scheduler.advance(idle), MarkovStep::Confirm { next_state, .. } if next_state == done));
    /// assert_eq!(scheduler.dwell_record(idle).visit_count, 1);
    /// ```
    pub fn new(
        table: TransitionTable,
        seed: u64,
        max_time_advance: f64,
        continuation: Option<StateId>,
    ) -> Self {
        let dwell = vec![DwellRecord::default(); table.len()];
        Self {
            table,
            rng: RngManager::new(seed),
            max_time_advance,
            continuation,
            pending: None,
            dwell,
            accumulated_lifetime: 0.0,
        }
    }

    /// Run the epoch due for `state`.
    ///
    /// Confirms the pending transition if it was scheduled from `state`,
    /// otherwise runs a fresh decision epoch. A pending transition left over
    /// from a different state is discarded.
    pub fn advance(&mut self, state: StateId) -> MarkovStep {
        if let Some(pending) = self.pending.take() {
            if pending.source == state {
                return self.confirm(pending);
            }
            debug!(
                stale_source = %self.table.state_name(pending.source),
                state = %self.table.state_name(state),
                "Discarding pending transition for another state"
            );
        }
        self.decide(state)
    }

    fn decide(&mut self, state: StateId) -> MarkovStep {
        let table = &self.table;
        let successors = table.successors(state);
        if successors.is_empty() {
            return MarkovStep::Absorbing { state };
        }

        let sample = self.rng.next_f64();
        let norm = table.normal_factor(state);

        let mut selected = state;
        let mut max = 0.0;
        for transition in successors {
            let min = max;
            max += transition.weight / norm;
            if min < sample && sample <= max {
                selected = transition.target;
                break;
            }
        }

        let holding_time = match table.transition(state, selected) {
            Some(transition) => transition.holding_time.sample(norm, &mut self.rng),
            None => HoldingTime::Sojourn.sample(norm, &mut self.rng),
        };

        let pending = if holding_time > self.max_time_advance {
            PendingTransition {
                source: state,
                next_state: self.continuation.unwrap_or(state),
                holding_time: self.max_time_advance,
                committed: false,
            }
        } else {
            PendingTransition {
                source: state,
                next_state: selected,
                holding_time,
                committed: selected != state,
            }
        };

        trace!(
            state = %table.state_name(state),
            sampled = %table.state_name(selected),
            next = %table.state_name(pending.next_state),
            sample,
            holding_time = pending.holding_time,
            committed = pending.committed,
            "Sampled Markov transition"
        );

        let step = MarkovStep::Hold {
            state,
            holding_time: pending.holding_time,
        };
        self.pending = Some(pending);
        step
    }

    fn confirm(&mut self, pending: PendingTransition) -> MarkovStep {
        let record = &mut self.dwell[pending.source.index()];
        record.visit_count += 1;
        record.cumulative_elapsed_time += pending.holding_time;
        self.accumulated_lifetime += pending.holding_time;

        MarkovStep::Confirm {
            from: pending.source,
            next_state: pending.next_state,
            holding_time: pending.holding_time,
            committed: pending.committed,
        }
    }

    /// Transition scheduled by the last decision epoch, if not yet confirmed
    pub fn pending(&self) -> Option<&PendingTransition> {
        self.pending.as_ref()
    }

    pub fn dwell_record(&self, state: StateId) -> &DwellRecord {
        &self.dwell[state.index()]
    }

    /// Dwell records of every state, in id order
    pub fn dwell_records(&self) -> impl Iterator<Item = (StateId, &DwellRecord)> {
        self.table.states().zip(self.dwell.iter())
    }

    pub fn accumulated_lifetime(&self) -> f64 {
        self.accumulated_lifetime
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn max_time_advance(&self) -> f64 {
        self.max_time_advance
    }

    pub fn continuation(&self) -> Option<StateId> {
        self.continuation
    }

    /// Current RNG state (for replay checks)
    pub fn rng_state(&self) -> u64 {
        self.rng.get_state()
    }
}
