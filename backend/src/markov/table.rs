//! Continuous-time Markov transition table
//!
//! For each source state: the successor states (self-loops excluded), each
//! with a relative weight and a holding-time distribution. Tables are loaded
//! from JSON and are read-only afterwards.
//!
//! # Format
//!
//! ```json
//! { "states": [
//!     { "name": "generating",
//!       "transitions": [
//!         { "to": "m1_state", "weight": 1.0,
//!           "holding_time": { "kind": "exponential", "rate": 2.0 } },
//!         { "to": "m2_state", "weight": 3.0 } ] } ] }
//! ```
//!
//! A missing `holding_time` means `sojourn`: exponential with rate equal to
//! the sum of the source's outgoing weights.
//!
//! # Example
//!
//! ```rust
//! use queue_simulator_core_rs::markov::TransitionTable;
//!
//! let table = TransitionTable::from_json_str(r#"{
//!     "states": [ { "name": "a", "transitions": [ { "to": "b", "weight": 2.0 } ] } ]
//! }"#).unwrap();
//!
//! let a = table.state_id("a").unwrap();
//! let b = table.state_id("b").unwrap();
//! assert_eq!(table.successors(a).len(), 1);
//! assert!(table.is_terminal(b));
//! assert_eq!(table.normal_factor(a), 2.0);
//! ```

use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors while loading or validating a transition table
#[derive(Debug, Error)]
pub enum TableError {
    #[error("Cannot read transition table '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed transition table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Transition table has no states")]
    Empty,

    #[error("State '{0}' is listed more than once")]
    DuplicateState(String),

    #[error("Transition {from} -> {to} is listed more than once")]
    DuplicateTransition { from: String, to: String },

    #[error("Transition {from} -> {to} has invalid weight {weight}")]
    InvalidWeight { from: String, to: String, weight: f64 },

    #[error("Transition {from} -> {to} has invalid holding time: {reason}")]
    InvalidHoldingTime {
        from: String,
        to: String,
        reason: String,
    },
}

/// Dense index of a state within one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Holding-time distribution of one edge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HoldingTime {
    /// Always the same delay (consumes no random draw)
    Fixed { value: f64 },

    /// Uniform on [lower, upper)
    Uniform { lower: f64, upper: f64 },

    /// Exponential with an edge-specific rate
    Exponential { rate: f64 },

    /// Exponential with rate = sum of the source's outgoing weights
    #[default]
    Sojourn,
}

impl HoldingTime {
    /// Draw a holding time. `norm` is the source state's normal factor.
    pub fn sample(&self, norm: f64, rng: &mut RngManager) -> f64 {
        match self {
            HoldingTime::Fixed { value } => *value,
            HoldingTime::Uniform { lower, upper } => rng.uniform(*lower, *upper),
            HoldingTime::Exponential { rate } => rng.exponential(*rate),
            HoldingTime::Sojourn => rng.exponential(norm),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            HoldingTime::Fixed { value } if !(value.is_finite() && *value >= 0.0) => {
                Err(format!("fixed value {} must be finite and non-negative", value))
            }
            HoldingTime::Uniform { lower, upper }
                if !(lower.is_finite() && upper.is_finite() && *lower >= 0.0 && lower <= upper) =>
            {
                Err(format!("uniform bounds [{}, {}) are invalid", lower, upper))
            }
            HoldingTime::Exponential { rate } if !(rate.is_finite() && *rate > 0.0) => {
                Err(format!("exponential rate {} must be positive", rate))
            }
            _ => Ok(()),
        }
    }
}

/// Serialized form of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDocument {
    pub states: Vec<StateEntry>,
}

/// Serialized form of one source state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub name: String,
    #[serde(default)]
    pub transitions: Vec<TransitionEntry>,
}

/// Serialized form of one edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub to: String,
    pub weight: f64,
    #[serde(default)]
    pub holding_time: HoldingTime,
}

/// One outgoing edge
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub target: StateId,
    pub weight: f64,
    pub holding_time: HoldingTime,
}

/// Validated, interned transition table
#[derive(Debug, Clone)]
pub struct TransitionTable {
    /// State names indexed by StateId (first-appearance order)
    names: Vec<String>,

    index: HashMap<String, StateId>,

    /// Outgoing edges indexed by StateId, in document order
    successors: Vec<Vec<Transition>>,
}

impl TransitionTable {
    /// Load a table from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse a table from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, TableError> {
        let document: TableDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Validate and intern a parsed document
    pub fn from_document(document: TableDocument) -> Result<Self, TableError> {
        if document.states.is_empty() {
            return Err(TableError::Empty);
        }

        let mut table = TransitionTable {
            names: Vec::new(),
            index: HashMap::new(),
            successors: Vec::new(),
        };

        // Sources first so their ids follow document order
        for entry in &document.states {
            if table.index.contains_key(&entry.name) {
                return Err(TableError::DuplicateState(entry.name.clone()));
            }
            table.intern(&entry.name);
        }

        for entry in document.states {
            let from = table.index[&entry.name];
            let mut edges: Vec<Transition> = Vec::with_capacity(entry.transitions.len());

            for edge in entry.transitions {
                if !(edge.weight.is_finite() && edge.weight >= 0.0) {
                    return Err(TableError::InvalidWeight {
                        from: entry.name.clone(),
                        to: edge.to,
                        weight: edge.weight,
                    });
                }
                if let Err(reason) = edge.holding_time.validate() {
                    return Err(TableError::InvalidHoldingTime {
                        from: entry.name.clone(),
                        to: edge.to,
                        reason,
                    });
                }
                if edge.to == entry.name {
                    debug!(state = %entry.name, "Dropping self-loop from transition table");
                    continue;
                }

                let target = table.intern(&edge.to);
                if edges.iter().any(|t| t.target == target) {
                    return Err(TableError::DuplicateTransition {
                        from: entry.name.clone(),
                        to: edge.to,
                    });
                }
                edges.push(Transition {
                    target,
                    weight: edge.weight,
                    holding_time: edge.holding_time,
                });
            }

            table.successors[from.0] = edges;
        }

        Ok(table)
    }

    fn intern(&mut self, name: &str) -> StateId {
        if let Some(id) = self.index.get(name) {
            return *id;
        }
        let id = StateId(self.names.len());
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.successors.push(Vec::new());
        id
    }

    /// Look up a state by name
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.index.get(name).copied()
    }

    /// Name of a state
    pub fn state_name(&self, id: StateId) -> &str {
        &self.names[id.0]
    }

    /// Number of distinct states (sources and targets)
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All states in id order
    pub fn states(&self) -> impl Iterator<Item = StateId> {
        (0..self.names.len()).map(StateId)
    }

    /// Outgoing edges of a state, in table order
    pub fn successors(&self, id: StateId) -> &[Transition] {
        &self.successors[id.0]
    }

    /// The edge `from -> to`, if present
    pub fn transition(&self, from: StateId, to: StateId) -> Option<&Transition> {
        self.successors(from).iter().find(|t| t.target == to)
    }

    /// Sum of outgoing weights (the normalization factor)
    pub fn normal_factor(&self, id: StateId) -> f64 {
        self.successors(id).iter().map(|t| t.weight).sum()
    }

    /// True when the state has no successors
    pub fn is_terminal(&self, id: StateId) -> bool {
        self.successors(id).is_empty()
    }

    /// Rebuild the serialized form (every state in id order, self-loops removed)
    pub fn to_document(&self) -> TableDocument {
        let states = self
            .states()
            .map(|id| StateEntry {
                name: self.state_name(id).to_string(),
                transitions: self
                    .successors(id)
                    .iter()
                    .map(|t| TransitionEntry {
                        to: self.state_name(t.target).to_string(),
                        weight: t.weight,
                        holding_time: t.holding_time.clone(),
                    })
                    .collect(),
            })
            .collect();
        TableDocument { states }
    }

    /// SHA-256 of the table's canonical JSON form (hex)
    ///
    /// Two tables with the same states, edges, weights and distributions in
    /// the same order share a fingerprint.
    pub fn fingerprint(&self) -> Result<String, TableError> {
        let json = serde_json::to_string(&self.to_document())?;

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        let result = hasher.finalize();

        Ok(format!("{:x}", result))
    }
}
