//! Node configuration
//!
//! Everything the model-assembly layer hands to a node constructor: name,
//! ordered port lists and node-specific parameters. All configs deserialize
//! from JSON (or any serde format) and are validated by the node
//! constructors; invalid configuration is fatal at construction time.

use crate::markov::table::TableError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Seed used by Markov nodes when none is configured
pub const DEFAULT_SEED: u64 = 2_349_991 + 19;

/// Default tracker input ports (arrivals, completions)
pub const TRACKER_ARRIVAL_PORT: &str = "inGeneratedJobs";
pub const TRACKER_COMPLETION_PORT: &str = "inProcessedJobs";

/// Configuration errors (fatal at node construction)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Node '{node}' needs at least one input port")]
    NoInputPorts { node: String },

    #[error("Node '{node}' needs at least one output port")]
    NoOutputPorts { node: String },

    #[error("Node '{node}' needs exactly {expected} input ports, got {actual}")]
    InputPortCount {
        node: String,
        expected: usize,
        actual: usize,
    },

    #[error("Node '{node}' declares port '{port}' more than once")]
    DuplicatePort { node: String, port: String },

    #[error("Node '{node}' has invalid processing time {value}")]
    InvalidProcessingTime { node: String, value: f64 },

    #[error("Node '{node}' has invalid max time advance {value}")]
    InvalidMaxTimeAdvance { node: String, value: f64 },

    #[error("Node '{node}' refers to state '{state}' missing from its transition table")]
    UnknownState { node: String, state: String },

    #[error("Node '{node}' routes to undeclared output port '{port}'")]
    UnknownRoutePort { node: String, port: String },

    #[error("Node '{node}' has no transition table configured")]
    MissingTable { node: String },

    #[error("Transition table error: {0}")]
    Table(#[from] TableError),
}

/// Synchronization (join) node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub name: String,
    pub input_ports: Vec<String>,
    pub output_ports: Vec<String>,

    /// Fixed delay between committing to a merge and emitting it
    #[serde(default)]
    pub processing_time: f64,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ports(&self.name, &self.input_ports, PortRule::NonEmptyInputs)?;
        validate_ports(&self.name, &self.output_ports, PortRule::NonEmptyOutputs)?;
        if !(self.processing_time.is_finite() && self.processing_time >= 0.0) {
            return Err(ConfigError::InvalidProcessingTime {
                node: self.name.clone(),
                value: self.processing_time,
            });
        }
        Ok(())
    }
}

/// How completions are matched to arrivals by the turnaround tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Oldest outstanding arrival, regardless of identity
    #[default]
    Arbitrary,

    /// Arrival with the same job identity
    Exact,

    /// Same dequeue semantics as `Arbitrary`
    FifoMerge,
}

fn default_tracker_inputs() -> Vec<String> {
    vec![
        TRACKER_ARRIVAL_PORT.to_string(),
        TRACKER_COMPLETION_PORT.to_string(),
    ]
}

/// Turnaround tracker configuration
///
/// The first input port receives arrivals, the second completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub name: String,

    #[serde(default = "default_tracker_inputs")]
    pub input_ports: Vec<String>,

    #[serde(default)]
    pub output_ports: Vec<String>,

    #[serde(default)]
    pub policy: MatchPolicy,
}

impl TrackerConfig {
    /// Tracker with the default port names
    pub fn new(name: impl Into<String>, policy: MatchPolicy) -> Self {
        Self {
            name: name.into(),
            input_ports: default_tracker_inputs(),
            output_ports: Vec::new(),
            policy,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_ports.len() != 2 {
            return Err(ConfigError::InputPortCount {
                node: self.name.clone(),
                expected: 2,
                actual: self.input_ports.len(),
            });
        }
        validate_ports(&self.name, &self.input_ports, PortRule::Any)?;
        validate_ports(&self.name, &self.output_ports, PortRule::Any)
    }
}

/// What a Markov-driven node does with its stochastic steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkovRole {
    /// Emits a freshly numbered job on every routed step; never passive
    Source,

    /// Carries one job at a time through the chain; loses jobs while busy
    Action,
}

fn infinite() -> f64 {
    f64::INFINITY
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Markov-driven node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovConfig {
    pub name: String,
    pub role: MarkovRole,

    #[serde(default)]
    pub input_ports: Vec<String>,

    pub output_ports: Vec<String>,

    /// JSON transition table; not needed when the table is passed directly
    #[serde(default)]
    pub table_path: Option<PathBuf>,

    /// Decision state the node starts from (and returns to, for sources)
    pub home_state: String,

    /// Ceiling on any sampled holding time
    #[serde(default = "infinite")]
    pub max_time_advance: f64,

    /// State entered instead of the sampled one when a wait is clamped
    #[serde(default)]
    pub continuation_state: Option<String>,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Exit state → output port on which reaching it is announced
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
}

impl MarkovConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let input_rule = match self.role {
            MarkovRole::Action => PortRule::NonEmptyInputs,
            MarkovRole::Source => PortRule::Any,
        };
        validate_ports(&self.name, &self.input_ports, input_rule)?;
        validate_ports(&self.name, &self.output_ports, PortRule::NonEmptyOutputs)?;

        if self.max_time_advance.is_nan() || self.max_time_advance <= 0.0 {
            return Err(ConfigError::InvalidMaxTimeAdvance {
                node: self.name.clone(),
                value: self.max_time_advance,
            });
        }
        for port in self.routes.values() {
            if !self.output_ports.contains(port) {
                return Err(ConfigError::UnknownRoutePort {
                    node: self.name.clone(),
                    port: port.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum PortRule {
    Any,
    NonEmptyInputs,
    NonEmptyOutputs,
}

fn validate_ports(node: &str, ports: &[String], rule: PortRule) -> Result<(), ConfigError> {
    if ports.is_empty() {
        match rule {
            PortRule::NonEmptyInputs => {
                return Err(ConfigError::NoInputPorts {
                    node: node.to_string(),
                })
            }
            PortRule::NonEmptyOutputs => {
                return Err(ConfigError::NoOutputPorts {
                    node: node.to_string(),
                })
            }
            PortRule::Any => {}
        }
    }
    for (i, port) in ports.iter().enumerate() {
        if ports[..i].contains(port) {
            return Err(ConfigError::DuplicatePort {
                node: node.to_string(),
                port: port.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_defaults_from_json() {
        let config: TrackerConfig = serde_json::from_str(r#"{ "name": "transducer" }"#).unwrap();
        assert_eq!(config.policy, MatchPolicy::Arbitrary);
        assert_eq!(config.input_ports, vec!["inGeneratedJobs", "inProcessedJobs"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_match_policy_names() {
        let policy: MatchPolicy = serde_json::from_str(r#""fifo-merge""#).unwrap();
        assert_eq!(policy, MatchPolicy::FifoMerge);
    }

    #[test]
    fn test_markov_defaults() {
        let config: MarkovConfig = serde_json::from_str(
            r#"{ "name": "gen", "role": "source", "output_ports": ["outM1"], "home_state": "generating" }"#,
        )
        .unwrap();
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.max_time_advance, f64::INFINITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_port_rejected() {
        let config = SyncConfig {
            name: "sync".to_string(),
            input_ports: vec!["a".to_string(), "a".to_string()],
            output_ports: vec!["out".to_string()],
            processing_time: 0.0,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicatePort { .. })
        ));
    }

    #[test]
    fn test_route_to_undeclared_port_rejected() {
        let mut routes = BTreeMap::new();
        routes.insert("done".to_string(), "nowhere".to_string());
        let config = MarkovConfig {
            name: "j4".to_string(),
            role: MarkovRole::Action,
            input_ports: vec!["in".to_string()],
            output_ports: vec!["out".to_string()],
            table_path: None,
            home_state: "active".to_string(),
            max_time_advance: 10.0,
            continuation_state: None,
            seed: 1,
            routes,
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownRoutePort { .. })
        ));
    }
}
