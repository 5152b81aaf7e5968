//! Job model
//!
//! A job is the unit of work flowing through the network. The core only
//! needs its identity; arrival timestamps are recorded by whichever queue
//! first holds it. Jobs are moved between nodes, never shared.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque job identity (text or numeric token)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    Number(u64),
    Text(String),
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Number(n) => write!(f, "{}", n),
            JobId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<u64> for JobId {
    fn from(n: u64) -> Self {
        JobId::Number(n)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId::Text(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId::Text(s)
    }
}

/// A job travelling through the network
///
/// # Example
/// ```
/// use queue_simulator_core_rs::{Job, JobId};
///
/// let job = Job::new("patient-7");
/// assert_eq!(job.id(), &JobId::Text("patient-7".to_string()));
///
/// let numbered = Job::new(3u64);
/// assert_eq!(numbered.id().to_string(), "3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
}

impl Job {
    /// Create a job with the given identity
    pub fn new(id: impl Into<JobId>) -> Self {
        Self { id: id.into() }
    }

    /// Get the job identity
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Consume the job, returning its identity
    pub fn into_id(self) -> JobId {
        self.id
    }
}
