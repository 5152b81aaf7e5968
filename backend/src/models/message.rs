//! Ports and message batches
//!
//! A [`MessageBatch`] is everything delivered to one node at one simulated
//! instant, grouped by input port. Order within a port is arrival order;
//! order across ports carries no meaning. Nodes iterate their own declared
//! port list and take each port's messages out of the batch, so processing
//! order is always the node's declared port order.

use crate::models::job::Job;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named endpoint on a node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(String);

impl Port {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Port {
    fn from(s: &str) -> Self {
        Port(s.to_string())
    }
}

impl From<String> for Port {
    fn from(s: String) -> Self {
        Port(s)
    }
}

/// Arbitrary data carried alongside a job
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    #[default]
    None,
    Number(f64),
    Text(String),
}

/// One (job, payload) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub job: Job,
    #[serde(default)]
    pub payload: Payload,
}

impl Message {
    /// Message carrying only a job
    pub fn new(job: Job) -> Self {
        Self {
            job,
            payload: Payload::None,
        }
    }

    /// Message carrying a job and payload
    pub fn with_payload(job: Job, payload: Payload) -> Self {
        Self { job, payload }
    }
}

/// Messages delivered at one instant, grouped by port
///
/// # Example
/// ```
/// use queue_simulator_core_rs::{Job, Message, MessageBatch, Port};
///
/// let mut batch = MessageBatch::new();
/// batch.push("inA", Message::new(Job::new(1u64)));
/// batch.push("inA", Message::new(Job::new(2u64)));
///
/// assert_eq!(batch.len(), 2);
/// let taken = batch.take(&Port::from("inA"));
/// assert_eq!(taken.len(), 2);
/// assert!(batch.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageBatch {
    by_port: BTreeMap<Port, Vec<Message>>,
}

impl MessageBatch {
    pub fn new() -> Self {
        Self {
            by_port: BTreeMap::new(),
        }
    }

    /// Append a message to a port (preserves per-port order)
    pub fn push(&mut self, port: impl Into<Port>, message: Message) {
        self.by_port.entry(port.into()).or_default().push(message);
    }

    /// Remove and return all messages for a port, in arrival order
    pub fn take(&mut self, port: &Port) -> Vec<Message> {
        self.by_port.remove(port).unwrap_or_default()
    }

    /// Messages for a port without removing them
    pub fn messages(&self, port: &Port) -> &[Message] {
        self.by_port.get(port).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ports that currently hold at least one message
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.by_port
            .iter()
            .filter(|(_, msgs)| !msgs.is_empty())
            .map(|(port, _)| port)
    }

    /// Total number of messages across all ports
    pub fn len(&self) -> usize {
        self.by_port.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntoIterator for MessageBatch {
    type Item = (Port, Vec<Message>);
    type IntoIter = std::collections::btree_map::IntoIter<Port, Vec<Message>>;

    /// Drain by port, in port-name order
    fn into_iter(self) -> Self::IntoIter {
        self.by_port.into_iter()
    }
}

/// Messages produced by a node's output function
pub type OutputBag = MessageBatch;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_payload_forms() {
        let text: Message =
            serde_json::from_str(r#"{ "job": { "id": "p-7" }, "payload": "triage" }"#).unwrap();
        assert_eq!(text.payload, Payload::Text("triage".to_string()));
        assert_eq!(text.job, Job::new("p-7"));

        let number: Message =
            serde_json::from_str(r#"{ "job": { "id": 3 }, "payload": 1.5 }"#).unwrap();
        assert_eq!(number.payload, Payload::Number(1.5));
        assert_eq!(number.job, Job::new(3u64));

        let bare: Message = serde_json::from_str(r#"{ "job": { "id": 4 } }"#).unwrap();
        assert_eq!(bare.payload, Payload::None);
    }

    #[test]
    fn test_batch_keeps_per_port_order() {
        let mut batch = MessageBatch::new();
        batch.push(
            "in",
            Message::with_payload(Job::new(1u64), Payload::Text("first".to_string())),
        );
        batch.push("in", Message::new(Job::new(2u64)));

        let messages = batch.messages(&Port::from("in"));
        assert_eq!(messages[0].payload, Payload::Text("first".to_string()));
        assert_eq!(messages[1].job, Job::new(2u64));
        assert!(batch.messages(&Port::from("other")).is_empty());
    }
}
