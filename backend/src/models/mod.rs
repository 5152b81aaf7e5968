//! Domain models for the queueing network

pub mod job;
pub mod message;
pub mod record;

// Re-exports
pub use job::{Job, JobId};
pub use message::{Message, MessageBatch, OutputBag, Payload, Port};
pub use record::{MarkovRecord, Record, RecordLog, SyncRecord, TurnaroundRecord};
