//! Background forwarding for cleanreport
//!
//! Accepted submissions become [`ForwardJob`]s. Each job is persisted in an
//! [`Outbox`] before it is queued, forwarded to the sink one unit at a time, and
//! removed from the outbox once every unit is delivered. Jobs that exhaust their
//! retries move to the outbox's dead-letter area.

pub mod outbox;
pub mod queue;
pub mod status;

pub use outbox::{FileOutbox, ForwardJob, MemoryOutbox, Outbox, OutboxError, OutboxResult};
pub use queue::{ForwardError, ForwardQueue, ForwardQueueConfig, MAX_RETRY_BACKOFF_SECS};
pub use status::{ForwardStatus, StatusStore};
