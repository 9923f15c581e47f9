//! Audit trail: event records, sinks and the background writer.
//!
//! The business engines hand finished facts to an [`AuditSink`] after commit.
//! Sinks never block and never report failure back to the caller; whatever
//! goes wrong while recording is logged and dropped.

pub mod channel;
pub mod event;
pub mod log;
pub mod sink;

pub use channel::{AuditWorker, ChannelAuditSink};
pub use event::{AuditEvent, AuditKind};
pub use log::{AuditError, AuditLog, InMemoryAuditLog};
pub use sink::{AuditSink, InMemoryAuditSink, TracingAuditSink};
