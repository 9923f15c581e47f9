//! Audit sink abstraction (fire-and-forget).

use std::sync::{Arc, Mutex};

use crate::event::{AuditEvent, AuditKind};

/// Best-effort recipient of audit events.
///
/// `record` must return promptly and must not fail: implementations log and
/// swallow their own errors. Callers invoke it only after the business
/// transaction has committed.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn record(&self, event: AuditEvent) {
        (**self).record(event)
    }
}

/// Sink that only writes audit events to the tracing output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            audit_id = %event.id,
            kind = %event.kind,
            actor = %event.actor,
            detail = %event.detail,
            "audit event"
        );
    }
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn of_kind(&self, kind: &AuditKind) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| &e.kind == kind)
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(_) => tracing::error!(kind = %event.kind, "audit sink lock poisoned; event dropped"),
        }
    }
}
