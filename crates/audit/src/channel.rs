//! Channel-backed audit sink and its background writer.
//!
//! ```text
//! engine ──record()──► ChannelAuditSink ──mpsc──► AuditWorker ──► AuditLog
//! ```
//!
//! `record` uses `try_send`, so a slow or failed log never stalls the engine.
//! When the buffer is full or the worker has stopped, the event is dropped
//! and the drop is logged.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::event::AuditEvent;
use crate::log::AuditLog;
use crate::sink::AuditSink;

/// Non-blocking sink that forwards events to an [`AuditWorker`].
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    /// Create a sink and the receiving end for its worker.
    ///
    /// `buffer` must be greater than zero.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, event: AuditEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    audit_id = %event.id,
                    kind = %event.kind,
                    "audit buffer full; event dropped"
                );
            }
            Err(TrySendError::Closed(event)) => {
                tracing::error!(
                    audit_id = %event.id,
                    kind = %event.kind,
                    "audit worker stopped; event dropped"
                );
            }
        }
    }
}

/// Background writer draining a [`ChannelAuditSink`] into an [`AuditLog`].
pub struct AuditWorker<L> {
    log: L,
}

impl<L> AuditWorker<L>
where
    L: AuditLog,
{
    pub fn new(log: L) -> Self {
        Self { log }
    }

    /// Run until every sender has been dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<AuditEvent>) {
        tracing::info!("audit worker started");

        while let Some(event) = rx.recv().await {
            match self.log.append(&event).await {
                Ok(()) => {
                    tracing::debug!(
                        audit_id = %event.id,
                        kind = %event.kind,
                        actor = %event.actor,
                        "audit event saved"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        audit_id = %event.id,
                        kind = %event.kind,
                        error = %e,
                        "failed to save audit event"
                    );
                }
            }
        }

        tracing::info!("audit channel closed, worker stopping");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::event::AuditKind;
    use crate::log::{AuditError, InMemoryAuditLog};

    struct BrokenLog;

    #[async_trait]
    impl AuditLog for BrokenLog {
        async fn append(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::Storage("disk on fire".into()))
        }
    }

    #[tokio::test]
    async fn worker_persists_events_in_order() {
        let log = Arc::new(InMemoryAuditLog::new());
        let (sink, rx) = ChannelAuditSink::new(8);
        let worker = tokio::spawn(AuditWorker::new(log.clone()).run(rx));

        sink.record(AuditEvent::new(AuditKind::ProductCreated, "alice", "first"));
        sink.record(AuditEvent::new(AuditKind::StockUpdated, "alice", "second"));
        drop(sink);
        worker.await.unwrap();

        let details: Vec<_> = log.entries().into_iter().map(|e| e.detail).collect();
        assert_eq!(details, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn full_buffer_drops_without_blocking() {
        let (sink, mut rx) = ChannelAuditSink::new(1);

        sink.record(AuditEvent::new(AuditKind::OrderPlaced, "u1", "kept"));
        sink.record(AuditEvent::new(AuditKind::OrderPlaced, "u1", "dropped"));
        drop(sink);

        assert_eq!(rx.recv().await.unwrap().detail, "kept");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_worker_is_tolerated() {
        let (sink, rx) = ChannelAuditSink::new(4);
        drop(rx);
        sink.record(AuditEvent::new(AuditKind::ProductDeleted, "system", "gone"));
    }

    #[tokio::test]
    async fn worker_survives_log_failures() {
        let (sink, rx) = ChannelAuditSink::new(4);
        let worker = tokio::spawn(AuditWorker::new(BrokenLog).run(rx));

        sink.record(AuditEvent::new(AuditKind::OrderPlaced, "u1", "a"));
        sink.record(AuditEvent::new(AuditKind::OrderPlaced, "u1", "b"));
        drop(sink);

        worker.await.unwrap();
    }
}
