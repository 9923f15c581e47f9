//! Durable audit log boundary.

use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::event::AuditEvent;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(String),
}

/// Append-only audit storage consumed by [`crate::AuditWorker`].
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// In-memory audit log for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEvent> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AuditError::Storage("lock poisoned".to_string()))?;
        entries.push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl<L> AuditLog for std::sync::Arc<L>
where
    L: AuditLog + ?Sized,
{
    async fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        (**self).append(event).await
    }
}
