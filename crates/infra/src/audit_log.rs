//! Durable audit storage and pipeline wiring.

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::task::JoinHandle;

use stockroom_audit::{AuditError, AuditEvent, AuditLog, AuditWorker, ChannelAuditSink};

/// Appends audit events to the `audit_logs` table.
#[derive(Debug, Clone)]
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, occurred_at, event_type, actor, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.occurred_at)
        .bind(event.kind.as_str())
        .bind(&event.actor)
        .bind(&event.detail)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// Start an [`AuditWorker`] over `log` and return the sink that feeds it.
///
/// The worker stops once every clone of the sink has been dropped; await the
/// handle to flush outstanding events on shutdown.
pub fn spawn_audit_pipeline<L>(log: L, buffer: usize) -> (ChannelAuditSink, JoinHandle<()>)
where
    L: AuditLog + 'static,
{
    let (sink, rx) = ChannelAuditSink::new(buffer);
    let handle = tokio::spawn(AuditWorker::new(log).run(rx));
    (sink, handle)
}
