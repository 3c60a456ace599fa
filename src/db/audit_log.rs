use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::{error::AppResult, models::AuditEvent};

/// Session key recorded for events raised by the server itself
pub const SYSTEM_SESSION_KEY: &str = "SYSTEM";

/// Write-only sink for recommendation audit events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, event: AuditEvent) -> AppResult<()>;
}

/// Appends events to the `recommendation_event_log` table
#[derive(Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditLog {
    async fn append(&self, event: AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recommendation_event_log (session_key, event_type, payload, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(SYSTEM_SESSION_KEY)
        .bind(event.event_type.as_str())
        .bind(Value::Object(event.payload))
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
