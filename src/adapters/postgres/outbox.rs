//! PostgreSQL transactional outbox.
//!
//! `insert_outbox_events` runs inside the contract repository's
//! transaction; `PostgresOutboxWriter` serves the publisher's reads and
//! status updates.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{OutboxEntry, OutboxStatus, OutboxWriter};

/// Append events to the outbox within an open transaction.
pub(super) async fn insert_outbox_events(
    tx: &mut Transaction<'_, Postgres>,
    events: &[EventEnvelope],
    partition_key: &str,
) -> Result<(), DomainError> {
    for event in events {
        let entry = OutboxEntry::new(event.clone(), partition_key);
        insert_entry(&mut **tx, &entry).await?;
    }
    Ok(())
}

async fn insert_entry<'e, E>(executor: E, entry: &OutboxEntry) -> Result<(), DomainError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO event_outbox (
            id, event_id, event_type, partition_key, envelope, status, attempts, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(entry.id)
    .bind(entry.event.event_id.as_str())
    .bind(&entry.event.event_type)
    .bind(&entry.partition_key)
    .bind(Json(&entry.event))
    .bind(status_to_str(entry.status))
    .bind(entry.attempts as i32)
    .bind(entry.created_at)
    .execute(executor)
    .await
    .map_err(|e| DomainError::database(format!("Failed to write outbox event: {}", e)))?;
    Ok(())
}

fn status_to_str(status: OutboxStatus) -> &'static str {
    match status {
        OutboxStatus::Pending => "pending",
        OutboxStatus::Published => "published",
        OutboxStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> Result<OutboxStatus, DomainError> {
    match s {
        "pending" => Ok(OutboxStatus::Pending),
        "published" => Ok(OutboxStatus::Published),
        "failed" => Ok(OutboxStatus::Failed),
        other => Err(DomainError::database(format!(
            "Invalid outbox status value: {}",
            other
        ))),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    partition_key: String,
    envelope: Json<EventEnvelope>,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<OutboxRow> for OutboxEntry {
    type Error = DomainError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(OutboxEntry {
            id: row.id,
            event: row.envelope.0,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            processed_at: row.processed_at,
            attempts: row.attempts.max(0) as u32,
            last_error: row.last_error,
            partition_key: row.partition_key,
        })
    }
}

/// PostgreSQL implementation of the OutboxWriter port.
pub struct PostgresOutboxWriter {
    pool: PgPool,
}

impl PostgresOutboxWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxWriter for PostgresOutboxWriter {
    async fn write(
        &self,
        event: &EventEnvelope,
        partition_key: &str,
    ) -> Result<OutboxEntry, DomainError> {
        let entry = OutboxEntry::new(event.clone(), partition_key);
        insert_entry(&self.pool, &entry).await?;
        Ok(entry)
    }

    async fn write_batch(
        &self,
        events: &[EventEnvelope],
        partition_key: &str,
    ) -> Result<Vec<OutboxEntry>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to start transaction: {}", e)))?;

        let mut entries = Vec::with_capacity(events.len());
        for event in events {
            let entry = OutboxEntry::new(event.clone(), partition_key);
            insert_entry(&mut *tx, &entry).await?;
            entries.push(entry);
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit outbox batch: {}", e)))?;
        Ok(entries)
    }

    async fn get_pending(&self, limit: u32) -> Result<Vec<OutboxEntry>, DomainError> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT id, partition_key, envelope, status, attempts, last_error,
                   created_at, processed_at
            FROM event_outbox
            WHERE status IN ('pending', 'failed')
            ORDER BY created_at
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to read outbox: {}", e)))?;

        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE event_outbox
            SET status = 'published', processed_at = NOW(), attempts = attempts + 1
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to mark outbox event published: {}", e)))?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE event_outbox
            SET status = 'failed', processed_at = NOW(), attempts = attempts + 1, last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to mark outbox event failed: {}", e)))?;
        Ok(())
    }

    async fn cleanup_old(&self, older_than_hours: u32) -> Result<u64, DomainError> {
        let cutoff = Utc::now() - Duration::hours(i64::from(older_than_hours));
        let result = sqlx::query(
            "DELETE FROM event_outbox WHERE status = 'published' AND processed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to clean up outbox: {}", e)))?;
        Ok(result.rows_affected())
    }
}
