//! PostgreSQL implementation of WebhookEventRepository.
//!
//! The `event_id` primary key arbitrates concurrent deliveries of one event:
//! the first insert wins and later ones see `AlreadyExists`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome};

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    event_id: String,
    event_type: String,
    user_id: Option<String>,
    payload_digest: String,
    payload: serde_json::Value,
    outcome: String,
    error_message: Option<String>,
    attempts: i32,
    received_at: DateTime<Utc>,
    processed_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        let outcome = row.outcome.parse::<WebhookOutcome>().map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid webhook_events.outcome value: {}", e),
            )
        })?;

        Ok(WebhookEventRecord {
            event_id: row.event_id,
            event_type: row.event_type,
            user_id: row.user_id,
            payload_digest: row.payload_digest,
            payload: row.payload,
            outcome,
            error_message: row.error_message,
            attempts: row.attempts,
            received_at: row.received_at,
            processed_at: row.processed_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    event_id, event_type, user_id, payload_digest, payload,
    outcome, error_message, attempts, received_at, processed_at
"#;

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(&format!(
            "SELECT {} FROM webhook_events WHERE event_id = $1",
            SELECT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load webhook event", e))?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (
                event_id, event_type, user_id, payload_digest, payload,
                outcome, error_message, attempts, received_at, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(&record.user_id)
        .bind(&record.payload_digest)
        .bind(&record.payload)
        .bind(record.outcome.as_str())
        .bind(&record.error_message)
        .bind(record.attempts)
        .bind(record.received_at)
        .bind(record.processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to save webhook event", e))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn record_retry(
        &self,
        event_id: &str,
        outcome: WebhookOutcome,
        error_message: Option<String>,
        processed_at: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events SET
                outcome = $2,
                error_message = $3,
                processed_at = $4,
                attempts = attempts + 1
            WHERE event_id = $1 AND outcome = 'failed'
            "#,
        )
        .bind(event_id)
        .bind(outcome.as_str())
        .bind(error_message)
        .bind(processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to record webhook retry", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_failed(&self, limit: u32) -> Result<Vec<WebhookEventRecord>, DomainError> {
        let rows: Vec<WebhookEventRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM webhook_events
            WHERE outcome = 'failed'
            ORDER BY received_at
            LIMIT $1
            "#,
            SELECT_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load failed webhook events", e))?;

        rows.into_iter().map(WebhookEventRecord::try_from).collect()
    }
}
