//! PostgreSQL implementation of SubscriptionRepository.
//!
//! Compare-and-swap is a single conditional `UPDATE ... WHERE version = $n`;
//! zero affected rows means another writer moved the record first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entitlement::{SubscriptionRecord, SubscriptionStatus, Tier};
use crate::domain::foundation::{DomainError, ErrorCode, EventId, Timestamp, UserId};
use crate::ports::{SubscriptionRepository, SwapResult};

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription record.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    user_id: String,
    provider_customer_id: Option<String>,
    tier: Option<String>,
    product_id: Option<String>,
    status: String,
    last_event_id: Option<String>,
    last_event_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let tier = row
            .tier
            .as_deref()
            .map(str::parse::<Tier>)
            .transpose()
            .map_err(|e| corrupt("tier", e))?;
        let status = row
            .status
            .parse::<SubscriptionStatus>()
            .map_err(|e| corrupt("status", e))?;
        let last_event_id = row
            .last_event_id
            .map(EventId::new)
            .transpose()
            .map_err(|e| corrupt("last_event_id", e))?;

        Ok(SubscriptionRecord {
            user_id: UserId::new(row.user_id).map_err(|e| corrupt("user_id", e))?,
            provider_customer_id: row.provider_customer_id,
            tier,
            product_id: row.product_id,
            status,
            last_event_id,
            last_event_at: row.last_event_at.map(Timestamp::from_datetime),
            version: row.version,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn corrupt(column: &str, cause: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid subscriptions.{} value: {}", column, cause),
    )
}

const SELECT_COLUMNS: &str = r#"
    user_id, provider_customer_id, tier, product_id, status,
    last_event_id, last_event_at, version, created_at, updated_at
"#;

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1",
            SELECT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load subscription", e))?;

        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn find_or_create(
        &self,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<SubscriptionRecord, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, status, version, created_at, updated_at)
            VALUES ($1, 'none', 0, $2, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id.as_str())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to create subscription", e))?;

        self.find_by_user(user_id).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription for {} vanished after insert", user_id),
            )
        })
    }

    async fn compare_and_swap(
        &self,
        record: &SubscriptionRecord,
        expected_version: i64,
    ) -> Result<SwapResult, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            UPDATE subscriptions SET
                provider_customer_id = $3,
                tier = $4,
                product_id = $5,
                status = $6,
                last_event_id = $7,
                last_event_at = $8,
                updated_at = $9,
                version = version + 1
            WHERE user_id = $1 AND version = $2
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(record.user_id.as_str())
        .bind(expected_version)
        .bind(&record.provider_customer_id)
        .bind(record.tier.map(|t| t.as_str()))
        .bind(&record.product_id)
        .bind(record.status.as_str())
        .bind(record.last_event_id.as_ref().map(|id| id.as_str()))
        .bind(record.last_event_at.map(|t| *t.as_datetime()))
        .bind(record.updated_at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to update subscription", e))?;

        match row {
            Some(row) => Ok(SwapResult::Updated(row.try_into()?)),
            None => Ok(SwapResult::Conflict),
        }
    }
}
