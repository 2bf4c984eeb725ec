//! PostgreSQL implementation of GrantRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entitlement::{GrantKind, GrantWindow, Tier};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::GrantRepository;

pub struct PostgresGrantRepository {
    pool: PgPool,
}

impl PostgresGrantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GrantWindowRow {
    user_id: String,
    kind: String,
    tier: String,
    granted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    active: bool,
    cleared_at: Option<DateTime<Utc>>,
}

impl TryFrom<GrantWindowRow> for GrantWindow {
    type Error = DomainError;

    fn try_from(row: GrantWindowRow) -> Result<Self, Self::Error> {
        let invalid = |column: &str, cause: String| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid grant_windows.{} value: {}", column, cause),
            )
        };

        Ok(GrantWindow {
            user_id: UserId::new(row.user_id).map_err(|e| invalid("user_id", e.to_string()))?,
            kind: row
                .kind
                .parse::<GrantKind>()
                .map_err(|e| invalid("kind", e.to_string()))?,
            tier: row
                .tier
                .parse::<Tier>()
                .map_err(|e| invalid("tier", e.to_string()))?,
            granted_at: Timestamp::from_datetime(row.granted_at),
            expires_at: Timestamp::from_datetime(row.expires_at),
            active: row.active,
            cleared_at: row.cleared_at.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl GrantRepository for PostgresGrantRepository {
    async fn upsert(&self, window: &GrantWindow) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO grant_windows (user_id, kind, tier, granted_at, expires_at, active, cleared_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, kind) DO UPDATE SET
                tier = EXCLUDED.tier,
                granted_at = EXCLUDED.granted_at,
                expires_at = EXCLUDED.expires_at,
                active = EXCLUDED.active,
                cleared_at = EXCLUDED.cleared_at
            "#,
        )
        .bind(window.user_id.as_str())
        .bind(window.kind.as_str())
        .bind(window.tier.as_str())
        .bind(window.granted_at.as_datetime())
        .bind(window.expires_at.as_datetime())
        .bind(window.active)
        .bind(window.cleared_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to upsert grant window", e))?;

        Ok(())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<GrantWindow>, DomainError> {
        let rows: Vec<GrantWindowRow> = sqlx::query_as(
            r#"
            SELECT user_id, kind, tier, granted_at, expires_at, active, cleared_at
            FROM grant_windows
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load grant windows", e))?;

        rows.into_iter().map(GrantWindow::try_from).collect()
    }

    async fn clear(
        &self,
        user_id: &UserId,
        kind: GrantKind,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE grant_windows SET active = FALSE, cleared_at = $3
            WHERE user_id = $1 AND kind = $2 AND active
            "#,
        )
        .bind(user_id.as_str())
        .bind(kind.as_str())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to clear grant window", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_expired(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<GrantWindow>, DomainError> {
        let rows: Vec<GrantWindowRow> = sqlx::query_as(
            r#"
            SELECT user_id, kind, tier, granted_at, expires_at, active, cleared_at
            FROM grant_windows
            WHERE active AND expires_at <= $1
            ORDER BY expires_at
            LIMIT $2
            "#,
        )
        .bind(now.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load expired grant windows", e))?;

        rows.into_iter().map(GrantWindow::try_from).collect()
    }

    async fn retire_if_expired(
        &self,
        user_id: &UserId,
        kind: GrantKind,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE grant_windows SET active = FALSE, cleared_at = $3
            WHERE user_id = $1 AND kind = $2 AND active AND expires_at <= $3
            "#,
        )
        .bind(user_id.as_str())
        .bind(kind.as_str())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to retire grant window", e))?;

        Ok(result.rows_affected() > 0)
    }
}
