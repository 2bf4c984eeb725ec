//! In-memory grant repository for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::entitlement::{GrantKind, GrantWindow};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::GrantRepository;

/// Grant windows keyed by (user, kind).
///
/// `set_unavailable(true)` makes every call fail with a database error,
/// for exercising outage paths.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGrantRepository {
    windows: Arc<RwLock<HashMap<(UserId, GrantKind), GrantWindow>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryGrantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn get(&self, user_id: &UserId, kind: GrantKind) -> Option<GrantWindow> {
        self.windows
            .read()
            .await
            .get(&(user_id.clone(), kind))
            .cloned()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "grant store unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GrantRepository for InMemoryGrantRepository {
    async fn upsert(&self, window: &GrantWindow) -> Result<(), DomainError> {
        self.check_available()?;
        self.windows
            .write()
            .await
            .insert((window.user_id.clone(), window.kind), window.clone());
        Ok(())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<GrantWindow>, DomainError> {
        self.check_available()?;
        Ok(self
            .windows
            .read()
            .await
            .values()
            .filter(|w| &w.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn clear(
        &self,
        user_id: &UserId,
        kind: GrantKind,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        self.check_available()?;
        let mut windows = self.windows.write().await;
        Ok(windows
            .get_mut(&(user_id.clone(), kind))
            .map(|w| w.clear(now))
            .unwrap_or(false))
    }

    async fn find_expired(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<GrantWindow>, DomainError> {
        self.check_available()?;
        let mut expired: Vec<GrantWindow> = self
            .windows
            .read()
            .await
            .values()
            .filter(|w| w.is_expired(now))
            .cloned()
            .collect();
        expired.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        expired.truncate(limit as usize);
        Ok(expired)
    }

    async fn retire_if_expired(
        &self,
        user_id: &UserId,
        kind: GrantKind,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        self.check_available()?;
        let mut windows = self.windows.write().await;
        match windows.get_mut(&(user_id.clone(), kind)) {
            Some(w) if w.is_expired(now) => Ok(w.clear(now)),
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::Tier;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn t(secs: i64) -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000 + secs).unwrap()
    }

    #[tokio::test]
    async fn upsert_overwrites_existing_window() {
        let repo = InMemoryGrantRepository::new();
        let first = GrantWindow::issue(user("u1"), GrantKind::DayPass, Tier::Pro, t(0));
        let second = GrantWindow::issue(user("u1"), GrantKind::DayPass, Tier::Elite, t(3600));

        repo.upsert(&first).await.unwrap();
        repo.upsert(&second).await.unwrap();

        let windows = repo.find_by_user(&user("u1")).await.unwrap();
        assert_eq!(windows, vec![second]);
    }

    #[tokio::test]
    async fn retire_if_expired_skips_live_and_regranted_windows() {
        let repo = InMemoryGrantRepository::new();
        repo.upsert(&GrantWindow::issue(user("u1"), GrantKind::DayPass, Tier::Pro, t(0)))
            .await
            .unwrap();

        assert!(!repo
            .retire_if_expired(&user("u1"), GrantKind::DayPass, t(60))
            .await
            .unwrap());
        let after_expiry = t(0).plus_hours(24);
        assert!(repo
            .retire_if_expired(&user("u1"), GrantKind::DayPass, after_expiry)
            .await
            .unwrap());
        assert!(!repo
            .retire_if_expired(&user("u1"), GrantKind::DayPass, after_expiry)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn find_expired_orders_by_expiry_and_limits() {
        let repo = InMemoryGrantRepository::new();
        for (i, id) in ["u3", "u1", "u2"].iter().enumerate() {
            repo.upsert(&GrantWindow::issue(
                user(id),
                GrantKind::WelcomeBonus,
                Tier::Pro,
                t(i as i64 * 10),
            ))
            .await
            .unwrap();
        }

        let expired = repo.find_expired(t(0).plus_hours(48), 2).await.unwrap();

        let ids: Vec<&str> = expired.iter().map(|w| w.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u3", "u1"]);
    }

    #[tokio::test]
    async fn unavailable_store_returns_database_error() {
        let repo = InMemoryGrantRepository::new();
        repo.set_unavailable(true);
        let err = repo.find_by_user(&user("u1")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
