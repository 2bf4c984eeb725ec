//! Grant repository port.
//!
//! Stores at most one `GrantWindow` per (account, kind). Windows are
//! deactivated rather than deleted.

use async_trait::async_trait;

use crate::domain::entitlement::{GrantKind, GrantWindow};
use crate::domain::foundation::{DomainError, Timestamp, UserId};

#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Insert or overwrite the window for (user, kind).
    async fn upsert(&self, window: &GrantWindow) -> Result<(), DomainError>;

    /// All windows for an account, active or not.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<GrantWindow>, DomainError>;

    /// Deactivate the window for (user, kind).
    ///
    /// Returns false if there was no active window.
    async fn clear(
        &self,
        user_id: &UserId,
        kind: GrantKind,
        now: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Active windows with `expires_at <= now`, oldest expiry first.
    async fn find_expired(&self, now: Timestamp, limit: u32)
        -> Result<Vec<GrantWindow>, DomainError>;

    /// Deactivate (user, kind) only if it is still active and expired at `now`.
    ///
    /// Returns false when another writer got there first or the window was
    /// re-granted since it was read.
    async fn retire_if_expired(
        &self,
        user_id: &UserId,
        kind: GrantKind,
        now: Timestamp,
    ) -> Result<bool, DomainError>;
}
