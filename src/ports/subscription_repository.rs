//! Subscription repository port.
//!
//! Persists `SubscriptionRecord`s with optimistic concurrency. Writers read a
//! record, apply an event in memory, then swap it in only if nobody else
//! changed it meanwhile:
//!
//! ```ignore
//! loop {
//!     let current = repo.find_or_create(&user_id, now).await?;
//!     let mut next = current.clone();
//!     next.apply(&event, now)?;
//!     match repo.compare_and_swap(&next, current.version).await? {
//!         SwapResult::Updated(_) => break,
//!         SwapResult::Conflict => continue,
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::domain::entitlement::SubscriptionRecord;
use crate::domain::foundation::{DomainError, Timestamp, UserId};

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum SwapResult {
    /// Written; carries the record as stored, with its new version.
    Updated(SubscriptionRecord),
    /// The stored version moved; re-read and retry.
    Conflict,
}

/// Repository port for subscription records.
///
/// Implementations must ensure:
/// - Unique user_id
/// - `compare_and_swap` is atomic with respect to other writers
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find the record for an account. `None` if the account never had one.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Return the existing record, creating an empty one first if absent.
    ///
    /// Concurrent callers all observe the same record.
    async fn find_or_create(
        &self,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<SubscriptionRecord, DomainError>;

    /// Write `record` only if the stored version equals `expected_version`.
    ///
    /// On success the stored version becomes `expected_version + 1`.
    async fn compare_and_swap(
        &self,
        record: &SubscriptionRecord,
        expected_version: i64,
    ) -> Result<SwapResult, DomainError>;
}
