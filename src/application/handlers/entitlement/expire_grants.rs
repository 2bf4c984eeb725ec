//! ExpireGrantsHandler - Retires grant windows whose 24 hours are up.
//!
//! Resolution already ignores expired windows at read time; this sweep
//! only brings the stored `active` flag in line. Each retirement is a
//! conditional update, so concurrent sweeps on several instances are safe.

use serde::Serialize;
use std::sync::Arc;

use super::invalidate_cached_tier;
use crate::domain::entitlement::EntitlementError;
use crate::domain::foundation::Timestamp;
use crate::ports::{GrantRepository, TierCache};

pub const DEFAULT_SWEEP_BATCH_SIZE: u32 = 500;
pub const DEFAULT_SWEEP_MAX_BATCHES: u32 = 20;

/// Outcome of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub retired: u32,
    /// Rows that errored or were retired by someone else first.
    pub skipped: u32,
    pub batches: u32,
}

pub struct ExpireGrantsHandler {
    grants: Arc<dyn GrantRepository>,
    tier_cache: Arc<dyn TierCache>,
    batch_size: u32,
    max_batches: u32,
}

impl ExpireGrantsHandler {
    pub fn new(grants: Arc<dyn GrantRepository>, tier_cache: Arc<dyn TierCache>) -> Self {
        Self {
            grants,
            tier_cache,
            batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            max_batches: DEFAULT_SWEEP_MAX_BATCHES,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_batches(mut self, max_batches: u32) -> Self {
        self.max_batches = max_batches.max(1);
        self
    }

    /// Run one sweep as of `now`.
    ///
    /// Fails only if a batch cannot be loaded; per-row failures are skipped
    /// and left for the next run.
    pub async fn handle(&self, now: Timestamp) -> Result<SweepReport, EntitlementError> {
        let mut report = SweepReport::default();

        while report.batches < self.max_batches {
            let batch = self.grants.find_expired(now, self.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            report.batches += 1;

            let mut retired_this_batch = 0;
            for window in &batch {
                match self
                    .grants
                    .retire_if_expired(&window.user_id, window.kind, now)
                    .await
                {
                    Ok(true) => {
                        retired_this_batch += 1;
                        invalidate_cached_tier(self.tier_cache.as_ref(), &window.user_id).await;
                        tracing::debug!(
                            user_id = %window.user_id,
                            kind = %window.kind,
                            "Retired expired grant window"
                        );
                    }
                    Ok(false) => report.skipped += 1,
                    Err(e) => {
                        report.skipped += 1;
                        tracing::warn!(
                            user_id = %window.user_id,
                            kind = %window.kind,
                            error = %e,
                            "Failed to retire grant window, leaving for next sweep"
                        );
                    }
                }
            }
            report.retired += retired_this_batch;

            if (batch.len() as u32) < self.batch_size || retired_this_batch == 0 {
                break;
            }
        }

        tracing::info!(
            retired = report.retired,
            skipped = report.skipped,
            batches = report.batches,
            "Grant expiration sweep complete"
        );

        Ok(report)
    }
}
