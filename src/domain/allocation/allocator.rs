//! Quota-bounded content allocation.
//!
//! Preferred sports are served first in confidence order. When they run out
//! before the quota is met, the remainder is filled from other sports, again
//! by confidence, and the result is flagged so the client can explain why.

use serde::Serialize;
use std::cmp::Ordering;

use super::{ContentItem, Sport};

/// Ordered set of sports an account has enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SportPreferences {
    sports: Vec<Sport>,
}

impl SportPreferences {
    /// Builds preferences, dropping duplicates but keeping first-seen order.
    pub fn new(sports: impl IntoIterator<Item = Sport>) -> Self {
        let mut unique: Vec<Sport> = Vec::new();
        for sport in sports {
            if !unique.contains(&sport) {
                unique.push(sport);
            }
        }
        Self { sports: unique }
    }

    pub fn contains(&self, sport: &Sport) -> bool {
        self.sports.contains(sport)
    }

    pub fn sports(&self) -> &[Sport] {
        &self.sports
    }

    pub fn is_empty(&self) -> bool {
        self.sports.is_empty()
    }
}

/// Outcome of one allocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub selected: Vec<ContentItem>,
    /// True iff at least one selected item is outside the preferences.
    pub fallback_used: bool,
    /// Distinct fallback sports in the order they were first selected.
    pub fallback_sports: Vec<Sport>,
}

impl Allocation {
    /// User-facing explanation of a fallback fill.
    pub fn fallback_notice(&self) -> Option<String> {
        if !self.fallback_used {
            return None;
        }
        let sports: Vec<&str> = self.fallback_sports.iter().map(Sport::as_str).collect();
        Some(format!(
            "Added picks from {} to reach your daily limit",
            sports.join(", ")
        ))
    }
}

fn by_confidence_desc(a: &ContentItem, b: &ContentItem) -> Ordering {
    b.confidence.total_cmp(&a.confidence)
}

/// Selects at most `quota` items from `pool`.
///
/// Stable sort: items with equal confidence keep their pool order.
/// Under-filling is not an error.
pub fn allocate(quota: usize, preferences: &SportPreferences, pool: Vec<ContentItem>) -> Allocation {
    let (mut preferred, mut other): (Vec<ContentItem>, Vec<ContentItem>) = pool
        .into_iter()
        .partition(|item| preferences.contains(&item.sport));

    preferred.sort_by(by_confidence_desc);
    other.sort_by(by_confidence_desc);

    let mut selected: Vec<ContentItem> = preferred.into_iter().take(quota).collect();

    let remaining = quota.saturating_sub(selected.len());
    let mut fallback_sports: Vec<Sport> = Vec::new();
    for item in other.into_iter().take(remaining) {
        if !fallback_sports.contains(&item.sport) {
            fallback_sports.push(item.sport.clone());
        }
        selected.push(item);
    }

    Allocation {
        fallback_used: !fallback_sports.is_empty(),
        selected,
        fallback_sports,
    }
}
