//! Content items and sport tags.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// Sport tag, normalized to trimmed lowercase so preferences and items
/// compare regardless of casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sport(String);

impl Sport {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::empty_field("sport"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Sport {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Sport::new(value)
    }
}

impl From<Sport> for String {
    fn from(sport: Sport) -> Self {
        sport.0
    }
}

/// Kind of pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickCategory {
    TeamBet,
    PlayerProp,
}

/// A confidence-scored pick offered for allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub sport: Sport,
    pub category: PickCategory,
    pub confidence: f64,
}

impl ContentItem {
    pub fn new(
        id: impl Into<String>,
        sport: Sport,
        category: PickCategory,
        confidence: f64,
    ) -> Result<Self, ValidationError> {
        let item = Self {
            id: id.into(),
            sport,
            category,
            confidence,
        };
        item.validate()?;
        Ok(item)
    }

    /// Ids must be non-blank and confidence finite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::empty_field("id"));
        }
        if !self.confidence.is_finite() {
            return Err(ValidationError::invalid_format(
                "confidence",
                format!("item '{}' has non-finite confidence", self.id),
            ));
        }
        Ok(())
    }
}
