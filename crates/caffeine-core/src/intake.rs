use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source name recorded for doses logged without a named source.
pub const UNNAMED_SOURCE: &str = "Custom";

/// A single consumption event. Append-only; never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaffeineIntake {
    pub source_name: String,
    #[serde(rename = "amount")]
    pub amount_mg: u32,
    pub timestamp: DateTime<Utc>,
}

impl CaffeineIntake {
    pub fn new(source_name: impl Into<String>, amount_mg: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            source_name: source_name.into(),
            amount_mg,
            timestamp,
        }
    }
}
