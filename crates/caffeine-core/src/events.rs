use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::CaffeineSource;

/// Every accepted state change produces an Event.
/// Rejected or no-op operations produce none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    DoseLogged {
        source_name: String,
        amount_mg: u32,
        /// Equivalent initial amount after folding in the dose.
        initial_mg: f64,
        at: DateTime<Utc>,
    },
    TrackerReset {
        at: DateTime<Utc>,
    },
    SourceAdded {
        source: CaffeineSource,
        index: usize,
        at: DateTime<Utc>,
    },
    SourceRemoved {
        name: String,
        removed: usize,
        at: DateTime<Utc>,
    },
    SourceUpdated {
        old_name: String,
        source: CaffeineSource,
        at: DateTime<Utc>,
    },
    /// Full state snapshot.
    StateSnapshot {
        displayed_mg: f64,
        initial_mg: f64,
        last_dose_at: Option<DateTime<Utc>>,
        history_len: usize,
        at: DateTime<Utc>,
    },
}
