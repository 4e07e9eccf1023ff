//! Historical caffeine levels reconstructed from the intake log.
//!
//! Unlike [`super::DecayEngine`], which only knows the collapsed state,
//! these functions replay every logged intake, so they can answer "what was
//! the level at time t" for any past instant.

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};

use super::DecayModel;
use crate::intake::CaffeineIntake;

/// Number of buckets in the daily histogram.
pub const HISTOGRAM_BUCKETS: usize = 12;

/// Width of a histogram bucket.
pub const HISTOGRAM_BUCKET_HOURS: i64 = 2;

/// Level at the end of one histogram bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Local wall-clock hour of the bucket end, e.g. `"14:00"`.
    pub label: String,
    pub ends_at: DateTime<Utc>,
    pub level_mg: f64,
}

/// Caffeine level at `at`, summing every intake taken at or before it.
pub fn level_at(model: &DecayModel, intakes: &[CaffeineIntake], at: DateTime<Utc>) -> f64 {
    let total: f64 = intakes
        .iter()
        .filter(|intake| intake.timestamp <= at)
        .map(|intake| model.decay(f64::from(intake.amount_mg), at - intake.timestamp))
        .sum();
    model.apply_floor(total)
}

/// Levels over the past 24 hours in 2-hour buckets, oldest first.
///
/// The last bucket ends at `now`.
pub fn histogram(
    model: &DecayModel,
    intakes: &[CaffeineIntake],
    now: DateTime<Utc>,
) -> Vec<HistogramBucket> {
    let mut buckets: Vec<HistogramBucket> = (0..HISTOGRAM_BUCKETS as i64)
        .map(|i| {
            let ends_at = now - Duration::hours(i * HISTOGRAM_BUCKET_HOURS);
            HistogramBucket {
                label: ends_at.with_timezone(&Local).format("%H:00").to_string(),
                ends_at,
                level_mg: level_at(model, intakes, ends_at),
            }
        })
        .collect();
    buckets.reverse();
    buckets
}
