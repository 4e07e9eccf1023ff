mod analysis;
mod engine;

pub use analysis::{histogram, level_at, HistogramBucket, HISTOGRAM_BUCKETS, HISTOGRAM_BUCKET_HOURS};
pub use engine::{DecayEngine, DecayModel, DecayState, DEFAULT_FLOOR_MG, DEFAULT_HALF_LIFE_HOURS};
