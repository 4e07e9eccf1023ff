//! # Caffeine-in Core Library
//!
//! Business logic for the Caffeine-in intake tracker. All operations are
//! available through the `caffeine-cli` binary; any GUI is a thin layer over
//! the same library.
//!
//! ## Architecture
//!
//! - **Decay Engine**: single-exponential caffeine elimination with additive
//!   re-dosing, folded into one collapsed state
//! - **History Store**: ordered list of named sources, unique by
//!   case-insensitive name
//! - **Storage**: SQLite key-value table and intake log, TOML configuration
//! - **Monitor**: cancellable periodic recomputation of the displayed level
//!
//! ## Key Components
//!
//! - [`DecayEngine`]: collapsed decay state and level computation
//! - [`HistoryStore`]: source list invariants
//! - [`CaffeineTracker`]: state holder bridging callers to storage
//! - [`LiveTracker`]: async wrapper publishing live levels
//! - [`Database`]: persistence
//! - [`Config`]: application configuration

pub mod decay;
pub mod error;
pub mod events;
pub mod history;
pub mod intake;
pub mod monitor;
pub mod storage;
pub mod tracker;

pub use decay::{DecayEngine, DecayModel, DecayState, HistogramBucket};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use history::{validate_amount, validate_source, CaffeineSource, HistoryStore};
pub use intake::CaffeineIntake;
pub use monitor::{DecayMonitor, LiveTracker};
pub use storage::{Config, Database};
pub use tracker::CaffeineTracker;
