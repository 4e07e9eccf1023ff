//! Caffeine decay engine.
//!
//! Single-exponential elimination with additive re-dosing. Instead of
//! keeping every dose, the engine folds each new dose into one equivalent
//! initial amount anchored at the time of the latest dose:
//!
//! ```text
//! level(now)   = initial_mg * 0.5 ^ ((now - last_dose) / half_life)
//! add_dose(a)  : initial_mg = level(now) + a, last_dose = now
//! ```
//!
//! The engine has no internal thread.
//! The caller passes `now` and is responsible for calling
//! [`DecayEngine::refresh`] periodically (see [`crate::monitor`]).

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Average caffeine half-life in adults.
pub const DEFAULT_HALF_LIFE_HOURS: f64 = 5.0;

/// Levels below this many milligrams read as zero.
pub const DEFAULT_FLOOR_MG: f64 = 1.0;

/// Decay parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayModel {
    pub half_life_hours: f64,
    pub floor_mg: f64,
}

impl Default for DecayModel {
    fn default() -> Self {
        Self {
            half_life_hours: DEFAULT_HALF_LIFE_HOURS,
            floor_mg: DEFAULT_FLOOR_MG,
        }
    }
}

impl DecayModel {
    pub fn new(half_life_hours: f64, floor_mg: f64) -> Self {
        Self {
            half_life_hours,
            floor_mg,
        }
    }

    /// Half-life in milliseconds. A zero, negative or non-finite half-life
    /// falls back to the default.
    fn half_life_ms(&self) -> f64 {
        let hours = if self.half_life_hours.is_finite() && self.half_life_hours > 0.0 {
            self.half_life_hours
        } else {
            DEFAULT_HALF_LIFE_HOURS
        };
        hours * 60.0 * 60.0 * 1000.0
    }

    /// Raw exponential decay of `amount_mg` over `elapsed`.
    ///
    /// Negative elapsed time (dose timestamp in the future after a clock
    /// change) is clamped to zero.
    pub fn decay(&self, amount_mg: f64, elapsed: Duration) -> f64 {
        let elapsed_ms = elapsed.num_milliseconds().max(0) as f64;
        amount_mg * 0.5_f64.powf(elapsed_ms / self.half_life_ms())
    }

    /// Snap sub-floor levels to exactly zero.
    pub fn apply_floor(&self, level_mg: f64) -> f64 {
        if level_mg < self.floor_mg {
            0.0
        } else {
            level_mg
        }
    }

    /// `initial_mg` decayed from `last_dose_at` to `now`, floor applied.
    pub fn current_level(
        &self,
        initial_mg: f64,
        last_dose_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> f64 {
        self.apply_floor(self.decay(initial_mg, now - last_dose_at))
    }
}

/// Collapsed decay state: one equivalent dose plus its reference time.
///
/// `initial_mg` is zero exactly when `last_dose_at` is `None`. The only
/// ways to build one keep that pairing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DecayState {
    initial_mg: f64,
    last_dose_at: Option<DateTime<Utc>>,
}

impl DecayState {
    /// Build from the persisted pair. Anything not strictly positive on
    /// both sides collapses to the cleared state.
    pub fn from_parts(initial_mg: f64, last_dose_epoch_ms: i64) -> Self {
        if initial_mg.is_nan() || initial_mg <= 0.0 || last_dose_epoch_ms <= 0 {
            return Self::default();
        }
        match Utc.timestamp_millis_opt(last_dose_epoch_ms).single() {
            Some(at) => Self {
                initial_mg,
                last_dose_at: Some(at),
            },
            None => Self::default(),
        }
    }

    /// Persisted pair; `(0.0, 0)` when cleared.
    pub fn to_parts(&self) -> (f64, i64) {
        match self.last_dose_at {
            Some(at) => (self.initial_mg, at.timestamp_millis()),
            None => (0.0, 0),
        }
    }

    pub fn initial_mg(&self) -> f64 {
        self.initial_mg
    }

    pub fn last_dose_at(&self) -> Option<DateTime<Utc>> {
        self.last_dose_at
    }

    pub fn is_cleared(&self) -> bool {
        self.last_dose_at.is_none()
    }

    fn set(&mut self, initial_mg: f64, at: DateTime<Utc>) {
        self.initial_mg = initial_mg;
        self.last_dose_at = Some(at);
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Decay engine holding the collapsed state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecayEngine {
    model: DecayModel,
    state: DecayState,
}

impl DecayEngine {
    pub fn new(model: DecayModel) -> Self {
        Self {
            model,
            state: DecayState::default(),
        }
    }

    pub fn with_state(model: DecayModel, state: DecayState) -> Self {
        Self { model, state }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn model(&self) -> &DecayModel {
        &self.model
    }

    pub fn state(&self) -> DecayState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_cleared()
    }

    /// Level at `now` without touching the state.
    pub fn level(&self, now: DateTime<Utc>) -> f64 {
        match self.state.last_dose_at {
            Some(at) => self.model.current_level(self.state.initial_mg, at, now),
            None => 0.0,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Recompute the level at `now`. Clears the state once it reaches zero.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> f64 {
        let level = self.level(now);
        if level == 0.0 && self.is_active() {
            self.state.clear();
        }
        level
    }

    /// Fold a dose into the state. Returns the new equivalent initial amount.
    ///
    /// A zero amount changes nothing and returns the current level.
    pub fn add_dose(&mut self, amount_mg: u32, now: DateTime<Utc>) -> f64 {
        if amount_mg == 0 {
            return self.level(now);
        }
        let remainder = self.level(now);
        let new_initial = remainder + f64::from(amount_mg);
        self.state.set(new_initial, now);
        new_initial
    }

    pub fn reset(&mut self) {
        self.state.clear();
    }
}
