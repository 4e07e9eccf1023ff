//! Caffeine tracker: the state holder between callers and storage.
//!
//! Owns the decay engine and a mirror of the persisted source history.
//! Every accepted command is persisted before the in-memory state changes,
//! so a failed write leaves the tracker as it was.
//!
//! Commands return `Ok(Some(Event))` when accepted and `Ok(None)` when the
//! input was rejected or changed nothing. `Err` is reserved for storage
//! failures.
//!
//! ```ignore
//! let mut tracker = CaffeineTracker::open(&Config::load_or_default())?;
//! tracker.add_source("Coffee", 95, Utc::now())?;
//! let mg = tracker.refresh(Utc::now())?;
//! ```

use chrono::{DateTime, Utc};

use crate::decay::{self, DecayEngine, DecayModel, DecayState, HistogramBucket};
use crate::error::Result;
use crate::events::Event;
use crate::history::{default_sources, validate_amount, validate_source, CaffeineSource};
use crate::intake::{CaffeineIntake, UNNAMED_SOURCE};
use crate::storage::{Config, Database};

pub struct CaffeineTracker {
    db: Database,
    engine: DecayEngine,
    history: Vec<CaffeineSource>,
    displayed_mg: f64,
}

impl CaffeineTracker {
    /// Open the configured database and load persisted state.
    pub fn open(config: &Config) -> Result<Self> {
        let db = Database::open(config)?;
        Self::with_database(db, config, Utc::now())
    }

    /// Load persisted state from `db`, seeding the showcase history on
    /// first launch, and compute the level at `now`.
    pub fn with_database(db: Database, config: &Config, now: DateTime<Utc>) -> Result<Self> {
        if !db.has_been_launched_before() {
            if config.history.seed_on_first_launch && db.load_history().is_empty() {
                db.set_history(&default_sources())?;
                tracing::info!("seeded default caffeine sources");
            }
            db.set_launched_before()?;
        }

        let state = db.load_decay_state();
        let history = db.load_history();
        let mut tracker = Self {
            db,
            engine: DecayEngine::with_state(config.model(), state),
            history,
            displayed_mg: 0.0,
        };
        tracker.refresh(now)?;
        Ok(tracker)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn model(&self) -> &DecayModel {
        self.engine.model()
    }

    pub fn decay_state(&self) -> DecayState {
        self.engine.state()
    }

    /// Level as of the last refresh or dose.
    pub fn displayed_mg(&self) -> f64 {
        self.displayed_mg
    }

    pub fn history(&self) -> &[CaffeineSource] {
        &self.history
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Logged intakes, oldest first.
    pub fn intakes(&self, since: Option<DateTime<Utc>>) -> Vec<CaffeineIntake> {
        self.db.intakes_since(since)
    }

    /// Caffeine level at `at`, replayed from the intake log.
    pub fn level_at(&self, at: DateTime<Utc>) -> f64 {
        decay::level_at(self.model(), &self.db.intakes_since(None), at)
    }

    /// Past-24-hour histogram ending at `now`.
    pub fn histogram(&self, now: DateTime<Utc>) -> Vec<HistogramBucket> {
        decay::histogram(self.model(), &self.db.intakes_since(None), now)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Event {
        let state = self.engine.state();
        Event::StateSnapshot {
            displayed_mg: self.displayed_mg,
            initial_mg: state.initial_mg(),
            last_dose_at: state.last_dose_at(),
            history_len: self.history.len(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Recompute the displayed level. Clears persisted state once the
    /// level reaches zero.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Result<f64> {
        let mut engine = self.engine.clone();
        let was_active = engine.is_active();
        let level = engine.refresh(now);
        if was_active && !engine.is_active() {
            self.db.save_decay_state(&engine.state())?;
            tracing::info!("caffeine level decayed to zero, state cleared");
        }
        self.engine = engine;
        self.displayed_mg = level;
        Ok(level)
    }

    /// Log an unnamed dose.
    pub fn add_dose(&mut self, amount_mg: i64, now: DateTime<Utc>) -> Result<Option<Event>> {
        match validate_amount(amount_mg) {
            Ok(amount_mg) => self.log_dose(UNNAMED_SOURCE, amount_mg, now).map(Some),
            Err(reason) => {
                tracing::debug!(%reason, "dose rejected");
                Ok(None)
            }
        }
    }

    /// Record a source in the history (no-op if the name exists) and log a
    /// dose of it.
    pub fn add_source(
        &mut self,
        name: &str,
        amount_mg: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        let amount_mg = match validate_source(name, amount_mg) {
            Ok(amount_mg) => amount_mg,
            Err(reason) => {
                tracing::debug!(%reason, name, "source rejected");
                return Ok(None);
            }
        };

        let source = CaffeineSource::new(name, amount_mg);
        let (added, list) = self.db.edit_history(|store| store.add(source))?;
        self.history = list;
        if !added {
            tracing::debug!(name, "source already in history");
        }
        self.log_dose(name, amount_mg, now).map(Some)
    }

    /// Insert a source at `index` without logging a dose.
    pub fn insert_source(
        &mut self,
        index: usize,
        name: &str,
        amount_mg: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        let amount_mg = match validate_source(name, amount_mg) {
            Ok(amount_mg) => amount_mg,
            Err(reason) => {
                tracing::debug!(%reason, name, "source rejected");
                return Ok(None);
            }
        };

        let source = CaffeineSource::new(name, amount_mg);
        let (inserted, list) = self
            .db
            .edit_history(|store| store.insert(index, source.clone()))?;
        self.history = list;
        if !inserted {
            tracing::debug!(name, index, "insert rejected: duplicate name or index out of range");
            return Ok(None);
        }
        Ok(Some(Event::SourceAdded {
            source,
            index,
            at: now,
        }))
    }

    /// Remove every source whose name matches case-insensitively.
    pub fn remove_source(&mut self, name: &str, now: DateTime<Utc>) -> Result<Option<Event>> {
        let (removed, list) = self.db.edit_history(|store| store.remove(name))?;
        self.history = list;
        if removed == 0 {
            return Ok(None);
        }
        tracing::info!(name, removed, "source removed");
        Ok(Some(Event::SourceRemoved {
            name: name.to_string(),
            removed,
            at: now,
        }))
    }

    /// Rename and re-amount the source named exactly `old_name`.
    ///
    /// Returns `None` if the input is invalid, `new_name` belongs to another
    /// source, or `old_name` is unknown.
    pub fn update_source(
        &mut self,
        old_name: &str,
        new_name: &str,
        new_amount_mg: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        let new_amount_mg = match validate_source(new_name, new_amount_mg) {
            Ok(amount_mg) => amount_mg,
            Err(reason) => {
                tracing::debug!(%reason, old_name, "update rejected");
                return Ok(None);
            }
        };

        let (updated, list) = self
            .db
            .edit_history(|store| store.update(old_name, new_name, new_amount_mg))?;
        self.history = list;
        if !updated {
            tracing::debug!(old_name, new_name, "update rejected: name collision or unknown source");
            return Ok(None);
        }
        Ok(Some(Event::SourceUpdated {
            old_name: old_name.to_string(),
            source: CaffeineSource::new(new_name, new_amount_mg),
            at: now,
        }))
    }

    /// Clear the decay state. The intake log and history are kept.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Result<Event> {
        self.db.save_decay_state(&DecayState::default())?;
        self.engine.reset();
        self.displayed_mg = 0.0;
        tracing::info!("tracker reset");
        Ok(Event::TrackerReset { at: now })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn log_dose(&mut self, source_name: &str, amount_mg: u32, now: DateTime<Utc>) -> Result<Event> {
        let mut engine = self.engine.clone();
        let initial_mg = engine.add_dose(amount_mg, now);
        let intake = CaffeineIntake::new(source_name, amount_mg, now);
        self.db.record_dose(&engine.state(), &intake)?;

        self.engine = engine;
        self.displayed_mg = initial_mg;
        tracing::info!(source_name, amount_mg, initial_mg, "dose logged");
        Ok(Event::DoseLogged {
            source_name: source_name.to_string(),
            amount_mg,
            initial_mg,
            at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn tracker() -> CaffeineTracker {
        let mut config = Config::default();
        config.history.seed_on_first_launch = false;
        CaffeineTracker::with_database(Database::open_memory().unwrap(), &config, t0()).unwrap()
    }

    fn names(tracker: &CaffeineTracker) -> Vec<&str> {
        tracker.history().iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn first_launch_seeds_defaults_once() {
        let db = Database::open_memory().unwrap();
        let mut tracker = CaffeineTracker::with_database(db, &Config::default(), t0()).unwrap();
        assert_eq!(tracker.history().len(), 5);
        assert_eq!(tracker.history()[0].name, "1 Espresso Shot");
        assert!(tracker.database().has_been_launched_before());

        tracker.remove_source("Green Tea", t0()).unwrap();
        let db = tracker.db;
        let tracker = CaffeineTracker::with_database(db, &Config::default(), t0()).unwrap();
        assert_eq!(tracker.history().len(), 4);
    }

    #[test]
    fn existing_history_is_not_overwritten_by_seed() {
        let db = Database::open_memory().unwrap();
        db.set_history(&[CaffeineSource::new("Matcha", 70)]).unwrap();
        let tracker = CaffeineTracker::with_database(db, &Config::default(), t0()).unwrap();
        assert_eq!(names(&tracker), vec!["Matcha"]);
    }

    #[test]
    fn add_source_dedups_but_still_logs_dose() {
        let mut tracker = tracker();
        assert!(tracker.add_source("Coffee", 95, t0()).unwrap().is_some());
        assert!(tracker.add_source("coffee", 50, t0()).unwrap().is_some());

        assert_eq!(tracker.history(), &[CaffeineSource::new("Coffee", 95)]);
        assert_eq!(tracker.displayed_mg(), 145.0);
        assert_eq!(tracker.intakes(None).len(), 2);
    }

    #[test]
    fn invalid_input_is_rejected_without_side_effects() {
        let mut tracker = tracker();
        assert!(tracker.add_source("  ", 95, t0()).unwrap().is_none());
        assert!(tracker.add_source("Tea", 0, t0()).unwrap().is_none());
        assert!(tracker.add_dose(-5, t0()).unwrap().is_none());
        assert!(tracker.history().is_empty());
        assert!(tracker.intakes(None).is_empty());
        assert!(tracker.decay_state().is_cleared());
    }

    #[test]
    fn update_collision_fails_and_keeps_both() {
        let mut tracker = tracker();
        tracker.add_source("Coffee", 95, t0()).unwrap();
        tracker.add_source("Tea", 35, t0()).unwrap();
        assert_eq!(names(&tracker), vec!["Tea", "Coffee"]);

        assert!(tracker.update_source("Tea", "Coffee", 40, t0()).unwrap().is_none());
        assert_eq!(
            tracker.history(),
            &[CaffeineSource::new("Tea", 35), CaffeineSource::new("Coffee", 95)]
        );

        let event = tracker.update_source("Tea", "Chai", 50, t0()).unwrap();
        assert!(matches!(event, Some(Event::SourceUpdated { .. })));
        assert_eq!(tracker.database().load_history()[0], CaffeineSource::new("Chai", 50));
    }

    #[test]
    fn insert_source_validates_index() {
        let mut tracker = tracker();
        tracker.add_source("Coffee", 95, t0()).unwrap();
        assert!(tracker.insert_source(5, "Tea", 35, t0()).unwrap().is_none());
        assert!(tracker.insert_source(1, "Tea", 35, t0()).unwrap().is_some());
        assert_eq!(names(&tracker), vec!["Coffee", "Tea"]);
    }

    #[test]
    fn end_to_end_level_timeline() {
        let mut tracker = tracker();
        tracker.add_dose(100, t0()).unwrap();

        let at_five = tracker.refresh(t0() + Duration::hours(5)).unwrap();
        assert!((at_five - 50.0).abs() < 1e-9);

        let at_twenty_five = tracker.refresh(t0() + Duration::hours(25)).unwrap();
        assert!((at_twenty_five - 3.125).abs() < 1e-9);

        assert_eq!(tracker.refresh(t0() + Duration::hours(35)).unwrap(), 0.0);
        assert!(tracker.decay_state().is_cleared());
        assert!(tracker.database().load_decay_state().is_cleared());
        assert!(tracker.database().kv_get("initial_caffeine_mg").unwrap().is_none());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caffeine.db");
        let config = Config::default();

        let db = Database::open_at(&path, config.storage.clone()).unwrap();
        let mut tracker = CaffeineTracker::with_database(db, &config, t0()).unwrap();
        tracker.add_dose(200, t0()).unwrap();
        drop(tracker);

        let db = Database::open_at(&path, config.storage.clone()).unwrap();
        let tracker =
            CaffeineTracker::with_database(db, &config, t0() + Duration::hours(5)).unwrap();
        assert!((tracker.displayed_mg() - 100.0).abs() < 1e-9);
        assert_eq!(tracker.decay_state().last_dose_at(), Some(t0()));
    }

    #[test]
    fn reset_clears_state_but_keeps_log() {
        let mut tracker = tracker();
        tracker.add_source("Coffee", 95, t0()).unwrap();
        tracker.reset(t0()).unwrap();
        assert_eq!(tracker.displayed_mg(), 0.0);
        assert!(tracker.database().load_decay_state().is_cleared());
        assert_eq!(tracker.intakes(None).len(), 1);
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn histogram_reflects_logged_intakes() {
        let mut tracker = tracker();
        tracker.add_dose(100, t0()).unwrap();
        let buckets = tracker.histogram(t0() + Duration::hours(1));
        assert_eq!(buckets.len(), 12);
        assert!(buckets.last().unwrap().level_mg > 80.0);
        assert_eq!(buckets[0].level_mg, 0.0);
        assert!((tracker.level_at(t0()) - 100.0).abs() < 1e-9);
    }
}
