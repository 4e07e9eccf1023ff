//! Periodic recomputation of the displayed caffeine level.
//!
//! [`DecayMonitor`] is a cancellable tokio task that refreshes the tracker
//! on a fixed interval and publishes the level on a watch channel. It stops
//! on its own once the level has decayed to zero; the next dose restarts it.
//!
//! [`LiveTracker`] wraps a [`CaffeineTracker`] for async callers: it owns the
//! monitor, restarts it whenever a dose changes the decay parameters, and
//! exposes watch receivers for the displayed level and the history list.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::Result;
use crate::events::Event;
use crate::history::CaffeineSource;
use crate::tracker::CaffeineTracker;

/// Source of "now" for the monitor.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Handle to a running refresh loop. Dropping it cancels the loop.
pub struct DecayMonitor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    _guard: DropGuard,
}

impl DecayMonitor {
    /// Spawn the refresh loop on the current tokio runtime.
    pub fn spawn(
        tracker: Arc<Mutex<CaffeineTracker>>,
        level_tx: watch::Sender<f64>,
        period: Duration,
        clock: Clock,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(decay_loop(tracker, level_tx, period, clock, cancel.clone()));
        Self {
            _guard: cancel.clone().drop_guard(),
            cancel,
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the loop to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "decay monitor task failed");
        }
    }
}

async fn decay_loop(
    tracker: Arc<Mutex<CaffeineTracker>>,
    level_tx: watch::Sender<f64>,
    period: Duration,
    clock: Clock,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let refreshed = {
                    let mut tracker = tracker.lock().await;
                    tracker
                        .refresh(clock())
                        .map(|level| (level, tracker.decay_state().is_cleared()))
                };
                match refreshed {
                    Ok((level, cleared)) => {
                        level_tx.send_replace(level);
                        if cleared {
                            tracing::debug!("caffeine level at zero, decay monitor idle");
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "decay refresh failed"),
                }
            }
            _ = cancel.cancelled() => {
                tracing::debug!("decay monitor shutting down");
                break;
            }
        }
    }
}

/// Async front end over [`CaffeineTracker`] with live level updates.
pub struct LiveTracker {
    tracker: Arc<Mutex<CaffeineTracker>>,
    level_tx: watch::Sender<f64>,
    history_tx: watch::Sender<Vec<CaffeineSource>>,
    monitor: Option<DecayMonitor>,
    period: Duration,
    clock: Clock,
}

impl LiveTracker {
    pub fn new(tracker: CaffeineTracker, period: Duration) -> Self {
        Self::with_clock(tracker, period, system_clock())
    }

    pub fn with_clock(tracker: CaffeineTracker, period: Duration, clock: Clock) -> Self {
        let (level_tx, _) = watch::channel(tracker.displayed_mg());
        let (history_tx, _) = watch::channel(tracker.history().to_vec());
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            level_tx,
            history_tx,
            monitor: None,
            period,
            clock,
        }
    }

    pub fn subscribe_level(&self) -> watch::Receiver<f64> {
        self.level_tx.subscribe()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<Vec<CaffeineSource>> {
        self.history_tx.subscribe()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().is_some_and(DecayMonitor::is_running)
    }

    /// Start (or restart) the monitor. Must run inside a tokio runtime.
    pub fn start(&mut self) {
        if let Some(old) = self.monitor.take() {
            old.cancel();
        }
        self.monitor = Some(DecayMonitor::spawn(
            Arc::clone(&self.tracker),
            self.level_tx.clone(),
            self.period,
            Arc::clone(&self.clock),
        ));
    }

    /// Stop the monitor and wait for it to exit.
    pub async fn shutdown(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop().await;
        }
    }

    pub async fn displayed_mg(&self) -> f64 {
        self.tracker.lock().await.displayed_mg()
    }

    /// Run `f` against the wrapped tracker.
    pub async fn with_tracker<R>(&self, f: impl FnOnce(&CaffeineTracker) -> R) -> R {
        f(&*self.tracker.lock().await)
    }

    pub async fn add_dose(&mut self, amount_mg: i64) -> Result<Option<Event>> {
        let now = (self.clock)();
        let event = self.tracker.lock().await.add_dose(amount_mg, now)?;
        self.after_dose(&event).await;
        Ok(event)
    }

    pub async fn add_source(&mut self, name: &str, amount_mg: i64) -> Result<Option<Event>> {
        let now = (self.clock)();
        let event = self.tracker.lock().await.add_source(name, amount_mg, now)?;
        self.publish_history().await;
        self.after_dose(&event).await;
        Ok(event)
    }

    pub async fn insert_source(
        &mut self,
        index: usize,
        name: &str,
        amount_mg: i64,
    ) -> Result<Option<Event>> {
        let now = (self.clock)();
        let event = self
            .tracker
            .lock()
            .await
            .insert_source(index, name, amount_mg, now)?;
        self.publish_history().await;
        Ok(event)
    }

    pub async fn remove_source(&mut self, name: &str) -> Result<Option<Event>> {
        let now = (self.clock)();
        let event = self.tracker.lock().await.remove_source(name, now)?;
        self.publish_history().await;
        Ok(event)
    }

    pub async fn update_source(
        &mut self,
        old_name: &str,
        new_name: &str,
        new_amount_mg: i64,
    ) -> Result<Option<Event>> {
        let now = (self.clock)();
        let event = self
            .tracker
            .lock()
            .await
            .update_source(old_name, new_name, new_amount_mg, now)?;
        self.publish_history().await;
        Ok(event)
    }

    pub async fn reset(&mut self) -> Result<Event> {
        self.shutdown().await;
        let now = (self.clock)();
        let event = self.tracker.lock().await.reset(now)?;
        self.level_tx.send_replace(0.0);
        Ok(event)
    }

    async fn after_dose(&mut self, event: &Option<Event>) {
        if event.is_some() {
            let level = self.displayed_mg().await;
            self.level_tx.send_replace(level);
            self.start();
        }
    }

    async fn publish_history(&self) {
        let history = self.tracker.lock().await.history().to_vec();
        self.history_tx.send_replace(history);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Config, Database};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct TestClock {
        now_ms: Arc<AtomicI64>,
    }

    impl TestClock {
        fn new() -> Self {
            let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
            Self {
                now_ms: Arc::new(AtomicI64::new(start.timestamp_millis())),
            }
        }

        fn advance(&self, by: chrono::Duration) {
            self.now_ms.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }

        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_millis_opt(self.now_ms.load(Ordering::SeqCst)).unwrap()
        }

        fn clock(&self) -> Clock {
            let now_ms = Arc::clone(&self.now_ms);
            Arc::new(move || Utc.timestamp_millis_opt(now_ms.load(Ordering::SeqCst)).unwrap())
        }
    }

    fn live(clock: &TestClock) -> LiveTracker {
        let mut config = Config::default();
        config.history.seed_on_first_launch = false;
        let tracker =
            CaffeineTracker::with_database(Database::open_memory().unwrap(), &config, clock.now())
                .unwrap();
        LiveTracker::with_clock(tracker, Duration::from_secs(2), clock.clock())
    }

    async fn wait_for_tick() {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn dose_starts_monitor_and_level_decays() {
        let clock = TestClock::new();
        let mut live = live(&clock);
        let level = live.subscribe_level();
        assert!(!live.is_monitoring());

        live.add_dose(100).await.unwrap();
        assert_eq!(*level.borrow(), 100.0);
        assert!(live.is_monitoring());

        clock.advance(chrono::Duration::hours(5));
        wait_for_tick().await;
        assert!((*level.borrow() - 50.0).abs() < 1e-9);

        clock.advance(chrono::Duration::hours(30));
        wait_for_tick().await;
        assert_eq!(*level.borrow(), 0.0);
        assert!(!live.is_monitoring());
        assert!(live.with_tracker(|t| t.decay_state().is_cleared()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn redose_restarts_stopped_monitor() {
        let clock = TestClock::new();
        let mut live = live(&clock);
        live.add_dose(10).await.unwrap();
        clock.advance(chrono::Duration::hours(24));
        wait_for_tick().await;
        assert!(!live.is_monitoring());

        live.add_source("Coffee", 95).await.unwrap();
        assert!(live.is_monitoring());
        assert_eq!(live.displayed_mg().await, 95.0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_dose_does_not_start_monitor() {
        let clock = TestClock::new();
        let mut live = live(&clock);
        assert!(live.add_dose(0).await.unwrap().is_none());
        assert!(!live.is_monitoring());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_monitor() {
        let clock = TestClock::new();
        let mut live = live(&clock);
        live.add_dose(100).await.unwrap();
        live.shutdown().await;
        assert!(!live.is_monitoring());

        clock.advance(chrono::Duration::hours(5));
        wait_for_tick().await;
        assert_eq!(*live.subscribe_level().borrow(), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn history_changes_are_published() {
        let clock = TestClock::new();
        let mut live = live(&clock);
        let history = live.subscribe_history();

        live.add_source("Tea", 35).await.unwrap();
        live.insert_source(1, "Coffee", 95).await.unwrap();
        assert_eq!(history.borrow().len(), 2);

        assert!(live.update_source("Tea", "coffee", 40).await.unwrap().is_none());
        live.remove_source("TEA").await.unwrap();
        assert_eq!(*history.borrow(), vec![CaffeineSource::new("Coffee", 95)]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_stops_monitor_and_zeroes_level() {
        let clock = TestClock::new();
        let mut live = live(&clock);
        live.add_dose(100).await.unwrap();
        live.reset().await.unwrap();
        assert!(!live.is_monitoring());
        assert_eq!(*live.subscribe_level().borrow(), 0.0);
    }
}
