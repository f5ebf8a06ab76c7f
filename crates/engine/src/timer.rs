//! Anchor-based elapsed-time ticker.
//!
//! Elapsed time is always recomputed as `floor((now - anchor) / 1s)`; ticks
//! only publish it. A frozen or starved process therefore shows the correct
//! value on its very next tick, however many ticks were missed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use yapp_core::{Clock, HuntId, Time, TimerAnchor};
use yapp_storage::{keys, load_json, save_json, KeyValueStore};

/// Elapsed-time ticker for the active hunt.
pub struct TimerEngine {
    clock: Arc<dyn Clock>,
    mirror: Option<Arc<dyn KeyValueStore>>,
    tick: Duration,
    anchor: Option<TimerAnchor>,
    paused: Option<(u64, Option<HuntId>)>,
    tx: Arc<watch::Sender<u64>>,
    ticker: Option<JoinHandle<()>>,
}

impl TimerEngine {
    /// Create a stopped timer ticking once per second.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            clock,
            mirror: None,
            tick: Duration::from_secs(1),
            anchor: None,
            paused: None,
            tx: Arc::new(tx),
            ticker: None,
        }
    }

    /// Mirror the running anchor into `store` for kill recovery.
    pub fn with_mirror(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.mirror = Some(store);
        self
    }

    /// Set the ticker period.
    pub fn with_tick_interval(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Start ticking from `anchor`, replacing any running timer.
    pub async fn start_timer(&mut self, anchor: Time, hunt_id: Option<HuntId>) {
        // Subscribers go straight from the old value to the new one
        self.abort_ticker();
        self.paused = None;

        let anchor = TimerAnchor::running(anchor, hunt_id);
        self.tx.send_replace(anchor.elapsed_at(self.clock.now()));
        self.ticker = Some(self.spawn_ticker(anchor.clone()));
        self.write_mirror(&anchor).await;
        debug!(hunt_id = ?hunt_id, anchor = %anchor.anchor_start_time, "timer started");
        self.anchor = Some(anchor);
    }

    /// Stop ticking and publish `0`. Safe to call when already stopped.
    pub async fn stop_timer(&mut self) {
        let was_running = self.anchor.is_some();
        self.halt();
        self.paused = None;
        if was_running {
            self.clear_mirror().await;
            debug!("timer stopped");
        }
    }

    /// Stop ticking and return the elapsed seconds at this instant.
    pub async fn pause_timer(&mut self) -> u64 {
        let elapsed = self.elapsed_seconds();
        let hunt_id = self.anchor.as_ref().and_then(|a| a.hunt_id);
        let was_running = self.anchor.is_some();
        self.halt();
        if was_running {
            self.paused = Some((elapsed, hunt_id));
            self.clear_mirror().await;
            debug!(elapsed, "timer paused");
        }
        elapsed
    }

    /// Continue a paused timer from a synthetic anchor `now - elapsed`.
    /// Does nothing unless the timer is paused.
    pub async fn resume_timer(&mut self) {
        if let Some((elapsed, hunt_id)) = self.paused.take() {
            let anchor = TimerAnchor::rebased(self.clock.now(), elapsed, hunt_id);
            self.start_timer(anchor.anchor_start_time, hunt_id).await;
        }
    }

    /// Restart the ticker from a mirrored anchor left by a previous process.
    pub async fn recover(&mut self) -> Option<TimerAnchor> {
        let store = self.mirror.clone()?;
        let anchor = match load_json::<TimerAnchor>(store.as_ref(), keys::TIMER_STATE).await {
            Ok(Some(anchor)) if anchor.running => anchor,
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "discarding unreadable timer mirror");
                return None;
            }
        };
        self.start_timer(anchor.anchor_start_time, anchor.hunt_id).await;
        Some(anchor)
    }

    /// Whole seconds since the anchor; `0` when not running.
    pub fn elapsed_seconds(&self) -> u64 {
        self.anchor
            .as_ref()
            .map(|a| a.elapsed_at(self.clock.now()))
            .unwrap_or(0)
    }

    /// Elapsed value captured by the last pause.
    pub fn paused_elapsed(&self) -> Option<u64> {
        self.paused.map(|(elapsed, _)| elapsed)
    }

    /// Whether the ticker is running.
    pub fn is_running(&self) -> bool {
        self.anchor.is_some()
    }

    /// Hunt being timed.
    pub fn hunt_id(&self) -> Option<HuntId> {
        self.anchor.as_ref().and_then(|a| a.hunt_id)
    }

    /// Current anchor.
    pub fn anchor(&self) -> Option<&TimerAnchor> {
        self.anchor.as_ref()
    }

    /// Receive the elapsed value on every tick.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    fn spawn_ticker(&self, anchor: TimerAnchor) -> JoinHandle<()> {
        let clock = self.clock.clone();
        let tx = self.tx.clone();
        let period = self.tick;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tx.send_replace(anchor.elapsed_at(clock.now()));
            }
        })
    }

    fn halt(&mut self) {
        self.abort_ticker();
        self.tx.send_replace(0);
    }

    fn abort_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.anchor = None;
    }

    async fn write_mirror(&self, anchor: &TimerAnchor) {
        if let Some(store) = &self.mirror {
            if let Err(e) = save_json(store.as_ref(), keys::TIMER_STATE, anchor).await {
                warn!(error = %e, "failed to mirror timer state");
            }
        }
    }

    async fn clear_mirror(&self) {
        if let Some(store) = &self.mirror {
            if let Err(e) = store.remove(keys::TIMER_STATE).await {
                warn!(error = %e, "failed to clear timer mirror");
            }
        }
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use yapp_core::ManualClock;
    use yapp_storage::MemoryStore;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_elapsed_survives_a_gap() {
        let clock = clock();
        let mut timer = TimerEngine::new(Arc::new(clock.clone()));
        timer.start_timer(clock.now(), Some(HuntId::new(1))).await;

        // No ticks observed while "suspended"
        clock.advance_secs(3_600);
        assert_eq!(timer.elapsed_seconds(), 3_600);
        assert_eq!(timer.hunt_id(), Some(HuntId::new(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_restart_never_publishes_zero() {
        let clock = clock();
        let mut timer = TimerEngine::new(Arc::new(clock.clone()));
        timer.start_timer(clock.now() - chrono::Duration::seconds(10), None).await;

        let mut rx = timer.subscribe();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let collector = {
            let seen = seen.clone();
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let value = *rx.borrow_and_update();
                    seen.lock().unwrap().push(value);
                }
            })
        };

        for secs in [20, 30, 40] {
            let anchor = clock.now() - chrono::Duration::seconds(secs);
            timer.start_timer(anchor, Some(HuntId::new(1))).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        collector.abort();

        assert_eq!(timer.elapsed_seconds(), 40);
        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(!seen.contains(&0), "restart published zero: {:?}", *seen);
    }

    #[tokio::test]
    async fn test_stop_publishes_zero() {
        let clock = clock();
        let mut timer = TimerEngine::new(Arc::new(clock.clone()));
        let rx = timer.subscribe();

        timer.start_timer(clock.now() - chrono::Duration::seconds(12), None).await;
        assert_eq!(*rx.borrow(), 12);

        timer.stop_timer().await;
        assert!(!timer.is_running());
        assert_eq!(*rx.borrow(), 0);
        assert_eq!(timer.elapsed_seconds(), 0);

        // Idempotent
        timer.stop_timer().await;
    }

    #[tokio::test]
    async fn test_pause_and_resume_preserve_elapsed() {
        let clock = clock();
        let mut timer = TimerEngine::new(Arc::new(clock.clone()));
        timer.start_timer(clock.now(), Some(HuntId::new(2))).await;

        clock.advance_secs(40);
        assert_eq!(timer.pause_timer().await, 40);
        assert!(!timer.is_running());
        assert_eq!(timer.paused_elapsed(), Some(40));

        // Paused time does not count
        clock.advance_secs(500);
        timer.resume_timer().await;
        assert_eq!(timer.elapsed_seconds(), 40);
        assert_eq!(timer.hunt_id(), Some(HuntId::new(2)));

        clock.advance_secs(5);
        assert_eq!(timer.elapsed_seconds(), 45);
    }

    #[tokio::test]
    async fn test_resume_without_pause_is_noop() {
        let clock = clock();
        let mut timer = TimerEngine::new(Arc::new(clock.clone()));
        timer.resume_timer().await;
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_publishes_recomputed_value() {
        let clock = clock();
        let mut timer = TimerEngine::new(Arc::new(clock.clone()));
        let mut rx = timer.subscribe();
        timer.start_timer(clock.now(), None).await;

        clock.advance_secs(42);
        let seen = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if rx.changed().await.is_err() {
                    return false;
                }
                if *rx.borrow_and_update() == 42 {
                    return true;
                }
            }
        })
        .await;
        assert!(matches!(seen, Ok(true)));
    }

    #[tokio::test]
    async fn test_mirror_written_and_recovered() {
        let clock = clock();
        let store = MemoryStore::new();
        let anchor_time = clock.now();
        {
            let mut timer =
                TimerEngine::new(Arc::new(clock.clone())).with_mirror(Arc::new(store.clone()));
            timer.start_timer(anchor_time, Some(HuntId::new(3))).await;
            assert!(store.contains(keys::TIMER_STATE).await);
        }

        clock.advance_secs(90);
        let mut relaunched =
            TimerEngine::new(Arc::new(clock.clone())).with_mirror(Arc::new(store.clone()));
        let recovered = relaunched.recover().await.unwrap();
        assert_eq!(recovered.anchor_start_time, anchor_time);
        assert_eq!(relaunched.elapsed_seconds(), 90);

        relaunched.stop_timer().await;
        assert!(!store.contains(keys::TIMER_STATE).await);
    }
}
