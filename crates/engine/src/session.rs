//! Wiring of the engine components behind the inbound operations.

use crate::config::EngineConfig;
use crate::lifecycle::AbandonmentMonitor;
use crate::orchestrator::HuntOrchestrator;
use crate::stats::{HttpStatsTransport, LogStatsTransport, StatsReporter, StatsTransport};
use crate::timer::TimerEngine;
use crate::validation::ValidationError;
use std::sync::Arc;
use tracing::{info, warn};
use yapp_core::{Clock, Hunt, HuntId, HuntProgress, SkipReason, User};
use yapp_progress::{ProgressStore, UserDirectory, UserError};
use yapp_storage::KeyValueStore;

/// One engine instance: orchestrator, lifecycle monitor and user directory
/// over a single key-value store.
///
/// Hosts that drive the session from several tasks wrap it in
/// `Arc<tokio::sync::Mutex<_>>`.
pub struct HuntSession {
    orchestrator: HuntOrchestrator,
    monitor: AbandonmentMonitor,
    users: Arc<UserDirectory>,
    clock: Arc<dyn Clock>,
    abandoned_on_open: Option<HuntId>,
}

impl HuntSession {
    /// Open a session, picking the stats transport from the config.
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        let transport: Arc<dyn StatsTransport> = match &config.stats_endpoint {
            Some(endpoint) => Arc::new(HttpStatsTransport::new(endpoint.clone())),
            None => Arc::new(LogStatsTransport),
        };
        Self::with_transport(store, clock, config, transport).await
    }

    /// Open a session with an explicit stats transport.
    ///
    /// Loads the current user and their progress, recovers a mirrored timer
    /// and, unless disabled in the config, runs the cold-start abandonment check.
    pub async fn with_transport(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
        transport: Arc<dyn StatsTransport>,
    ) -> Self {
        let users = Arc::new(UserDirectory::load(store.clone()).await);
        let progress = ProgressStore::open(store.clone(), users.clone()).await;

        let mut timer = TimerEngine::new(clock.clone()).with_tick_interval(config.tick_interval);
        if config.mirror_timer {
            timer = timer.with_mirror(store.clone());
        }
        if let Some(anchor) = timer.recover().await {
            info!(hunt_id = ?anchor.hunt_id, "recovered running timer");
        }

        let stats = StatsReporter::new(users.clone(), transport, clock.clone());
        let orchestrator =
            HuntOrchestrator::new(progress, timer, stats, users.clone(), clock.clone());
        let monitor = AbandonmentMonitor::new(store, clock.clone(), config.abandonment_threshold);

        let mut session = Self {
            orchestrator,
            monitor,
            users,
            clock,
            abandoned_on_open: None,
        };
        if config.cold_start_check {
            session.abandoned_on_open = session.handle_cold_start().await;
        } else {
            session.orchestrator.resume_active_timer().await;
        }
        session
    }

    /// Hunt the cold-start check skipped as abandoned when the session opened.
    pub fn abandoned_on_open(&self) -> Option<HuntId> {
        self.abandoned_on_open
    }

    /// The orchestrator.
    pub fn orchestrator(&self) -> &HuntOrchestrator {
        &self.orchestrator
    }

    /// The orchestrator, for callers that need direct access.
    pub fn orchestrator_mut(&mut self) -> &mut HuntOrchestrator {
        &mut self.orchestrator
    }

    /// The user directory.
    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    /// The committed aggregate.
    pub fn progress(&self) -> &HuntProgress {
        self.orchestrator.progress()
    }

    /// Start a hunt.
    pub async fn start_hunt(&mut self, id: HuntId) -> Result<Hunt, ValidationError> {
        self.orchestrator.start_hunt(id).await
    }

    /// Complete the running hunt.
    pub async fn complete_hunt(
        &mut self,
        id: HuntId,
        duration: Option<u64>,
    ) -> Result<Hunt, ValidationError> {
        self.orchestrator.complete_hunt(id, duration).await
    }

    /// Skip a hunt.
    pub async fn skip_hunt(
        &mut self,
        id: HuntId,
        reason: SkipReason,
    ) -> Result<Hunt, ValidationError> {
        self.orchestrator.skip_hunt(id, reason).await
    }

    /// Record that the running hunt's task condition was met.
    pub async fn report_task_condition_met(
        &mut self,
        id: HuntId,
        elapsed: u64,
    ) -> Result<bool, ValidationError> {
        self.orchestrator.report_task_condition_met(id, elapsed).await
    }

    /// Discard all progress.
    pub async fn reset_progress(&mut self) {
        self.orchestrator.reset_progress().await;
    }

    /// Discard all progress and end the user's session.
    pub async fn reset_user_progress(&mut self) -> Result<(), UserError> {
        self.orchestrator.reset_user_progress().await?;
        self.orchestrator.reload_progress().await;
        Ok(())
    }

    /// The app moved to the background.
    pub async fn handle_app_background(&mut self) {
        self.monitor.on_app_background(&self.orchestrator).await;
    }

    /// The app returned after `time_away_ms`. Returns the abandoned hunt, if any.
    pub async fn handle_app_foreground(&mut self, time_away_ms: u64) -> Option<HuntId> {
        self.monitor.on_app_foreground(&mut self.orchestrator, time_away_ms).await
    }

    /// The app is closing. Returns the skipped hunt, if any.
    pub async fn handle_app_close(&mut self) -> Option<HuntId> {
        self.monitor.on_app_close(&mut self.orchestrator).await
    }

    /// Run the abandonment check against the persisted background time.
    pub async fn handle_cold_start(&mut self) -> Option<HuntId> {
        let skipped = self.monitor.on_cold_start_check(&mut self.orchestrator).await;
        if let Some(id) = skipped {
            warn!(hunt_id = %id, "hunt abandoned while the app was not running");
        }
        skipped
    }

    /// Log in as `name` and load that user's progress.
    pub async fn switch_user(&mut self, name: &str) -> Result<User, UserError> {
        let user = self.users.register(name, self.clock.now()).await?;
        self.orchestrator.reload_progress().await;
        info!(user = %user.name, key = %self.orchestrator.storage_key(), "switched user");
        Ok(user)
    }

    /// End the session and fall back to the shared progress key.
    pub async fn logout(&mut self) -> Result<(), UserError> {
        self.users.logout().await?;
        self.orchestrator.reload_progress().await;
        Ok(())
    }

    /// Freeze the running timer. Returns the elapsed seconds.
    pub async fn pause_timer(&mut self) -> u64 {
        self.orchestrator.timer_mut().pause_timer().await
    }

    /// Continue a paused timer.
    pub async fn resume_timer(&mut self) {
        self.orchestrator.timer_mut().resume_timer().await;
    }

    /// Wait for an in-flight stats submission before shutting down.
    pub async fn shutdown(&mut self) {
        self.orchestrator.wait_for_submission().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use std::time::Duration;
    use yapp_core::HuntStatus;
    use yapp_progress::UserProvider;
    use yapp_storage::keys;

    fn id(n: u32) -> HuntId {
        HuntId::new(n)
    }

    async fn open(fixture: &Fixture) -> HuntSession {
        HuntSession::with_transport(
            Arc::new(fixture.store.clone()),
            Arc::new(fixture.clock.clone()),
            &EngineConfig::default().with_abandonment_threshold(Duration::from_secs(3)),
            fixture.transport.clone(),
        )
        .await
    }

    #[tokio::test]
    async fn test_open_recovers_running_hunt() {
        let fixture = Fixture::new().await;
        {
            let mut session = open(&fixture).await;
            session.start_hunt(id(1)).await.unwrap();
            assert!(fixture.store.contains(keys::TIMER_STATE).await);
        }

        fixture.clock.advance_secs(90);
        let session = open(&fixture).await;
        let timer = session.orchestrator().timer();
        assert!(timer.is_running());
        assert_eq!(timer.hunt_id(), Some(id(1)));
        assert_eq!(timer.elapsed_seconds(), 90);
    }

    #[tokio::test]
    async fn test_open_skips_hunt_abandoned_while_closed() {
        let fixture = Fixture::new().await;
        {
            let mut session = open(&fixture).await;
            session.start_hunt(id(1)).await.unwrap();
            session.handle_app_background().await;
        }

        fixture.clock.advance_secs(4);
        let session = open(&fixture).await;
        assert_eq!(session.abandoned_on_open(), Some(id(1)));
        assert_eq!(session.orchestrator().hunt_status(id(1)), Some(HuntStatus::Skipped));
        assert!(!session.orchestrator().timer().is_running());
        assert!(!fixture.store.contains(keys::TIMER_STATE).await);
    }

    #[tokio::test]
    async fn test_open_without_cold_start_defers_to_foreground() {
        let fixture = Fixture::new().await;
        {
            let mut session = open(&fixture).await;
            session.start_hunt(id(1)).await.unwrap();
            session.handle_app_background().await;
        }

        fixture.clock.advance_secs(60);
        let config = EngineConfig::default()
            .with_abandonment_threshold(Duration::from_secs(3))
            .with_cold_start_check(false);
        let mut session = HuntSession::with_transport(
            Arc::new(fixture.store.clone()),
            Arc::new(fixture.clock.clone()),
            &config,
            fixture.transport.clone(),
        )
        .await;

        assert_eq!(session.abandoned_on_open(), None);
        assert_eq!(session.progress().current_active_hunt, Some(id(1)));
        assert!(session.orchestrator().timer().is_running());

        assert_eq!(session.handle_app_foreground(1_000).await, None);
        assert_eq!(session.progress().current_active_hunt, Some(id(1)));
        assert!(!fixture.store.contains(keys::APP_BACKGROUND_TIME).await);
    }

    #[tokio::test]
    async fn test_foreground_and_close_route_to_monitor() {
        let fixture = Fixture::new().await;
        let mut session = open(&fixture).await;

        session.start_hunt(id(1)).await.unwrap();
        session.handle_app_background().await;
        assert_eq!(session.handle_app_foreground(3_000).await, None);
        assert_eq!(session.handle_app_foreground(3_001).await, Some(id(1)));

        session.start_hunt(id(2)).await.unwrap();
        assert_eq!(session.handle_app_close().await, Some(id(2)));
        assert_eq!(session.progress().current_active_hunt, None);
    }

    #[tokio::test]
    async fn test_switch_user_isolates_progress() {
        let fixture = Fixture::new().await;
        let mut session = open(&fixture).await;
        session.start_hunt(id(1)).await.unwrap();
        assert_eq!(session.orchestrator().storage_key(), "ada_lovelace_hunt_progress");

        session.switch_user("Grace Hopper").await.unwrap();
        assert_eq!(session.orchestrator().storage_key(), "grace_hopper_hunt_progress");
        assert_eq!(session.progress().current_active_hunt, None);
        assert!(!session.orchestrator().timer().is_running());

        session.switch_user("Ada Lovelace").await.unwrap();
        assert_eq!(session.progress().current_active_hunt, Some(id(1)));
        assert!(session.orchestrator().timer().is_running());
    }

    #[tokio::test]
    async fn test_logout_falls_back_to_shared_key() {
        let fixture = Fixture::new().await;
        let mut session = open(&fixture).await;

        session.logout().await.unwrap();
        assert_eq!(session.orchestrator().storage_key(), "hunt_progress");
        assert!(session.users().current_user_name().await.is_none());
    }

    #[tokio::test]
    async fn test_pause_and_resume_preserve_elapsed() {
        let fixture = Fixture::new().await;
        let mut session = open(&fixture).await;
        session.start_hunt(id(1)).await.unwrap();

        fixture.clock.advance_secs(20);
        assert_eq!(session.pause_timer().await, 20);
        fixture.clock.advance_secs(100);
        session.resume_timer().await;
        fixture.clock.advance_secs(5);

        assert_eq!(session.orchestrator().timer().elapsed_seconds(), 25);
    }

    #[tokio::test]
    async fn test_full_run_submits_once() {
        let fixture = Fixture::new().await;
        let mut session = open(&fixture).await;

        for n in 1..=4 {
            session.start_hunt(id(n)).await.unwrap();
            fixture.clock.advance_secs(60);
            session.complete_hunt(id(n), None).await.unwrap();
        }
        session.shutdown().await;

        let sent = fixture.transport.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user_name, "Ada Lovelace");
        assert_eq!(sent[0].total_duration_formatted, "00:04:00");
        assert_eq!(sent[0].num_late_completions, 0);
    }

    #[tokio::test]
    async fn test_reset_user_progress_logs_out() {
        let fixture = Fixture::new().await;
        let mut session = open(&fixture).await;
        session.start_hunt(id(1)).await.unwrap();

        session.reset_user_progress().await.unwrap();
        assert!(session.users().current().await.is_none());
        assert_eq!(session.orchestrator().storage_key(), "hunt_progress");
        assert!(!session.orchestrator().timer().is_running());
    }
}
