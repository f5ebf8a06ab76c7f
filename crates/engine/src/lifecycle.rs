//! App lifecycle handling: background, foreground, cold start and close.
//!
//! A hunt left in the background longer than the threshold is skipped as
//! abandoned. The monitor is handed the orchestrator on every call and holds
//! no reference to it.

use crate::orchestrator::HuntOrchestrator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use yapp_core::{Clock, HuntId, SkipReason, Time};
use yapp_storage::{keys, KeyValueStore};

/// Skips the active hunt when the app was away for too long.
pub struct AbandonmentMonitor {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    threshold: Duration,
}

impl AbandonmentMonitor {
    /// Create a monitor persisting background timestamps in `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, threshold: Duration) -> Self {
        Self { store, clock, threshold }
    }

    /// Remember when the app left the foreground, if a hunt is running.
    pub async fn on_app_background(&self, orchestrator: &HuntOrchestrator) {
        let Some(active) = orchestrator.progress().current_active_hunt else {
            debug!("app backgrounded with no active hunt");
            return;
        };

        let now = self.clock.now().to_rfc3339();
        match self.store.set(keys::APP_BACKGROUND_TIME, &now).await {
            Ok(()) => debug!(hunt_id = %active, at = %now, "recorded background time"),
            Err(e) => warn!(hunt_id = %active, error = %e, "failed to record background time"),
        }
    }

    /// Check the away time reported by the platform on return to the foreground.
    ///
    /// Returns the id of the hunt skipped as abandoned, if any.
    pub async fn on_app_foreground(
        &self,
        orchestrator: &mut HuntOrchestrator,
        time_away_ms: u64,
    ) -> Option<HuntId> {
        let skipped = self.check_abandonment(orchestrator, time_away_ms).await;
        self.clear_background_time().await;
        orchestrator.resume_active_timer().await;
        skipped
    }

    /// Check the persisted background time after the process was relaunched.
    pub async fn on_cold_start_check(&self, orchestrator: &mut HuntOrchestrator) -> Option<HuntId> {
        let skipped = match self.stored_background_time().await {
            Some(since) => {
                let away_ms = (self.clock.now() - since).num_milliseconds().max(0) as u64;
                debug!(since = %since, away_ms, "cold start after background");
                self.check_abandonment(orchestrator, away_ms).await
            }
            None => None,
        };
        self.clear_background_time().await;
        orchestrator.resume_active_timer().await;
        skipped
    }

    /// Skip the running hunt because the app is closing.
    pub async fn on_app_close(&self, orchestrator: &mut HuntOrchestrator) -> Option<HuntId> {
        let active = orchestrator.progress().current_active_hunt?;
        match orchestrator.skip_hunt(active, SkipReason::Closed).await {
            Ok(_) => {
                info!(hunt_id = %active, "active hunt skipped on app close");
                Some(active)
            }
            Err(e) => {
                warn!(hunt_id = %active, error = %e, "failed to skip hunt on app close");
                None
            }
        }
    }

    async fn check_abandonment(
        &self,
        orchestrator: &mut HuntOrchestrator,
        away_ms: u64,
    ) -> Option<HuntId> {
        let active = orchestrator.progress().current_active_hunt?;
        if u128::from(away_ms) <= self.threshold.as_millis() {
            debug!(hunt_id = %active, away_ms, "away time within threshold");
            return None;
        }

        match orchestrator.skip_hunt(active, SkipReason::Abandoned { away_ms }).await {
            Ok(_) => {
                info!(
                    hunt_id = %active,
                    away_ms,
                    threshold_ms = self.threshold.as_millis() as u64,
                    "hunt abandoned"
                );
                Some(active)
            }
            Err(e) => {
                warn!(hunt_id = %active, error = %e, "failed to skip abandoned hunt");
                None
            }
        }
    }

    async fn stored_background_time(&self) -> Option<Time> {
        let raw = match self.store.get(keys::APP_BACKGROUND_TIME).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "failed to read background time");
                return None;
            }
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(at) => Some(at.with_timezone(&Utc)),
            Err(e) => {
                warn!(value = %raw, error = %e, "ignoring unparsable background time");
                None
            }
        }
    }

    async fn clear_background_time(&self) {
        if let Err(e) = self.store.remove(keys::APP_BACKGROUND_TIME).await {
            warn!(error = %e, "failed to clear background time");
        }
    }
}
