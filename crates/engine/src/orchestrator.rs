//! Hunt orchestrator - the only place hunt state changes.
//!
//! Every transition is a single read-modify-commit on a copy of the committed
//! aggregate: validate, mutate the copy, adjust the timer, commit. A refused
//! transition leaves the aggregate untouched. Transitions take `&mut self`,
//! so two of them can never interleave on one engine.

use crate::stats::{StatsReporter, SubmitOutcome};
use crate::timer::TimerEngine;
use crate::validation::{HuntValidator, ValidationError};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use yapp_core::{elapsed_seconds, Clock, Hunt, HuntId, HuntProgress, HuntStatus, SkipReason, Time};
use yapp_progress::{ProgressStore, UserError, UserProvider};

/// Transition engine for the hunt sequence.
pub struct HuntOrchestrator {
    progress: ProgressStore,
    timer: TimerEngine,
    stats: StatsReporter,
    users: Arc<dyn UserProvider>,
    clock: Arc<dyn Clock>,
    pending_submission: Option<JoinHandle<()>>,
}

impl HuntOrchestrator {
    /// Create an orchestrator over loaded progress.
    pub fn new(
        progress: ProgressStore,
        timer: TimerEngine,
        stats: StatsReporter,
        users: Arc<dyn UserProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            progress,
            timer,
            stats,
            users,
            clock,
            pending_submission: None,
        }
    }

    /// Start an unlocked hunt and its timer.
    pub async fn start_hunt(&mut self, id: HuntId) -> Result<Hunt, ValidationError> {
        HuntValidator::validate_can_start(self.progress.current(), id)?;

        let now = self.clock.now();
        let mut progress = self.progress.current().clone();
        let hunt = progress.find_mut(id).ok_or(ValidationError::NotFound(id))?;
        hunt.start_time = Some(now);
        let started = hunt.clone();
        progress.current_active_hunt = Some(id);

        self.timer.start_timer(now, Some(id)).await;
        self.progress.commit(progress).await;
        info!(hunt_id = %id, title = %started.title, "hunt started");
        Ok(started)
    }

    /// Freeze the elapsed time a task detector observed, without finishing the hunt.
    ///
    /// Only the first report for a hunt is recorded; later ones return `Ok(false)`.
    pub async fn report_task_condition_met(
        &mut self,
        id: HuntId,
        elapsed: u64,
    ) -> Result<bool, ValidationError> {
        HuntValidator::validate_can_complete(self.progress.current(), id)?;

        let mut progress = self.progress.current().clone();
        let hunt = progress.find_mut(id).ok_or(ValidationError::NotFound(id))?;
        if hunt.duration.is_some() {
            debug!(hunt_id = %id, "task condition already recorded");
            return Ok(false);
        }
        hunt.duration = Some(elapsed);

        self.progress.commit(progress).await;
        info!(hunt_id = %id, elapsed, "task condition met");
        Ok(true)
    }

    /// Complete the running hunt and unlock the next one.
    ///
    /// `explicit_duration` overrides the duration measured from the start time.
    pub async fn complete_hunt(
        &mut self,
        id: HuntId,
        explicit_duration: Option<u64>,
    ) -> Result<Hunt, ValidationError> {
        HuntValidator::validate_can_complete(self.progress.current(), id)?;

        let now = self.clock.now();
        let mut progress = self.progress.current().clone();
        let hunt = progress.find_mut(id).ok_or(ValidationError::NotFound(id))?;
        let start = hunt.start_time.ok_or_else(|| ValidationError::MissingStartTime {
            id,
            title: hunt.title.clone(),
        })?;

        let duration = explicit_duration.unwrap_or_else(|| measured_duration(id, start, now));
        hunt.is_completed = true;
        hunt.completion_time = Some(now);
        hunt.duration = Some(duration);
        hunt.is_late_completion = hunt.exceeds_budget(duration);
        let completed = hunt.clone();

        progress.total_completed += 1;
        progress.current_active_hunt = None;
        progress.unlock_next(id);

        self.timer.stop_timer().await;
        self.progress.commit(progress).await;
        info!(
            hunt_id = %id,
            duration,
            late = completed.is_late_completion,
            "hunt completed"
        );
        self.check_final_stats().await;
        Ok(completed)
    }

    /// Skip any hunt that is not finished yet, running or not.
    ///
    /// A skip is terminal and unlocks the next hunt, but does not count
    /// towards `total_completed`.
    pub async fn skip_hunt(
        &mut self,
        id: HuntId,
        reason: SkipReason,
    ) -> Result<Hunt, ValidationError> {
        HuntValidator::validate_can_skip(self.progress.current(), id)?;

        let now = self.clock.now();
        let mut progress = self.progress.current().clone();
        let hunt = progress.find_mut(id).ok_or(ValidationError::NotFound(id))?;
        hunt.is_skipped = true;
        hunt.is_completed = true;
        hunt.completion_time = Some(now);
        hunt.duration = Some(hunt.start_time.map_or(0, |start| measured_duration(id, start, now)));
        let skipped = hunt.clone();

        let was_active = progress.current_active_hunt == Some(id);
        if was_active {
            progress.current_active_hunt = None;
        }
        progress.unlock_next(id);

        if was_active {
            self.timer.stop_timer().await;
        }
        self.progress.commit(progress).await;
        info!(hunt_id = %id, reason = %reason, was_active, "hunt skipped");
        self.check_final_stats().await;
        Ok(skipped)
    }

    /// Discard all progress and reseed from the catalog.
    pub async fn reset_progress(&mut self) {
        self.timer.stop_timer().await;
        self.progress.reset_to_initial().await;
        info!("hunt progress reset");
    }

    /// Reset progress and end the user's session.
    pub async fn reset_user_progress(&mut self) -> Result<(), UserError> {
        self.reset_progress().await;
        self.users.end_session().await?;
        info!("user progress and session reset");
        Ok(())
    }

    /// Reload progress for whoever is logged in now and resync the timer.
    pub async fn reload_progress(&mut self) {
        self.progress.load().await;
        self.resume_active_timer().await;
    }

    /// Run the timer from the active hunt's start time, or stop it if nothing is active.
    pub async fn resume_active_timer(&mut self) {
        let active = self
            .progress
            .current()
            .active_hunt()
            .filter(|h| !h.is_terminal())
            .and_then(|h| h.start_time.map(|start| (h.id, start)));

        match active {
            Some((id, start)) => {
                let already = self.timer.hunt_id() == Some(id)
                    && self.timer.anchor().is_some_and(|a| a.anchor_start_time == start);
                if !already {
                    self.timer.start_timer(start, Some(id)).await;
                }
            }
            None => self.timer.stop_timer().await,
        }
    }

    /// Whether a hunt has overrun its budget.
    pub fn is_hunt_overdue(&self, id: HuntId) -> bool {
        self.progress
            .find_hunt(id)
            .is_some_and(|h| !h.is_terminal() && h.is_overdue(self.elapsed_for(h)))
    }

    /// Seconds left in a hunt's budget.
    pub fn remaining_seconds(&self, id: HuntId) -> Option<u64> {
        let hunt = self.progress.find_hunt(id)?;
        hunt.remaining_seconds(self.elapsed_for(hunt))
    }

    /// Display status of a hunt.
    pub fn hunt_status(&self, id: HuntId) -> Option<HuntStatus> {
        self.progress.find_hunt(id).map(Hunt::status)
    }

    /// Seconds the hunt has been running, or its recorded duration once finished.
    pub fn elapsed_for(&self, hunt: &Hunt) -> u64 {
        if hunt.is_terminal() {
            return hunt.duration.unwrap_or(0);
        }
        hunt.start_time
            .map(|start| elapsed_seconds(start, self.clock.now()))
            .unwrap_or(0)
    }

    /// The committed aggregate.
    pub fn progress(&self) -> &HuntProgress {
        self.progress.current()
    }

    /// Key the aggregate is stored under.
    pub fn storage_key(&self) -> &str {
        self.progress.storage_key()
    }

    /// Receive every committed aggregate.
    pub fn subscribe(&self) -> watch::Receiver<HuntProgress> {
        self.progress.subscribe()
    }

    /// The hunt timer.
    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    /// The hunt timer, for pause and resume.
    pub fn timer_mut(&mut self) -> &mut TimerEngine {
        &mut self.timer
    }

    /// Wait for an in-flight stats submission, if any.
    pub async fn wait_for_submission(&mut self) {
        if let Some(handle) = self.pending_submission.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "stats submission task failed");
            }
        }
    }

    async fn check_final_stats(&mut self) {
        let outcome = self.stats.check_and_submit(self.progress.current()).await;
        if let SubmitOutcome::Dispatched(handle) = outcome {
            self.pending_submission = Some(handle);
        }
    }
}

/// Seconds from `start` to `now`. A clock that moved backwards yields zero.
fn measured_duration(id: HuntId, start: Time, now: Time) -> u64 {
    if now < start {
        warn!(
            hunt_id = %id,
            %start,
            %now,
            "clock is behind the hunt start time, clamping duration to zero"
        );
    }
    elapsed_seconds(start, now)
}
