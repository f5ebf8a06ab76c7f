//! Final stats payload sent once a user finishes every hunt.

use crate::Time;
use crate::progress::HuntProgress;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Aggregate summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalStats {
    /// Unique id so receivers can drop duplicates
    pub submission_id: Ulid,

    /// Who played
    pub user_name: String,

    /// Hunts completed without skipping
    pub num_hunts_completed: u32,

    /// Hunts that were skipped
    pub num_hunts_skipped: u32,

    /// Completions that overran their budget
    pub num_late_completions: u32,

    /// Sum of hunt durations
    pub total_duration_seconds: u64,

    /// Same total as `HH:MM:SS`
    pub total_duration_formatted: String,

    /// When the summary was composed
    pub submitted_at: Time,
}

impl FinalStats {
    /// Summarize `progress` for `user_name`.
    pub fn from_progress(user_name: impl Into<String>, progress: &HuntProgress, now: Time) -> Self {
        let total = progress.total_duration();
        Self {
            submission_id: Ulid::new(),
            user_name: user_name.into(),
            num_hunts_completed: progress.completed_count() as u32,
            num_hunts_skipped: progress.skipped_count() as u32,
            num_late_completions: progress.late_count() as u32,
            total_duration_seconds: total,
            total_duration_formatted: format_hms(total),
            submitted_at: now,
        }
    }
}

/// Format whole seconds as `HH:MM:SS`. Hours are not wrapped.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
