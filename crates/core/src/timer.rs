//! Timer anchor - the reference point elapsed time is computed from.

use crate::Time;
use crate::hunt::elapsed_seconds;
use crate::id::HuntId;
use serde::{Deserialize, Serialize};

/// Ephemeral timing state. `Hunt::start_time` stays authoritative; this is a
/// recomputable cache that may be mirrored to storage for kill recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerAnchor {
    /// Instant elapsed time is measured from
    pub anchor_start_time: Time,

    /// Hunt being timed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hunt_id: Option<HuntId>,

    /// Whether the ticker is running
    pub running: bool,
}

impl TimerAnchor {
    /// Create a running anchor.
    pub fn running(anchor_start_time: Time, hunt_id: Option<HuntId>) -> Self {
        Self {
            anchor_start_time,
            hunt_id,
            running: true,
        }
    }

    /// Whole seconds elapsed at `now`.
    pub fn elapsed_at(&self, now: Time) -> u64 {
        elapsed_seconds(self.anchor_start_time, now)
    }

    /// Anchor that yields `elapsed` seconds at `now`.
    pub fn rebased(now: Time, elapsed: u64, hunt_id: Option<HuntId>) -> Self {
        let offset = chrono::Duration::seconds(elapsed.min(u64::from(u32::MAX)) as i64);
        Self::running(now.checked_sub_signed(offset).unwrap_or(now), hunt_id)
    }
}
