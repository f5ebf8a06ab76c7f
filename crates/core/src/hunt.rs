//! Hunt model - one stage of the hunt sequence.

use crate::Time;
use crate::id::HuntId;
use serde::{Deserialize, Serialize};

/// A single hunt in the fixed, ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hunt {
    /// Unique identifier, equal to the position in the unlock chain
    pub id: HuntId,

    /// Short title
    pub title: String,

    /// What the player has to do
    pub description: String,

    /// Whether the hunt can be started
    #[serde(default)]
    pub is_unlocked: bool,

    /// Terminal flag, also set for skipped hunts
    #[serde(default)]
    pub is_completed: bool,

    /// Hunt was skipped (manually or through abandonment)
    #[serde(default)]
    pub is_skipped: bool,

    /// Completed after `max_duration` elapsed
    #[serde(default)]
    pub is_late_completion: bool,

    /// When the hunt was started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Time>,

    /// When the hunt reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Time>,

    /// Whole seconds spent on the hunt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,

    /// Target budget in whole seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<u64>,
}

impl Hunt {
    /// Create a locked hunt without a time budget.
    pub fn new(
        id: impl Into<HuntId>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            is_unlocked: false,
            is_completed: false,
            is_skipped: false,
            is_late_completion: false,
            start_time: None,
            completion_time: None,
            duration: None,
            max_duration: None,
        }
    }

    /// Set the target budget.
    pub fn with_max_duration(mut self, seconds: u64) -> Self {
        self.max_duration = Some(seconds);
        self
    }

    /// Mark the hunt as unlocked.
    pub fn unlocked(mut self) -> Self {
        self.is_unlocked = true;
        self
    }

    /// Completed or skipped. No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        self.is_completed || self.is_skipped
    }

    /// Display status derived from the flags.
    pub fn status(&self) -> HuntStatus {
        if !self.is_unlocked && !self.is_terminal() {
            HuntStatus::Locked
        } else if self.is_skipped {
            HuntStatus::Skipped
        } else if self.is_completed && self.is_late_completion {
            HuntStatus::Late
        } else if self.is_completed {
            HuntStatus::Completed
        } else if self.start_time.is_some() {
            HuntStatus::Started
        } else {
            HuntStatus::Unlocked
        }
    }

    /// Whether `elapsed` seconds overrun the budget of a started hunt.
    pub fn is_overdue(&self, elapsed: u64) -> bool {
        match (self.start_time, self.max_duration) {
            (Some(_), Some(max)) => elapsed > max,
            _ => false,
        }
    }

    /// Seconds left in the budget, if the hunt has one.
    pub fn remaining_seconds(&self, elapsed: u64) -> Option<u64> {
        self.max_duration.map(|max| max.saturating_sub(elapsed))
    }

    /// Whether `duration` overruns the budget.
    pub fn exceeds_budget(&self, duration: u64) -> bool {
        self.max_duration.is_some_and(|max| duration > max)
    }
}

/// Status of a hunt as shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HuntStatus {
    /// Not yet reachable
    Locked,
    /// Can be started
    Unlocked,
    /// Started, still running
    Started,
    /// Completed within budget
    Completed,
    /// Completed after the budget ran out
    Late,
    /// Skipped or abandoned
    Skipped,
}

impl HuntStatus {
    /// Lower-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Late => "late",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for HuntStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a hunt was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Player gave up
    Manual(String),

    /// App stayed in the background longer than the abandonment threshold
    Abandoned {
        /// Time spent away in milliseconds
        away_ms: u64,
    },

    /// App was closed while the hunt was running
    Closed,
}

impl Default for SkipReason {
    fn default() -> Self {
        Self::Manual("Manually skipped".to_string())
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual(reason) => f.write_str(reason),
            Self::Abandoned { away_ms } => {
                write!(f, "App was away for {} seconds", away_ms.saturating_add(500) / 1000)
            }
            Self::Closed => f.write_str("App was closed"),
        }
    }
}

/// Whole seconds between two instants, floored. Negative spans clamp to zero.
pub fn elapsed_seconds(start: Time, end: Time) -> u64 {
    let ms = (end - start).num_milliseconds();
    if ms <= 0 {
        0
    } else {
        (ms / 1000) as u64
    }
}
