//! Yapp hunt core data models.
//!
//! This crate defines the data structures shared by every layer of the
//! scavenger-hunt engine: the hunt sequence, the per-user progress
//! aggregate, timer anchors, users and the final stats payload.

#![warn(missing_docs)]

// Core identities
mod id;

// Hunt sequence
mod hunt;
mod progress;
mod catalog;

// Timing
mod clock;
mod timer;

// Users and reporting
mod user;
mod stats;

// Re-exports
pub use id::HuntId;

pub use hunt::{Hunt, HuntStatus, SkipReason, elapsed_seconds};
pub use progress::HuntProgress;
pub use catalog::{seed_catalog, initial_progress};

pub use clock::{Clock, SystemClock, ManualClock};
pub use timer::TimerAnchor;

pub use user::{User, UserPermissions};
pub use stats::{FinalStats, format_hms};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
