//! Hunt lifecycle engine.
//!
//! Drives hunts through locked → unlocked → active → completed/skipped,
//! times them from a persisted anchor, skips hunts abandoned in the
//! background, and reports final stats once everything is finished.

#![warn(missing_docs)]

pub mod config;
pub mod timer;
pub mod validation;
pub mod orchestrator;
pub mod lifecycle;
pub mod stats;
pub mod session;

pub use config::EngineConfig;
pub use timer::TimerEngine;
pub use validation::{HuntValidator, ValidationError};
pub use orchestrator::HuntOrchestrator;
pub use lifecycle::AbandonmentMonitor;
pub use stats::{
    HttpStatsTransport, LogStatsTransport, StatsReporter, StatsTransport, SubmitOutcome,
    TransportError,
};
pub use session::HuntSession;

#[cfg(test)]
mod testing;
