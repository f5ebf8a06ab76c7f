//! Engine configuration.

use std::time::Duration;

/// Configuration for the hunt engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Away time after which the active hunt counts as abandoned
    pub abandonment_threshold: Duration,
    /// Period of the elapsed-time ticker
    pub tick_interval: Duration,
    /// Mirror the running timer anchor to storage
    pub mirror_timer: bool,
    /// Where final stats are POSTed (None = log only)
    pub stats_endpoint: Option<String>,
    /// Run the abandonment check against the stored background time when a session opens
    pub cold_start_check: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            abandonment_threshold: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
            mirror_timer: true,
            stats_endpoint: None,
            cold_start_check: true,
        }
    }
}

impl EngineConfig {
    /// Set the abandonment threshold.
    pub fn with_abandonment_threshold(mut self, threshold: Duration) -> Self {
        self.abandonment_threshold = threshold;
        self
    }

    /// Set the ticker period.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Enable or disable the timer mirror.
    pub fn with_timer_mirror(mut self, enabled: bool) -> Self {
        self.mirror_timer = enabled;
        self
    }

    /// Submit final stats to `endpoint`.
    pub fn with_stats_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.stats_endpoint = Some(endpoint.into());
        self
    }

    /// Enable or disable the abandonment check on open.
    pub fn with_cold_start_check(mut self, enabled: bool) -> Self {
        self.cold_start_check = enabled;
        self
    }
}
