//! Final stats submission.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use yapp_core::{Clock, FinalStats, HuntProgress};
use yapp_progress::UserProvider;

/// Errors from a stats transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Request could not be sent
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("server rejected stats with status {0}")]
    Rejected(u16),
}

/// Delivers the final stats payload somewhere.
#[async_trait]
pub trait StatsTransport: Send + Sync {
    /// Send `stats`.
    async fn submit(&self, stats: &FinalStats) -> Result<(), TransportError>;
}

/// POSTs the payload as JSON.
pub struct HttpStatsTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStatsTransport {
    /// Create a transport posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl StatsTransport for HttpStatsTransport {
    async fn submit(&self, stats: &FinalStats) -> Result<(), TransportError> {
        let response = self.client.post(&self.endpoint).json(stats).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Writes the payload to the log. Used when no endpoint is configured.
#[derive(Debug, Default)]
pub struct LogStatsTransport;

#[async_trait]
impl StatsTransport for LogStatsTransport {
    async fn submit(&self, stats: &FinalStats) -> Result<(), TransportError> {
        info!(
            user = %stats.user_name,
            completed = stats.num_hunts_completed,
            skipped = stats.num_hunts_skipped,
            late = stats.num_late_completions,
            total = %stats.total_duration_formatted,
            "final stats"
        );
        Ok(())
    }
}

/// Result of [`StatsReporter::check_and_submit`].
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Nobody is logged in
    NoUser,
    /// Stats were already sent for this user
    AlreadySubmitted,
    /// Some hunt is not finished yet
    Incomplete,
    /// Submission is running in the background
    Dispatched(JoinHandle<()>),
}

/// Sends final stats exactly once per user.
pub struct StatsReporter {
    users: Arc<dyn UserProvider>,
    transport: Arc<dyn StatsTransport>,
    clock: Arc<dyn Clock>,
}

impl StatsReporter {
    /// Create a reporter.
    pub fn new(
        users: Arc<dyn UserProvider>,
        transport: Arc<dyn StatsTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { users, transport, clock }
    }

    /// Submit stats if every hunt is finished and nothing was sent yet.
    ///
    /// The submitted flag is set before the transport runs and stays set even
    /// if delivery fails: a lost summary is preferred over a duplicate one.
    pub async fn check_and_submit(&self, progress: &HuntProgress) -> SubmitOutcome {
        let Some(user_name) = self.users.current_user_name().await else {
            debug!("no user logged in, skipping final stats");
            return SubmitOutcome::NoUser;
        };
        if self.users.has_submitted_final_stats().await {
            return SubmitOutcome::AlreadySubmitted;
        }
        if !progress.all_terminal() {
            return SubmitOutcome::Incomplete;
        }

        let stats = FinalStats::from_progress(user_name, progress, self.clock.now());
        if let Err(e) = self.users.mark_final_stats_submitted().await {
            warn!(error = %e, "failed to persist final stats flag");
        }

        let transport = self.transport.clone();
        let handle = tokio::spawn(async move {
            match transport.submit(&stats).await {
                Ok(()) => info!(
                    user = %stats.user_name,
                    id = %stats.submission_id,
                    "final stats submitted"
                ),
                Err(e) => {
                    warn!(user = %stats.user_name, error = %e, "final stats submission failed")
                }
            }
        });
        SubmitOutcome::Dispatched(handle)
    }
}
