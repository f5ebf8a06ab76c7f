//! YAPP CLI - drive the hunt engine from the terminal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use yapp_core::{
    format_hms, HuntId, HuntProgress, HuntStatus, SkipReason, SystemClock, UserPermissions,
};
use yapp_engine::{EngineConfig, HuntSession};
use yapp_storage::JsonFileStore;

#[derive(Parser)]
#[command(name = "yapp")]
#[command(about = "Timed scavenger hunt engine", long_about = None)]
struct Cli {
    /// Directory holding the persisted state
    #[arg(long, default_value = ".yapp")]
    data_dir: PathBuf,

    /// Seconds in the background after which the active hunt is abandoned
    #[arg(long, default_value = "30")]
    abandon_threshold_secs: u64,

    /// Endpoint final stats are POSTed to (logged when unset)
    #[arg(long)]
    stats_endpoint: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in as a user, registering them on first use
    Login {
        /// Display name
        name: String,
    },
    /// End the current session
    Logout,
    /// List registered users
    Users,
    /// Record granted permissions and finish onboarding
    Setup {
        /// Location access granted
        #[arg(long)]
        location: bool,
        /// Camera access granted
        #[arg(long)]
        camera: bool,
    },
    /// Show hunt progress
    Status,
    /// Start an unlocked hunt
    Start {
        /// Hunt ID
        id: HuntId,
    },
    /// Record that the running hunt's task was detected
    Report {
        /// Hunt ID
        id: HuntId,
        /// Elapsed seconds when the task was detected
        elapsed: u64,
    },
    /// Complete the running hunt
    Complete {
        /// Hunt ID
        id: HuntId,
        /// Override the measured duration (seconds)
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Skip a hunt
    Skip {
        /// Hunt ID
        id: HuntId,
        /// Reason shown in the log
        #[arg(long)]
        reason: Option<String>,
    },
    /// Follow the running hunt's timer
    Watch {
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Record that the app went to the background
    Background,
    /// Report the app's return to the foreground
    Foreground {
        /// Milliseconds spent away
        #[arg(long)]
        away_ms: u64,
    },
    /// Close the app, skipping the running hunt
    Close,
    /// Discard all progress
    Reset {
        /// Also end the user's session
        #[arg(long)]
        user: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = JsonFileStore::new(&cli.data_dir)
        .await
        .with_context(|| format!("failed to open data directory {}", cli.data_dir.display()))?;
    debug!(root = %store.root().display(), "opened store");

    // An explicit foreground report replaces the check against the stored background time
    let cold_start_check = !matches!(cli.command, Commands::Foreground { .. });
    let mut config = EngineConfig::default()
        .with_abandonment_threshold(Duration::from_secs(cli.abandon_threshold_secs))
        .with_cold_start_check(cold_start_check);
    if let Some(endpoint) = cli.stats_endpoint {
        config = config.with_stats_endpoint(endpoint);
    }

    let mut session = HuntSession::open(Arc::new(store), Arc::new(SystemClock), &config).await;
    if let Some(id) = session.abandoned_on_open() {
        println!("Hunt {} was abandoned while the app was away", id);
    }

    match cli.command {
        Commands::Login { name } => {
            let user = session.switch_user(&name).await?;
            println!("Logged in as {}", user.name);
            print_progress(&session);
        }
        Commands::Logout => {
            session.logout().await?;
            println!("Logged out");
        }
        Commands::Users => {
            let current = session.users().current().await.map(|u| u.name);
            for user in session.users().all_users().await? {
                let marker = if current.as_deref() == Some(user.name.as_str()) { "*" } else { " " };
                let submitted = if user.has_submitted_final_stats { " (stats sent)" } else { "" };
                println!("{} {}{}", marker, user.name, submitted);
            }
        }
        Commands::Setup { location, camera } => {
            let users = session.users();
            users.update_permissions(UserPermissions { location, camera }).await?;
            users.complete_setup().await?;
            println!("Setup complete (location: {}, camera: {})", location, camera);
        }
        Commands::Status => {
            match session.users().current().await {
                Some(user) => println!("User: {}", user.name),
                None => println!("User: (none)"),
            }
            print_progress(&session);
        }
        Commands::Start { id } => {
            let hunt = session.start_hunt(id).await?;
            println!("Started {} - {}", hunt.id, hunt.title);
            if let Some(max) = hunt.max_duration {
                println!("  Time limit: {}", format_hms(max));
            }
        }
        Commands::Report { id, elapsed } => {
            if session.report_task_condition_met(id, elapsed).await? {
                println!("Recorded task for hunt {} at {}", id, format_hms(elapsed));
            } else {
                println!("Task for hunt {} was already recorded", id);
            }
        }
        Commands::Complete { id, duration } => {
            let hunt = session.complete_hunt(id, duration).await?;
            let took = format_hms(hunt.duration.unwrap_or(0));
            if hunt.is_late_completion {
                println!("Completed {} in {} (late)", hunt.title, took);
            } else {
                println!("Completed {} in {}", hunt.title, took);
            }
        }
        Commands::Skip { id, reason } => {
            let reason = reason.map(SkipReason::Manual).unwrap_or_default();
            let hunt = session.skip_hunt(id, reason).await?;
            println!("Skipped {}", hunt.title);
        }
        Commands::Watch { seconds } => watch(&session, seconds).await?,
        Commands::Background => {
            session.handle_app_background().await;
            println!("Background time recorded");
        }
        Commands::Foreground { away_ms } => match session.handle_app_foreground(away_ms).await {
            Some(id) => println!("Hunt {} was abandoned", id),
            None => println!("Welcome back"),
        },
        Commands::Close => match session.handle_app_close().await {
            Some(id) => println!("Hunt {} skipped on close", id),
            None => println!("No hunt running"),
        },
        Commands::Reset { user } => {
            if user {
                session.reset_user_progress().await?;
                println!("Progress reset and logged out");
            } else {
                session.reset_progress().await;
                println!("Progress reset");
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn watch(session: &HuntSession, seconds: Option<u64>) -> Result<()> {
    let engine = session.orchestrator();
    let Some(active) = engine.progress().active_hunt().cloned() else {
        println!("No hunt running");
        return Ok(());
    };

    let mut elapsed = engine.timer().subscribe();
    let deadline = async {
        match seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    info!(hunt_id = %active.id, "watching timer");
    loop {
        let secs = *elapsed.borrow_and_update();
        let remaining = active
            .remaining_seconds(secs)
            .map(|r| format!(" ({} left)", format_hms(r)))
            .unwrap_or_default();
        println!("{} {}{}", active.title, format_hms(secs), remaining);

        tokio::select! {
            changed = elapsed.changed() => changed.context("timer stopped")?,
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn print_progress(session: &HuntSession) {
    let engine = session.orchestrator();
    let progress: &HuntProgress = engine.progress();

    println!("Hunts ({} completed)", progress.total_completed);
    for hunt in &progress.hunts {
        let detail = match hunt.status() {
            HuntStatus::Started => {
                let elapsed = engine.elapsed_for(hunt);
                if engine.is_hunt_overdue(hunt.id) {
                    format!("{} OVERDUE", format_hms(elapsed))
                } else {
                    format_hms(elapsed)
                }
            }
            HuntStatus::Completed | HuntStatus::Late | HuntStatus::Skipped => {
                format_hms(hunt.duration.unwrap_or(0))
            }
            HuntStatus::Locked | HuntStatus::Unlocked => String::new(),
        };
        println!("  {} | {:9} | {} {}", hunt.id, hunt.status().as_str(), hunt.title, detail);
    }
}
