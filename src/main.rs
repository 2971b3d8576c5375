//! # DataShed Notifier CLI
//!
//! Runs the batched activity-digest notifier against the catalog's
//! SQLite store.
//!
//! Usage:
//!   datashed-notifier run-once             # One notification pass
//!   datashed-notifier watch                # Run on an interval
//!   datashed-notifier enable sara          # Opt a user in
//!   datashed-notifier site-wide off        # Admin kill switch
//!   datashed-notifier seed-demo            # Populate demo data

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use datashed_core::traits::{ActivityStore, PreferenceStore};
use datashed_core::types::{Activity, ActivityKind, User};
use datashed_core::DatashedConfig;
use datashed_mailer::SmtpDispatcher;
use datashed_notifier::{spawn_notifier, BatchNotifier, Composer, SqliteStore};

#[derive(Parser)]
#[command(
    name = "datashed-notifier",
    version,
    about = "📬 DataShed — batched activity email notifications"
)]
struct Cli {
    /// Config file (defaults to ~/.datashed/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one notification pass and exit.
    RunOnce,
    /// Keep running a pass on the configured interval.
    Watch {
        /// Override the interval between passes, in seconds
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Turn email notifications on for a user.
    Enable { user: String },
    /// Turn email notifications off for a user.
    Disable { user: String },
    /// Flip the site-wide switch ("on" or "off").
    SiteWide { state: String },
    /// Create a demo user and some activity for a dry run.
    SeedDemo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "datashed=debug,datashed_notifier=debug"
    } else {
        "datashed=info,datashed_notifier=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => DatashedConfig::load_from(path.as_ref())?,
        None => DatashedConfig::load()?,
    };

    let db_path = config.storage.resolved_db_path();
    tracing::debug!("🗄️ Using catalog database at {}", db_path.display());
    let store = Arc::new(SqliteStore::open(&db_path).context("opening catalog database")?);
    let mailer = Arc::new(SmtpDispatcher::new(config.smtp.clone()));
    let notifier = BatchNotifier::new(
        store.clone(),
        store.clone(),
        mailer,
        Composer::from_config(&config),
        config.notifier.suppress_seen,
    );

    match cli.command {
        Command::RunOnce => {
            let report = notifier.run_once().await?;
            println!(
                "sent: {}  skipped: {}  failed: {}",
                report.sent_count(),
                report.skipped_count(),
                report.failed_count()
            );
        }
        Command::Watch { interval } => {
            let secs = interval.unwrap_or(config.notifier.check_interval_secs);
            spawn_notifier(Arc::new(notifier), secs).await;
        }
        Command::Enable { user } => {
            let id = resolve_user(&store, &user).await?;
            store.set_user_preference(&id, true).await?;
            println!("Email notifications enabled for {user}");
        }
        Command::Disable { user } => {
            let id = resolve_user(&store, &user).await?;
            store.set_user_preference(&id, false).await?;
            println!("Email notifications disabled for {user}");
        }
        Command::SiteWide { state } => {
            let enabled = match state.as_str() {
                "on" => true,
                "off" => false,
                other => anyhow::bail!("expected 'on' or 'off', got '{other}'"),
            };
            store.set_site_wide(enabled).await?;
            println!("Site-wide email notifications: {state}");
        }
        Command::SeedDemo => {
            seed_demo(&store).await?;
            println!("Demo data created. Try 'datashed-notifier run-once'");
        }
    }

    Ok(())
}

async fn resolve_user(store: &Arc<SqliteStore>, name: &str) -> Result<String> {
    let users = store.users().await?;
    users
        .into_iter()
        .find(|u| u.name == name)
        .map(|u| u.id)
        .with_context(|| format!("no such user: {name}"))
}

async fn seed_demo(store: &Arc<SqliteStore>) -> Result<()> {
    let user = User::new("sara", "sara@sararollins.com", "Sara Rollins");
    let id = user.id.clone();
    store.insert_user(user).await?;
    store.set_user_preference(&id, true).await?;

    for i in 1..=3 {
        let activity = Activity::new(
            &id,
            ActivityKind::DatasetUpdated,
            "warandpeace",
            &format!("updated {i} times"),
        );
        store.record(activity).await?;
    }
    Ok(())
}
