//! lot-send - Background daemon for scheduled publishing
//!
//! Polls the database for scheduled posts whose firing time has
//! arrived and publishes them through the normal pipeline, so quota
//! admission and fan-out behave exactly as they do for an immediate
//! publish. Also sweeps posts abandoned mid-publish by a dead process.

use clap::Parser;
use secrecy::SecretString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use liblotcast::generator::{ContentGenerator, HttpTextModel, TextModel};
use liblotcast::orchestrator::{load_ledger, PublishOrchestrator};
use liblotcast::{Config, Database, LotcastError, PlatformRegistry, Result};

/// Publishing posts older than this are treated as abandoned
const ABANDONED_CUTOFF_SECS: i64 = 3600;

#[derive(Parser, Debug)]
#[command(name = "lot-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
lot-send - Background daemon for scheduled publishing

DESCRIPTION:
    lot-send is a long-running daemon that monitors the Lotcast
    database and publishes scheduled posts when they come due.

    It polls at regular intervals, re-checks quota admission at fire
    time (against the firing month's counter), publishes through the
    same pipeline as lot-post, and records per-platform outcomes.

    On each pass it also resolves posts stuck in the in-flight state
    by a previous crash, marking them failed so nothing stays in limbo.

USAGE:
    # Run in foreground (logs to stderr)
    lot-send

    # Custom poll interval
    lot-send --poll-interval 30

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current post)

CONFIGURATION:
    Configuration file: ~/.config/lotcast/config.toml
    Database location: ~/.local/share/lotcast/posts.db

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
")]
struct Cli {
    /// Poll interval in seconds
    #[arg(long, value_name = "SECONDS", default_value = "60")]
    poll_interval: u64,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due posts once and exit (for testing)
    #[arg(long, hide = true)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    liblotcast::logging::init_cli(cli.verbose, "info");

    let config = Config::load().unwrap_or_else(|_| Config::default_config());
    let db = Database::new(&config.database.path).await?;

    info!("lot-send daemon starting");

    let ledger = Arc::new(load_ledger(&db, config.quota.free_post_limit).await?);
    let orchestrator = PublishOrchestrator::new(
        ledger,
        build_generator(&config)?,
        PlatformRegistry::with_default_platforms(),
        Arc::new(db.clone()),
        db.clone(),
    )
    .with_platform_timeout(Duration::from_secs(config.publish.platform_timeout_secs));

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    info!("Poll interval: {}s", cli.poll_interval);

    if cli.once {
        process_due_posts(&db, &orchestrator).await?;
        info!("lot-send: processed posts once, exiting");
    } else {
        run_daemon_loop(&db, &orchestrator, cli.poll_interval, shutdown).await?;
    }

    info!("lot-send daemon stopped");
    Ok(())
}

fn build_generator(config: &Config) -> Result<ContentGenerator> {
    let model: Option<Arc<dyn TextModel>> =
        match (&config.generation.endpoint, &config.generation.model) {
            (Some(endpoint), Some(model_name)) => {
                let api_key = std::env::var("LOTCAST_MODEL_API_KEY")
                    .ok()
                    .map(SecretString::from);
                Some(Arc::new(HttpTextModel::new(
                    endpoint.clone(),
                    model_name.clone(),
                    api_key,
                )?))
            }
            _ => None,
        };

    Ok(ContentGenerator::new(model)
        .with_fragment_threshold(config.generation.fragment_threshold)
        .with_model_timeout(Duration::from_secs(config.generation.model_timeout_secs)))
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| LotcastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

/// Main daemon loop
async fn run_daemon_loop(
    db: &Database,
    orchestrator: &PublishOrchestrator,
    poll_interval: u64,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        if let Err(e) = process_due_posts(db, orchestrator).await {
            error!("Error processing posts: {}", e);
        }

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    Ok(())
}

/// Publish every post that has come due, then sweep abandoned ones
async fn process_due_posts(db: &Database, orchestrator: &PublishOrchestrator) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    let swept = db.fail_abandoned_posts(now - ABANDONED_CUTOFF_SECS).await?;
    if swept > 0 {
        warn!("Marked {} abandoned post(s) as failed", swept);
    }

    let due_posts = db.due_scheduled(now).await?;
    if due_posts.is_empty() {
        return Ok(());
    }

    info!("Found {} post(s) due for publishing", due_posts.len());

    for post in due_posts {
        info!("Publishing scheduled post: {}", post.id);
        match orchestrator.publish_stored(&post.id).await {
            Ok(report) => {
                info!(
                    "Post {} resolved as {}",
                    report.post.id,
                    report.post.status.as_str()
                );
            }
            Err(e) => {
                // Quota rejections and load failures leave the post
                // scheduled; it will be retried next pass
                error!("Failed to publish post {}: {}", post.id, e);
            }
        }
    }

    Ok(())
}
