//! lot-post - Publish a vehicle listing to connected social platforms
//!
//! Generates (or accepts) post copy, fans it out to the selected
//! platforms, and reports the per-platform outcome. Quota admission
//! runs before anything else; a rejected request leaves no trace.

use clap::Parser;
use secrecy::SecretString;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use liblotcast::generator::{ContentGenerator, HttpTextModel, TextModel};
use liblotcast::orchestrator::{load_ledger, PublishOrchestrator, PublishRequest};
use liblotcast::scheduling::parse_schedule;
use liblotcast::{
    Config, Database, GenerationOptions, Length, Listing, LotcastError, PlatformId,
    PlatformRegistry, PublishReport, Result, Tone,
};

#[derive(Parser, Debug)]
#[command(name = "lot-post")]
#[command(version)]
#[command(about = "Publish a vehicle listing to connected social platforms")]
#[command(long_about = "\
lot-post - Publish a vehicle listing to connected social platforms

Builds post copy from listing data (or takes it pre-written), then
delivers it to every selected platform concurrently. One success is
enough to count the post as published and charge the monthly quota;
a post that fails everywhere charges nothing.

EXAMPLES:
    # Publish now to two platforms
    lot-post --account dealer-42 --listing veh-17 \\
        --make Toyota --model Camry --year 2021 --price '$24,500' \\
        --platforms facebook,twitter

    # Pre-written copy, exciting tone ignored
    lot-post --account dealer-42 --listing veh-17 \\
        --make Toyota --model Camry \\
        --content 'Just in: a one-owner Camry.' --platforms facebook

    # Schedule for later
    lot-post --account dealer-42 --listing veh-17 \\
        --make Toyota --model Camry \\
        --platforms facebook --schedule 'tomorrow 9am'

    # Save a draft, publish it another day
    lot-post --account dealer-42 --listing veh-17 \\
        --make Toyota --model Camry --platforms facebook --draft

EXIT CODES:
    0 - Published (at least one platform succeeded)
    1 - Runtime error or all platforms failed
    2 - Authentication error
    3 - Invalid input
    4 - Quota exhausted or no active subscription
")]
struct Cli {
    /// Account to publish as
    #[arg(short, long)]
    account: String,

    /// Listing identifier, recorded with the post
    #[arg(long, default_value = "ad-hoc")]
    listing: String,

    /// Vehicle make
    #[arg(long)]
    make: String,

    /// Vehicle model
    #[arg(long)]
    model: String,

    /// Model year
    #[arg(long)]
    year: Option<u32>,

    /// Asking price, free-form
    #[arg(long)]
    price: Option<String>,

    /// Mileage, free-form
    #[arg(long)]
    mileage: Option<String>,

    /// Condition (e.g. "New", "Used")
    #[arg(long)]
    condition: Option<String>,

    /// Notable feature (repeatable)
    #[arg(long = "feature", value_name = "FEATURE")]
    features: Vec<String>,

    /// Image URL to attach (repeatable)
    #[arg(long = "image", value_name = "URL")]
    images: Vec<String>,

    /// Pre-written post copy (skips generation)
    #[arg(long)]
    content: Option<String>,

    /// Target platforms, comma-separated (defaults from config)
    #[arg(short, long)]
    platforms: Option<String>,

    /// Tone: professional, casual, exciting, luxury
    #[arg(short, long, default_value = "professional")]
    tone: String,

    /// Length: short, medium, long
    #[arg(short, long, default_value = "medium")]
    length: String,

    /// Publish later; accepts "2h", "tomorrow 9am", RFC 3339, or
    /// "random:MIN-MAX"
    #[arg(short, long, value_name = "WHEN")]
    schedule: Option<String>,

    /// Save as draft without publishing
    #[arg(short, long)]
    draft: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    liblotcast::logging::init_cli(cli.verbose, "warn");

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().unwrap_or_else(|_| Config::default_config());
    let db = Database::new(&config.database.path).await?;

    let ledger = Arc::new(load_ledger(&db, config.quota.free_post_limit).await?);
    ensure_account(&ledger, &db, &cli.account).await?;

    let orchestrator = PublishOrchestrator::new(
        Arc::clone(&ledger),
        build_generator(&config)?,
        PlatformRegistry::with_default_platforms(),
        Arc::new(db.clone()),
        db,
    )
    .with_platform_timeout(Duration::from_secs(config.publish.platform_timeout_secs));

    let platforms = parse_platforms(cli.platforms.as_deref(), &config)?;
    let request = PublishRequest {
        account_id: cli.account.clone(),
        listing_id: cli.listing.clone(),
        listing: Listing {
            year: cli.year,
            make: cli.make.clone(),
            model: cli.model.clone(),
            price: cli.price.clone(),
            mileage: cli.mileage.clone(),
            condition: cli.condition.clone(),
            features: cli.features.clone(),
            images: cli.images.clone(),
        },
        platforms,
        content: cli.content.clone(),
        options: GenerationOptions {
            tone: Tone::from_str(&cli.tone)?,
            length: Length::from_str(&cli.length)?,
            ..GenerationOptions::default()
        },
    };

    if cli.draft {
        let post = orchestrator.save_draft(request).await?;
        print_stored(&post, &cli.format, "draft saved")?;
        return Ok(());
    }

    if let Some(when) = &cli.schedule {
        let scheduled_for = parse_schedule(when, None)?.timestamp();
        let post = orchestrator.schedule(request, scheduled_for).await?;
        print_stored(&post, &cli.format, "post scheduled")?;
        return Ok(());
    }

    let report = orchestrator.publish(request).await?;
    print_report(&report, &cli.format)?;

    if report.post.any_success() {
        Ok(())
    } else {
        // The attempt is recorded; the exit code still signals failure
        std::process::exit(1);
    }
}

/// Enroll unknown accounts on the free tier, the signup default
async fn ensure_account(
    ledger: &Arc<liblotcast::QuotaLedger>,
    db: &Database,
    account_id: &str,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    if ledger.lock(account_id).await.is_err() {
        info!("Enrolling account '{}' on the free tier", account_id);
        ledger.register_free(account_id, now);
        let lease = ledger.lock(account_id).await?;
        db.save_quota(lease.quota()).await?;
    }
    Ok(())
}

fn parse_platforms(arg: Option<&str>, config: &Config) -> Result<Vec<PlatformId>> {
    let names: Vec<String> = match arg {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => config.defaults.platforms.clone(),
    };
    names.iter().map(|name| name.parse()).collect()
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

fn print_stored(post: &liblotcast::Post, format: &str, label: &str) -> Result<()> {
    match format {
        "json" => {
            println!(
                "{}",
                serde_json::to_string_pretty(post)
                    .map_err(|e| LotcastError::InvalidInput(e.to_string()))?
            );
        }
        _ => {
            println!("{}: {}", label, post.id);
            if let Some(scheduled_for) = post.scheduled_for {
                let dt = chrono::DateTime::from_timestamp(scheduled_for, 0)
                    .unwrap_or_else(chrono::Utc::now);
                println!("  fires at {}", dt.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
    }
    Ok(())
}

fn print_report(report: &PublishReport, format: &str) -> Result<()> {
    match format {
        "json" => {
            let output = serde_json::json!({
                "post": report.post,
                "usage": report.usage,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output)
                    .map_err(|e| LotcastError::InvalidInput(e.to_string()))?
            );
        }
        _ => {
            println!("{} | {}", report.post.id, report.post.status.as_str());
            for outcome in &report.post.publish_results {
                let symbol = if outcome.success { "✓" } else { "✗" };
                if let Some(url) = &outcome.url {
                    println!("  {} {}: {}", symbol, outcome.platform, url);
                } else if let Some(error) = &outcome.error {
                    println!("  {} {}: {}", symbol, outcome.platform, error);
                } else {
                    println!("  {} {}", symbol, outcome.platform);
                }
            }
            match report.usage.limit {
                Some(limit) => println!("quota: {} of {} used", report.usage.used, limit),
                None => println!("quota: {} used (unlimited)", report.usage.used),
            }
        }
    }
    Ok(())
}
