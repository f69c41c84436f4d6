//! lot-quota - Inspect and manage account publish quotas
//!
//! Shows the current period's usage and handles tier changes. All
//! mutations go through the ledger and are persisted immediately, so
//! a publish started after an upgrade sees the new limit.

use clap::{Parser, Subcommand};
use std::sync::Arc;

use liblotcast::orchestrator::load_ledger;
use liblotcast::quota::QuotaUsage;
use liblotcast::{Config, Database, LotcastError, QuotaLedger, Result};

#[derive(Parser, Debug)]
#[command(name = "lot-quota")]
#[command(version)]
#[command(about = "Inspect and manage account publish quotas")]
#[command(long_about = "\
lot-quota - Inspect and manage account publish quotas

Free accounts get a fixed number of posts per calendar month; premium
accounts are unlimited. Counters reset lazily at the month boundary,
so 'usage' always reflects the current period.

EXAMPLES:
    # Current usage
    lot-quota usage --account dealer-42

    # Enroll a new account on the free tier
    lot-quota init --account dealer-42

    # Tier changes
    lot-quota upgrade --account dealer-42
    lot-quota cancel --account dealer-42

    # Scripting
    lot-quota usage --account dealer-42 --format json | jq .remaining

EXIT CODES:
    0 - Success
    1 - Runtime error
    3 - Invalid input
    4 - Unknown account / no active subscription
")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current period's usage
    Usage {
        #[arg(short, long)]
        account: String,
    },
    /// Enroll an account on the free tier
    Init {
        #[arg(short, long)]
        account: String,
    },
    /// Upgrade an account to premium (unlimited posts)
    Upgrade {
        #[arg(short, long)]
        account: String,
    },
    /// Cancel premium, reverting to the free limit
    Cancel {
        #[arg(short, long)]
        account: String,
    },
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
    let now = chrono::Utc::now().timestamp();

    match &cli.command {
        Command::Usage { account } => {
            let usage = ledger.usage(account, now).await?;
            print_usage(account, &usage, &cli.format)?;
        }
        Command::Init { account } => {
            if ledger.lock(account).await.is_ok() {
                return Err(LotcastError::InvalidInput(format!(
                    "Account '{}' is already enrolled",
                    account
                )));
            }
            ledger.register_free(account, now);
            persist(&ledger, &db, account).await?;
            println!(
                "Enrolled '{}' on the free tier ({} posts per month)",
                account,
                config.quota.free_post_limit
            );
        }
        Command::Upgrade { account } => {
            {
                let mut lease = ledger.lock(account).await?;
                lease.upgrade();
                db.save_quota(lease.quota()).await?;
            }
            println!("Account '{}' upgraded to premium", account);
        }
        Command::Cancel { account } => {
            {
                let mut lease = ledger.lock(account).await?;
                lease.cancel(ledger.free_limit());
                db.save_quota(lease.quota()).await?;
            }
            println!(
                "Account '{}' reverted to the free tier ({} posts per month)",
                account,
                ledger.free_limit()
            );
        }
    }

    Ok(())
}

async fn persist(ledger: &Arc<QuotaLedger>, db: &Database, account: &str) -> Result<()> {
    let lease = ledger.lock(account).await?;
    db.save_quota(lease.quota()).await
}

fn print_usage(account: &str, usage: &QuotaUsage, format: &str) -> Result<()> {
    match format {
        "json" => {
            println!(
                "{}",
                serde_json::to_string_pretty(usage)
                    .map_err(|e| LotcastError::InvalidInput(e.to_string()))?
            );
        }
        _ => {
            let resets = chrono::DateTime::from_timestamp(usage.resets_at, 0)
                .unwrap_or_else(chrono::Utc::now);
            match usage.limit {
                Some(limit) => {
                    println!(
                        "{}: {} of {} posts used ({} tier)",
                        account,
                        usage.used,
                        limit,
                        usage.tier.as_str()
                    );
                    println!("resets {}", resets.format("%Y-%m-%d"));
                }
                None => {
                    println!(
                        "{}: {} posts this period ({} tier, unlimited)",
                        account,
                        usage.used,
                        usage.tier.as_str()
                    );
                }
            }
        }
    }
    Ok(())
}
