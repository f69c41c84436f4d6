//! lot-gen - Generate social media copy for a vehicle listing
//!
//! Runs the content pipeline without publishing anything: useful for
//! previewing copy, piping into other tools, or A/B-ing tones.

use clap::Parser;
use secrecy::SecretString;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use liblotcast::generator::{ContentGenerator, HttpTextModel, TextModel};
use liblotcast::{Config, GenerationOptions, Length, Listing, LotcastError, Result, Tone};

#[derive(Parser, Debug)]
#[command(name = "lot-gen")]
#[command(version)]
#[command(about = "Generate social media copy for a vehicle listing")]
#[command(long_about = "\
lot-gen - Generate social media copy for a vehicle listing

Generates post text from structured listing data. Uses the configured
text model when one is available and falls back to the deterministic
templates otherwise, so it always produces output for a valid listing.

EXAMPLES:
    # Minimal listing
    lot-gen --make Toyota --model Camry

    # Full listing with style options
    lot-gen --make BMW --model M3 --year 2023 --price '$72,000' \\
        --condition New --feature 'Carbon roof' --feature 'Harman Kardon' \\
        --tone luxury --length long

    # Machine-readable output
    lot-gen --make Honda --model Civic --format json | jq -r .content

EXIT CODES:
    0 - Success
    1 - Runtime error
    3 - Invalid listing or options
")]
struct Cli {
    /// Vehicle make (required)
    #[arg(long)]
    make: String,

    /// Vehicle model (required)
    #[arg(long)]
    model: String,

    /// Model year
    #[arg(long)]
    year: Option<u32>,

    /// Asking price, free-form (e.g. "$24,500")
    #[arg(long)]
    price: Option<String>,

    /// Mileage, free-form (e.g. "32,000 miles")
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

    /// Tone: professional, casual, exciting, luxury
    #[arg(short, long, default_value = "professional")]
    tone: String,

    /// Length: short, medium, long
    #[arg(short, long, default_value = "medium")]
    length: String,

    /// Skip the trailing hashtag block
    #[arg(long)]
    no_hashtags: bool,

    /// Skip the emoji prefix
    #[arg(long)]
    no_emoji: bool,

    /// Skip the text model and use the templates directly
    #[arg(long)]
    template_only: bool,

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
    let listing = Listing {
        year: cli.year,
        make: cli.make.clone(),
        model: cli.model.clone(),
        price: cli.price.clone(),
        mileage: cli.mileage.clone(),
        condition: cli.condition.clone(),
        features: cli.features.clone(),
        images: cli.images.clone(),
    };

    let options = GenerationOptions {
        tone: Tone::from_str(&cli.tone)?,
        length: Length::from_str(&cli.length)?,
        include_hashtags: !cli.no_hashtags,
        include_emoji: !cli.no_emoji,
    };

    let generator = build_generator(cli.template_only)?;
    let content = generator.generate(&listing, &options).await?;

    match cli.format.as_str() {
        "json" => {
            let output = serde_json::json!({
                "content": content,
                "listing": listing,
                "options": options,
            });
            println!("{}", serde_json::to_string_pretty(&output).map_err(|e| {
                LotcastError::InvalidInput(format!("Failed to serialize output: {}", e))
            })?);
        }
        _ => {
            println!("{}", content);
        }
    }

    Ok(())
}

/// Assemble the generator from config; missing config means
/// template-only operation, not an error
fn build_generator(template_only: bool) -> Result<ContentGenerator> {
    let config = Config::load().unwrap_or_else(|_| Config::default_config());

    let model: Option<Arc<dyn TextModel>> = if template_only {
        None
    } else {
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
        }
    };

    Ok(ContentGenerator::new(model)
        .with_fragment_threshold(config.generation.fragment_threshold)
        .with_model_timeout(Duration::from_secs(config.generation.model_timeout_secs)))
}
