//! Post copy generation
//!
//! Two-tier strategy: a best-effort generative backend behind the
//! [`TextModel`] trait, and a deterministic tone-keyed template engine
//! as the correctness backstop. Any failure on the primary path (model
//! unavailable, network error, timeout) falls back to the templates,
//! so callers never observe a total generation failure for a valid
//! listing. The fallback is a plain function and is tested directly,
//! without touching the primary path.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{LotcastError, Result};
use crate::types::{GenerationOptions, Length, Listing, Tone};

/// Trailing sentence fragments shorter than this are treated as model
/// run-on and dropped. A crude completeness heuristic inherited from
/// the original pipeline; configurable because it can eat valid short
/// sentences.
pub const DEFAULT_FRAGMENT_THRESHOLD: usize = 20;

pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);

/// Sampling parameters derived from the style options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl SamplingParams {
    /// Fixed lookup: length bounds the output size, tone picks the
    /// randomness.
    pub fn for_style(tone: Tone, length: Length) -> Self {
        let max_new_tokens = match length {
            Length::Short => 50,
            Length::Medium => 100,
            Length::Long => 150,
        };
        let temperature = match tone {
            Tone::Professional => 0.7,
            Tone::Casual => 0.8,
            Tone::Exciting => 0.9,
            Tone::Luxury => 0.75,
        };
        Self {
            max_new_tokens,
            temperature,
            top_k: 50,
            top_p: 0.95,
        }
    }
}

/// The pluggable, possibly-unavailable generation capability
///
/// Prompt in, raw text out. Implementations own their lifecycle and
/// report failures through `LotcastError::Generation`; the caller
/// absorbs them via the template fallback.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &str, params: &SamplingParams) -> Result<String>;
}

/// Text model backed by an OpenAI-compatible completions endpoint
pub struct HttpTextModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

impl HttpTextModel {
    pub fn new(endpoint: String, model: String, api_key: Option<SecretString>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_MODEL_TIMEOUT)
            .build()
            .map_err(|e| LotcastError::Generation(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            model,
            api_key,
        })
    }
}

#[async_trait]
impl TextModel for HttpTextModel {
    async fn complete(&self, prompt: &str, params: &SamplingParams) -> Result<String> {
        let url = format!("{}/v1/completions", self.endpoint.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": params.max_new_tokens,
            "temperature": params.temperature,
            "top_k": params.top_k,
            "top_p": params.top_p,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| LotcastError::Generation(format!("Model request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(LotcastError::Generation(format!(
                "Model endpoint returned {}",
                response.status()
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LotcastError::Generation(format!("Invalid model response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| LotcastError::Generation("Model returned no choices".to_string()))
    }
}

/// Generates post copy from listing data and style options
pub struct ContentGenerator {
    model: Option<Arc<dyn TextModel>>,
    fragment_threshold: usize,
    model_timeout: Duration,
}

impl ContentGenerator {
    /// Create a generator. With no model the template engine handles
    /// every request.
    pub fn new(model: Option<Arc<dyn TextModel>>) -> Self {
        Self {
            model,
            fragment_threshold: DEFAULT_FRAGMENT_THRESHOLD,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    pub fn with_fragment_threshold(mut self, threshold: usize) -> Self {
        self.fragment_threshold = threshold;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Generate post text
    ///
    /// Fails only on a malformed listing. Primary-path errors are
    /// absorbed by the template fallback.
    pub async fn generate(&self, listing: &Listing, options: &GenerationOptions) -> Result<String> {
        listing.validate()?;

        if let Some(model) = &self.model {
            match self.generate_primary(model.as_ref(), listing, options).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!("Primary generation failed, using template fallback: {}", e);
                }
            }
        } else {
            debug!("No text model configured, using template fallback");
        }

        Ok(self.render_template(listing, options))
    }

    async fn generate_primary(
        &self,
        model: &dyn TextModel,
        listing: &Listing,
        options: &GenerationOptions,
    ) -> Result<String> {
        let prompt = build_prompt(listing, options.tone);
        let params = SamplingParams::for_style(options.tone, options.length);

        let raw = tokio::time::timeout(self.model_timeout, model.complete(&prompt, &params))
            .await
            .map_err(|_| {
                LotcastError::Generation(format!(
                    "Model call timed out after {}s",
                    self.model_timeout.as_secs()
                ))
            })??;

        let text = self.cleanup(&raw, &prompt);
        if text.is_empty() {
            return Err(LotcastError::Generation(
                "Model produced no usable text".to_string(),
            ));
        }

        Ok(decorate(text, listing, options))
    }

    /// Deterministic template fallback
    ///
    /// Never fails for a listing that passed validation; callers may
    /// use it directly to skip the model entirely.
    pub fn render_template(&self, listing: &Listing, options: &GenerationOptions) -> String {
        let title = listing_title(listing);
        let price = listing.price.as_deref();
        let mileage = listing.mileage.as_deref();
        let condition = listing.condition.as_deref();
        let features = feature_clause(listing);

        let mut parts: Vec<String> = Vec::new();
        match options.tone {
            Tone::Professional => {
                parts.push(format!("Check out this {}!", title));
                if let Some(condition) = condition {
                    parts.push(format!("{} condition.", condition));
                }
                if let Some(price) = price {
                    parts.push(format!("Priced at {}.", price));
                }
                if let Some(mileage) = mileage {
                    parts.push(format!("{}.", mileage));
                }
                if let Some(features) = &features {
                    parts.push(format!("Features include: {}.", features));
                }
                parts.push("Contact us today for more information!".to_string());
            }
            Tone::Casual => {
                parts.push(format!(
                    "Hey! Looking for a great ride? Check out this awesome {}!",
                    title
                ));
                if let Some(price) = price {
                    parts.push(format!("Only {}!", price));
                }
                if let Some(mileage) = mileage {
                    parts.push(format!("{}.", mileage));
                }
                parts.push("This one won't last long!".to_string());
            }
            Tone::Exciting => {
                parts.push(format!(
                    "AMAZING DEAL ALERT! This stunning {} is ready for you!",
                    title
                ));
                if let Some(price) = price {
                    parts.push(format!("Unbeatable price: {}!", price));
                }
                if let Some(features) = &features {
                    parts.push(format!("Loaded with: {}!", features));
                }
                parts.push("Don't miss out!".to_string());
            }
            Tone::Luxury => {
                parts.push(format!("Experience elegance with this pristine {}.", title));
                if condition == Some("New") {
                    parts.push("Brand new and ready to impress.".to_string());
                } else {
                    parts.push("Meticulously maintained.".to_string());
                }
                if let Some(features) = &features {
                    parts.push(format!("Premium features include {}.", features));
                }
                if let Some(price) = price {
                    parts.push(format!("{}.", price));
                }
                parts.push("Inquire today.".to_string());
            }
        }

        decorate(parts.join(" "), listing, options)
    }

    /// Strip the echoed prompt and drop a trailing fragment below the
    /// completeness threshold, then ensure terminal punctuation.
    fn cleanup(&self, raw: &str, prompt: &str) -> String {
        let text = raw.replace(prompt, "");
        let text = text.trim();

        let mut sentences: Vec<&str> = text
            .split(|c| c == '.' || c == '!' || c == '?')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if sentences.len() > 1 {
            if let Some(last) = sentences.last() {
                if last.len() < self.fragment_threshold {
                    sentences.pop();
                }
            }
        }

        let mut text = sentences.join(". ");
        if !text.is_empty() && !text.ends_with(['.', '!', '?']) {
            text.push('.');
        }
        text
    }
}

impl Default for ContentGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Style-appropriate instruction prompt for the model
pub fn build_prompt(listing: &Listing, tone: Tone) -> String {
    let instruction = match tone {
        Tone::Professional => "Write a professional, informative social media post",
        Tone::Casual => "Write a friendly, casual social media post",
        Tone::Exciting => "Write an exciting, enthusiastic social media post",
        Tone::Luxury => "Write an elegant, luxury-focused social media post",
    };

    let mut prompt = format!("{} about a {}.", instruction, listing_title(listing));
    if let Some(condition) = &listing.condition {
        prompt.push_str(&format!(" This is a {} vehicle.", condition));
    }
    if let Some(price) = &listing.price {
        prompt.push_str(&format!(" Priced at {}.", price));
    }
    if let Some(mileage) = &listing.mileage {
        prompt.push_str(&format!(" It has {}.", mileage));
    }
    prompt.push_str("\n\nPost: ");
    prompt
}

fn listing_title(listing: &Listing) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(year) = listing.year {
        parts.push(year.to_string());
    }
    parts.push(listing.make.clone());
    parts.push(listing.model.clone());
    parts.join(" ")
}

fn feature_clause(listing: &Listing) -> Option<String> {
    if listing.features.is_empty() {
        None
    } else {
        Some(
            listing
                .features
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// Shared hashtag/emoji pass applied by both generation tiers
fn decorate(text: String, listing: &Listing, options: &GenerationOptions) -> String {
    let mut text = text;
    if options.include_hashtags {
        text.push_str("\n\n");
        text.push_str(&hashtags(listing));
    }
    if options.include_emoji {
        text = format!("{} {}", emoji_prefix(&text, listing), text);
    }
    text
}

/// Up to 8 hashtags: make, model, year, condition pair, then three
/// fixed generic tags, in that priority order.
pub fn hashtags(listing: &Listing) -> String {
    let mut tags: Vec<String> = Vec::new();

    if !listing.make.trim().is_empty() {
        tags.push(format!("#{}", strip_spaces(&listing.make)));
    }
    if !listing.model.trim().is_empty() {
        tags.push(format!("#{}", strip_spaces(&listing.model)));
    }
    if let Some(year) = listing.year {
        tags.push(format!("#{}", year));
    }

    match listing.condition.as_deref() {
        Some("Used") => {
            tags.push("#UsedCar".to_string());
            tags.push("#PreOwned".to_string());
        }
        Some("New") => {
            tags.push("#NewCar".to_string());
            tags.push("#BrandNew".to_string());
        }
        _ => {}
    }

    tags.push("#CarForSale".to_string());
    tags.push("#AutoSales".to_string());
    tags.push("#VehicleForSale".to_string());

    tags.truncate(8);
    tags.join(" ")
}

fn strip_spaces(s: &str) -> String {
    s.split_whitespace().collect()
}

/// Two to three emoji chosen by simple keyword/condition rules
fn emoji_prefix(text: &str, listing: &Listing) -> String {
    let mut emojis = vec!["\u{1F697}", "\u{2728}"]; // 🚗 ✨
    if listing.condition.as_deref() == Some("New") {
        emojis.push("\u{1F195}"); // 🆕
    } else if text.to_lowercase().contains("luxury")
        || listing
            .features
            .iter()
            .any(|f| f.to_lowercase().contains("luxury"))
    {
        emojis.push("\u{1F48E}"); // 💎
    }
    emojis.truncate(3);
    emojis.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedModel {
        output: String,
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn complete(&self, _prompt: &str, _params: &SamplingParams) -> Result<String> {
            Ok(self.output.clone())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl TextModel for FailingModel {
        async fn complete(&self, _prompt: &str, _params: &SamplingParams) -> Result<String> {
            Err(LotcastError::Generation("model unavailable".to_string()))
        }
    }

    struct SlowModel;

    #[async_trait]
    impl TextModel for SlowModel {
        async fn complete(&self, _prompt: &str, _params: &SamplingParams) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    fn camry() -> Listing {
        Listing {
            year: Some(2023),
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            price: Some("$28,500".to_string()),
            mileage: Some("15,000 miles".to_string()),
            condition: Some("Used".to_string()),
            features: vec![],
            images: vec![],
        }
    }

    #[test]
    fn test_sampling_params_lookup() {
        let params = SamplingParams::for_style(Tone::Exciting, Length::Long);
        assert_eq!(params.max_new_tokens, 150);
        assert_eq!(params.temperature, 0.9);
        assert_eq!(params.top_k, 50);
        assert_eq!(params.top_p, 0.95);

        let params = SamplingParams::for_style(Tone::Professional, Length::Short);
        assert_eq!(params.max_new_tokens, 50);
        assert_eq!(params.temperature, 0.7);
    }

    #[test]
    fn test_build_prompt_includes_listing_fields() {
        let prompt = build_prompt(&camry(), Tone::Professional);
        assert!(prompt.starts_with("Write a professional"));
        assert!(prompt.contains("2023 Toyota Camry"));
        assert!(prompt.contains("Used vehicle"));
        assert!(prompt.contains("$28,500"));
        assert!(prompt.contains("15,000 miles"));
        assert!(prompt.ends_with("Post: "));
    }

    #[tokio::test]
    async fn test_fallback_when_model_fails() {
        let generator = ContentGenerator::new(Some(Arc::new(FailingModel)));
        let text = generator
            .generate(
                &camry(),
                &GenerationOptions {
                    tone: Tone::Professional,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!text.is_empty());
        assert!(text.contains("Toyota"));
        assert!(text.contains("Camry"));
        let last_line = text.lines().last().unwrap();
        assert!(last_line.contains("#Toyota"));
        assert!(last_line.contains("#Camry"));
    }

    #[tokio::test]
    async fn test_fallback_when_model_times_out() {
        let generator = ContentGenerator::new(Some(Arc::new(SlowModel)))
            .with_model_timeout(Duration::from_millis(20));
        let text = generator
            .generate(&camry(), &GenerationOptions::default())
            .await
            .unwrap();
        assert!(text.contains("Toyota"));
    }

    #[tokio::test]
    async fn test_no_model_uses_template() {
        let generator = ContentGenerator::new(None);
        let text = generator
            .generate(&camry(), &GenerationOptions::default())
            .await
            .unwrap();
        assert!(text.contains("Check out this 2023 Toyota Camry!"));
    }

    #[tokio::test]
    async fn test_malformed_listing_is_rejected() {
        let generator = ContentGenerator::new(None);
        let listing = Listing {
            make: String::new(),
            model: "Camry".to_string(),
            ..Default::default()
        };
        assert!(generator
            .generate(&listing, &GenerationOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_primary_output_is_cleaned_and_decorated() {
        let listing = camry();
        let prompt = build_prompt(&listing, Tone::Professional);
        let model = ScriptedModel {
            output: format!(
                "{}This Camry drives beautifully and is priced to sell! Great fuel econ",
                prompt
            ),
        };
        let generator = ContentGenerator::new(Some(Arc::new(model)));
        let text = generator
            .generate(&listing, &GenerationOptions::default())
            .await
            .unwrap();

        // Prompt stripped, short trailing fragment dropped
        assert!(!text.contains("Write a professional"));
        assert!(!text.contains("Great fuel econ"));
        assert!(text.contains("This Camry drives beautifully and is priced to sell"));
        // Hashtag pass applied to the primary path too
        assert!(text.contains("#Toyota"));
    }

    #[tokio::test]
    async fn test_fragment_threshold_is_configurable() {
        let listing = camry();
        let prompt = build_prompt(&listing, Tone::Professional);
        let model = ScriptedModel {
            output: format!("{}A solid family sedan for the daily commute. Runs great", prompt),
        };
        // With the threshold lowered the trailing sentence survives
        let generator = ContentGenerator::new(Some(Arc::new(model))).with_fragment_threshold(5);
        let text = generator
            .generate(&listing, &GenerationOptions::default())
            .await
            .unwrap();
        assert!(text.contains("Runs great"));
    }

    #[tokio::test]
    async fn test_empty_model_output_falls_back() {
        let model = ScriptedModel {
            output: String::new(),
        };
        let generator = ContentGenerator::new(Some(Arc::new(model)));
        let text = generator
            .generate(&camry(), &GenerationOptions::default())
            .await
            .unwrap();
        assert!(text.contains("Check out this 2023 Toyota Camry!"));
    }

    #[test]
    fn test_template_tones_differ() {
        let generator = ContentGenerator::new(None);
        let listing = camry();
        let options = |tone| GenerationOptions {
            tone,
            include_hashtags: false,
            include_emoji: false,
            ..Default::default()
        };

        let professional = generator.render_template(&listing, &options(Tone::Professional));
        let casual = generator.render_template(&listing, &options(Tone::Casual));
        let exciting = generator.render_template(&listing, &options(Tone::Exciting));
        let luxury = generator.render_template(&listing, &options(Tone::Luxury));

        assert!(professional.contains("Contact us today"));
        assert!(casual.contains("won't last long"));
        assert!(exciting.contains("AMAZING DEAL ALERT"));
        assert!(luxury.contains("Experience elegance"));
    }

    #[test]
    fn test_luxury_template_condition_branch() {
        let generator = ContentGenerator::new(None);
        let mut listing = camry();
        listing.condition = Some("New".to_string());
        let options = GenerationOptions {
            tone: Tone::Luxury,
            include_hashtags: false,
            include_emoji: false,
            ..Default::default()
        };
        let text = generator.render_template(&listing, &options);
        assert!(text.contains("Brand new and ready to impress."));
    }

    #[test]
    fn test_hashtags_priority_and_cap() {
        let tags = hashtags(&camry());
        let list: Vec<&str> = tags.split(' ').collect();
        assert_eq!(
            list,
            vec![
                "#Toyota",
                "#Camry",
                "#2023",
                "#UsedCar",
                "#PreOwned",
                "#CarForSale",
                "#AutoSales",
                "#VehicleForSale"
            ]
        );
        assert!(list.len() <= 8);
    }

    #[test]
    fn test_hashtags_strip_spaces_in_names() {
        let listing = Listing {
            year: Some(2022),
            make: "Land Rover".to_string(),
            model: "Range Rover".to_string(),
            ..Default::default()
        };
        let tags = hashtags(&listing);
        assert!(tags.contains("#LandRover"));
        assert!(tags.contains("#RangeRover"));
    }

    #[test]
    fn test_emoji_rules() {
        let used = camry();
        let prefix = emoji_prefix("plain text", &used);
        assert_eq!(prefix.split(' ').count(), 2);

        let mut new_car = camry();
        new_car.condition = Some("New".to_string());
        let prefix = emoji_prefix("plain text", &new_car);
        assert_eq!(prefix.split(' ').count(), 3);
        assert!(prefix.contains('\u{1F195}'));

        let prefix = emoji_prefix("pure luxury inside", &used);
        assert!(prefix.contains('\u{1F48E}'));
    }

    #[test]
    fn test_hashtags_omitted_when_disabled() {
        let generator = ContentGenerator::new(None);
        let options = GenerationOptions {
            include_hashtags: false,
            include_emoji: false,
            ..Default::default()
        };
        let text = generator.render_template(&camry(), &options);
        assert!(!text.contains('#'));
        assert!(!text.contains('\u{1F697}'));
    }
}
