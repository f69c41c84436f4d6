//! Core types for Lotcast

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{LotcastError, Result};

/// The closed set of supported delivery targets
///
/// Adding a platform means adding a variant here plus one publisher
/// registration in `platforms::PlatformRegistry::with_default_platforms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Facebook,
    Instagram,
    Twitter,
    Linkedin,
}

impl PlatformId {
    pub const ALL: [PlatformId; 4] = [
        PlatformId::Facebook,
        PlatformId::Instagram,
        PlatformId::Twitter,
        PlatformId::Linkedin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformId::Facebook => "facebook",
            PlatformId::Instagram => "instagram",
            PlatformId::Twitter => "twitter",
            PlatformId::Linkedin => "linkedin",
        }
    }
}

impl FromStr for PlatformId {
    type Err = LotcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(PlatformId::Facebook),
            "instagram" => Ok(PlatformId::Instagram),
            "twitter" => Ok(PlatformId::Twitter),
            "linkedin" => Ok(PlatformId::Linkedin),
            _ => Err(LotcastError::InvalidInput(format!(
                "Unsupported platform: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured vehicle listing data, the input to content generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Listing {
    pub year: Option<u32>,
    pub make: String,
    pub model: String,
    pub price: Option<String>,
    pub mileage: Option<String>,
    pub condition: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Listing {
    /// Reject listings that cannot produce meaningful copy
    pub fn validate(&self) -> Result<()> {
        if self.make.trim().is_empty() {
            return Err(LotcastError::InvalidInput(
                "Listing make cannot be empty".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(LotcastError::InvalidInput(
                "Listing model cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Casual,
    Exciting,
    Luxury,
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Professional
    }
}

impl FromStr for Tone {
    type Err = LotcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "professional" => Ok(Tone::Professional),
            "casual" => Ok(Tone::Casual),
            "exciting" => Ok(Tone::Exciting),
            "luxury" => Ok(Tone::Luxury),
            _ => Err(LotcastError::InvalidInput(format!(
                "Invalid tone: '{}'. Valid options: professional, casual, exciting, luxury",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Length {
    Short,
    Medium,
    Long,
}

impl Default for Length {
    fn default() -> Self {
        Length::Medium
    }
}

impl FromStr for Length {
    type Err = LotcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "short" => Ok(Length::Short),
            "medium" => Ok(Length::Medium),
            "long" => Ok(Length::Long),
            _ => Err(LotcastError::InvalidInput(format!(
                "Invalid length: '{}'. Valid options: short, medium, long",
                s
            ))),
        }
    }
}

/// Style options for content generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub length: Length,
    #[serde(default = "default_true")]
    pub include_hashtags: bool,
    #[serde(default = "default_true")]
    pub include_emoji: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            tone: Tone::default(),
            length: Length::default(),
            include_hashtags: true,
            include_emoji: true,
        }
    }
}

/// Normalized content handed to platform publishers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostContent {
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl PostContent {
    pub fn new(text: String) -> Self {
        Self {
            text,
            images: Vec::new(),
        }
    }

    pub fn with_images(text: String, images: Vec<String>) -> Self {
        Self { text, images }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    /// In-flight marker while the fan-out runs; resolved to published
    /// or failed when the outcomes are aggregated, or swept to failed
    /// if the process dies mid-publish.
    Publishing,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    /// Published and failed posts never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Failed)
    }
}

impl FromStr for PostStatus {
    type Err = LotcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "publishing" => Ok(PostStatus::Publishing),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            _ => Err(LotcastError::InvalidInput(format!(
                "Unknown post status: {}",
                s
            ))),
        }
    }
}

/// Outcome of one delivery attempt to one platform
///
/// Failures are local to their platform and never abort sibling
/// attempts; the orchestrator aggregates these into the post's result
/// map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub platform: PlatformId,
    pub success: bool,
    /// Platform-assigned post identifier (opaque)
    pub external_id: Option<String>,
    /// Canonical URL of the published post
    pub url: Option<String>,
    pub error: Option<String>,
    pub published_at: Option<i64>,
}

impl PublishOutcome {
    pub fn success(platform: PlatformId, external_id: String, url: String, now: i64) -> Self {
        Self {
            platform,
            success: true,
            external_id: Some(external_id),
            url: Some(url),
            error: None,
            published_at: Some(now),
        }
    }

    pub fn failure(platform: PlatformId, error: String) -> Self {
        Self {
            platform,
            success: false,
            external_id: None,
            url: None,
            error: Some(error),
            published_at: None,
        }
    }
}

/// One social-media submission
///
/// Posts are immutable value snapshots; state changes go through the
/// explicit transition functions below, which return the next snapshot
/// or reject the transition. Persistence stores snapshots and is
/// decoupled from transition logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub account_id: String,
    pub listing_id: String,
    pub content: String,
    pub images: Vec<String>,
    pub platforms: Vec<PlatformId>,
    pub status: PostStatus,
    pub publish_results: Vec<PublishOutcome>,
    pub scheduled_for: Option<i64>,
    pub published_at: Option<i64>,
    pub created_at: i64,
}

impl Post {
    /// Create a new draft post
    pub fn draft(
        account_id: String,
        listing_id: String,
        content: String,
        images: Vec<String>,
        platforms: Vec<PlatformId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            account_id,
            listing_id,
            content,
            images,
            platforms,
            status: PostStatus::Draft,
            publish_results: Vec::new(),
            scheduled_for: None,
            published_at: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// draft -> scheduled
    ///
    /// Requires a strictly future timestamp; anything else is a caller
    /// error, not a state transition.
    pub fn into_scheduled(self, scheduled_for: i64, now: i64) -> Result<Self> {
        if self.status != PostStatus::Draft {
            return Err(LotcastError::InvalidInput(format!(
                "Cannot schedule a {} post",
                self.status.as_str()
            )));
        }
        if scheduled_for <= now {
            return Err(LotcastError::InvalidInput(
                "Scheduled time must be in the future".to_string(),
            ));
        }
        Ok(Self {
            status: PostStatus::Scheduled,
            scheduled_for: Some(scheduled_for),
            ..self
        })
    }

    /// draft|scheduled -> publishing
    ///
    /// In-flight marker persisted before the fan-out starts, so an
    /// interrupted publish is distinguishable from a saved draft and
    /// can be swept to failed instead of lingering.
    pub fn into_publishing(self) -> Result<Self> {
        match self.status {
            PostStatus::Draft | PostStatus::Scheduled => Ok(Self {
                status: PostStatus::Publishing,
                ..self
            }),
            _ => Err(LotcastError::InvalidInput(format!(
                "Post {} is already {}",
                self.id,
                self.status.as_str()
            ))),
        }
    }

    /// draft|scheduled|publishing -> published|failed
    ///
    /// One success among the outcomes is enough to count the post as
    /// published; only a total failure marks it failed. A fired
    /// scheduled post drops its `scheduled_for` marker.
    pub fn into_resolved(self, results: Vec<PublishOutcome>, now: i64) -> Result<Self> {
        if self.status.is_terminal() {
            return Err(LotcastError::InvalidInput(format!(
                "Post {} is already {}",
                self.id,
                self.status.as_str()
            )));
        }
        let any_success = results.iter().any(|r| r.success);
        Ok(Self {
            status: if any_success {
                PostStatus::Published
            } else {
                PostStatus::Failed
            },
            published_at: if any_success { Some(now) } else { None },
            scheduled_for: None,
            publish_results: results,
            ..self
        })
    }

    /// Look up the outcome for one platform in the result map
    pub fn result_for(&self, platform: PlatformId) -> Option<&PublishOutcome> {
        self.publish_results.iter().find(|r| r.platform == platform)
    }

    /// True when at least one platform accepted the post
    pub fn any_success(&self) -> bool {
        self.publish_results.iter().any(|r| r.success)
    }
}

/// Credential material a publisher uses to act on the user's behalf
///
/// Connections are read-only during a publish attempt; tokens live in
/// `SecretString` so they are zeroed on drop and never show up in
/// Debug output or logs.
#[derive(Clone)]
pub struct PlatformConnection {
    pub id: String,
    pub account_id: String,
    pub platform: PlatformId,
    pub platform_user_id: String,
    pub platform_username: Option<String>,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// Unix seconds; None means the token never expires
    pub token_expires_at: Option<i64>,
    pub active: bool,
}

impl PlatformConnection {
    /// Token validity is a pure function of the clock vs. the expiry
    /// timestamp. No expiry recorded means perpetually valid.
    pub fn is_token_valid(&self, now: i64) -> bool {
        match self.token_expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

impl std::fmt::Debug for PlatformConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConnection")
            .field("id", &self.id)
            .field("account_id", &self.account_id)
            .field("platform", &self.platform)
            .field("platform_user_id", &self.platform_user_id)
            .field("active", &self.active)
            .field("token_expires_at", &self.token_expires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(expires_at: Option<i64>, active: bool) -> PlatformConnection {
        PlatformConnection {
            id: "conn-1".to_string(),
            account_id: "acct-1".to_string(),
            platform: PlatformId::Facebook,
            platform_user_id: "fb-user".to_string(),
            platform_username: None,
            access_token: SecretString::from("super-secret-value"),
            refresh_token: None,
            token_expires_at: expires_at,
            active,
        }
    }

    #[test]
    fn test_platform_id_from_str() {
        assert_eq!(
            "facebook".parse::<PlatformId>().unwrap(),
            PlatformId::Facebook
        );
        assert_eq!(
            "TWITTER".parse::<PlatformId>().unwrap(),
            PlatformId::Twitter
        );
        assert!("myspace".parse::<PlatformId>().is_err());
    }

    #[test]
    fn test_platform_id_round_trip() {
        for platform in PlatformId::ALL {
            assert_eq!(platform.as_str().parse::<PlatformId>().unwrap(), platform);
        }
    }

    #[test]
    fn test_listing_validate_rejects_empty_make() {
        let listing = Listing {
            make: "  ".to_string(),
            model: "Camry".to_string(),
            ..Default::default()
        };
        assert!(listing.validate().is_err());
    }

    #[test]
    fn test_listing_validate_accepts_minimal() {
        let listing = Listing {
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            ..Default::default()
        };
        assert!(listing.validate().is_ok());
    }

    #[test]
    fn test_generation_options_defaults() {
        let options = GenerationOptions::default();
        assert_eq!(options.tone, Tone::Professional);
        assert_eq!(options.length, Length::Medium);
        assert!(options.include_hashtags);
        assert!(options.include_emoji);
    }

    #[test]
    fn test_generation_options_defaults_from_empty_json() {
        let options: GenerationOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.tone, Tone::Professional);
        assert!(options.include_emoji);
    }

    #[test]
    fn test_post_draft_defaults() {
        let post = Post::draft(
            "acct-1".to_string(),
            "veh-1".to_string(),
            "content".to_string(),
            vec![],
            vec![PlatformId::Facebook],
        );
        assert_eq!(post.status, PostStatus::Draft);
        assert!(post.publish_results.is_empty());
        assert!(post.scheduled_for.is_none());
        assert!(post.published_at.is_none());
        assert!(Uuid::parse_str(&post.id).is_ok());
    }

    #[test]
    fn test_schedule_requires_future_timestamp() {
        let post = Post::draft(
            "acct-1".to_string(),
            "veh-1".to_string(),
            "content".to_string(),
            vec![],
            vec![PlatformId::Facebook],
        );
        let now = 1_700_000_000;
        assert!(post.clone().into_scheduled(now, now).is_err());
        let scheduled = post.into_scheduled(now + 3600, now).unwrap();
        assert_eq!(scheduled.status, PostStatus::Scheduled);
        assert_eq!(scheduled.scheduled_for, Some(now + 3600));
    }

    #[test]
    fn test_resolved_partial_success_is_published() {
        let post = Post::draft(
            "acct-1".to_string(),
            "veh-1".to_string(),
            "content".to_string(),
            vec![],
            vec![PlatformId::Facebook, PlatformId::Twitter],
        );
        let now = 1_700_000_000;
        let results = vec![
            PublishOutcome::success(
                PlatformId::Facebook,
                "fb_1".to_string(),
                "https://facebook.com/post/1".to_string(),
                now,
            ),
            PublishOutcome::failure(PlatformId::Twitter, "rate limited".to_string()),
        ];
        let resolved = post.into_resolved(results, now).unwrap();
        assert_eq!(resolved.status, PostStatus::Published);
        assert_eq!(resolved.published_at, Some(now));
        assert!(resolved.result_for(PlatformId::Facebook).unwrap().success);
        assert!(!resolved.result_for(PlatformId::Twitter).unwrap().success);
    }

    #[test]
    fn test_resolved_total_failure_is_failed() {
        let post = Post::draft(
            "acct-1".to_string(),
            "veh-1".to_string(),
            "content".to_string(),
            vec![],
            vec![PlatformId::Facebook],
        );
        let results = vec![PublishOutcome::failure(
            PlatformId::Facebook,
            "token expired".to_string(),
        )];
        let resolved = post.into_resolved(results, 1_700_000_000).unwrap();
        assert_eq!(resolved.status, PostStatus::Failed);
        assert!(resolved.published_at.is_none());
    }

    #[test]
    fn test_terminal_post_cannot_be_resolved_again() {
        let post = Post::draft(
            "acct-1".to_string(),
            "veh-1".to_string(),
            "content".to_string(),
            vec![],
            vec![PlatformId::Facebook],
        );
        let now = 1_700_000_000;
        let resolved = post
            .into_resolved(
                vec![PublishOutcome::success(
                    PlatformId::Facebook,
                    "fb_1".to_string(),
                    "https://facebook.com/post/1".to_string(),
                    now,
                )],
                now,
            )
            .unwrap();
        assert!(resolved.into_resolved(vec![], now).is_err());
    }

    #[test]
    fn test_fired_schedule_clears_scheduled_for() {
        let post = Post::draft(
            "acct-1".to_string(),
            "veh-1".to_string(),
            "content".to_string(),
            vec![],
            vec![PlatformId::Facebook],
        );
        let now = 1_700_000_000;
        let scheduled = post.into_scheduled(now + 60, now).unwrap();
        let fired = scheduled
            .into_resolved(
                vec![PublishOutcome::success(
                    PlatformId::Facebook,
                    "fb_1".to_string(),
                    "https://facebook.com/post/1".to_string(),
                    now + 60,
                )],
                now + 60,
            )
            .unwrap();
        assert_eq!(fired.status, PostStatus::Published);
        assert_eq!(fired.scheduled_for, None);
    }

    #[test]
    fn test_publishing_marker_transitions() {
        let post = Post::draft(
            "acct-1".to_string(),
            "veh-1".to_string(),
            "content".to_string(),
            vec![],
            vec![PlatformId::Facebook],
        );
        let publishing = post.into_publishing().unwrap();
        assert_eq!(publishing.status, PostStatus::Publishing);
        // In-flight posts cannot re-enter the in-flight state
        assert!(publishing.clone().into_publishing().is_err());
        let resolved = publishing
            .into_resolved(
                vec![PublishOutcome::failure(
                    PlatformId::Facebook,
                    "boom".to_string(),
                )],
                1_700_000_000,
            )
            .unwrap();
        assert_eq!(resolved.status, PostStatus::Failed);
    }

    #[test]
    fn test_token_validity_window() {
        let now = 1_700_000_000;
        assert!(connection(None, true).is_token_valid(now));
        assert!(connection(Some(now + 1), true).is_token_valid(now));
        assert!(!connection(Some(now), true).is_token_valid(now));
        assert!(!connection(Some(now - 1), true).is_token_valid(now));
    }

    #[test]
    fn test_connection_debug_hides_tokens() {
        let conn = connection(None, true);
        let debug = format!("{:?}", conn);
        assert!(!debug.contains("super-secret-value"));
    }

    #[test]
    fn test_post_status_serialization() {
        assert_eq!(
            serde_json::to_string(&PostStatus::Published).unwrap(),
            r#""published""#
        );
        let status: PostStatus = serde_json::from_str(r#""failed""#).unwrap();
        assert_eq!(status, PostStatus::Failed);
    }

    #[test]
    fn test_publish_outcome_serialization() {
        let outcome = PublishOutcome::success(
            PlatformId::Linkedin,
            "li_42".to_string(),
            "https://linkedin.com/feed/update/42".to_string(),
            1_700_000_000,
        );
        let json = serde_json::to_string(&outcome).unwrap();
        let back: PublishOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back.platform, PlatformId::Linkedin);
        assert!(back.success);
        assert_eq!(back.external_id, Some("li_42".to_string()));
    }
}
