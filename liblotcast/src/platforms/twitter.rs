//! Twitter publisher
//!
//! Enforces the 280 character limit before shaping a v2 tweet request.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::error::Result;
use crate::platforms::{simulated_post_id, PlatformPublisher};
use crate::types::{PlatformConnection, PlatformId, PostContent, PublishOutcome};

pub const CHARACTER_LIMIT: usize = 280;

pub struct TwitterPublisher;

impl TwitterPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TwitterPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformPublisher for TwitterPublisher {
    fn platform(&self) -> PlatformId {
        PlatformId::Twitter
    }

    fn character_limit(&self) -> Option<usize> {
        Some(CHARACTER_LIMIT)
    }

    async fn publish(
        &self,
        _connection: &PlatformConnection,
        content: &PostContent,
    ) -> Result<PublishOutcome> {
        self.validate(content)?;

        // API v2 /tweets payload
        let payload = json!({
            "text": content.text,
        });
        debug!(payload = %payload, "twitter request shaped");

        info!("Publishing to twitter");
        let post_id = simulated_post_id("tw");
        let url = format!("https://twitter.com/status/{}", post_id);
        Ok(PublishOutcome::success(
            self.platform(),
            post_id,
            url,
            chrono::Utc::now().timestamp(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LotcastError, PlatformError};
    use secrecy::SecretString;

    fn connection() -> PlatformConnection {
        PlatformConnection {
            id: "conn-tw".to_string(),
            account_id: "acct-1".to_string(),
            platform: PlatformId::Twitter,
            platform_user_id: "tw-user".to_string(),
            platform_username: None,
            access_token: SecretString::from("tw-token"),
            refresh_token: None,
            token_expires_at: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_over_limit_content_is_rejected() {
        let publisher = TwitterPublisher::new();
        let content = PostContent::new("x".repeat(CHARACTER_LIMIT + 1));
        let result = publisher.publish(&connection(), &content).await;

        match result {
            Err(LotcastError::Platform(PlatformError::Validation(msg))) => {
                assert!(msg.contains("280"));
            }
            other => panic!("Expected validation error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_at_limit_content_is_accepted() {
        let publisher = TwitterPublisher::new();
        let content = PostContent::new("x".repeat(CHARACTER_LIMIT));
        let outcome = publisher.publish(&connection(), &content).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.external_id.unwrap().starts_with("tw_"));
    }
}
