//! Facebook publisher
//!
//! Shapes a Graph API feed request. Actual delivery is simulated; the
//! wire protocol stays out of scope.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::error::Result;
use crate::platforms::{simulated_post_id, PlatformPublisher};
use crate::types::{PlatformConnection, PlatformId, PostContent, PublishOutcome};

pub struct FacebookPublisher;

impl FacebookPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FacebookPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformPublisher for FacebookPublisher {
    fn platform(&self) -> PlatformId {
        PlatformId::Facebook
    }

    async fn publish(
        &self,
        _connection: &PlatformConnection,
        content: &PostContent,
    ) -> Result<PublishOutcome> {
        self.validate(content)?;

        // Graph API /me/feed payload; token is attached at send time
        let payload = json!({
            "message": content.text,
        });
        debug!(payload = %payload, "facebook request shaped");

        info!("Publishing to facebook");
        let post_id = simulated_post_id("fb");
        let url = format!("https://facebook.com/post/{}", post_id);
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
    use secrecy::SecretString;

    fn connection() -> PlatformConnection {
        PlatformConnection {
            id: "conn-fb".to_string(),
            account_id: "acct-1".to_string(),
            platform: PlatformId::Facebook,
            platform_user_id: "fb-user".to_string(),
            platform_username: Some("dealer".to_string()),
            access_token: SecretString::from("fb-token"),
            refresh_token: None,
            token_expires_at: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_publish_returns_success_outcome() {
        let publisher = FacebookPublisher::new();
        let outcome = publisher
            .publish(&connection(), &PostContent::new("Great car!".to_string()))
            .await
            .unwrap();

        assert_eq!(outcome.platform, PlatformId::Facebook);
        assert!(outcome.success);
        let external_id = outcome.external_id.unwrap();
        assert!(external_id.starts_with("fb_"));
        assert!(outcome.url.unwrap().contains(&external_id));
        assert!(outcome.published_at.is_some());
    }

    #[test]
    fn test_no_character_limit() {
        assert_eq!(FacebookPublisher::new().character_limit(), None);
    }
}
