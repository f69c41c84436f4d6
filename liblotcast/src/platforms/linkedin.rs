//! LinkedIn publisher
//!
//! Shapes a UGC share request addressed by the connection's member id.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::error::Result;
use crate::platforms::{simulated_post_id, PlatformPublisher};
use crate::types::{PlatformConnection, PlatformId, PostContent, PublishOutcome};

pub struct LinkedinPublisher;

impl LinkedinPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinkedinPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformPublisher for LinkedinPublisher {
    fn platform(&self) -> PlatformId {
        PlatformId::Linkedin
    }

    fn character_limit(&self) -> Option<usize> {
        Some(3000)
    }

    async fn publish(
        &self,
        connection: &PlatformConnection,
        content: &PostContent,
    ) -> Result<PublishOutcome> {
        self.validate(content)?;

        // /v2/ugcPosts payload, public visibility
        let payload = json!({
            "author": format!("urn:li:person:{}", connection.platform_user_id),
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": content.text },
                    "shareMediaCategory": "NONE",
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
            }
        });
        debug!(payload = %payload, "linkedin request shaped");

        info!("Publishing to linkedin");
        let post_id = simulated_post_id("li");
        let url = format!("https://linkedin.com/feed/update/{}", post_id);
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

    #[tokio::test]
    async fn test_publish_addresses_member_urn() {
        let publisher = LinkedinPublisher::new();
        let connection = PlatformConnection {
            id: "conn-li".to_string(),
            account_id: "acct-1".to_string(),
            platform: PlatformId::Linkedin,
            platform_user_id: "li-member-9".to_string(),
            platform_username: None,
            access_token: SecretString::from("li-token"),
            refresh_token: None,
            token_expires_at: None,
            active: true,
        };
        let outcome = publisher
            .publish(&connection, &PostContent::new("New arrival".to_string()))
            .await
            .unwrap();
        assert_eq!(outcome.platform, PlatformId::Linkedin);
        assert!(outcome.success);
        assert!(outcome.url.unwrap().starts_with("https://linkedin.com/"));
    }
}
