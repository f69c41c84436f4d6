//! Instagram publisher
//!
//! Instagram refuses text-only posts, so at least one image is a hard
//! content constraint here, not an orchestrator concern.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::error::Result;
use crate::platforms::{simulated_post_id, PlatformPublisher};
use crate::types::{PlatformConnection, PlatformId, PostContent, PublishOutcome};

pub struct InstagramPublisher;

impl InstagramPublisher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InstagramPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformPublisher for InstagramPublisher {
    fn platform(&self) -> PlatformId {
        PlatformId::Instagram
    }

    fn requires_media(&self) -> bool {
        true
    }

    fn character_limit(&self) -> Option<usize> {
        Some(2200)
    }

    async fn publish(
        &self,
        _connection: &PlatformConnection,
        content: &PostContent,
    ) -> Result<PublishOutcome> {
        self.validate(content)?;

        // Graph API media container: caption plus the first image
        let payload = json!({
            "caption": content.text,
            "image_url": content.images[0],
        });
        debug!(payload = %payload, "instagram request shaped");

        info!("Publishing to instagram");
        let post_id = simulated_post_id("ig");
        let url = format!("https://instagram.com/p/{}", post_id);
        Ok(PublishOutcome::success(
            self.platform(),
            post_id,
            url,
            chrono::Utc::now().timestamp(),
        ))
    }
}
