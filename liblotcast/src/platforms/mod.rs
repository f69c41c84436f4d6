//! Platform delivery capability and implementations
//!
//! Each supported platform implements [`PlatformPublisher`]: one
//! connection plus normalized content in, one structured outcome out.
//! All platform-specific request shaping stays behind the trait, and a
//! failure in one publisher never affects another. The orchestrator
//! verifies connection preconditions before calling `publish`; the
//! publishers assume they hold.
//!
//! Platform selection goes through [`PlatformRegistry`], populated at
//! startup. Supporting a new platform means one new module and one
//! `register` call, not a branch edit.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::{PlatformError, Result};
use crate::types::{PlatformConnection, PlatformId, PostContent, PublishOutcome};

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod twitter;

// Mock publisher is available for all builds (not just tests) to
// support integration tests
pub mod mock;

/// Delivery capability for exactly one platform
#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    /// Which platform this publisher delivers to
    fn platform(&self) -> PlatformId;

    /// Hard character limit for post text, if the platform has one
    fn character_limit(&self) -> Option<usize> {
        None
    }

    /// Whether the platform refuses text-only posts
    fn requires_media(&self) -> bool {
        false
    }

    /// Check platform-local content constraints before delivery
    fn validate(&self, content: &PostContent) -> Result<()> {
        if let Some(limit) = self.character_limit() {
            let count = content.text.chars().count();
            if count > limit {
                return Err(PlatformError::Validation(format!(
                    "Content exceeds {}'s {} character limit (current: {} characters)",
                    self.platform(),
                    limit,
                    count
                ))
                .into());
            }
        }
        if self.requires_media() && content.images.is_empty() {
            return Err(PlatformError::Validation(format!(
                "{} requires at least one image",
                self.platform()
            ))
            .into());
        }
        Ok(())
    }

    /// Deliver the content on the user's behalf
    ///
    /// On success the outcome carries the platform-assigned post id
    /// and canonical URL. Errors are returned to the orchestrator,
    /// which folds them into a failure outcome for this platform only.
    async fn publish(
        &self,
        connection: &PlatformConnection,
        content: &PostContent,
    ) -> Result<PublishOutcome>;
}

/// Startup-time mapping from platform identifier to publisher
pub struct PlatformRegistry {
    publishers: HashMap<PlatformId, Box<dyn PlatformPublisher>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self {
            publishers: HashMap::new(),
        }
    }

    /// Registry with every built-in platform registered
    pub fn with_default_platforms() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(facebook::FacebookPublisher::new()));
        registry.register(Box::new(instagram::InstagramPublisher::new()));
        registry.register(Box::new(twitter::TwitterPublisher::new()));
        registry.register(Box::new(linkedin::LinkedinPublisher::new()));
        registry
    }

    pub fn register(&mut self, publisher: Box<dyn PlatformPublisher>) {
        self.publishers.insert(publisher.platform(), publisher);
    }

    pub fn get(&self, platform: PlatformId) -> Option<&dyn PlatformPublisher> {
        self.publishers.get(&platform).map(|p| p.as_ref())
    }

    pub fn platforms(&self) -> Vec<PlatformId> {
        let mut platforms: Vec<PlatformId> = self.publishers.keys().copied().collect();
        platforms.sort();
        platforms
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::with_default_platforms()
    }
}

/// Fabricate an external post id in the platform's id style
///
/// The concrete wire protocols are out of scope; delivery is simulated
/// after request shaping, the way the original integrations stubbed
/// their network calls.
pub(crate) fn simulated_post_id(prefix: &str) -> String {
    format!("{}_{}", prefix, chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_all_platforms() {
        let registry = PlatformRegistry::with_default_platforms();
        for platform in PlatformId::ALL {
            assert!(registry.get(platform).is_some(), "missing {}", platform);
        }
        assert_eq!(registry.platforms().len(), 4);
    }

    #[test]
    fn test_empty_registry() {
        let registry = PlatformRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(PlatformId::Facebook).is_none());
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = PlatformRegistry::with_default_platforms();
        registry.register(Box::new(mock::MockPublisher::success(PlatformId::Twitter)));
        assert_eq!(registry.platforms().len(), 4);
    }

    #[test]
    fn test_simulated_post_id_prefix() {
        let id = simulated_post_id("fb");
        assert!(id.starts_with("fb_"));
    }
}
