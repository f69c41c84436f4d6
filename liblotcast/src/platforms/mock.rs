//! Mock publisher for testing
//!
//! Configurable success, failure, and latency so fan-out behavior can
//! be exercised without real platform integrations. Call counts and
//! delivered content are recorded for verification.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::PlatformPublisher;
use crate::types::{PlatformConnection, PlatformId, PostContent, PublishOutcome};

#[derive(Clone)]
pub struct MockConfig {
    pub platform: PlatformId,
    /// Whether publishing should succeed
    pub succeeds: bool,
    /// Error to return on failure
    pub error: Option<PlatformError>,
    /// Delay before completing (simulates platform latency)
    pub delay: Duration,
    /// Number of publish calls so far
    pub publish_calls: Arc<Mutex<usize>>,
    /// Content delivered through this publisher
    pub delivered: Arc<Mutex<Vec<String>>>,
}

impl MockConfig {
    fn new(platform: PlatformId) -> Self {
        Self {
            platform,
            succeeds: true,
            error: None,
            delay: Duration::from_millis(0),
            publish_calls: Arc::new(Mutex::new(0)),
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub struct MockPublisher {
    config: MockConfig,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A publisher that always succeeds
    pub fn success(platform: PlatformId) -> Self {
        Self::new(MockConfig::new(platform))
    }

    /// A publisher that always fails with the given error
    pub fn failure(platform: PlatformId, error: PlatformError) -> Self {
        Self::new(MockConfig {
            succeeds: false,
            error: Some(error),
            ..MockConfig::new(platform)
        })
    }

    /// A publisher that sleeps before answering
    pub fn with_delay(platform: PlatformId, delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..MockConfig::new(platform)
        })
    }

    pub fn publish_calls(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.config.publish_calls)
    }

    pub fn delivered(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.config.delivered)
    }
}

#[async_trait]
impl PlatformPublisher for MockPublisher {
    fn platform(&self) -> PlatformId {
        self.config.platform
    }

    async fn publish(
        &self,
        _connection: &PlatformConnection,
        content: &PostContent,
    ) -> Result<PublishOutcome> {
        *self
            .config
            .publish_calls
            .lock()
            .expect("mock call counter poisoned") += 1;

        if self.config.delay > Duration::from_millis(0) {
            sleep(self.config.delay).await;
        }

        if !self.config.succeeds {
            let error = self
                .config
                .error
                .clone()
                .unwrap_or_else(|| PlatformError::Posting("mock failure".to_string()));
            return Err(error.into());
        }

        self.config
            .delivered
            .lock()
            .expect("mock delivery log poisoned")
            .push(content.text.clone());

        let platform = self.config.platform;
        Ok(PublishOutcome::success(
            platform,
            format!("{}_mock_1", platform.as_str()),
            format!("https://{}.example.com/mock_1", platform.as_str()),
            chrono::Utc::now().timestamp(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn connection(platform: PlatformId) -> PlatformConnection {
        PlatformConnection {
            id: format!("conn-{}", platform),
            account_id: "acct-1".to_string(),
            platform,
            platform_user_id: "user".to_string(),
            platform_username: None,
            access_token: SecretString::from("token-value"),
            refresh_token: None,
            token_expires_at: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_success_mock_records_delivery() {
        let publisher = MockPublisher::success(PlatformId::Facebook);
        let calls = publisher.publish_calls();
        let delivered = publisher.delivered();

        let outcome = publisher
            .publish(
                &connection(PlatformId::Facebook),
                &PostContent::new("hello".to_string()),
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(delivered.lock().unwrap().as_slice(), ["hello"]);
    }

    #[tokio::test]
    async fn test_failure_mock_returns_configured_error() {
        let publisher = MockPublisher::failure(
            PlatformId::Twitter,
            PlatformError::RateLimit("slow down".to_string()),
        );
        let result = publisher
            .publish(
                &connection(PlatformId::Twitter),
                &PostContent::new("hello".to_string()),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(*publisher.publish_calls().lock().unwrap(), 1);
    }
}
