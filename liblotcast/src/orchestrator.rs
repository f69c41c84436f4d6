//! Publish orchestration
//!
//! Ties the quota ledger, content generator, connection store, and
//! platform registry together into the single publish pipeline:
//! admission, content, concurrent fan-out, aggregation, and exactly
//! one quota charge when at least one platform accepted the post.
//!
//! The per-account quota lease is held across the whole attempt, so
//! two concurrent publishes for one account serialize at admission and
//! cannot both pass at the limit boundary.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::connections::ConnectionStore;
use crate::db::Database;
use crate::error::{LotcastError, PlatformError, Result};
use crate::generator::ContentGenerator;
use crate::platforms::{PlatformPublisher, PlatformRegistry};
use crate::quota::{QuotaLedger, QuotaUsage};
use crate::types::{
    GenerationOptions, Listing, PlatformId, Post, PostContent, PublishOutcome,
};

pub const DEFAULT_PLATFORM_TIMEOUT: Duration = Duration::from_secs(30);

/// One publish (or schedule) request
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub account_id: String,
    pub listing_id: String,
    pub listing: Listing,
    pub platforms: Vec<PlatformId>,
    /// Pre-written copy; when absent the generator produces it
    pub content: Option<String>,
    pub options: GenerationOptions,
}

/// Resolved post plus the account's quota position after the attempt
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub post: Post,
    pub usage: QuotaUsage,
}

pub struct PublishOrchestrator {
    ledger: Arc<QuotaLedger>,
    generator: ContentGenerator,
    registry: PlatformRegistry,
    connections: Arc<dyn ConnectionStore>,
    db: Database,
    platform_timeout: Duration,
}

impl PublishOrchestrator {
    pub fn new(
        ledger: Arc<QuotaLedger>,
        generator: ContentGenerator,
        registry: PlatformRegistry,
        connections: Arc<dyn ConnectionStore>,
        db: Database,
    ) -> Self {
        Self {
            ledger,
            generator,
            registry,
            connections,
            db,
            platform_timeout: DEFAULT_PLATFORM_TIMEOUT,
        }
    }

    pub fn with_platform_timeout(mut self, timeout: Duration) -> Self {
        self.platform_timeout = timeout;
        self
    }

    /// Generate post copy without publishing
    pub async fn generate(&self, listing: &Listing, options: &GenerationOptions) -> Result<String> {
        self.generator.generate(listing, options).await
    }

    /// Persist a draft without touching quota or platforms
    pub async fn save_draft(&self, request: PublishRequest) -> Result<Post> {
        let (_content, post) = self.prepare_post(&request).await?;
        self.db.create_post(&post).await?;
        Ok(post)
    }

    /// Publish immediately
    ///
    /// Request validation and quota admission run before any side
    /// effect; a rejected request leaves no post row and no quota
    /// movement. The quota is charged exactly once, after aggregation,
    /// and only when at least one platform succeeded.
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishReport> {
        self.validate_platforms(&request.platforms)?;
        let now = chrono::Utc::now().timestamp();

        // The lease serializes this account's publishes from admission
        // through consume
        let mut lease = self.ledger.lock(&request.account_id).await?;
        lease.admit(now)?;

        let (content, post) = self.prepare_post(&request).await?;
        let post = post.into_publishing()?;
        self.db.create_post(&post).await?;

        let results = self.fan_out(&request.account_id, &post.platforms, &content).await;

        let now = chrono::Utc::now().timestamp();
        let resolved = post.into_resolved(results, now)?;

        if resolved.any_success() {
            lease.consume(now, &resolved.id)?;
            self.db.save_quota(lease.quota()).await?;
            info!(post_id = %resolved.id, "post published");
        } else {
            warn!(post_id = %resolved.id, "all platforms failed, quota untouched");
        }

        self.db.update_post(&resolved).await?;
        let usage = lease.usage(now);
        Ok(PublishReport {
            post: resolved,
            usage,
        })
    }

    /// Store a post for later delivery
    ///
    /// Admission is checked for early feedback, but the quota is only
    /// charged when the post actually fires.
    pub async fn schedule(&self, request: PublishRequest, scheduled_for: i64) -> Result<Post> {
        self.validate_platforms(&request.platforms)?;
        let now = chrono::Utc::now().timestamp();
        if scheduled_for <= now {
            return Err(LotcastError::InvalidInput(
                "Scheduled time must be in the future".to_string(),
            ));
        }

        let mut lease = self.ledger.lock(&request.account_id).await?;
        lease.admit(now)?;
        drop(lease);

        let (_, post) = self.prepare_post(&request).await?;
        let post = post.into_scheduled(scheduled_for, now)?;
        self.db.create_post(&post).await?;
        info!(post_id = %post.id, scheduled_for, "post scheduled");
        Ok(post)
    }

    /// Fire one stored post (scheduled or draft)
    ///
    /// Admission is re-evaluated at fire time against the firing
    /// month's counter, not the scheduling month's.
    pub async fn publish_stored(&self, post_id: &str) -> Result<PublishReport> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| LotcastError::InvalidInput(format!("No such post: {}", post_id)))?;

        let now = chrono::Utc::now().timestamp();
        let mut lease = self.ledger.lock(&post.account_id).await?;
        lease.admit(now)?;

        let post = post.into_publishing()?;
        self.db.update_post(&post).await?;

        let content = PostContent::with_images(post.content.clone(), post.images.clone());
        let results = self.fan_out(&post.account_id, &post.platforms, &content).await;

        let now = chrono::Utc::now().timestamp();
        let resolved = post.into_resolved(results, now)?;

        if resolved.any_success() {
            lease.consume(now, &resolved.id)?;
            self.db.save_quota(lease.quota()).await?;
        }

        self.db.update_post(&resolved).await?;
        let usage = lease.usage(now);
        Ok(PublishReport {
            post: resolved,
            usage,
        })
    }

    /// Look up a post and its per-platform results
    pub async fn status(&self, post_id: &str) -> Result<Post> {
        self.db
            .get_post(post_id)
            .await?
            .ok_or_else(|| LotcastError::InvalidInput(format!("No such post: {}", post_id)))
    }

    /// An account's posts, newest first
    pub async fn history(
        &self,
        account_id: &str,
        status: Option<crate::types::PostStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>> {
        self.db.list_posts(account_id, status, limit, offset).await
    }

    /// Remove a post. Quota already charged for it stays charged.
    pub async fn delete(&self, post_id: &str) -> Result<()> {
        self.db.delete_post(post_id).await
    }

    /// Reject empty or unrecognized platform selections before any
    /// side effect
    fn validate_platforms(&self, platforms: &[PlatformId]) -> Result<()> {
        if platforms.is_empty() {
            return Err(LotcastError::InvalidInput(
                "At least one platform must be selected".to_string(),
            ));
        }
        for platform in platforms {
            if self.registry.get(*platform).is_none() {
                return Err(LotcastError::InvalidInput(format!(
                    "No publisher registered for platform: {}",
                    platform
                )));
            }
        }
        Ok(())
    }

    /// Resolve content and build the draft snapshot
    async fn prepare_post(&self, request: &PublishRequest) -> Result<(PostContent, Post)> {
        let text = match &request.content {
            Some(text) => {
                request.listing.validate()?;
                text.clone()
            }
            None => {
                self.generator
                    .generate(&request.listing, &request.options)
                    .await?
            }
        };

        let platforms = dedup_platforms(&request.platforms);
        let content = PostContent::with_images(text.clone(), request.listing.images.clone());
        let post = Post::draft(
            request.account_id.clone(),
            request.listing_id.clone(),
            text,
            request.listing.images.clone(),
            platforms,
        );
        Ok((content, post))
    }

    /// Deliver to every selected platform concurrently
    ///
    /// Every platform yields exactly one outcome. A missing or expired
    /// connection, a publisher error, and a timeout all fold into a
    /// failure outcome for that platform alone; siblings are never
    /// aborted.
    async fn fan_out(
        &self,
        account_id: &str,
        platforms: &[PlatformId],
        content: &PostContent,
    ) -> Vec<PublishOutcome> {
        let futures: Vec<_> = platforms
            .iter()
            .map(|&platform| {
                let content = content.clone();
                async move {
                    info!("Publishing to platform: {}", platform);
                    self.publish_one(account_id, platform, &content).await
                }
            })
            .collect();

        join_all(futures).await
    }

    async fn publish_one(
        &self,
        account_id: &str,
        platform: PlatformId,
        content: &PostContent,
    ) -> PublishOutcome {
        let publisher = match self.registry.get(platform) {
            Some(publisher) => publisher,
            // Selections are validated up front, so this only happens
            // when the registry changed mid-flight
            None => {
                return PublishOutcome::failure(
                    platform,
                    format!("No publisher registered for {}", platform),
                );
            }
        };

        let connection = match self.connections.connection(account_id, platform).await {
            Ok(Some(connection)) => connection,
            Ok(None) => {
                return self.fail(
                    platform,
                    PlatformError::Connection(format!("No {} connection for this account", platform)),
                );
            }
            Err(e) => {
                return PublishOutcome::failure(platform, e.to_string());
            }
        };

        if !connection.active {
            return self.fail(
                platform,
                PlatformError::Connection(format!("{} connection is disabled", platform)),
            );
        }

        let now = chrono::Utc::now().timestamp();
        if !connection.is_token_valid(now) {
            return self.fail(
                platform,
                PlatformError::Authentication(format!(
                    "{} access token has expired, please reconnect",
                    platform
                )),
            );
        }

        self.deliver(publisher, &connection, content).await
    }

    async fn deliver(
        &self,
        publisher: &dyn PlatformPublisher,
        connection: &crate::types::PlatformConnection,
        content: &PostContent,
    ) -> PublishOutcome {
        let platform = publisher.platform();
        match timeout(self.platform_timeout, publisher.publish(connection, content)).await {
            Ok(Ok(outcome)) => {
                info!("Successfully published to {}", platform);
                outcome
            }
            Ok(Err(e)) => {
                warn!("Failed to publish to {}: {}", platform, e);
                PublishOutcome::failure(platform, e.to_string())
            }
            Err(_) => self.fail(
                platform,
                PlatformError::Timeout(self.platform_timeout.as_secs()),
            ),
        }
    }

    fn fail(&self, platform: PlatformId, error: PlatformError) -> PublishOutcome {
        let error: LotcastError = error.into();
        warn!("Failed to publish to {}: {}", platform, error);
        PublishOutcome::failure(platform, error.to_string())
    }
}

/// Drop duplicate platform selections, keeping first-seen order
fn dedup_platforms(platforms: &[PlatformId]) -> Vec<PlatformId> {
    let mut seen = Vec::new();
    for &platform in platforms {
        if !seen.contains(&platform) {
            seen.push(platform);
        }
    }
    seen
}

/// Build a ledger hydrated from the persisted quota snapshots
pub async fn load_ledger(db: &Database, free_limit: u32) -> Result<QuotaLedger> {
    let ledger = QuotaLedger::new(free_limit);
    for quota in db.list_quotas().await? {
        ledger.register(quota);
    }
    Ok(ledger)
}
