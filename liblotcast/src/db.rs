//! Database operations for Lotcast

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{DbError, Result};
use crate::quota::{AccountQuota, SubscriptionStatus, Tier};
use crate::types::{PlatformConnection, PlatformId, Post, PostStatus, PublishOutcome};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection, running migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if expanded_path != ":memory:" {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        // mode=rwc creates the database file if it doesn't exist;
        // forward slashes keep the URL valid on Windows too
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ========================================================================
    // Posts
    // ========================================================================

    /// Persist a new post snapshot
    pub async fn create_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, account_id, listing_id, content, images, platforms,
                               status, scheduled_for, published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.account_id)
        .bind(&post.listing_id)
        .bind(&post.content)
        .bind(serde_json::to_string(&post.images).unwrap_or_else(|_| "[]".to_string()))
        .bind(serde_json::to_string(&post.platforms).unwrap_or_else(|_| "[]".to_string()))
        .bind(post.status.as_str())
        .bind(post.scheduled_for)
        .bind(post.published_at)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Store an updated snapshot of an existing post, replacing its
    /// result rows with the snapshot's
    pub async fn update_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts
            SET content = ?, status = ?, scheduled_for = ?, published_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&post.content)
        .bind(post.status.as_str())
        .bind(post.scheduled_for)
        .bind(post.published_at)
        .bind(&post.id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        sqlx::query("DELETE FROM publish_results WHERE post_id = ?")
            .bind(&post.id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        for outcome in &post.publish_results {
            self.record_outcome(&post.id, outcome).await?;
        }

        Ok(())
    }

    async fn record_outcome(&self, post_id: &str, outcome: &PublishOutcome) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO publish_results (post_id, platform, success, external_id, url,
                                         error_message, published_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post_id)
        .bind(outcome.platform.as_str())
        .bind(outcome.success)
        .bind(&outcome.external_id)
        .bind(&outcome.url)
        .bind(&outcome.error)
        .bind(outcome.published_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Get a post by ID, with its per-platform results
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, listing_id, content, images, platforms,
                   status, scheduled_for, published_at, created_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut post = row_to_post(&row)?;
        post.publish_results = self.results_for(post_id).await?;
        Ok(Some(post))
    }

    async fn results_for(&self, post_id: &str) -> Result<Vec<PublishOutcome>> {
        let rows = sqlx::query(
            r#"
            SELECT platform, success, external_id, url, error_message, published_at
            FROM publish_results WHERE post_id = ? ORDER BY id
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter()
            .map(|row| {
                Ok(PublishOutcome {
                    platform: PlatformId::from_str(&row.get::<String, _>("platform"))?,
                    success: row.get("success"),
                    external_id: row.get("external_id"),
                    url: row.get("url"),
                    error: row.get("error_message"),
                    published_at: row.get("published_at"),
                })
            })
            .collect()
    }

    /// List an account's posts, newest first, optionally filtered by
    /// status, with limit/offset paging
    pub async fn list_posts(
        &self,
        account_id: &str,
        status: Option<PostStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    r#"
                    SELECT id, account_id, listing_id, content, images, platforms,
                           status, scheduled_for, published_at, created_at
                    FROM posts WHERE account_id = ? AND status = ?
                    ORDER BY created_at DESC LIMIT ? OFFSET ?
                    "#,
                )
                .bind(account_id)
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, account_id, listing_id, content, images, platforms,
                           status, scheduled_for, published_at, created_at
                    FROM posts WHERE account_id = ?
                    ORDER BY created_at DESC LIMIT ? OFFSET ?
                    "#,
                )
                .bind(account_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(DbError::SqlxError)?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut post = row_to_post(row)?;
            post.publish_results = self.results_for(&post.id).await?;
            posts.push(post);
        }
        Ok(posts)
    }

    /// Scheduled posts whose firing time has arrived
    pub async fn due_scheduled(&self, now: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, listing_id, content, images, platforms,
                   status, scheduled_for, published_at, created_at
            FROM posts WHERE status = 'scheduled' AND scheduled_for <= ?
            ORDER BY scheduled_for
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_post).collect()
    }

    /// Finalize posts stuck in the in-flight state
    ///
    /// A post left in `publishing` past the cutoff belongs to a dead
    /// or cancelled publish; it is resolved to failed so nothing stays
    /// in limbo. Whatever partial results were recorded are kept.
    pub async fn fail_abandoned_posts(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET status = 'failed'
            WHERE status = 'publishing' AND created_at < ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected())
    }

    /// Delete a post. No quota side effects.
    pub async fn delete_post(&self, post_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM publish_results WHERE post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(())
    }

    // ========================================================================
    // Quotas
    // ========================================================================

    /// Store a quota snapshot
    pub async fn save_quota(&self, quota: &AccountQuota) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO quotas (account_id, tier, status, posts_this_period, post_limit, period_anchor)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                tier = excluded.tier,
                status = excluded.status,
                posts_this_period = excluded.posts_this_period,
                post_limit = excluded.post_limit,
                period_anchor = excluded.period_anchor
            "#,
        )
        .bind(&quota.account_id)
        .bind(quota.tier.as_str())
        .bind(quota.status.as_str())
        .bind(quota.posts_this_period)
        .bind(quota.post_limit)
        .bind(quota.period_anchor)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_quota(&self, account_id: &str) -> Result<Option<AccountQuota>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, tier, status, posts_this_period, post_limit, period_anchor
            FROM quotas WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_quota).transpose()
    }

    /// Every stored quota, for ledger hydration at startup
    pub async fn list_quotas(&self) -> Result<Vec<AccountQuota>> {
        let rows = sqlx::query(
            r#"
            SELECT account_id, tier, status, posts_this_period, post_limit, period_anchor
            FROM quotas
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_quota).collect()
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Insert or replace an account's connection for one platform
    pub async fn upsert_connection(&self, connection: &PlatformConnection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO connections (id, account_id, platform, platform_user_id,
                                     platform_username, access_token, refresh_token,
                                     token_expires_at, active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id, platform) DO UPDATE SET
                platform_user_id = excluded.platform_user_id,
                platform_username = excluded.platform_username,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_expires_at = excluded.token_expires_at,
                active = excluded.active
            "#,
        )
        .bind(&connection.id)
        .bind(&connection.account_id)
        .bind(connection.platform.as_str())
        .bind(&connection.platform_user_id)
        .bind(&connection.platform_username)
        .bind(connection.access_token.expose_secret())
        .bind(
            connection
                .refresh_token
                .as_ref()
                .map(|token| token.expose_secret().to_string()),
        )
        .bind(connection.token_expires_at)
        .bind(connection.active)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_connection(
        &self,
        account_id: &str,
        platform: PlatformId,
    ) -> Result<Option<PlatformConnection>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, platform, platform_user_id, platform_username,
                   access_token, refresh_token, token_expires_at, active
            FROM connections WHERE account_id = ? AND platform = ?
            "#,
        )
        .bind(account_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_connection).transpose()
    }
}

fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let images: Vec<String> =
        serde_json::from_str(&row.get::<String, _>("images")).unwrap_or_default();
    let platforms: Vec<PlatformId> =
        serde_json::from_str(&row.get::<String, _>("platforms")).unwrap_or_default();

    Ok(Post {
        id: row.get("id"),
        account_id: row.get("account_id"),
        listing_id: row.get("listing_id"),
        content: row.get("content"),
        images,
        platforms,
        status: PostStatus::from_str(&row.get::<String, _>("status"))?,
        publish_results: Vec::new(),
        scheduled_for: row.get("scheduled_for"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
    })
}

fn row_to_quota(row: &sqlx::sqlite::SqliteRow) -> Result<AccountQuota> {
    Ok(AccountQuota {
        account_id: row.get("account_id"),
        tier: Tier::from_str(&row.get::<String, _>("tier"))?,
        status: SubscriptionStatus::from_str(&row.get::<String, _>("status"))?,
        posts_this_period: row.get::<i64, _>("posts_this_period") as u32,
        post_limit: row
            .get::<Option<i64>, _>("post_limit")
            .map(|limit| limit as u32),
        period_anchor: row.get("period_anchor"),
    })
}

fn row_to_connection(row: &sqlx::sqlite::SqliteRow) -> Result<PlatformConnection> {
    Ok(PlatformConnection {
        id: row.get("id"),
        account_id: row.get("account_id"),
        platform: PlatformId::from_str(&row.get::<String, _>("platform"))?,
        platform_user_id: row.get("platform_user_id"),
        platform_username: row.get("platform_username"),
        access_token: SecretString::from(row.get::<String, _>("access_token")),
        refresh_token: row
            .get::<Option<String>, _>("refresh_token")
            .map(SecretString::from),
        token_expires_at: row.get("token_expires_at"),
        active: row.get("active"),
    })
}
