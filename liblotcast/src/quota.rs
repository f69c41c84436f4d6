//! Per-account monthly publish quota
//!
//! The ledger gates post creation per billing period. Counters roll
//! over lazily on each evaluation when the calendar month of the
//! period anchor differs from the wall clock; there is no background
//! reset job. The check-then-increment sequence is the ledger's
//! critical section: callers hold an [`AccountLease`] across the whole
//! publish attempt so two concurrent publishes for one account cannot
//! both pass admission at the limit boundary.

use chrono::{Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{LotcastError, QuotaError, Result};

/// Default post limit for the free tier
pub const DEFAULT_FREE_POST_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Premium => "premium",
        }
    }
}

impl FromStr for Tier {
    type Err = LotcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "free" => Ok(Tier::Free),
            "premium" => Ok(Tier::Premium),
            _ => Err(LotcastError::InvalidInput(format!("Unknown tier: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = LotcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            _ => Err(LotcastError::InvalidInput(format!(
                "Unknown subscription status: {}",
                s
            ))),
        }
    }
}

/// Immutable quota snapshot for one account
///
/// `post_limit` of `None` is the unbounded sentinel used by premium.
/// Transition functions return the next snapshot; the ledger stores
/// whatever the transition produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountQuota {
    pub account_id: String,
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub posts_this_period: u32,
    pub post_limit: Option<u32>,
    /// Start of the current counting period, unix seconds
    pub period_anchor: i64,
}

impl AccountQuota {
    /// Free-tier defaults, as created alongside the account at signup
    pub fn free(account_id: String, now: i64, post_limit: u32) -> Self {
        Self {
            account_id,
            tier: Tier::Free,
            status: SubscriptionStatus::Active,
            posts_this_period: 0,
            post_limit: Some(post_limit),
            period_anchor: now,
        }
    }

    /// Apply the lazy calendar-month rollover
    ///
    /// Resets the counter and advances the anchor whenever the wall
    /// clock's month or year differs from the anchor's. Part of every
    /// evaluation, so a stale counter can never block a new period.
    pub fn rolled_over(self, now: i64) -> Self {
        let anchor = Utc.timestamp_opt(self.period_anchor, 0).single();
        let current = Utc.timestamp_opt(now, 0).single();
        match (anchor, current) {
            (Some(anchor), Some(current))
                if anchor.month() == current.month() && anchor.year() == current.year() =>
            {
                self
            }
            _ => Self {
                posts_this_period: 0,
                period_anchor: now,
                ..self
            },
        }
    }

    /// True when a publish may be admitted. Premium is never blocked.
    pub fn can_consume(&self) -> bool {
        match self.post_limit {
            None => true,
            Some(limit) => self.posts_this_period < limit,
        }
    }

    fn consumed(self) -> Self {
        Self {
            posts_this_period: self.posts_this_period + 1,
            ..self
        }
    }

    /// Tier change: tier, limit, and status move together
    pub fn upgraded(self) -> Self {
        Self {
            tier: Tier::Premium,
            post_limit: None,
            status: SubscriptionStatus::Active,
            ..self
        }
    }

    /// Tier change: cancellation always reverts to the free default
    pub fn cancelled(self, free_limit: u32) -> Self {
        Self {
            tier: Tier::Free,
            post_limit: Some(free_limit),
            status: SubscriptionStatus::Cancelled,
            ..self
        }
    }

    /// First instant of the month after the current period
    pub fn period_resets_at(&self) -> i64 {
        let anchor = Utc
            .timestamp_opt(self.period_anchor, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let (year, month) = if anchor.month() == 12 {
            (anchor.year() + 1, 1)
        } else {
            (anchor.year(), anchor.month() + 1)
        };
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .map(|dt| dt.timestamp())
            .unwrap_or(self.period_anchor)
    }
}

/// Usage report for "N of M used" rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub tier: Tier,
    pub used: u32,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub resets_at: i64,
}

struct AccountEntry {
    quota: AccountQuota,
    /// Post ids already charged, so a double `consume` for one post is
    /// detectable as a caller bug instead of a silent double increment.
    consumed_posts: HashSet<String>,
}

/// Exclusive lease on one account's quota state
///
/// Held across the entire publish attempt: admission check, fan-out,
/// and the single post-aggregation `consume`.
pub struct AccountLease {
    guard: OwnedMutexGuard<AccountEntry>,
}

impl AccountLease {
    /// Evaluate admission, applying rollover as part of the check
    ///
    /// The rollover mutation lands even when the answer is `false`, so
    /// this is a read-with-side-effect, not a pure read.
    pub fn can_consume(&mut self, now: i64) -> bool {
        let quota = self.guard.quota.clone().rolled_over(now);
        let admitted = quota.can_consume();
        self.guard.quota = quota;
        admitted
    }

    /// Admission gate with a typed, user-actionable rejection
    pub fn admit(&mut self, now: i64) -> std::result::Result<(), QuotaError> {
        if self.guard.quota.status == SubscriptionStatus::Expired {
            return Err(QuotaError::NoActiveSubscription(
                self.guard.quota.account_id.clone(),
            ));
        }
        if self.can_consume(now) {
            Ok(())
        } else {
            Err(QuotaError::Exhausted {
                limit: self.guard.quota.post_limit.unwrap_or(0),
                used: self.guard.quota.posts_this_period,
            })
        }
    }

    /// Charge exactly one publish against the period
    ///
    /// Called once per published post, never per platform. Not
    /// idempotent: a second call for the same post id is rejected.
    pub fn consume(&mut self, now: i64, post_id: &str) -> std::result::Result<(), QuotaError> {
        if self.guard.consumed_posts.contains(post_id) {
            return Err(QuotaError::AlreadyConsumed(post_id.to_string()));
        }
        let quota = self.guard.quota.clone().rolled_over(now);
        if !quota.can_consume() {
            // Admission runs under this same lease, so hitting the
            // limit here means the caller skipped it.
            return Err(QuotaError::Exhausted {
                limit: quota.post_limit.unwrap_or(0),
                used: quota.posts_this_period,
            });
        }
        self.guard.quota = quota.consumed();
        self.guard.consumed_posts.insert(post_id.to_string());
        debug!(
            account = %self.guard.quota.account_id,
            used = self.guard.quota.posts_this_period,
            "quota consumed"
        );
        Ok(())
    }

    pub fn upgrade(&mut self) {
        self.guard.quota = self.guard.quota.clone().upgraded();
    }

    pub fn cancel(&mut self, free_limit: u32) {
        self.guard.quota = self.guard.quota.clone().cancelled(free_limit);
    }

    /// Current snapshot, for persistence
    pub fn quota(&self) -> &AccountQuota {
        &self.guard.quota
    }

    pub fn usage(&mut self, now: i64) -> QuotaUsage {
        let quota = self.guard.quota.clone().rolled_over(now);
        self.guard.quota = quota.clone();
        QuotaUsage {
            tier: quota.tier,
            used: quota.posts_this_period,
            limit: quota.post_limit,
            remaining: quota
                .post_limit
                .map(|limit| limit.saturating_sub(quota.posts_this_period)),
            resets_at: quota.period_resets_at(),
        }
    }
}

/// In-memory quota ledger, one lock per account
pub struct QuotaLedger {
    accounts: StdMutex<HashMap<String, Arc<Mutex<AccountEntry>>>>,
    free_limit: u32,
}

impl QuotaLedger {
    pub fn new(free_limit: u32) -> Self {
        Self {
            accounts: StdMutex::new(HashMap::new()),
            free_limit,
        }
    }

    pub fn free_limit(&self) -> u32 {
        self.free_limit
    }

    /// Register (or replace) an account's quota snapshot
    pub fn register(&self, quota: AccountQuota) {
        let mut accounts = self.accounts.lock().expect("quota ledger map poisoned");
        accounts.insert(
            quota.account_id.clone(),
            Arc::new(Mutex::new(AccountEntry {
                quota,
                consumed_posts: HashSet::new(),
            })),
        );
    }

    /// Register an account with free-tier signup defaults
    pub fn register_free(&self, account_id: &str, now: i64) {
        self.register(AccountQuota::free(
            account_id.to_string(),
            now,
            self.free_limit,
        ));
    }

    /// Take the exclusive per-account lease
    ///
    /// An unknown account is indistinguishable from one with no
    /// subscription and is rejected the same way.
    pub async fn lock(&self, account_id: &str) -> Result<AccountLease> {
        let entry = {
            let accounts = self.accounts.lock().expect("quota ledger map poisoned");
            accounts.get(account_id).cloned()
        };
        let entry =
            entry.ok_or_else(|| QuotaError::NoActiveSubscription(account_id.to_string()))?;
        Ok(AccountLease {
            guard: entry.lock_owned().await,
        })
    }

    /// Convenience usage lookup without holding the lease
    pub async fn usage(&self, account_id: &str, now: i64) -> Result<QuotaUsage> {
        let mut lease = self.lock(account_id).await?;
        Ok(lease.usage(now))
    }
}
