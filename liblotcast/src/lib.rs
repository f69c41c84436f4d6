//! Lotcast - vehicle listing to social media publishing
//!
//! This library turns structured vehicle listings into platform-ready
//! post copy and delivers it to the connected social platforms, under
//! a per-account monthly publish quota.

pub mod config;
pub mod connections;
pub mod db;
pub mod error;
pub mod generator;
pub mod logging;
pub mod orchestrator;
pub mod platforms;
pub mod quota;
pub mod scheduling;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use connections::{ConnectionStore, MemoryConnectionStore};
pub use db::Database;
pub use error::{LotcastError, Result};
pub use generator::ContentGenerator;
pub use orchestrator::{PublishOrchestrator, PublishReport, PublishRequest};
pub use platforms::{PlatformPublisher, PlatformRegistry};
pub use quota::{AccountQuota, QuotaLedger, QuotaUsage};
pub use types::{
    GenerationOptions, Length, Listing, PlatformConnection, PlatformId, Post, PostContent,
    PostStatus, PublishOutcome, Tone,
};
