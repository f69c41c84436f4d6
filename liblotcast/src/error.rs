//! Error types for Lotcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotcastError>;

#[derive(Error, Debug)]
pub enum LotcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LotcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            LotcastError::InvalidInput(_) => 3,
            LotcastError::Quota(QuotaError::Exhausted { .. }) => 4,
            LotcastError::Quota(_) => 4,
            LotcastError::Platform(PlatformError::Authentication(_)) => 2,
            LotcastError::Platform(_) => 1,
            LotcastError::Config(_) => 1,
            LotcastError::Database(_) => 1,
            LotcastError::Generation(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Admission errors from the quota ledger
///
/// These are rejected before any platform is contacted and are fully
/// recoverable by the caller (upgrade tier, wait for period rollover).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    #[error("Post limit reached for this period: {used} of {limit} used")]
    Exhausted { limit: u32, used: u32 },

    #[error("No active subscription for account {0}")]
    NoActiveSubscription(String),

    #[error("Quota already consumed for post {0}")]
    AlreadyConsumed(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    /// No active connection, or token expired. Checked before any
    /// delivery is attempted.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Delivery timed out after {0}s")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = LotcastError::InvalidInput("Empty platform set".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_quota_exhausted() {
        let error = LotcastError::Quota(QuotaError::Exhausted { limit: 10, used: 10 });
        assert_eq!(error.exit_code(), 4);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = LotcastError::Platform(PlatformError::Authentication(
            "Invalid token".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_posting_error() {
        let error = LotcastError::Platform(PlatformError::Posting("Network timeout".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_config_error() {
        let error = LotcastError::Config(ConfigError::MissingField("database.path".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_quota_exhausted_carries_limit_and_used() {
        let error = QuotaError::Exhausted { limit: 10, used: 10 };
        let message = format!("{}", error);
        assert!(message.contains("10 of 10"));
    }

    #[test]
    fn test_quota_exhausted_renders_n_of_m() {
        let error = QuotaError::Exhausted { limit: 25, used: 7 };
        assert_eq!(
            format!("{}", error),
            "Post limit reached for this period: 7 of 25 used"
        );
    }

    #[test]
    fn test_error_message_formatting_connection() {
        let error = LotcastError::Platform(PlatformError::Connection(
            "No active connection for instagram".to_string(),
        ));
        assert_eq!(
            format!("{}", error),
            "Platform error: Connection error: No active connection for instagram"
        );
    }

    #[test]
    fn test_error_message_formatting_timeout() {
        let error = PlatformError::Timeout(30);
        assert_eq!(format!("{}", error), "Delivery timed out after 30s");
    }

    #[test]
    fn test_error_conversion_from_quota_error() {
        let quota_error = QuotaError::NoActiveSubscription("acct-1".to_string());
        let error: LotcastError = quota_error.into();
        assert!(matches!(error, LotcastError::Quota(_)));
    }

    #[test]
    fn test_error_conversion_from_platform_error() {
        let platform_error = PlatformError::Posting("test".to_string());
        let error: LotcastError = platform_error.into();
        assert!(matches!(error, LotcastError::Platform(_)));
    }

    #[test]
    fn test_already_consumed_carries_post_id() {
        let error = QuotaError::AlreadyConsumed("post-123".to_string());
        assert!(format!("{}", error).contains("post-123"));
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();
        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
