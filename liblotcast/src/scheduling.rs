//! Scheduling and time parsing utilities
//!
//! Parses human-readable firing times for scheduled posts.

use crate::{LotcastError, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

const MIN_RANDOM_SECONDS: i64 = 30;
const MAX_RANDOM_SECONDS: i64 = 30 * 24 * 3600; // 30 days

/// Parse a schedule string into a DateTime
///
/// Supports multiple formats:
/// - Relative durations: "1h", "30m", "2d"
/// - Natural language: "tomorrow", "next monday 10am"
/// - Absolute RFC 3339 times: "2026-09-01T09:00:00Z"
/// - Random intervals: "random:10m-20m" (spaces out batch posting)
///
/// # Errors
///
/// Returns an error if the time format is invalid or cannot be parsed.
pub fn parse_schedule(input: &str, last_scheduled: Option<i64>) -> Result<DateTime<Utc>> {
    if input.is_empty() {
        return Err(LotcastError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if input.starts_with("random:") {
        return parse_random_schedule(input, last_scheduled);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(duration) = parse_duration(input) {
        return Ok(Utc::now() + duration);
    }

    if let Ok(dt) = parse_natural_language(input) {
        return Ok(dt);
    }

    Err(LotcastError::InvalidInput(format!(
        "Could not parse schedule string: {}",
        input
    )))
}

/// Parse a duration string into a chrono::Duration
fn parse_duration(input: &str) -> Result<Duration> {
    if let Ok(std_duration) = humantime::parse_duration(input) {
        let seconds = std_duration.as_secs() as i64;
        return Duration::try_seconds(seconds)
            .ok_or_else(|| LotcastError::InvalidInput("Duration out of range".to_string()));
    }

    Err(LotcastError::InvalidInput(format!(
        "Could not parse duration: {}",
        input
    )))
}

/// Parse natural language time expression
fn parse_natural_language(input: &str) -> Result<DateTime<Utc>> {
    chrono_english::parse_date_string(input, Utc::now(), chrono_english::Dialect::Us)
        .map_err(|e| LotcastError::InvalidInput(format!("Could not parse time: {}", e)))
}

/// Parse random schedule format: "random:MIN-MAX"
fn parse_random_schedule(input: &str, last_scheduled: Option<i64>) -> Result<DateTime<Utc>> {
    let range_part = input
        .strip_prefix("random:")
        .ok_or_else(|| LotcastError::InvalidInput("Invalid random format".to_string()))?;

    let (min_str, max_str) = parse_random_range(range_part)?;
    let min_duration = parse_duration(min_str)?;
    let max_duration = parse_duration(max_str)?;

    validate_random_range(min_duration, max_duration)?;

    // Chain off the previous firing time so batches spread out instead
    // of all landing in the same window
    let base_time = match last_scheduled {
        Some(timestamp) => DateTime::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now),
        None => Utc::now(),
    };

    let min_secs = min_duration.num_seconds();
    let max_secs = max_duration.num_seconds();
    let random_secs = rand::thread_rng().gen_range(min_secs..=max_secs);
    let random_duration = Duration::try_seconds(random_secs).unwrap_or(min_duration);

    Ok(base_time + random_duration)
}

/// Split "MIN-MAX" into (MIN, MAX)
fn parse_random_range(range: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = range.split('-').collect();
    if parts.len() != 2 {
        return Err(LotcastError::InvalidInput(
            "Random format must be MIN-MAX".to_string(),
        ));
    }
    Ok((parts[0], parts[1]))
}

/// Validate random range constraints
fn validate_random_range(min: Duration, max: Duration) -> Result<()> {
    let min_secs = min.num_seconds();
    let max_secs = max.num_seconds();

    if min_secs < MIN_RANDOM_SECONDS {
        return Err(LotcastError::InvalidInput(format!(
            "Minimum random interval must be at least {} seconds",
            MIN_RANDOM_SECONDS
        )));
    }

    if max_secs > MAX_RANDOM_SECONDS {
        return Err(LotcastError::InvalidInput(format!(
            "Maximum random interval must be less than {} days",
            MAX_RANDOM_SECONDS / (24 * 3600)
        )));
    }

    if min_secs >= max_secs {
        return Err(LotcastError::InvalidInput(
            "Minimum must be less than maximum".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_minutes() {
        let scheduled_time = parse_schedule("30m", None).unwrap();
        let diff = (scheduled_time - Utc::now()).num_minutes();
        assert!(
            (29..=31).contains(&diff),
            "Expected ~30 minutes, got {}",
            diff
        );
    }

    #[test]
    fn test_parse_duration_with_space() {
        let scheduled_time = parse_schedule("1 hour", None).unwrap();
        let diff = (scheduled_time - Utc::now()).num_minutes();
        assert!(
            (59..=61).contains(&diff),
            "Expected ~60 minutes, got {}",
            diff
        );
    }

    #[test]
    fn test_parse_rfc3339() {
        let scheduled_time = parse_schedule("2026-09-01T09:00:00Z", None).unwrap();
        assert_eq!(scheduled_time.timestamp(), 1_788_253_200);
    }

    #[test]
    fn test_parse_tomorrow() {
        let scheduled_time = parse_schedule("tomorrow", None).unwrap();
        let diff = (scheduled_time - Utc::now()).num_hours();
        // Tolerant window: parser resolves to a time of day tomorrow
        assert!((20..=28).contains(&diff), "Expected ~24 hours, got {}", diff);
    }

    #[test]
    fn test_parse_random_without_last_scheduled() {
        let scheduled_time = parse_schedule("random:10m-20m", None).unwrap();
        let diff = (scheduled_time - Utc::now()).num_minutes();
        assert!(
            (10..=20).contains(&diff),
            "Expected 10-20 minutes, got {}",
            diff
        );
    }

    #[test]
    fn test_parse_random_chains_off_last_scheduled() {
        let last = Utc::now().timestamp() + 3600;
        let scheduled_time = parse_schedule("random:10m-20m", Some(last)).unwrap();
        let diff = (scheduled_time.timestamp() - last) / 60;
        assert!(
            (10..=20).contains(&diff),
            "Expected 10-20 minutes after last, got {}",
            diff
        );
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(parse_schedule("", None).is_err());
    }

    #[test]
    fn test_parse_invalid_format() {
        assert!(parse_schedule("not a time", None).is_err());
    }

    #[test]
    fn test_parse_random_invalid_format() {
        assert!(parse_schedule("random:invalid", None).is_err());
    }

    #[test]
    fn test_parse_random_min_greater_than_max() {
        assert!(parse_schedule("random:2h-1h", None).is_err());
    }

    #[test]
    fn test_parse_random_bounds() {
        assert!(parse_schedule("random:1s-10s", None).is_err());
        assert!(parse_schedule("random:1d-40d", None).is_err());
    }
}
