//! Classification of provider error messages and extraction of the retry
//! metadata they carry.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Fields pulled out of a raw error message. Each is `None` when the
/// message does not mention it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    pub metric: Option<String>,
    pub limit: Option<String>,
    pub model: Option<String>,
    pub retry_in: Option<String>,
}

// Validation failures show up alongside truncated, rate-limited responses,
// so they are reported as quota errors too.
const QUOTA_INDICATORS: [&str; 6] = [
    "quota",
    "rate limit",
    "resource_exhausted",
    "free data limit",
    "type validation failed",
    "expected object, received undefined",
];

static METRIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Quota exceeded for metric: ([^,]+)").expect("valid regex"));
static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)limit: (\d+)").expect("valid regex"));
static MODEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)model: ([^,\s]+)").expect("valid regex"));
static RETRY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)retry in ([\d.]+)s").expect("valid regex"));

pub fn is_quota_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    QUOTA_INDICATORS.iter().any(|indicator| lower.contains(indicator))
}

pub fn parse_error_details(message: &str) -> ErrorDetails {
    let capture = |re: &Regex| {
        re.captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };

    let metric = capture(&METRIC_RE).map(|m| match m.rsplit('/').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => m,
    });

    let retry_in = capture(&RETRY_RE)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| format_retry_time(s.ceil() as u64));

    ErrorDetails {
        metric,
        limit: capture(&LIMIT_RE),
        model: capture(&MODEL_RE),
        retry_in,
    }
}

/// "1 seconds" is intentional: no singular form below a minute.
pub fn format_retry_time(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{} seconds", seconds);
    }
    let minutes = seconds.div_ceil(60);
    if minutes > 1 {
        format!("{} minutes", minutes)
    } else {
        format!("{} minute", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_metric() {
        let details = parse_error_details(
            "Quota exceeded for metric: generativelanguage.googleapis.com/generate_content_free_tier_requests",
        );
        assert_eq!(details.metric.as_deref(), Some("generate_content_free_tier_requests"));
    }

    #[test]
    fn test_extract_limit_and_model() {
        let details = parse_error_details("limit: 20, model: gemini-2.5-flash");
        assert_eq!(details.limit.as_deref(), Some("20"));
        assert_eq!(details.model.as_deref(), Some("gemini-2.5-flash"));
    }

    #[test]
    fn test_extract_retry_time() {
        assert_eq!(
            parse_error_details("Please retry in 45.5s").retry_in.as_deref(),
            Some("46 seconds")
        );
        assert_eq!(
            parse_error_details("Please retry in 125.7s").retry_in.as_deref(),
            Some("3 minutes")
        );
    }

    #[test]
    fn test_full_provider_message() {
        let message = "RESOURCE_EXHAUSTED: You exceeded your current quota. \
            * Quota exceeded for metric: generativelanguage.googleapis.com/generate_content_free_tier_requests, \
            limit: 20, model: gemini-2.5-flash\nPlease retry in 55.249495162s.";
        let details = parse_error_details(message);
        assert_eq!(details.metric.as_deref(), Some("generate_content_free_tier_requests"));
        assert_eq!(details.limit.as_deref(), Some("20"));
        assert_eq!(details.model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(details.retry_in.as_deref(), Some("56 seconds"));
        assert!(is_quota_error(message));
    }

    #[test]
    fn test_missing_information() {
        assert_eq!(parse_error_details("Generic error message"), ErrorDetails::default());
        assert_eq!(parse_error_details(""), ErrorDetails::default());
    }

    #[test]
    fn test_quota_indicators() {
        assert!(is_quota_error("quota exceeded"));
        assert!(is_quota_error("rate limit reached"));
        assert!(is_quota_error("RESOURCE_EXHAUSTED"));
        assert!(is_quota_error("free data limit"));
        assert!(is_quota_error("QUOTA EXCEEDED"));
        assert!(is_quota_error("Rate Limit"));
        assert!(is_quota_error("resource_exhausted"));
    }

    #[test]
    fn test_validation_failures_count_as_quota() {
        assert!(is_quota_error("Type validation failed"));
        assert!(is_quota_error("expected object, received undefined"));
    }

    #[test]
    fn test_regular_errors() {
        assert!(!is_quota_error("Network error"));
        assert!(!is_quota_error("Invalid API key"));
        assert!(!is_quota_error("Server error 500"));
        assert!(!is_quota_error(""));
    }

    #[test]
    fn test_format_retry_time() {
        assert_eq!(format_retry_time(0), "0 seconds");
        assert_eq!(format_retry_time(1), "1 seconds");
        assert_eq!(format_retry_time(30), "30 seconds");
        assert_eq!(format_retry_time(59), "59 seconds");
        assert_eq!(format_retry_time(60), "1 minute");
        assert_eq!(format_retry_time(61), "2 minutes");
        assert_eq!(format_retry_time(120), "2 minutes");
        assert_eq!(format_retry_time(125), "3 minutes");
    }
}
