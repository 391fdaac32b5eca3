use serde::Serialize;
use std::fmt;

use crate::error_parser::{ErrorDetails, is_quota_error, parse_error_details};

const DEFAULT_RETRY: &str = "5 minutes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Quota,
    Generic,
}

/// What the error panel shows for one display error
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub kind: NoticeKind,
    pub headline: &'static str,
    pub message: String,
    pub details: ErrorDetails,
    pub retry_in: String,
    pub tips: Vec<String>,
}

impl ErrorNotice {
    pub fn from_message(message: &str) -> Self {
        let details = parse_error_details(message);
        let retry_in = details
            .retry_in
            .clone()
            .unwrap_or_else(|| DEFAULT_RETRY.to_string());

        if is_quota_error(message) {
            let tips = vec![
                format!("Wait {} before trying again", retry_in),
                "The free tier has limited requests per minute".to_string(),
                "Check your usage at: https://ai.dev/rate-limit".to_string(),
                "Learn more: https://ai.google.dev/gemini-api/docs/rate-limits".to_string(),
            ];
            Self {
                kind: NoticeKind::Quota,
                headline: "API Limit Exceeded",
                message: "You've exceeded your free API quota limit.".to_string(),
                details,
                retry_in,
                tips,
            }
        } else {
            Self {
                kind: NoticeKind::Generic,
                headline: "Generation Error",
                message: message.to_string(),
                details,
                retry_in,
                tips: Vec::new(),
            }
        }
    }

    pub fn is_quota(&self) -> bool {
        self.kind == NoticeKind::Quota
    }
}

impl fmt::Display for ErrorNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline)?;
        writeln!(f, "{}", self.message)?;
        if !self.is_quota() {
            return Ok(());
        }

        if let Some(limit) = &self.details.limit {
            writeln!(f, "Limit: {} requests per minute (free tier)", limit)?;
        }
        writeln!(f, "Try again in: {}", self.retry_in)?;
        writeln!(f, "Note: The API returned an incomplete response due to rate limiting.")?;
        writeln!(f, "What you can do:")?;
        for tip in &self.tips {
            writeln!(f, "  - {}", tip)?;
        }
        Ok(())
    }
}
