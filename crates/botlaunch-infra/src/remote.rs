//! Shared helpers for remote service error payloads.
//!
//! The build/train/deploy/provision APIs return structured errors in a
//! couple of common shapes; everything else is surfaced as the raw body.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

/// Normalize a non-success response body into one error line.
///
/// Prefers `{"error": {"code", "message"}}`, then a top-level
/// `{"message"}`, then the raw payload stringified.
pub fn error_detail(status: u16, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(detail) = envelope.error {
            let code = detail.code.unwrap_or_else(|| status.to_string());
            let message = detail.message.unwrap_or_default();
            return format!("{code}: {message}");
        }
        if let Some(message) = envelope.message {
            return format!("{status}: {message}");
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("status {status}")
    } else {
        format!("{status}: {trimmed}")
    }
}
