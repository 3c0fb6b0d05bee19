//! Outbound delivery results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::Payload;
use crate::error::WebhookError;

/// Number of response characters kept in an HTTP failure message.
pub const ERROR_BODY_LIMIT: usize = 200;

/// Classification of a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    /// No response within the client timeout.
    Timeout,
    /// The target could not be reached.
    Connection,
    /// The target answered with a status of 400 or above.
    Http,
    /// Anything else.
    Unknown,
}

impl DeliveryErrorKind {
    /// Classifies an error.
    pub fn of(err: &WebhookError) -> Self {
        match err {
            WebhookError::Timeout => DeliveryErrorKind::Timeout,
            WebhookError::Connection(_) => DeliveryErrorKind::Connection,
            WebhookError::Http { .. } => DeliveryErrorKind::Http,
            _ => DeliveryErrorKind::Unknown,
        }
    }
}

/// Outcome of one delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// True iff a response arrived with a status below 400.
    pub success: bool,
    /// HTTP status, absent if the request never reached the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Parsed response body, or `{"text": <raw>}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
    /// Wall-clock duration, transport retries included.
    pub elapsed_seconds: f64,
    /// Failure classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Failure kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<DeliveryErrorKind>,
    /// HTTP requests made, transport retries included.
    pub attempts: u32,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
}

impl DeliveryResult {
    /// Builds a result from a received response.
    pub fn from_response(status: u16, body: &str, elapsed: Duration, attempts: u32) -> Self {
        let success = status < 400;
        let (error, error_message, error_kind) = if success {
            (None, None, None)
        } else {
            let err = WebhookError::Http {
                status,
                body: truncate_chars(body, ERROR_BODY_LIMIT),
            };
            let message = err.to_string();
            (Some(message.clone()), Some(message), Some(DeliveryErrorKind::Http))
        };

        Self {
            success,
            status_code: Some(status),
            response_data: Some(parse_response_body(body)),
            elapsed_seconds: elapsed.as_secs_f64(),
            error,
            error_message,
            error_kind,
            attempts,
            timestamp: Utc::now(),
        }
    }

    /// Builds a result for a request that produced no response.
    pub fn from_error(err: &WebhookError, elapsed: Duration, attempts: u32) -> Self {
        let kind = DeliveryErrorKind::of(err);
        let error = match kind {
            DeliveryErrorKind::Timeout => "Request timeout".to_string(),
            DeliveryErrorKind::Connection => "Connection error".to_string(),
            DeliveryErrorKind::Http => err.to_string(),
            DeliveryErrorKind::Unknown => "Unknown error".to_string(),
        };

        Self {
            success: false,
            status_code: None,
            response_data: None,
            elapsed_seconds: elapsed.as_secs_f64(),
            error: Some(error),
            error_message: Some(err.to_string()),
            error_kind: Some(kind),
            attempts,
            timestamp: Utc::now(),
        }
    }

    /// Returns the failure classification, if any.
    pub fn error_kind(&self) -> Option<DeliveryErrorKind> {
        self.error_kind
    }
}

/// Delivery result tagged with its target URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDeliveryResult {
    /// Target URL.
    pub url: String,
    /// Delivery outcome.
    #[serde(flatten)]
    pub result: DeliveryResult,
}

impl BatchDeliveryResult {
    /// Tags a result with its URL.
    pub fn new(url: impl Into<String>, result: DeliveryResult) -> Self {
        Self {
            url: url.into(),
            result,
        }
    }

    /// Shortcut for `result.success`.
    pub fn success(&self) -> bool {
        self.result.success
    }
}

/// Parses a response body as JSON, wrapping non-JSON text as `{"text": ...}`.
pub fn parse_response_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| {
        let mut wrapped = Payload::new();
        wrapped.insert("text".to_string(), Value::String(body.to_string()));
        Value::Object(wrapped)
    })
}

/// Keeps at most `limit` characters.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_from_response() {
        let result = DeliveryResult::from_response(
            200,
            r#"{"status":"success"}"#,
            Duration::from_millis(25),
            1,
        );

        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.response_data, Some(json!({"status": "success"})));
        assert!(result.error.is_none());
        assert!(result.error_kind().is_none());
    }

    #[test]
    fn test_http_failure_truncates_body() {
        let body = "x".repeat(500);
        let result = DeliveryResult::from_response(502, &body, Duration::ZERO, 4);

        assert!(!result.success);
        assert_eq!(result.status_code, Some(502));
        assert_eq!(result.error_kind(), Some(DeliveryErrorKind::Http));
        let error = result.error.unwrap();
        assert!(error.starts_with("HTTP 502: "));
        assert_eq!(error.len(), "HTTP 502: ".len() + ERROR_BODY_LIMIT);
        assert_eq!(result.response_data, Some(json!({ "text": body })));
    }

    #[test]
    fn test_redirect_status_counts_as_success() {
        let result = DeliveryResult::from_response(302, "", Duration::ZERO, 1);
        assert!(result.success);
        assert_eq!(result.response_data, Some(json!({ "text": "" })));
    }

    #[test]
    fn test_error_classification() {
        let timeout = DeliveryResult::from_error(&WebhookError::Timeout, Duration::ZERO, 1);
        assert_eq!(timeout.error.as_deref(), Some("Request timeout"));
        assert!(timeout.status_code.is_none());

        let refused = DeliveryResult::from_error(
            &WebhookError::Connection("connection refused".into()),
            Duration::ZERO,
            1,
        );
        assert_eq!(refused.error.as_deref(), Some("Connection error"));
        assert!(refused.error_message.unwrap().contains("connection refused"));

        let other = DeliveryResult::from_error(&WebhookError::Internal("boom".into()), Duration::ZERO, 1);
        assert_eq!(other.error.as_deref(), Some("Unknown error"));
        assert_eq!(other.error_kind(), Some(DeliveryErrorKind::Unknown));
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 200), "short");
    }

    #[test]
    fn test_batch_result_flattens() {
        let result = DeliveryResult::from_response(200, "{}", Duration::ZERO, 1);
        let tagged = BatchDeliveryResult::new("http://a.example/hook", result);
        let value = serde_json::to_value(&tagged).unwrap();

        assert_eq!(value["url"], json!("http://a.example/hook"));
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["status_code"], json!(200));
    }
}
