//! Webhook receiver: authenticates, parses and dispatches inbound calls.
//!
//! The receiver is framework agnostic. An HTTP layer turns its request into
//! an [`InboundRequest`], calls [`WebhookReceiver::handle_request`] and writes
//! the returned [`RelayResponse`] back. Every path through `handle_request`
//! produces a JSON body; nothing escapes as a panic or an error.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{Instrument, error, info, info_span, warn};

use crate::envelope::{WebhookEnvelope, WebhookHeaders, endpoint_from_path, parse_body};
use crate::error::{WebhookError, WebhookResult};
use crate::registry::{HandlerRegistry, HandlerResult, WebhookHandler};

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "X-Webhook-Secret";

/// Bearer prefix accepted in the `Authorization` header.
const BEARER_PREFIX: &str = "Bearer ";

/// One inbound HTTP call, as seen by the receiver.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// HTTP method.
    pub method: String,
    /// Request path, e.g. `/webhook/payment`.
    pub path: String,
    /// Request headers.
    pub headers: WebhookHeaders,
    /// Raw body.
    pub body: Bytes,
    /// Caller address, when known.
    pub remote_address: Option<String>,
}

impl InboundRequest {
    /// Creates a request with no headers and an empty body.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: WebhookHeaders::new(),
            body: Bytes::new(),
            remote_address: None,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and the matching content type.
    pub fn json(self, value: &Value) -> Self {
        self.header("Content-Type", "application/json")
            .body(value.to_string())
    }

    /// Sets the remote address.
    pub fn remote_address(mut self, addr: impl Into<String>) -> Self {
        self.remote_address = Some(addr.into());
        self
    }
}

/// JSON response produced by the receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl RelayResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// A handler ran and returned `result`.
    pub fn processed(result: Value) -> Self {
        Self::new(
            200,
            json!({
                "status": "success",
                "message": "Webhook received and processed",
                "result": result,
            }),
        )
    }

    /// No handler is registered; the webhook is acknowledged and echoed.
    pub fn received(envelope: &WebhookEnvelope) -> Self {
        Self::new(
            200,
            json!({
                "status": "success",
                "message": "Webhook received",
                "endpoint": envelope.endpoint,
                "data": envelope.data,
            }),
        )
    }

    /// Shared secret mismatch.
    pub fn unauthorized() -> Self {
        Self::new(
            WebhookError::Unauthorized.status_code(),
            json!({
                "error": "Unauthorized",
                "message": WebhookError::Unauthorized.to_string(),
            }),
        )
    }

    /// Builds an error response from a relay error.
    pub fn error(err: &WebhookError) -> Self {
        if matches!(err, WebhookError::Unauthorized) {
            return Self::unauthorized();
        }

        Self::new(
            err.status_code(),
            json!({
                "status": "error",
                "message": err.to_string(),
            }),
        )
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Health check body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always `"healthy"`.
    pub status: String,
    /// When the check was answered.
    pub timestamp: DateTime<Utc>,
}

/// Dispatches inbound webhooks to registered handlers.
#[derive(Debug, Default)]
pub struct WebhookReceiver {
    secret: Option<String>,
    registry: HandlerRegistry,
}

impl WebhookReceiver {
    /// Creates a receiver. An empty or absent secret disables verification.
    pub fn new(secret: Option<String>) -> Self {
        Self::with_registry(secret, HandlerRegistry::new())
    }

    /// Creates a receiver around an existing registry.
    pub fn with_registry(secret: Option<String>, registry: HandlerRegistry) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            registry,
        }
    }

    /// Associates a handler with an endpoint, replacing any previous one.
    pub fn register_handler(&mut self, endpoint: impl Into<String>, handler: impl WebhookHandler + 'static) {
        self.registry.register(endpoint, handler);
    }

    /// Registers a synchronous closure.
    pub fn register_fn<F>(&mut self, endpoint: impl Into<String>, handler: F)
    where
        F: Fn(&WebhookEnvelope) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.register_fn(endpoint, handler);
    }

    /// Returns the handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Returns true if requests must present the shared secret.
    pub fn requires_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks the shared secret carried by the request headers.
    ///
    /// `X-Webhook-Secret` is read first; if it is missing or empty the
    /// `Authorization` header is used with its `Bearer ` prefix removed.
    pub fn verify_secret(&self, headers: &WebhookHeaders) -> WebhookResult<()> {
        let Some(expected) = self.secret.as_deref() else {
            return Ok(());
        };

        let presented = headers
            .get(SECRET_HEADER)
            .filter(|value| !value.is_empty())
            .or_else(|| {
                headers.get("Authorization").map(|value| {
                    value.strip_prefix(BEARER_PREFIX).unwrap_or(value)
                })
            })
            .unwrap_or_default();

        if constant_time_compare(expected, presented) {
            Ok(())
        } else {
            Err(WebhookError::Unauthorized)
        }
    }

    /// Handles one inbound webhook.
    pub async fn handle_request(&self, request: InboundRequest) -> RelayResponse {
        let endpoint = endpoint_from_path(&request.path);
        let remote = request.remote_address.clone().unwrap_or_else(|| "unknown".to_string());
        let span = info_span!("webhook", endpoint = %endpoint, remote = %remote);

        self.dispatch(endpoint, request).instrument(span).await
    }

    async fn dispatch(&self, endpoint: String, request: InboundRequest) -> RelayResponse {
        info!("Webhook request received");

        if let Err(err) = self.verify_secret(&request.headers) {
            warn!("Webhook secret verification failed");
            return RelayResponse::error(&err);
        }

        let content_type = request.headers.get("Content-Type").map(str::to_string);
        let data = parse_body(content_type.as_deref(), request.body).await;

        let envelope = WebhookEnvelope::new(endpoint, request.method, data)
            .with_headers(request.headers)
            .with_remote_address(request.remote_address);

        info!(
            request_id = %envelope.id,
            data = %serde_json::Value::Object(envelope.data.clone()),
            "Webhook payload"
        );

        let Some(handler) = self.registry.get(&envelope.endpoint) else {
            info!(request_id = %envelope.id, "No handler registered, acknowledging only");
            return RelayResponse::received(&envelope);
        };

        let outcome = AssertUnwindSafe(handler.handle(&envelope)).catch_unwind().await;
        match outcome {
            Ok(Ok(result)) => {
                info!(request_id = %envelope.id, "Handler succeeded");
                RelayResponse::processed(result)
            }
            Ok(Err(err)) => {
                error!(request_id = %envelope.id, error = %err, details = ?err, "Handler failed");
                RelayResponse::error(&WebhookError::Handler(err.to_string()))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(request_id = %envelope.id, error = %message, "Handler panicked");
                RelayResponse::error(&WebhookError::Handler(message))
            }
        }
    }

    /// Answers the health check. Never touches the registry.
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
