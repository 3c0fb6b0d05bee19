//! Client for sending webhooks with preset credentials.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use webhook_relay::{
    BatchDeliveryResult, DeliveryResult, Method, Payload, SendOptions, SenderConfig, WebhookError, WebhookResult,
    WebhookSender,
};

/// Client wrapping a [`WebhookSender`] with a default secret and headers.
#[derive(Debug, Clone)]
pub struct RelayClient {
    sender: Arc<WebhookSender>,
    options: SendOptions,
}

impl RelayClient {
    /// Creates a new client with default sender settings.
    pub fn new() -> WebhookResult<Self> {
        Ok(Self::with_sender(Arc::new(WebhookSender::new(SenderConfig::default())?)))
    }

    /// Creates a client sharing an existing sender.
    pub fn with_sender(sender: Arc<WebhookSender>) -> Self {
        Self {
            sender,
            options: SendOptions::new(),
        }
    }

    /// Delivers a payload once.
    pub async fn send(&self, url: &str, data: &Payload) -> DeliveryResult {
        self.sender.send(url, data, &self.options).await
    }

    /// Serializes `value` and delivers it once.
    ///
    /// Fails with `InvalidPayload` when `value` does not serialize to a JSON
    /// object.
    pub async fn send_json<T: Serialize>(&self, url: &str, value: &T) -> WebhookResult<DeliveryResult> {
        let data = to_payload(value)?;
        Ok(self.send(url, &data).await)
    }

    /// Delivers a payload to several URLs in order.
    pub async fn send_batch<U: AsRef<str>>(&self, urls: &[U], data: &Payload) -> Vec<BatchDeliveryResult> {
        self.sender.send_batch(urls, data, &self.options).await
    }

    /// Delivers a payload with caller-visible retries.
    pub async fn send_with_retry(&self, url: &str, data: &Payload, max_attempts: u32) -> DeliveryResult {
        self.sender
            .send_with_retry(url, data, &self.options, max_attempts)
            .await
    }

    /// Returns the inner sender.
    pub fn sender(&self) -> &WebhookSender {
        &self.sender
    }
}

/// Builder for relay clients.
#[derive(Debug, Default)]
pub struct RelayClientBuilder {
    config: SenderConfig,
    options: SendOptions,
}

impl RelayClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender configuration.
    pub fn config(mut self, config: SenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the secret sent with every request.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.options = self.options.secret(secret);
        self
    }

    /// Sets the secret from an optional value.
    pub fn maybe_secret(mut self, secret: Option<String>) -> Self {
        self.options = self.options.maybe_secret(secret);
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options = self.options.header(name, value);
        self
    }

    /// Sets the HTTP method, `POST` by default.
    pub fn method(mut self, method: Method) -> Self {
        self.options = self.options.method(method);
        self
    }

    /// Builds the client.
    pub fn build(self) -> WebhookResult<RelayClient> {
        Ok(RelayClient {
            sender: Arc::new(WebhookSender::new(self.config)?),
            options: self.options,
        })
    }
}

/// Serializes a value into a payload mapping.
pub fn to_payload<T: Serialize>(value: &T) -> WebhookResult<Payload> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(WebhookError::InvalidPayload(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Order {
        order_id: String,
        amount: f64,
    }

    #[test]
    fn test_to_payload() {
        let order = Order {
            order_id: "ORD-1".to_string(),
            amount: 199.99,
        };
        let payload = to_payload(&order).unwrap();
        assert_eq!(payload["order_id"], "ORD-1");
        assert_eq!(payload["amount"], json!(199.99));
    }

    #[test]
    fn test_to_payload_rejects_non_objects() {
        let err = to_payload(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, WebhookError::InvalidPayload(_)));
        assert_eq!(err.to_string(), "Invalid payload: expected a JSON object, got an array");
    }
}
