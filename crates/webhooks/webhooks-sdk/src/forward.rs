//! Forwarding handler: receive on one endpoint, fan out to many URLs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{info, warn};
use webhook_relay::{HandlerResult, SendOptions, WebhookEnvelope, WebhookHandler, WebhookSender};

use crate::traits::{DefaultTransformer, WebhookTransformer};

/// Default value of the `forwarded_from` field.
pub const DEFAULT_FORWARD_SOURCE: &str = "webhook_receiver";

/// Handler that re-sends received data to a list of URLs.
///
/// The forwarded body is the received data plus `forwarded_from`,
/// `original_endpoint` and `forwarded_at`. Delivery goes through
/// [`WebhookSender::send_batch`], so targets are tried in order and one
/// failure never stops the rest.
pub struct ForwardHandler<T = DefaultTransformer> {
    sender: Arc<WebhookSender>,
    urls: Vec<String>,
    secret: Option<String>,
    headers: Vec<(String, String)>,
    source: String,
    transformer: T,
}

impl ForwardHandler<DefaultTransformer> {
    /// Creates a forwarding handler.
    pub fn new(sender: Arc<WebhookSender>, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            sender,
            urls: urls.into_iter().map(Into::into).collect(),
            secret: None,
            headers: Vec::new(),
            source: DEFAULT_FORWARD_SOURCE.to_string(),
            transformer: DefaultTransformer,
        }
    }
}

impl<T: WebhookTransformer> ForwardHandler<T> {
    /// Sets the secret presented to every target.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Sets the secret from an optional value.
    pub fn maybe_secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret.filter(|s| !s.is_empty());
        self
    }

    /// Adds a header sent to every target.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the `forwarded_from` value.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Replaces the payload transformer.
    pub fn with_transformer<U: WebhookTransformer>(self, transformer: U) -> ForwardHandler<U> {
        ForwardHandler {
            sender: self.sender,
            urls: self.urls,
            secret: self.secret,
            headers: self.headers,
            source: self.source,
            transformer,
        }
    }

    /// Returns the target URLs.
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    fn options(&self, envelope: &WebhookEnvelope) -> SendOptions {
        let mut options = SendOptions::new().maybe_secret(self.secret.clone());
        for (name, value) in self
            .headers
            .iter()
            .cloned()
            .chain(self.transformer.custom_headers(envelope))
        {
            options = options.header(name, value);
        }
        options
    }
}

#[async_trait]
impl<T> WebhookHandler for ForwardHandler<T>
where
    T: WebhookTransformer + 'static,
{
    async fn handle(&self, envelope: &WebhookEnvelope) -> HandlerResult {
        if !self.transformer.should_forward(envelope) {
            info!(endpoint = %envelope.endpoint, "Webhook not forwarded");
            return Ok(json!({ "processed": true, "forwarded": false }));
        }

        let mut data = self
            .transformer
            .transform_payload(envelope)
            .unwrap_or_else(|| envelope.data.clone());
        data.insert("forwarded_from".to_string(), Value::String(self.source.clone()));
        data.insert(
            "original_endpoint".to_string(),
            Value::String(envelope.endpoint.clone()),
        );
        data.insert(
            "forwarded_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        let results = self
            .sender
            .send_batch(self.urls.as_slice(), &data, &self.options(envelope))
            .await;

        let succeeded = results.iter().filter(|r| r.success()).count();
        let total = results.len();
        if succeeded < total {
            warn!(endpoint = %envelope.endpoint, succeeded, total, "Some forwards failed");
        } else {
            info!(endpoint = %envelope.endpoint, succeeded, total, "Webhook forwarded");
        }

        Ok(json!({
            "processed": true,
            "forwarded": true,
            "succeeded": succeeded,
            "total": total,
            "forward_results": serde_json::to_value(&results)?,
        }))
    }
}

impl<T> std::fmt::Debug for ForwardHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardHandler")
            .field("urls", &self.urls)
            .field("has_secret", &self.secret.is_some())
            .field("source", &self.source)
            .finish()
    }
}
