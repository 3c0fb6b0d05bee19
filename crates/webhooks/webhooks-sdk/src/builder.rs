//! Receiver and sender builders.

use std::sync::Arc;
use std::time::Duration;

use webhook_relay::{
    HandlerRegistry, HandlerResult, SenderConfig, WebhookEnvelope, WebhookHandler, WebhookReceiver,
    WebhookResult, WebhookSender,
};

use crate::forward::ForwardHandler;
use crate::traits::HandlerProvider;

/// Configuration for a forwarding endpoint.
#[derive(Debug, Clone)]
pub struct ForwardTarget {
    endpoint: String,
    urls: Vec<String>,
    secret: Option<String>,
    headers: Vec<(String, String)>,
}

impl ForwardTarget {
    /// Creates a forwarding target for an endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            urls: Vec::new(),
            secret: None,
            headers: Vec::new(),
        }
    }

    /// Adds a destination URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Adds several destination URLs.
    pub fn urls(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.urls.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Sets the secret presented to the destinations.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Adds a custom header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Returns the endpoint identifier.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Converts to a handler delivering through `sender`.
    pub fn into_handler(self, sender: Arc<WebhookSender>) -> ForwardHandler {
        self.headers.into_iter().fold(
            ForwardHandler::new(sender, self.urls).maybe_secret(self.secret),
            |handler, (key, value)| handler.header(key, value),
        )
    }
}

/// Builder for a [`WebhookReceiver`].
#[derive(Debug, Default)]
pub struct ReceiverBuilder {
    secret: Option<String>,
    registry: HandlerRegistry,
}

impl ReceiverBuilder {
    /// Creates a new builder without a secret.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires callers to present this secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Sets the secret from an optional value.
    pub fn maybe_secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret;
        self
    }

    /// Registers a handler.
    pub fn handler(mut self, endpoint: impl Into<String>, handler: impl WebhookHandler + 'static) -> Self {
        self.registry.register(endpoint, handler);
        self
    }

    /// Registers a synchronous closure.
    pub fn handler_fn<F>(mut self, endpoint: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&WebhookEnvelope) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.register_fn(endpoint, handler);
        self
    }

    /// Registers every handler of a provider.
    pub fn provider(mut self, provider: &impl HandlerProvider) -> Self {
        for (endpoint, handler) in provider.webhook_handlers() {
            self.registry.register_arc(endpoint, handler);
        }
        self
    }

    /// Registers a forwarding handler.
    pub fn forward(mut self, target: ForwardTarget, sender: Arc<WebhookSender>) -> Self {
        let endpoint = target.endpoint.clone();
        self.registry.register(endpoint, target.into_handler(sender));
        self
    }

    /// Returns the registered endpoints.
    pub fn endpoints(&self) -> Vec<&str> {
        self.registry.endpoints()
    }

    /// Builds the receiver.
    pub fn build(self) -> WebhookReceiver {
        WebhookReceiver::with_registry(self.secret, self.registry)
    }
}

/// Builder for a [`WebhookSender`].
#[derive(Debug, Clone, Default)]
pub struct SenderBuilder {
    config: SenderConfig,
}

impl SenderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-request timeout in milliseconds.
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config = self.config.timeout(Duration::from_millis(ms));
        self
    }

    /// Sets the transport-level retry count.
    pub fn max_retries(mut self, max: u32) -> Self {
        self.config = self.config.max_retries(max);
        self
    }

    /// Sets the backoff factor in milliseconds.
    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config = self.config.retry_backoff(Duration::from_millis(ms));
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config = self.config.user_agent(user_agent);
        self
    }

    /// Sets the pause between batch targets in milliseconds.
    pub fn batch_delay_ms(mut self, ms: u64) -> Self {
        self.config = self.config.batch_delay(Duration::from_millis(ms));
        self
    }

    /// Sets the delivery deadline in seconds; `None` removes it.
    pub fn max_elapsed_secs(mut self, secs: Option<u64>) -> Self {
        self.config = self.config.max_elapsed(secs.map(Duration::from_secs));
        self
    }

    /// Returns the configuration built so far.
    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Builds the sender.
    pub fn build(self) -> WebhookResult<WebhookSender> {
        WebhookSender::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Billing;

    impl HandlerProvider for Billing {
        fn webhook_handlers(&self) -> Vec<(String, Arc<dyn WebhookHandler>)> {
            let handler: Arc<dyn WebhookHandler> =
                Arc::new(webhook_relay::FnHandler::new(|_: &WebhookEnvelope| Ok(json!({"billing": true}))));
            vec![("invoice".to_string(), handler.clone()), ("refund".to_string(), handler)]
        }
    }

    #[test]
    fn test_receiver_builder() {
        let sender = Arc::new(SenderBuilder::new().build().unwrap());
        let builder = ReceiverBuilder::new()
            .secret("s3cr3t")
            .handler_fn("github", |_| Ok(json!({"ok": true})))
            .provider(&Billing)
            .forward(ForwardTarget::new("forward").url("http://a.example/hook"), sender);

        assert_eq!(builder.endpoints(), vec!["forward", "github", "invoice", "refund"]);

        let receiver = builder.build();
        assert!(receiver.requires_secret());
        assert_eq!(receiver.registry().len(), 4);
    }

    #[test]
    fn test_sender_builder() {
        let builder = SenderBuilder::new()
            .timeout_ms(2500)
            .max_retries(1)
            .retry_backoff_ms(50)
            .batch_delay_ms(0)
            .max_elapsed_secs(None)
            .user_agent("relay-test/1.0");

        let config = builder.config();
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_backoff, Duration::from_millis(50));
        assert!(config.batch_delay.is_zero());
        assert!(config.max_elapsed.is_none());
        assert_eq!(config.user_agent, "relay-test/1.0");
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_forward_target() {
        let target = ForwardTarget::new("forward")
            .urls(["http://a.example", "http://b.example"])
            .secret("fwd")
            .header("X-Relay", "1");
        assert_eq!(target.endpoint(), "forward");

        let sender = Arc::new(SenderBuilder::new().build().unwrap());
        let handler = target.into_handler(sender);
        assert_eq!(handler.urls().len(), 2);
        assert_eq!(handler.urls()[1], "http://b.example");
    }
}
