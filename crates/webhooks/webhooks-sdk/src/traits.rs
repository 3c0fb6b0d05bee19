//! Traits for handler authors.

use std::sync::Arc;

use webhook_relay::{Payload, WebhookEnvelope, WebhookHandler};

/// Trait for components that provide webhook handlers.
///
/// Implement this trait to declare the endpoints a component serves, then
/// register them all at once with `ReceiverBuilder::provider`.
pub trait HandlerProvider {
    /// Returns `(endpoint, handler)` pairs.
    fn webhook_handlers(&self) -> Vec<(String, Arc<dyn WebhookHandler>)>;
}

/// Trait for shaping payloads before they are forwarded.
pub trait WebhookTransformer: Send + Sync {
    /// Transforms the received data before forwarding.
    ///
    /// Return `None` to forward the received data unchanged.
    fn transform_payload(&self, _envelope: &WebhookEnvelope) -> Option<Payload> {
        None
    }

    /// Filters whether a received webhook should be forwarded.
    fn should_forward(&self, _envelope: &WebhookEnvelope) -> bool {
        true
    }

    /// Adds custom headers to forwarded requests.
    fn custom_headers(&self, _envelope: &WebhookEnvelope) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Transformer that forwards everything unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransformer;

impl WebhookTransformer for DefaultTransformer {}
