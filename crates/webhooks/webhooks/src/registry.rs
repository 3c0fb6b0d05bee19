//! Handler trait and the endpoint registry.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::envelope::WebhookEnvelope;
use crate::error::HandlerError;

/// Result of a handler invocation.
pub type HandlerResult = Result<Value, HandlerError>;

/// Boxed future returned by async closure handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for webhook handlers.
///
/// A handler consumes one envelope and returns a JSON value that is echoed
/// back to the caller under `result`, or fails.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Handles a webhook.
    async fn handle(&self, envelope: &WebhookEnvelope) -> HandlerResult;
}

/// Wrapper for synchronous closure handlers.
pub struct FnHandler<F>
where
    F: Fn(&WebhookEnvelope) -> HandlerResult + Send + Sync,
{
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&WebhookEnvelope) -> HandlerResult + Send + Sync,
{
    /// Creates a new function handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> WebhookHandler for FnHandler<F>
where
    F: Fn(&WebhookEnvelope) -> HandlerResult + Send + Sync,
{
    async fn handle(&self, envelope: &WebhookEnvelope) -> HandlerResult {
        (self.handler)(envelope)
    }
}

/// Wrapper for closures returning a boxed future.
///
/// The closure receives an owned copy of the envelope so the future can be
/// `'static`.
pub struct AsyncFnHandler<F>
where
    F: Fn(WebhookEnvelope) -> HandlerFuture + Send + Sync,
{
    handler: F,
}

impl<F> AsyncFnHandler<F>
where
    F: Fn(WebhookEnvelope) -> HandlerFuture + Send + Sync,
{
    /// Creates a new async function handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> WebhookHandler for AsyncFnHandler<F>
where
    F: Fn(WebhookEnvelope) -> HandlerFuture + Send + Sync,
{
    async fn handle(&self, envelope: &WebhookEnvelope) -> HandlerResult {
        (self.handler)(envelope.clone()).await
    }
}

/// Mapping from endpoint identifier to handler.
///
/// Filled during setup and moved into the receiver; shared read-only while
/// serving.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn WebhookHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a handler with an endpoint, replacing any previous one.
    pub fn register(&mut self, endpoint: impl Into<String>, handler: impl WebhookHandler + 'static) {
        self.register_arc(endpoint, Arc::new(handler));
    }

    /// Associates an already shared handler with an endpoint.
    pub fn register_arc(&mut self, endpoint: impl Into<String>, handler: Arc<dyn WebhookHandler>) {
        let endpoint = endpoint.into();
        if self.handlers.insert(endpoint.clone(), handler).is_some() {
            tracing::debug!(endpoint = %endpoint, "Replaced webhook handler");
        } else {
            tracing::info!(endpoint = %endpoint, "Registered webhook handler");
        }
    }

    /// Registers a synchronous closure.
    pub fn register_fn<F>(&mut self, endpoint: impl Into<String>, handler: F)
    where
        F: Fn(&WebhookEnvelope) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(endpoint, FnHandler::new(handler));
    }

    /// Gets the handler for an endpoint.
    pub fn get(&self, endpoint: &str) -> Option<Arc<dyn WebhookHandler>> {
        self.handlers.get(endpoint).cloned()
    }

    /// Checks whether an endpoint has a handler.
    pub fn contains(&self, endpoint: &str) -> bool {
        self.handlers.contains_key(endpoint)
    }

    /// Returns the registered endpoint identifiers, sorted.
    pub fn endpoints(&self) -> Vec<&str> {
        let mut endpoints: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        endpoints.sort_unstable();
        endpoints
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("endpoints", &self.endpoints())
            .finish()
    }
}
