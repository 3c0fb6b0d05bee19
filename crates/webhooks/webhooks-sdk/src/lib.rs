//! # Webhook Relay SDK
//!
//! Conveniences for wiring up the webhook relay.
//!
//! This crate provides builders and helpers to:
//! - Assemble a receiver with its handlers and secret
//! - Configure a sender with plain numeric settings
//! - Forward received webhooks to other services
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use webhook_relay_sdk::{ForwardTarget, ReceiverBuilder, SenderBuilder};
//!
//! let sender = Arc::new(SenderBuilder::new().timeout_ms(5000).build()?);
//! let receiver = ReceiverBuilder::new()
//!     .secret("s3cr3t")
//!     .handler_fn("github", |env| Ok(serde_json::json!({ "processed": true })))
//!     .forward(
//!         ForwardTarget::new("forward").url("https://hooks.example.com/in").secret("fwd"),
//!         sender,
//!     )
//!     .build();
//! ```

mod builder;
mod client;
mod forward;
mod traits;

pub use builder::{ForwardTarget, ReceiverBuilder, SenderBuilder};
pub use client::{RelayClient, RelayClientBuilder, to_payload};
pub use forward::{DEFAULT_FORWARD_SOURCE, ForwardHandler};
pub use traits::{DefaultTransformer, HandlerProvider, WebhookTransformer};

// Re-export core types for convenience
pub use webhook_relay::{
    BatchDeliveryResult, DeliveryResult, HandlerResult, Payload, SendOptions, SenderConfig, WebhookEnvelope,
    WebhookError, WebhookHandler, WebhookReceiver, WebhookResult, WebhookSender,
};
