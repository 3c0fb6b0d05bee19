//! # Webhook Relay
//!
//! Core of the webhook relay providing:
//! - Inbound dispatch of webhook calls to handlers keyed by endpoint
//! - Static shared-secret verification
//! - Outbound delivery with transport-level and caller-visible retries
//! - Sequential fan-out of one payload to many URLs
//!
//! ## Example
//!
//! ```rust,ignore
//! use webhook_relay::{WebhookReceiver, WebhookSender, SenderConfig, SendOptions};
//! use serde_json::json;
//!
//! let mut receiver = WebhookReceiver::new(Some("s3cr3t".to_string()));
//! receiver.register_fn("payment", |env| Ok(json!({ "order_id": env.data["order_id"] })));
//!
//! let sender = WebhookSender::new(SenderConfig::default())?;
//! let result = sender
//!     .send("http://localhost:5000/webhook/payment", &payload, &SendOptions::new().secret("s3cr3t"))
//!     .await;
//! ```

mod delivery;
mod envelope;
mod error;
mod receiver;
mod registry;
pub mod retry;
#[cfg(feature = "http-client")]
mod sender;

pub use delivery::{BatchDeliveryResult, DeliveryErrorKind, DeliveryResult, ERROR_BODY_LIMIT};
pub use envelope::{
    DEFAULT_ENDPOINT, Payload, RAW_BODY_KEY, WEBHOOK_BASE_PATH, WebhookEnvelope, WebhookHeaders,
    endpoint_from_path, parse_body, raw_payload,
};
pub use error::{HandlerError, WebhookError, WebhookResult};
pub use receiver::{HealthStatus, InboundRequest, RelayResponse, SECRET_HEADER, WebhookReceiver};
pub use registry::{AsyncFnHandler, FnHandler, HandlerFuture, HandlerRegistry, HandlerResult, WebhookHandler};
pub use retry::{Deadline, ExponentialBackoff, LinearBackoff, RetryStrategy};
#[cfg(feature = "http-client")]
pub use sender::{DEFAULT_USER_AGENT, SendOptions, SenderConfig, WebhookSender};
#[cfg(feature = "http-client")]
pub use reqwest::Method;
