//! # Webhook Relay Axum Integration
//!
//! This crate exposes the relay's receiver over HTTP with Axum, including:
//! - Route mounting (`/health`, `/webhook`, `/webhook/{endpoint}`)
//! - An extractor turning requests into [`webhook_relay::InboundRequest`]
//! - Conversion of [`webhook_relay::RelayResponse`] into Axum responses
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use webhook_relay::WebhookReceiver;
//! use webhook_relay_axum::relay_routes;
//!
//! let mut receiver = WebhookReceiver::new(None);
//! receiver.register_fn("github", |env| Ok(serde_json::json!({ "processed": true })));
//!
//! let app = relay_routes(Arc::new(receiver));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

mod extractor;
mod routes;

pub use extractor::{InboundWebhook, InboundWebhookRejection};
pub use routes::relay_routes;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use webhook_relay::{RelayResponse, WebhookError};

/// Wrapper for RelayResponse that implements IntoResponse.
#[derive(Debug, Clone)]
pub struct RelayHttpResponse(pub RelayResponse);

impl IntoResponse for RelayHttpResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self.0.body)).into_response()
    }
}

impl From<RelayResponse> for RelayHttpResponse {
    fn from(response: RelayResponse) -> Self {
        RelayHttpResponse(response)
    }
}

impl From<WebhookError> for RelayHttpResponse {
    fn from(err: WebhookError) -> Self {
        RelayHttpResponse(RelayResponse::error(&err))
    }
}
