//! Route mounting for the relay's HTTP surface.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use webhook_relay::{HealthStatus, WebhookReceiver};

use crate::RelayHttpResponse;
use crate::extractor::InboundWebhook;

/// Creates an Axum router with the relay routes.
///
/// - `GET /health`
/// - `POST /webhook` (endpoint `default`)
/// - `POST /webhook/{endpoint}`
///
/// Unknown paths and wrong methods get JSON error bodies as well.
///
/// # Example
///
/// ```rust,ignore
/// let mut receiver = WebhookReceiver::new(Some(secret));
/// receiver.register_fn("payment", handle_payment);
///
/// let app = relay_routes(Arc::new(receiver));
/// axum::serve(listener, app).await?;
/// ```
pub fn relay_routes<S>(receiver: Arc<WebhookReceiver>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .route("/webhook/{*endpoint}", post(webhook_handler))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .with_state(receiver)
}

async fn health_handler(State(receiver): State<Arc<WebhookReceiver>>) -> Json<HealthStatus> {
    Json(receiver.health())
}

async fn webhook_handler(
    State(receiver): State<Arc<WebhookReceiver>>,
    InboundWebhook(request): InboundWebhook,
) -> RelayHttpResponse {
    RelayHttpResponse(receiver.handle_request(request).await)
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "error", "message": "Not found" })),
    )
}

async fn method_not_allowed() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "status": "error", "message": "Method not allowed" })),
    )
}
