//! Request extractor for inbound webhooks.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use webhook_relay::{InboundRequest, WebhookHeaders};

/// Extractor turning an axum request into an [`InboundRequest`].
///
/// The caller address is taken from [`ConnectInfo`] when the server was
/// started with `into_make_service_with_connect_info`. The body size is
/// bounded by axum's `DefaultBodyLimit`.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(InboundWebhook(request): InboundWebhook) -> String {
///     request.path
/// }
/// ```
#[derive(Debug, Clone)]
pub struct InboundWebhook(pub InboundRequest);

/// Error returned when the request body cannot be read.
#[derive(Debug)]
pub struct InboundWebhookRejection {
    status: StatusCode,
    message: String,
}

impl IntoResponse for InboundWebhookRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "status": "error",
            "message": self.message,
        });
        (self.status, axum::Json(body)).into_response()
    }
}

impl<S> FromRequest<S> for InboundWebhook
where
    S: Send + Sync,
{
    type Rejection = InboundWebhookRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let remote_address = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());

        let mut headers = WebhookHeaders::new();
        for (name, value) in req.headers() {
            headers.insert(name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| {
                tracing::warn!(path = %path, error = %rejection.body_text(), "Failed to read webhook body");
                InboundWebhookRejection {
                    status: rejection.status(),
                    message: rejection.body_text(),
                }
            })?;

        Ok(InboundWebhook(InboundRequest {
            method,
            path,
            headers,
            body,
            remote_address,
        }))
    }
}
