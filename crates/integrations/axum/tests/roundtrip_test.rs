//! End-to-end: the sender delivers to a live relay listener.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;
use webhook_relay::{Payload, SendOptions, SenderConfig, WebhookEnvelope, WebhookReceiver, WebhookSender};
use webhook_relay_axum::relay_routes;

async fn spawn_relay(receiver: WebhookReceiver) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = relay_routes(Arc::new(receiver));

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    addr
}

fn sender() -> WebhookSender {
    WebhookSender::new(
        SenderConfig::new()
            .timeout(Duration::from_secs(5))
            .retry_backoff(Duration::from_millis(10)),
    )
    .unwrap()
}

fn order() -> Payload {
    json!({"order_id": "ORD-1", "amount": 199.99, "items": 2})
        .as_object()
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn payment_round_trip() {
    let seen: Arc<Mutex<Option<WebhookEnvelope>>> = Arc::new(Mutex::new(None));
    let slot = seen.clone();

    let mut receiver = WebhookReceiver::new(Some("s3cr3t".to_string()));
    receiver.register_fn("payment", move |env| {
        *slot.lock().unwrap() = Some(env.clone());
        Ok(json!({ "order_id": env.data["order_id"] }))
    });
    let addr = spawn_relay(receiver).await;

    let url = format!("http://{addr}/webhook/payment");
    let result = sender()
        .send(&url, &order(), &SendOptions::new().secret("s3cr3t"))
        .await;

    assert!(result.success, "delivery failed: {:?}", result.error);
    assert_eq!(result.status_code, Some(200));
    assert_eq!(result.attempts, 1);
    let body = result.response_data.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["result"], json!({"order_id": "ORD-1"}));

    let envelope = seen.lock().unwrap().take().unwrap();
    assert_eq!(envelope.endpoint, "payment");
    assert_eq!(envelope.method, "POST");
    assert!(envelope.data["amount"].is_f64());
    assert!(envelope.data["items"].is_u64());
    assert_eq!(envelope.data, order());
    assert!(envelope.remote_address.unwrap().starts_with("127.0.0.1:"));
    assert_eq!(envelope.headers.get("x-webhook-secret"), Some("s3cr3t"));
}

#[tokio::test]
async fn wrong_secret_is_reported_as_http_failure() {
    let mut receiver = WebhookReceiver::new(Some("s3cr3t".to_string()));
    receiver.register_fn("payment", |_| Ok(json!({})));
    let addr = spawn_relay(receiver).await;

    let url = format!("http://{addr}/webhook/payment");
    let result = sender()
        .send(&url, &order(), &SendOptions::new().secret("wrong"))
        .await;

    assert!(!result.success);
    assert_eq!(result.status_code, Some(401));
    assert_eq!(result.attempts, 1);
    assert_eq!(
        result.response_data,
        Some(json!({"error": "Unauthorized", "message": "Invalid secret"}))
    );
}

#[tokio::test]
async fn failing_handler_is_retried_by_the_transport() {
    let mut receiver = WebhookReceiver::new(None);
    receiver.register_fn("flaky", |_| Err("not yet".into()));
    let addr = spawn_relay(receiver).await;

    let url = format!("http://{addr}/webhook/flaky");
    let result = sender()
        .send(&url, &order(), &SendOptions::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.status_code, Some(500));
    assert_eq!(result.attempts, 4);
}

#[tokio::test]
async fn batch_to_live_endpoints() {
    let addr = spawn_relay(WebhookReceiver::new(None)).await;

    let urls = [
        format!("http://{addr}/webhook/a"),
        format!("http://{addr}/webhook/b"),
    ];
    let results = sender()
        .send_batch(urls.as_slice(), &order(), &SendOptions::new())
        .await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success()));
    assert_eq!(
        results[1].result.response_data.as_ref().unwrap()["endpoint"],
        "b"
    );
}
