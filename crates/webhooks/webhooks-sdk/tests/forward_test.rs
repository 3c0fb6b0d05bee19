//! Forwarding from a receiver endpoint to mock targets.

use std::sync::Arc;

use serde_json::json;
use webhook_relay::InboundRequest;
use webhook_relay_sdk::{ForwardTarget, ReceiverBuilder, RelayClientBuilder, SenderBuilder};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sender() -> Arc<webhook_relay::WebhookSender> {
    Arc::new(
        SenderBuilder::new()
            .timeout_ms(2000)
            .retry_backoff_ms(10)
            .batch_delay_ms(1)
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn forwards_enriched_data_to_every_target() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/first"))
        .and(header("x-webhook-secret", "forward-secret"))
        .and(body_partial_json(json!({
            "order_id": "ORD-1",
            "forwarded_from": "webhook_receiver",
            "original_endpoint": "forward",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/second"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let target = ForwardTarget::new("forward")
        .url(format!("{}/first", server.uri()))
        .url(format!("{}/second", server.uri()))
        .secret("forward-secret");
    let receiver = ReceiverBuilder::new()
        .secret("inbound")
        .forward(target, sender())
        .build();

    let request = InboundRequest::new("POST", "/webhook/forward")
        .header("X-Webhook-Secret", "inbound")
        .json(&json!({"order_id": "ORD-1"}));
    let response = receiver.handle_request(request).await;

    assert_eq!(response.status, 200);
    let result = &response.body["result"];
    assert_eq!(result["processed"], true);
    assert_eq!(result["forwarded"], true);
    assert_eq!(result["succeeded"], 1);
    assert_eq!(result["total"], 2);

    let forwards = result["forward_results"].as_array().unwrap();
    assert_eq!(forwards.len(), 2);
    assert_eq!(forwards[0]["url"], format!("{}/first", server.uri()));
    assert_eq!(forwards[0]["success"], true);
    assert_eq!(forwards[0]["response_data"], json!({"ok": true}));
    assert_eq!(forwards[1]["success"], false);
    assert_eq!(forwards[1]["status_code"], 404);
}

#[tokio::test]
async fn forwarded_at_is_added() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let receiver = ReceiverBuilder::new()
        .forward(ForwardTarget::new("relay").url(server.uri()), sender())
        .build();
    let request = InboundRequest::new("POST", "/webhook/relay").json(&json!({"n": 1}));
    let response = receiver.handle_request(request).await;
    assert_eq!(response.status, 200);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["n"], 1);
    assert!(body["forwarded_at"].as_str().is_some());
}

#[tokio::test]
async fn client_sends_preset_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-webhook-secret", "client-secret"))
        .and(header("x-source", "sdk"))
        .and(body_partial_json(json!({"event": "ping"})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let client = RelayClientBuilder::new()
        .secret("client-secret")
        .header("X-Source", "sdk")
        .build()
        .unwrap();
    let result = client
        .send_json(&server.uri(), &json!({"event": "ping"}))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.status_code, Some(202));
}

#[tokio::test]
async fn client_batch_uses_configured_method_and_optional_secret() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(header("x-webhook-secret", "batch"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let client = RelayClientBuilder::new()
        .config(webhook_relay::SenderConfig::new().batch_delay(std::time::Duration::ZERO))
        .maybe_secret(Some("batch".to_string()))
        .method(webhook_relay::Method::PUT)
        .build()
        .unwrap();
    let urls = [format!("{}/a", server.uri()), format!("{}/b", server.uri())];
    let data = json!({"n": 1}).as_object().cloned().unwrap();
    let results = client.send_batch(&urls, &data).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success()));
}
