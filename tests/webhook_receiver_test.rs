//! Reference receiver contract: raw-body-first verification over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::post, Router};
use serde_json::json;

use cryptopay_backend::api::webhooks::{example_receiver, WebhookReceiverState};
use cryptopay_backend::services::webhook_dispatcher::{EVENT_HEADER, SIGNATURE_HEADER};
use cryptopay_backend::services::webhook_verify::sign_payload;

const SECRET: &str = "receiver-test-secret";

async fn spawn_receiver() -> SocketAddr {
    let state = Arc::new(WebhookReceiverState {
        secret: SECRET.to_string(),
    });
    let app = Router::new()
        .route("/api/webhooks/example", post(example_receiver))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn event_body() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "0e6821f8-9f92-47b5-9ba1-12c3c1b013f8",
        "event": "payment.confirmed",
        "data": {
            "paymentIntentId": "aa254a5a-57be-41f2-a5bf-051c1ad3b43f",
            "amount": "1000000",
            "chainId": 8453
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn correctly_signed_webhook_is_accepted() {
    let addr = spawn_receiver().await;
    let body = event_body();
    let signature = format!("sha256={}", sign_payload(&body, SECRET));

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/webhooks/example", addr))
        .header("Content-Type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(EVENT_HEADER, "payment.confirmed")
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn tampered_body_is_rejected_with_401() {
    let addr = spawn_receiver().await;
    let body = event_body();
    let signature = format!("sha256={}", sign_payload(&body, SECRET));

    let mut tampered = body.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/webhooks/example", addr))
        .header("Content-Type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(tampered)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn missing_signature_header_is_rejected_with_401() {
    let addr = spawn_receiver().await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/webhooks/example", addr))
        .header("Content-Type", "application/json")
        .body(event_body())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn signature_is_checked_before_json_parsing() {
    let addr = spawn_receiver().await;
    let body: &[u8] = b"this is not json";
    let signature = format!("sha256={}", sign_payload(body, SECRET));

    // A correctly signed non-JSON body gets past verification and fails
    // at the parse step: 400, not 401.
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/webhooks/example", addr))
        .header(SIGNATURE_HEADER, signature)
        .body(body.to_vec())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}
