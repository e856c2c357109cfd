//! Webhook emitter tests against a local HTTP receiver.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tally::Error;
use tally::emitter::{Emitter, WebhookEmitter, WebhookPayload};
use tally::models::{EmittedCount, WindowId};

type Received = Arc<Mutex<Vec<(Option<String>, WebhookPayload)>>>;

async fn receive(
    State(received): State<Received>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    received.lock().unwrap().push((auth, payload));
    StatusCode::ACCEPTED
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn start_receiver() -> (String, Received) {
    let received: Received = Arc::default();
    let app = Router::new()
        .route("/counts", post(receive))
        .route("/down", post(unavailable))
        .with_state(Arc::clone(&received));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), received)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_posts_json_payload_with_bearer_token() {
    let (base, received) = start_receiver().await;
    let emitter = WebhookEmitter::new(
        format!("{base}/counts"),
        "unique-counts",
        Duration::from_secs(5),
    )
    .unwrap()
    .with_bearer_token(SecretString::from("t0ken".to_string()));

    let count = EmittedCount::new(WindowId::new(4), 17, Duration::from_secs(60));
    let sent = count.clone();
    tokio::task::spawn_blocking(move || emitter.publish(&sent))
        .await
        .unwrap()
        .unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (auth, payload) = &received[0];
    assert_eq!(auth.as_deref(), Some("Bearer t0ken"));
    assert_eq!(payload.topic, "unique-counts");
    assert_eq!(payload.message, "Unique count in the last minute: 17");
    assert_eq!(payload.count, 17);
    assert_eq!(payload.window_id, WindowId::new(4));
    assert_eq!(payload.emitted_at, count.emitted_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_non_success_status_is_publish_error() {
    let (base, _) = start_receiver().await;
    let emitter =
        WebhookEmitter::new(format!("{base}/down"), "unique-counts", Duration::from_secs(5))
            .unwrap();

    let count = EmittedCount::new(WindowId::FIRST, 1, Duration::from_secs(60));
    let err = tokio::task::spawn_blocking(move || emitter.publish(&count))
        .await
        .unwrap()
        .unwrap_err();

    match err {
        Error::Publish { topic, cause } => {
            assert_eq!(topic, "unique-counts");
            assert!(cause.contains("503"));
        },
        other => panic!("unexpected error: {other}"),
    }
}
