//! Resilient invocation layer and circuit breaker against a mock server.

use mockito::Server;
use serde_json::json;
use std::sync::Arc;

use self_token::clock::ManualClock;
use self_token::http::{Encoding, HttpErrorKind, ResilientClient};
use self_token::providers::{
    CircuitStateProvider, InMemoryCircuit, JsonFileStore, PersistenceProvider, StoreBackedCircuit,
};
use self_token::resilience::{CircuitBreaker, CircuitState};

mod common;
use common::NOW;

fn client(clock: Arc<ManualClock>) -> ResilientClient {
    let config = common::fast_config();
    ResilientClient::with_transport(&config, common::transport())
        .with_breaker(CircuitBreaker::with_clock(config.circuit.clone(), clock))
}

#[tokio::test]
async fn test_server_error_retried_up_to_max_retries() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/token")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"boom"}"#)
        .expect(2)
        .create_async()
        .await;

    let client = client(Arc::new(ManualClock::new(NOW)));
    let err = client
        .post(
            &format!("{}/token", server.url()),
            json!({"grant_type": "client_credentials"}),
            client.options().step("token_service").encoding(Encoding::UrlEncoded),
            None,
        )
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.code, 500);
    assert_eq!(err.step, "token_service");
    assert_eq!(err.ctx, json!({"error": "boom"}));
    assert!(err.retryable);
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/token")
        .with_status(401)
        .with_body("denied")
        .expect(1)
        .create_async()
        .await;

    let client = client(Arc::new(ManualClock::new(NOW)));
    let err = client
        .post(&format!("{}/token", server.url()), json!({}), client.options(), None)
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert_eq!(err.code, 401);
    assert_eq!(err.ctx, json!("denied"));
    assert_eq!(err.kind, HttpErrorKind::Status);
}

#[tokio::test]
async fn test_json_body_sent_and_decoded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/echo")
        .match_header("content-type", "application/json")
        .match_header("x-correlation-id", "abc-123")
        .match_body(mockito::Matcher::Json(json!({"hello": "world"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"ok":true}"#)
        .create_async()
        .await;

    let client = client(Arc::new(ManualClock::new(NOW)));
    let response = client
        .post(
            &format!("{}/echo", server.url()),
            json!({"hello": "world"}),
            client.options().header("x-correlation-id", "abc-123"),
            None,
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 201);
    assert_eq!(response.body, json!({"ok": true}));
}

#[tokio::test]
async fn test_circuit_opens_and_recovers() {
    let mut server = Server::new_async().await;
    let flaky = server
        .mock("GET", "/flaky")
        .with_status(502)
        .expect(6)
        .create_async()
        .await;
    let healthy = server
        .mock("GET", "/healthy")
        .with_status(200)
        .with_body("ok")
        .expect(2)
        .create_async()
        .await;

    let clock = Arc::new(ManualClock::new(NOW));
    let client = client(clock.clone());
    let circuit = InMemoryCircuit::new();
    let flaky_url = format!("{}/flaky", server.url());
    let healthy_url = format!("{}/healthy", server.url());

    // Three failed calls inside the threshold trip the circuit.
    for _ in 0..3 {
        let err = client
            .get(&flaky_url, client.options(), Some(&circuit))
            .await
            .unwrap_err();
        assert_eq!(err.code, 502);
    }
    let record = circuit.record().await.unwrap();
    assert_eq!(record.state, Some(CircuitState::Open));
    assert_eq!(record.failures, 0);

    // While standing down the call never leaves the process.
    let err = client
        .get(&healthy_url, client.options(), Some(&circuit))
        .await
        .unwrap_err();
    assert!(err.circuit_open().is_some());
    assert_eq!(err.to_json()["error"], "Circuit Open");

    clock.advance(301);
    client
        .get(&healthy_url, client.options(), Some(&circuit))
        .await
        .unwrap();
    assert_eq!(circuit.record().await.unwrap().state, Some(CircuitState::HalfClosed));

    client
        .get(&healthy_url, client.options(), Some(&circuit))
        .await
        .unwrap();
    let record = circuit.record().await.unwrap();
    assert_eq!(record.state, Some(CircuitState::Closed));
    assert_eq!(record.failures, 0);

    flaky.assert_async().await;
    healthy.assert_async().await;
}

#[tokio::test]
async fn test_circuit_record_persisted_to_file() {
    let mut server = Server::new_async().await;
    let _down = server
        .mock("GET", "/down")
        .with_status(500)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store: Arc<dyn PersistenceProvider> = Arc::new(JsonFileStore::new(&path));
    let circuit = StoreBackedCircuit::new("identity", Arc::clone(&store));

    let client = client(Arc::new(ManualClock::new(NOW)));
    client
        .get(&format!("{}/down", server.url()), client.options(), Some(&circuit))
        .await
        .unwrap_err();

    // A fresh adapter over the same file sees the recorded failure.
    let reopened = StoreBackedCircuit::new("identity", Arc::new(JsonFileStore::new(&path)));
    let record = reopened.record().await.unwrap();
    assert_eq!(record.state, Some(CircuitState::HalfOpen));
    assert_eq!(record.failures, 1);
    assert_eq!(record.last_state_change, Some(NOW));
}
