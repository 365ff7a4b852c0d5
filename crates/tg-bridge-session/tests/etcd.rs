//! Etcd backend tests against an in-process stub of the v3 KV gateway.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use tg_bridge_core::{SessionKey, SessionStore, StorageError};
use tg_bridge_session::EtcdSessionStore;

#[derive(Clone, Default)]
struct StubState {
    kvs: Arc<Mutex<HashMap<String, String>>>,
    healthy: Arc<Mutex<bool>>,
}

async fn health(State(state): State<StubState>) -> (StatusCode, &'static str) {
    if *state.healthy.lock().unwrap() {
        (StatusCode::OK, "{\"health\":\"true\"}")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    }
}

async fn range(State(state): State<StubState>, Json(body): Json<Value>) -> Json<Value> {
    let key = body["key"].as_str().unwrap_or_default().to_owned();
    let kvs = state.kvs.lock().unwrap();
    match kvs.get(&key) {
        Some(value) => Json(json!({ "kvs": [{ "key": key, "value": value }], "count": "1" })),
        None => Json(json!({})),
    }
}

async fn put(State(state): State<StubState>, Json(body): Json<Value>) -> Json<Value> {
    let key = body["key"].as_str().unwrap_or_default().to_owned();
    let value = body["value"].as_str().unwrap_or_default().to_owned();
    state.kvs.lock().unwrap().insert(key, value);
    Json(json!({}))
}

/// Spawn the stub on an ephemeral port, returning its base URL.
async fn spawn_stub(healthy: bool) -> (String, StubState) {
    let state = StubState {
        kvs: Arc::default(),
        healthy: Arc::new(Mutex::new(healthy)),
    };
    let app = Router::new()
        .route("/health", get(health))
        .route("/v3/kv/range", post(range))
        .route("/v3/kv/put", post(put))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

#[tokio::test]
async fn load_unwritten_key_is_not_found() {
    let (url, _state) = spawn_stub(true).await;
    let store = EtcdSessionStore::connect(&url).await.unwrap();

    let key = SessionKey::for_account("+15550000010");
    assert!(matches!(
        store.load(&key).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn save_then_load_round_trips_byte_exact() {
    let (url, _state) = spawn_stub(true).await;
    let store = EtcdSessionStore::connect(&url).await.unwrap();

    let key = SessionKey::for_account("+15550000011");
    let blob: Vec<u8> = (0u8..=255).collect();

    store.save(&key, &blob).await.unwrap();
    assert_eq!(store.load(&key).await.unwrap(), blob);
}

#[tokio::test]
async fn endpoint_with_api_path_is_normalized() {
    let (url, _state) = spawn_stub(true).await;
    let store = EtcdSessionStore::connect(&format!("{url}/v3/kv")).await.unwrap();

    let key = SessionKey::for_account("+15550000012");
    store.save(&key, b"blob").await.unwrap();
    assert_eq!(store.load(&key).await.unwrap(), b"blob");
}

#[tokio::test]
async fn unhealthy_endpoint_fails_construction() {
    let (url, _state) = spawn_stub(false).await;
    let err = EtcdSessionStore::connect(&url).await.unwrap_err();
    assert!(matches!(err, StorageError::Connection(_)));
}

#[tokio::test]
async fn keys_carry_the_session_prefix() {
    let (url, state) = spawn_stub(true).await;
    let store = EtcdSessionStore::connect(&url).await.unwrap();

    let key = SessionKey::for_account("+15550000013");
    store.save(&key, b"x").await.unwrap();

    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    let stored_keys: Vec<String> = state.kvs.lock().unwrap().keys().cloned().collect();
    assert_eq!(stored_keys.len(), 1);
    let decoded = String::from_utf8(BASE64.decode(&stored_keys[0]).unwrap()).unwrap();
    assert_eq!(decoded, format!("telegram/sessions/{key}"));
}
