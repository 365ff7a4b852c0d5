//! Etcd-backed session storage over plain HTTP.
//!
//! Two JSON exchanges against the v3 KV gateway: `POST /v3/kv/range` for
//! reads and `POST /v3/kv/put` for writes, key and value base64-encoded. A
//! range response with zero entries means "no session yet" and is reported as
//! `NotFound`; transport failures and non-OK statuses are `Connection` errors
//! and are fatal for the whole process.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use tg_bridge_core::{SessionKey, SessionStore, StorageError};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix under which session blobs are stored.
const KEY_PREFIX: &str = "telegram/sessions";

#[derive(Serialize)]
struct RangeRequest<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct PutRequest<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[derive(Deserialize)]
struct KeyValue {
    #[allow(dead_code)]
    key: String,
    value: String,
}

/// Session store backed by an etcd v3 HTTP gateway.
#[derive(Debug)]
pub struct EtcdSessionStore {
    endpoint: String,
    http: reqwest::Client,
}

impl EtcdSessionStore {
    /// Probe the endpoint and build the store.
    ///
    /// The health probe is intentionally non-retryable: without the remote
    /// store no session can be recovered or persisted, so construction fails
    /// immediately.
    ///
    /// # Errors
    /// `StorageError::Connection` when the endpoint is empty, unreachable or
    /// reports unhealthy.
    pub async fn connect(endpoint: &str) -> Result<Self, StorageError> {
        let endpoint = endpoint.trim_end_matches('/').to_owned();
        if endpoint.is_empty() {
            return Err(StorageError::Connection(
                "etcd endpoint cannot be empty".into(),
            ));
        }

        let probe = reqwest::Client::builder()
            .timeout(HEALTH_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let health_url = format!("{}/health", base_url(&endpoint));
        let resp = probe
            .get(&health_url)
            .send()
            .await
            .map_err(|e| StorageError::Connection(format!("health probe failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(StorageError::Connection(format!(
                "health probe returned {}",
                resp.status()
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!(endpoint, "etcd session store ready");
        Ok(Self { endpoint, http })
    }

    fn kv_url(&self, op: &str) -> String {
        format!("{}/v3/kv/{op}", base_url(&self.endpoint))
    }

    fn storage_key(key: &SessionKey) -> String {
        BASE64.encode(format!("{KEY_PREFIX}/{key}"))
    }
}

/// Strip any `/v3/...` API path a configured endpoint may carry.
fn base_url(endpoint: &str) -> &str {
    endpoint.split("/v3").next().unwrap_or(endpoint)
}

#[async_trait]
impl SessionStore for EtcdSessionStore {
    async fn load(&self, key: &SessionKey) -> Result<Vec<u8>, StorageError> {
        let encoded_key = Self::storage_key(key);
        let resp = self
            .http
            .post(self.kv_url("range"))
            .json(&RangeRequest { key: &encoded_key })
            .send()
            .await
            .map_err(|e| StorageError::Connection(format!("range request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(StorageError::Connection(format!(
                "range returned {}",
                resp.status()
            )));
        }

        let body: RangeResponse = resp
            .json()
            .await
            .map_err(|e| StorageError::Connection(format!("invalid range response: {e}")))?;

        let Some(entry) = body.kvs.first() else {
            tracing::debug!(%key, "no session in etcd");
            return Err(StorageError::NotFound);
        };

        BASE64
            .decode(&entry.value)
            .map_err(|e| StorageError::Connection(format!("invalid base64 in response: {e}")))
    }

    async fn save(&self, key: &SessionKey, data: &[u8]) -> Result<(), StorageError> {
        let encoded_key = Self::storage_key(key);
        let encoded_value = BASE64.encode(data);
        let resp = self
            .http
            .post(self.kv_url("put"))
            .json(&PutRequest {
                key: &encoded_key,
                value: &encoded_value,
            })
            .send()
            .await
            .map_err(|e| StorageError::Connection(format!("put request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(StorageError::Connection(format!(
                "put returned {}",
                resp.status()
            )));
        }

        tracing::debug!(%key, bytes = data.len(), "session saved to etcd");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_strips_api_path() {
        assert_eq!(base_url("http://etcd:2379/v3/kv"), "http://etcd:2379");
        assert_eq!(base_url("http://etcd:2379"), "http://etcd:2379");
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_construction() {
        // Reserved TEST-NET-1 address; nothing listens there.
        let err = EtcdSessionStore::connect("http://192.0.2.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
    }

    #[tokio::test]
    async fn empty_endpoint_fails_construction() {
        let err = EtcdSessionStore::connect("").await.unwrap_err();
        assert!(matches!(err, StorageError::Connection(_)));
    }
}
