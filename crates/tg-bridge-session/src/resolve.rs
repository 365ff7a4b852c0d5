//! Backend selection from configuration.

use std::sync::Arc;

use tg_bridge_core::{BridgeConfig, SessionStore, StorageError};

use crate::{EtcdSessionStore, FileSessionStore};

/// Resolve the configured session store.
///
/// An etcd endpoint selects the remote backend (probing it up front);
/// otherwise sessions live under the configured directory.
///
/// # Errors
/// `StorageError::Connection` when the remote backend is configured but
/// unreachable - unrecoverable, callers terminate on it.
pub async fn resolve_store(config: &BridgeConfig) -> Result<Arc<dyn SessionStore>, StorageError> {
    if let Some(endpoint) = config.etcd_endpoint.as_deref() {
        tracing::info!(endpoint, "using etcd session storage");
        let store = EtcdSessionStore::connect(endpoint).await?;
        Ok(Arc::new(store))
    } else {
        tracing::info!(dir = %config.session_dir.display(), "using file session storage");
        Ok(Arc::new(FileSessionStore::new(config.session_dir.clone())))
    }
}
