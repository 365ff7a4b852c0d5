//! Probe-first read-only data operations.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tg_bridge_core::{
    ClientError, GroupInfo, MessageRecord, PlatformConnection, SharedState, Timings,
};

use crate::monitor::HealthMonitor;

/// Group listing result.
#[derive(Debug, Clone, Serialize)]
pub struct GroupListing {
    pub groups: Vec<GroupInfo>,
    pub count: usize,
}

/// Message listing result.
#[derive(Debug, Clone, Serialize)]
pub struct MessageListing {
    pub messages: Vec<MessageRecord>,
    pub count: usize,
    pub group_id: i64,
}

/// Read-only data queries exposed at the tool-invocation boundary.
///
/// Every operation runs the on-demand health probe before touching the
/// handle; an unavailable handle surfaces as a descriptive not-ready error,
/// never a raw internal one. Transient failures are retried a fixed number
/// of times with a fixed pause.
pub struct QueryService {
    state: Arc<SharedState>,
    monitor: Arc<HealthMonitor>,
    timings: Timings,
}

impl QueryService {
    #[must_use]
    pub fn new(state: Arc<SharedState>, monitor: Arc<HealthMonitor>, timings: Timings) -> Self {
        Self {
            state,
            monitor,
            timings,
        }
    }

    /// List group-like chats, up to `limit`. A limit of zero means no cap.
    ///
    /// # Errors
    /// `ClientError::NotReady` while the handle is unavailable; the last
    /// transient error when every attempt fails.
    pub async fn list_groups(&self, limit: usize) -> Result<GroupListing, ClientError> {
        let handle = self.ready_handle().await?;

        // The platform returns roughly twice as many dialogs as requested;
        // ask for half and cap at the caller's limit afterwards. Zero is
        // passed through as "unlimited".
        let api_limit = if limit == 0 { 0 } else { (limit / 2).max(1) };
        tracing::info!(limit, api_limit, "listing groups");

        let mut groups = self
            .with_retries(|| {
                let handle = Arc::clone(&handle);
                async move { handle.list_dialogs(api_limit).await }
            })
            .await?;
        if limit > 0 {
            groups.truncate(limit);
        }

        tracing::info!(found = groups.len(), "group listing complete");
        Ok(GroupListing {
            count: groups.len(),
            groups,
        })
    }

    /// Fetch recent messages from a group, up to `limit`.
    ///
    /// # Errors
    /// `ClientError::NotReady` while the handle is unavailable; the last
    /// transient error when every attempt fails.
    pub async fn list_group_messages(
        &self,
        group_id: i64,
        limit: usize,
    ) -> Result<MessageListing, ClientError> {
        let handle = self.ready_handle().await?;
        tracing::info!(group_id, limit, "listing group messages");

        let messages = self
            .with_retries(|| {
                let handle = Arc::clone(&handle);
                async move { handle.group_history(group_id, limit).await }
            })
            .await?;

        tracing::info!(group_id, found = messages.len(), "message listing complete");
        Ok(MessageListing {
            count: messages.len(),
            messages,
            group_id,
        })
    }

    /// Run the on-demand probe and return the authoritative handle.
    async fn ready_handle(&self) -> Result<Arc<dyn PlatformConnection>, ClientError> {
        if !self.monitor.probe().await {
            return Err(ClientError::NotReady(
                "client is not ready; the system is reconnecting, retry in a few seconds".into(),
            ));
        }
        self.state.handle().ok_or_else(|| {
            ClientError::NotReady(
                "client is not initialized; the system is reconnecting, retry in a few seconds"
                    .into(),
            )
        })
    }

    /// Retry `op` on transient classifications, under a per-attempt timeout.
    async fn with_retries<T, F, Fut>(&self, op: F) -> Result<T, ClientError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let timings = &self.timings;
        let mut last_err = ClientError::Timeout;
        for attempt in 1..=timings.max_attempts {
            if attempt > 1 {
                tracing::info!(attempt, max = timings.max_attempts, "retrying request");
                tokio::time::sleep(timings.retry_pause).await;
            }
            match tokio::time::timeout(timings.request_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) if err.is_transient() => {
                    tracing::warn!(error = %err, attempt, "transient request failure");
                    last_err = err;
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    tracing::warn!(attempt, "request timed out");
                    last_err = ClientError::Timeout;
                }
            }
        }
        Err(last_err)
    }
}
