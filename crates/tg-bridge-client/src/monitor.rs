//! Periodic and on-demand connection health probing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tg_bridge_core::{AuthStatus, ClientError};
use tokio_util::sync::CancellationToken;

use crate::lifecycle::ClientLifecycleManager;

/// Supervises the handle's authorization status and escalates to a rebuild
/// after a threshold of consecutive failures, or immediately on a
/// fatal-classified error.
///
/// The periodic loop and the on-demand [`probe`](Self::probe) share one
/// classification path; consumer-facing operations call `probe` synchronously
/// before touching the handle.
pub struct HealthMonitor {
    manager: Arc<ClientLifecycleManager>,
    cancel: CancellationToken,
    consecutive_errors: AtomicU32,
}

impl HealthMonitor {
    #[must_use]
    pub fn new(manager: Arc<ClientLifecycleManager>, cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            manager,
            cancel,
            consecutive_errors: AtomicU32::new(0),
        })
    }

    /// Run the fixed-interval probe loop until the root token fires.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.manager.config().timings.probe_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Consume the immediate first tick; setup has just run.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.probe().await;
                }
            }
        }
        tracing::debug!("health monitor stopped");
    }

    /// Probe the handle once and update readiness, returning the readiness
    /// after the probe. Identical classification for the periodic loop and
    /// consumer-facing callers.
    pub async fn probe(&self) -> bool {
        let state = self.manager.state();

        let Some(handle) = state.handle() else {
            tracing::info!("no client handle, running setup");
            self.trigger_setup().await;
            return state.is_ready();
        };

        let timeout = self.manager.config().timings.probe_timeout;
        let outcome = tokio::time::timeout(timeout, handle.auth_status()).await;
        // Do not hold the handle across the escalation below.
        drop(handle);

        match outcome {
            Ok(Ok(AuthStatus::Authorized)) => {
                let failures = self.consecutive_errors.swap(0, Ordering::SeqCst);
                if failures > 0 {
                    tracing::info!(failures, "status check successful after failures");
                }
                state.set_ready(true);
            }
            Ok(Ok(AuthStatus::Unauthorized)) => {
                state.set_ready(false);
                let count = self.record_failure();
                tracing::warn!(count, "client is not authorized");
                if self.at_threshold(count) {
                    self.trigger_setup().await;
                }
            }
            Ok(Err(err)) => {
                state.set_ready(false);
                let count = self.record_failure();
                tracing::warn!(error = %err, count, "status check failed");
                if err.is_fatal() || self.at_threshold(count) {
                    self.trigger_setup().await;
                }
            }
            Err(_) => {
                // Timeout is classified exactly like a failed probe.
                state.set_ready(false);
                let count = self.record_failure();
                tracing::warn!(count, "status check timed out");
                if self.at_threshold(count) {
                    self.trigger_setup().await;
                }
            }
        }

        state.is_ready()
    }

    /// Current consecutive-failure count. Reset only by a successful probe.
    #[must_use]
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors.load(Ordering::SeqCst)
    }

    fn record_failure(&self) -> u32 {
        self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Escalate on every probe at or above the threshold, so a replacement
    /// handle that also fails keeps being rebuilt. The counter resets only on
    /// a subsequent success.
    fn at_threshold(&self, count: u32) -> bool {
        count >= self.manager.config().timings.failure_threshold
    }

    async fn trigger_setup(&self) {
        if let Err(err) = self.manager.setup().await {
            match err {
                ClientError::Storage(_) => {
                    // setup already fired the fatal signal where warranted.
                    tracing::error!(error = %err, "rebuild failed on session storage");
                }
                other => tracing::warn!(error = %other, "rebuild failed"),
            }
        }
    }
}
