//! Construction, teardown and rebuild of the platform connection handle.

use std::sync::Arc;

use tg_bridge_core::{
    BridgeConfig, BridgeEvent, ClientError, PlatformConnection, PlatformConnector, PlatformUpdate,
    SharedState, StorageError,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthCoordinator;
use crate::dispatch::NotificationDispatcher;

/// Owns the single authoritative connection handle.
///
/// `setup` fully replaces the handle; concurrent in-flight operations against
/// a torn-down handle may observe connection errors, which callers treat as
/// transient and retry after the next readiness transition.
pub struct ClientLifecycleManager {
    config: BridgeConfig,
    state: Arc<SharedState>,
    connector: Arc<dyn PlatformConnector>,
    auth: Arc<AuthCoordinator>,
    dispatcher: Arc<NotificationDispatcher>,
    cancel: CancellationToken,
    fatal: CancellationToken,
}

impl ClientLifecycleManager {
    #[must_use]
    pub fn new(
        config: BridgeConfig,
        state: Arc<SharedState>,
        connector: Arc<dyn PlatformConnector>,
        auth: Arc<AuthCoordinator>,
        dispatcher: Arc<NotificationDispatcher>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            state,
            connector,
            auth,
            dispatcher,
            cancel,
            fatal: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Token fired on an unrecoverable storage failure. The embedding binary
    /// observes it and terminates the process.
    #[must_use]
    pub fn fatal_signal(&self) -> CancellationToken {
        self.fatal.clone()
    }

    /// Tear down any existing handle and build a fresh one.
    ///
    /// Readiness stays `false` from here until the new handle authenticates
    /// or a probe observes it authorized.
    ///
    /// # Errors
    /// Storage-connection failures (also firing the fatal signal) and handle
    /// construction failures.
    pub async fn setup(self: &Arc<Self>) -> Result<(), ClientError> {
        if let Some(old) = self.state.take_handle() {
            tracing::info!("tearing down existing client before rebuild");
            self.state.set_ready(false);
            drop(old);
            // Best-effort drain window for in-flight operations.
            tokio::time::sleep(self.config.timings.teardown_grace).await;
        }
        self.state.set_ready(false);
        let generation = self.state.advance_generation();

        let store = match tg_bridge_session::resolve_store(&self.config).await {
            Ok(store) => store,
            Err(err @ StorageError::Connection(_)) => {
                tracing::error!(error = %err, "session store unreachable, shutting down");
                self.fatal.cancel();
                return Err(ClientError::Storage(err));
            }
            Err(err) => return Err(ClientError::Storage(err)),
        };

        let (update_tx, update_rx) = mpsc::unbounded_channel();
        self.spawn_update_forwarder(update_rx);

        let handle = self.connector.build(store, update_tx).await?;
        self.state.install_handle(Arc::clone(&handle));
        tracing::info!(generation, "client handle installed");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_client(handle, generation).await;
        });

        Ok(())
    }

    /// Connection run loop: connect, authenticate, then keep the handle
    /// alive until the root token fires.
    async fn run_client(self: &Arc<Self>, handle: Arc<dyn PlatformConnection>, generation: u64) {
        let result = async {
            match tokio::time::timeout(self.config.timings.init_timeout, handle.connect()).await {
                Ok(res) => res?,
                Err(_) => return Err(ClientError::Timeout),
            }
            self.auth.attempt(handle.as_ref()).await?;
            self.state.set_ready(true);
            tracing::info!("client is now ready");

            self.cancel.cancelled().await;
            Ok(())
        }
        .await;

        if let Err(err) = result {
            self.state.set_ready(false);
            match &err {
                ClientError::Storage(StorageError::Connection(_)) => {
                    tracing::error!(error = %err, "session persistence failed, shutting down");
                    self.fatal.cancel();
                }
                ClientError::Cancelled => {
                    tracing::debug!("client run loop cancelled");
                }
                e if e.is_fatal() || matches!(e, ClientError::Timeout) => {
                    tracing::warn!(error = %err, "fatal client error, scheduling rebuild");
                    self.schedule_rebuild(generation);
                }
                _ => {
                    tracing::warn!(error = %err, "client error, leaving recovery to the health monitor");
                }
            }
        }
    }

    /// Rebuild after a fixed delay, detached from the failing task. The
    /// generation guard makes the task a no-op when another setup already
    /// replaced the handle in the meantime.
    fn schedule_rebuild(self: &Arc<Self>, generation: u64) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = this.cancel.cancelled() => return,
                () = tokio::time::sleep(this.config.timings.rebuild_delay) => {}
            }
            if this.state.generation() != generation {
                tracing::debug!(generation, "rebuild superseded, skipping");
                return;
            }
            if let Err(err) = this.setup().await {
                tracing::warn!(error = %err, "delayed rebuild failed");
            }
        });
    }

    /// Forward platform updates into the notification dispatcher. Ends when
    /// the handle (and with it the sink) is dropped or the root token fires.
    fn spawn_update_forwarder(&self, mut updates: mpsc::UnboundedReceiver<PlatformUpdate>) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    update = updates.recv() => match update {
                        Some(PlatformUpdate::NewMessage(message)) => {
                            tracing::debug!(id = message.id, "incoming message");
                            dispatcher.dispatch(&BridgeEvent::NewMessage { message });
                        }
                        None => break,
                    }
                }
            }
        });
    }
}
