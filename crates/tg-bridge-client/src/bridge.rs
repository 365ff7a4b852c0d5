//! Wiring facade: one struct owning every component, for embedders and the
//! serving surface.

use std::sync::Arc;

use tg_bridge_core::{BridgeConfig, ClientError, PlatformConnector, SharedState};
use tokio_util::sync::CancellationToken;

use crate::auth::AuthCoordinator;
use crate::dispatch::NotificationDispatcher;
use crate::lifecycle::ClientLifecycleManager;
use crate::monitor::HealthMonitor;
use crate::query::QueryService;

/// The assembled bridge.
pub struct Bridge {
    pub state: Arc<SharedState>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub auth: Arc<AuthCoordinator>,
    pub manager: Arc<ClientLifecycleManager>,
    pub monitor: Arc<HealthMonitor>,
    pub queries: QueryService,
    cancel: CancellationToken,
}

impl Bridge {
    /// Wire every component around a shared state instance and one root
    /// cancellation token.
    #[must_use]
    pub fn new(
        config: BridgeConfig,
        connector: Arc<dyn PlatformConnector>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let state = Arc::new(SharedState::new());
        let dispatcher = Arc::new(NotificationDispatcher::new());
        let auth = Arc::new(AuthCoordinator::new(
            config.phone.clone(),
            config.timings.auth_retry_delay,
            Arc::clone(&dispatcher),
            cancel.clone(),
        ));
        let manager = ClientLifecycleManager::new(
            config.clone(),
            Arc::clone(&state),
            connector,
            Arc::clone(&auth),
            Arc::clone(&dispatcher),
            cancel.clone(),
        );
        let monitor = HealthMonitor::new(Arc::clone(&manager), cancel.clone());
        let queries = QueryService::new(
            Arc::clone(&state),
            Arc::clone(&monitor),
            config.timings.clone(),
        );

        Arc::new(Self {
            state,
            dispatcher,
            auth,
            manager,
            monitor,
            queries,
            cancel,
        })
    }

    /// Run the initial setup and start the periodic health monitor.
    ///
    /// # Errors
    /// Propagates the initial `setup` failure; the fatal signal fires
    /// separately for unrecoverable storage errors.
    pub async fn start(&self) -> Result<(), ClientError> {
        self.manager.setup().await?;
        tokio::spawn(Arc::clone(&self.monitor).run());
        Ok(())
    }

    /// Token that fires when the process must terminate (unrecoverable
    /// session-storage failure).
    #[must_use]
    pub fn fatal_signal(&self) -> CancellationToken {
        self.manager.fatal_signal()
    }

    /// The root cancellation token this bridge was built with.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
