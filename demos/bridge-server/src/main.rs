//! Demo server wiring the bridge to a stubbed platform connection.
//!
//! Run with: PHONE=+15551234567 APP_ID=1 APP_HASH=demo \
//!   BRIDGE_SERVER_PORT=8080 cargo run -p bridge-server-demo
//!
//! The stub connection authorizes immediately and emits a synthetic message
//! every few seconds, so the tool routes and the /events feed can be
//! exercised without real platform credentials.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use tg_bridge_client::Bridge;
use tg_bridge_core::{
    AuthError, AuthStatus, BridgeConfig, ClientError, CodeProvider, GroupInfo, MessageRecord,
    PlatformConnection, PlatformConnector, PlatformUpdate, SessionStore, UpdateSink,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct StubConnection;

#[async_trait]
impl PlatformConnection for StubConnection {
    async fn connect(&self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn authenticate(&self, _phone: &str, _codes: &dyn CodeProvider) -> Result<(), AuthError> {
        Ok(())
    }

    async fn auth_status(&self) -> Result<AuthStatus, ClientError> {
        Ok(AuthStatus::Authorized)
    }

    async fn list_dialogs(&self, limit: usize) -> Result<Vec<GroupInfo>, ClientError> {
        Ok((0..limit as i64)
            .map(|i| GroupInfo {
                id: 1000 + i,
                title: format!("demo group {i}"),
                kind: "megagroup".into(),
                username: None,
                members: Some(3),
                deactivated: false,
                verified: false,
                restricted: false,
            })
            .collect())
    }

    async fn group_history(
        &self,
        group_id: i64,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, ClientError> {
        Ok((0..limit as i64)
            .map(|i| MessageRecord {
                id: i,
                date: 1_700_000_000 + i,
                text: format!("demo message {i}"),
                has_media: false,
                kind: "channel".into(),
                sender_id: Some(1),
                chat_id: Some(group_id),
            })
            .collect())
    }
}

struct StubConnector;

#[async_trait]
impl PlatformConnector for StubConnector {
    async fn build(
        &self,
        _store: Arc<dyn SessionStore>,
        updates: UpdateSink,
    ) -> Result<Arc<dyn PlatformConnection>, ClientError> {
        // Feed the event stream so /events has something to show.
        tokio::spawn(async move {
            let mut n = 0i64;
            loop {
                tokio::time::sleep(Duration::from_secs(5)).await;
                n += 1;
                let sent = updates.send(PlatformUpdate::NewMessage(MessageRecord {
                    id: n,
                    date: 1_700_000_000 + n,
                    text: format!("synthetic message {n}"),
                    has_media: false,
                    kind: "channel".into(),
                    sender_id: Some(1),
                    chat_id: Some(1000),
                }));
                if sent.is_err() {
                    break;
                }
            }
        });
        Ok(Arc::new(StubConnection))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = BridgeConfig::from_env().context("loading configuration")?;
    let port = config
        .port
        .context("BRIDGE_SERVER_PORT environment variable is not set")?;

    let cancel = CancellationToken::new();
    let bridge = Bridge::new(config, Arc::new(StubConnector), cancel.clone());
    bridge.start().await.context("initial client setup")?;

    let fatal = bridge.fatal_signal();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                cancel.cancel();
            }
        });
    }

    tokio::select! {
        () = fatal.cancelled() => {
            cancel.cancel();
            anyhow::bail!("session storage unreachable, exiting");
        }
        result = tg_bridge_server::serve(bridge, port, cancel.clone()) => {
            result.context("tool server")?;
        }
    }
    Ok(())
}
