//! Multi-step authentication flow with externally supplied codes.
//!
//! The coordinator is the platform's [`CodeProvider`]: when the exchange
//! requests a one-time code it parks on a single-use signal until the code
//! arrives through the tool-invocation boundary. The signal is consumed
//! exactly once and replaced for the next request - a fired one-shot is never
//! reused.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tg_bridge_core::{AuthError, BridgeEvent, CodeProvider, PlatformConnection};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::dispatch::NotificationDispatcher;

/// Authentication flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    AwaitingCode,
}

struct CodeSlot {
    state: AuthState,
    pending: Option<oneshot::Sender<String>>,
    /// Identifies the waiter the stored sender belongs to. A stale waiter
    /// (replaced during a rebuild overlap) must not touch a newer request.
    request: u64,
}

/// Drives the login flow and accepts code submissions concurrently.
pub struct AuthCoordinator {
    phone: String,
    retry_delay: std::time::Duration,
    dispatcher: Arc<NotificationDispatcher>,
    cancel: CancellationToken,
    slot: Mutex<CodeSlot>,
}

impl AuthCoordinator {
    #[must_use]
    pub fn new(
        phone: String,
        retry_delay: std::time::Duration,
        dispatcher: Arc<NotificationDispatcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            phone,
            retry_delay,
            dispatcher,
            cancel,
            slot: Mutex::new(CodeSlot {
                state: AuthState::Idle,
                pending: None,
                request: 0,
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.slot.lock().unwrap().state
    }

    /// Accept a code submitted through the tool-invocation boundary.
    ///
    /// At most one submission succeeds per code request; submissions while no
    /// code is awaited are rejected, never queued.
    ///
    /// # Errors
    /// `AuthError::InvalidState` when no code is currently awaited.
    pub fn submit_code(&self, code: &str) -> Result<(), AuthError> {
        let mut slot = self.slot.lock().unwrap();
        if slot.state != AuthState::AwaitingCode {
            return Err(AuthError::InvalidState);
        }
        let tx = slot.pending.take().ok_or(AuthError::InvalidState)?;
        slot.state = AuthState::Idle;
        drop(slot);

        // The waiter aborted between our state check and the send.
        tx.send(code.to_owned())
            .map_err(|_| AuthError::InvalidState)?;
        tracing::info!("authentication code accepted");
        Ok(())
    }

    /// Run the authentication exchange until it succeeds or is cancelled.
    ///
    /// Non-cancellation failures are published and retried after a fixed
    /// delay, indefinitely.
    ///
    /// # Errors
    /// `AuthError::Cancelled` when the root token fires mid-flow.
    pub async fn attempt(&self, conn: &dyn PlatformConnection) -> Result<(), AuthError> {
        loop {
            match conn.authenticate(&self.phone, self).await {
                Ok(()) => {
                    tracing::info!("authentication successful");
                    self.dispatcher.dispatch(&BridgeEvent::AuthSucceeded);
                    return Ok(());
                }
                Err(AuthError::Cancelled) => {
                    self.abort_pending();
                    return Err(AuthError::Cancelled);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "authentication error, retrying in {:?}", self.retry_delay);
                    self.dispatcher.dispatch(&BridgeEvent::AuthFailed {
                        error: err.to_string(),
                    });
                    tokio::select! {
                        () = self.cancel.cancelled() => return Err(AuthError::Cancelled),
                        () = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }
    }

    /// Reset to `Idle`, dropping any outstanding code request.
    fn abort_pending(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.state = AuthState::Idle;
        slot.pending = None;
    }

    /// Reset to `Idle` only if `request` is still the outstanding one.
    fn abort_request(&self, request: u64) {
        let mut slot = self.slot.lock().unwrap();
        if slot.request == request {
            slot.state = AuthState::Idle;
            slot.pending = None;
        }
    }
}

#[async_trait]
impl CodeProvider for AuthCoordinator {
    async fn code(&self, code_type: &str) -> Result<String, AuthError> {
        let (request, rx) = {
            let mut slot = self.slot.lock().unwrap();
            let (tx, rx) = oneshot::channel();
            slot.pending = Some(tx);
            slot.state = AuthState::AwaitingCode;
            slot.request = slot.request.wrapping_add(1);
            (slot.request, rx)
        };

        tracing::info!(phone = %self.phone, code_type, "authentication code needed");
        self.dispatcher.dispatch(&BridgeEvent::AuthCodeNeeded {
            phone: self.phone.clone(),
            code_type: code_type.to_owned(),
        });

        tokio::select! {
            () = self.cancel.cancelled() => {
                self.abort_request(request);
                Err(AuthError::Cancelled)
            }
            received = rx => match received {
                Ok(code) => Ok(code),
                // Sender was dropped: a newer request replaced this one.
                // The slot now belongs to that request; leave it alone.
                Err(_) => Err(AuthError::Cancelled),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> Arc<AuthCoordinator> {
        Arc::new(AuthCoordinator::new(
            "+15551234567".into(),
            std::time::Duration::from_millis(10),
            Arc::new(NotificationDispatcher::new()),
            CancellationToken::new(),
        ))
    }

    #[test]
    fn submit_while_idle_is_invalid_state() {
        let auth = coordinator();
        assert!(matches!(
            auth.submit_code("12345"),
            Err(AuthError::InvalidState)
        ));
        assert_eq!(auth.state(), AuthState::Idle);
    }

    #[tokio::test]
    async fn one_submission_succeeds_per_request() {
        let auth = coordinator();

        let waiter = {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.code("sms").await })
        };

        // Wait for the transition into AwaitingCode.
        while auth.state() != AuthState::AwaitingCode {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        assert!(auth.submit_code("12345").is_ok());
        assert!(matches!(
            auth.submit_code("67890"),
            Err(AuthError::InvalidState)
        ));

        let code = waiter.await.unwrap().unwrap();
        assert_eq!(code, "12345");
        assert_eq!(auth.state(), AuthState::Idle);
    }

    #[tokio::test]
    async fn fresh_signal_is_issued_for_each_request() {
        let auth = coordinator();

        for expected in ["11111", "22222"] {
            let waiter = {
                let auth = Arc::clone(&auth);
                tokio::spawn(async move { auth.code("sms").await })
            };
            while auth.state() != AuthState::AwaitingCode {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
            auth.submit_code(expected).unwrap();
            assert_eq!(waiter.await.unwrap().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn replaced_waiter_leaves_the_new_request_intact() {
        // A stale run task can still be inside the code wait while a rebuilt
        // one issues the next request. The stale waiter must step aside
        // without disturbing the live request.
        let auth = coordinator();

        let stale = {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.code("sms").await })
        };
        while auth.state() != AuthState::AwaitingCode {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        let live = {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.code("sms").await })
        };

        // The replaced sender resolves the stale waiter.
        assert!(matches!(
            stale.await.unwrap(),
            Err(AuthError::Cancelled)
        ));

        // The live request is still outstanding and accepts the code.
        assert_eq!(auth.state(), AuthState::AwaitingCode);
        auth.submit_code("12345").unwrap();
        assert_eq!(live.await.unwrap().unwrap(), "12345");
        assert_eq!(auth.state(), AuthState::Idle);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_code_wait() {
        let cancel = CancellationToken::new();
        let auth = Arc::new(AuthCoordinator::new(
            "+15551234567".into(),
            std::time::Duration::from_millis(10),
            Arc::new(NotificationDispatcher::new()),
            cancel.clone(),
        ));

        let waiter = {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.code("sms").await })
        };
        while auth.state() != AuthState::AwaitingCode {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        cancel.cancel();
        assert!(matches!(
            waiter.await.unwrap(),
            Err(AuthError::Cancelled)
        ));
        assert_eq!(auth.state(), AuthState::Idle);
        // The aborted request does not accept late codes.
        assert!(matches!(
            auth.submit_code("12345"),
            Err(AuthError::InvalidState)
        ));
    }

    #[tokio::test]
    async fn code_request_publishes_notification() {
        let dispatcher = Arc::new(NotificationDispatcher::new());
        let mut listener = dispatcher.register();
        let auth = Arc::new(AuthCoordinator::new(
            "+15551234567".into(),
            std::time::Duration::from_millis(10),
            Arc::clone(&dispatcher),
            CancellationToken::new(),
        ));

        let waiter = {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.code("app").await })
        };
        while auth.state() != AuthState::AwaitingCode {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }

        let event = listener.events.recv().await.unwrap();
        assert!(matches!(
            event,
            BridgeEvent::AuthCodeNeeded { ref code_type, .. } if code_type == "app"
        ));

        auth.submit_code("12345").unwrap();
        waiter.await.unwrap().unwrap();
    }
}
