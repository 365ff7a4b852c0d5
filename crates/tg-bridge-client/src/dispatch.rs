//! Event fan-out to registered listeners.

use std::collections::HashMap;
use std::sync::RwLock;

use tg_bridge_core::BridgeEvent;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque listener identity.
pub type ListenerId = Uuid;

/// A registered listener: its identity plus the receiving end of its channel.
pub struct Registration {
    pub id: ListenerId,
    pub events: mpsc::UnboundedReceiver<BridgeEvent>,
}

/// Fans out asynchronous events to zero or more registered listeners.
///
/// Dispatch never fails as a unit: delivery is attempted per listener over a
/// snapshot of the registry, individual failures are logged and skipped. The
/// registry tolerates concurrent register/unregister during dispatch.
#[derive(Default)]
pub struct NotificationDispatcher {
    listeners: RwLock<HashMap<ListenerId, mpsc::UnboundedSender<BridgeEvent>>>,
    /// When set, dispatch targets only this listener instead of broadcasting.
    active: RwLock<Option<ListenerId>>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener and return its event channel.
    #[must_use]
    pub fn register(&self) -> Registration {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.write().unwrap().insert(id, tx);
        tracing::info!(listener = %id, "listener registered");
        Registration { id, events: rx }
    }

    pub fn unregister(&self, id: ListenerId) {
        if self.listeners.write().unwrap().remove(&id).is_some() {
            tracing::info!(listener = %id, "listener unregistered");
        }
        let mut active = self.active.write().unwrap();
        if *active == Some(id) {
            *active = None;
        }
    }

    /// Designate a single listener as the dispatch target, or clear it.
    pub fn set_active(&self, id: Option<ListenerId>) {
        *self.active.write().unwrap() = id;
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap().len()
    }

    /// Deliver `event` to the active listener, or broadcast when none is set.
    pub fn dispatch(&self, event: &BridgeEvent) {
        let active = *self.active.read().unwrap();

        // Snapshot, then deliver outside the lock.
        let targets: Vec<(ListenerId, mpsc::UnboundedSender<BridgeEvent>)> = {
            let listeners = self.listeners.read().unwrap();
            match active {
                Some(id) => listeners
                    .get(&id)
                    .map(|tx| (id, tx.clone()))
                    .into_iter()
                    .collect(),
                None => listeners.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
            }
        };

        if targets.is_empty() {
            tracing::debug!(event = event.name(), "no listeners for event");
            return;
        }

        let mut delivered = 0usize;
        for (id, tx) in targets {
            match tx.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(listener = %id, event = event.name(), "listener dropped, delivery failed");
                }
            }
        }
        tracing::debug!(event = event.name(), delivered, "event dispatched");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> BridgeEvent {
        BridgeEvent::AuthSucceeded
    }

    #[test]
    fn dispatch_with_zero_listeners_is_a_noop() {
        let dispatcher = NotificationDispatcher::new();
        dispatcher.dispatch(&event());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_listener() {
        let dispatcher = NotificationDispatcher::new();
        let mut a = dispatcher.register();
        let mut b = dispatcher.register();

        dispatcher.dispatch(&event());

        assert!(matches!(
            a.events.recv().await,
            Some(BridgeEvent::AuthSucceeded)
        ));
        assert!(matches!(
            b.events.recv().await,
            Some(BridgeEvent::AuthSucceeded)
        ));
    }

    #[tokio::test]
    async fn active_listener_receives_exclusively() {
        let dispatcher = NotificationDispatcher::new();
        let mut chosen = dispatcher.register();
        let mut other = dispatcher.register();
        dispatcher.set_active(Some(chosen.id));

        dispatcher.dispatch(&event());

        assert!(chosen.events.recv().await.is_some());
        assert!(other.events.try_recv().is_err());
    }

    #[test]
    fn unregister_clears_active_designation() {
        let dispatcher = NotificationDispatcher::new();
        let reg = dispatcher.register();
        dispatcher.set_active(Some(reg.id));
        dispatcher.unregister(reg.id);

        assert_eq!(dispatcher.listener_count(), 0);
        // Broadcast path again; no panic, no target.
        dispatcher.dispatch(&event());
    }

    #[test]
    fn dropped_receiver_does_not_fail_dispatch() {
        let dispatcher = NotificationDispatcher::new();
        let reg = dispatcher.register();
        drop(reg.events);

        dispatcher.dispatch(&event());
        assert_eq!(dispatcher.listener_count(), 1);
    }
}
