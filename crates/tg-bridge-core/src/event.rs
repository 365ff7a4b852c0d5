//! Events fanned out to external listeners.

use serde::{Deserialize, Serialize};

use crate::platform::MessageRecord;

/// Asynchronous notification delivered through the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// The authentication flow is waiting for a one-time code.
    AuthCodeNeeded { phone: String, code_type: String },
    /// Authentication completed; the handle is usable.
    AuthSucceeded,
    /// The authentication exchange failed (will be retried).
    AuthFailed { error: String },
    /// An incoming message was delivered by the platform.
    NewMessage { message: MessageRecord },
    /// A listener attached to the event feed.
    ListenerConnected { listener: String },
}

impl BridgeEvent {
    /// Stable event name, used as the SSE event field and in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AuthCodeNeeded { .. } => "auth_code_needed",
            Self::AuthSucceeded => "auth_succeeded",
            Self::AuthFailed { .. } => "auth_failed",
            Self::NewMessage { .. } => "new_message",
            Self::ListenerConnected { .. } => "listener_connected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_tagged() {
        let event = BridgeEvent::AuthCodeNeeded {
            phone: "+1555".into(),
            code_type: "sms".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"auth_code_needed\""));
        assert!(json.contains("+1555"));

        let parsed: BridgeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name(), "auth_code_needed");
    }

    #[test]
    fn names_match_tags() {
        assert_eq!(BridgeEvent::AuthSucceeded.name(), "auth_succeeded");
        assert_eq!(
            BridgeEvent::AuthFailed { error: "x".into() }.name(),
            "auth_failed"
        );
    }
}
