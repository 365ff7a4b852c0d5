//! The opaque remote-platform boundary.
//!
//! The bridge never touches the platform's wire protocol. Everything it needs
//! is expressed as two object-safe traits: a connector that builds fresh
//! connection handles, and the handle itself exposing connect / authenticate /
//! status / data-query operations. Implementations wrap the external platform
//! library and are required to produce typed [`ClientError`] variants at the
//! point each underlying call fails (see [`crate::error::classify_raw`]).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{AuthError, ClientError};
use crate::store::SessionStore;

/// Authorization state reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Authorized,
    Unauthorized,
}

/// Group-like chat surfaced by the dialog listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: i64,
    pub title: String,
    /// Platform-specific chat flavor ("chat", "megagroup", ...).
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<i64>,
    #[serde(default)]
    pub deactivated: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub restricted: bool,
}

/// A single retrieved or delivered message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    /// Platform timestamp (Unix epoch seconds).
    pub date: i64,
    pub text: String,
    pub has_media: bool,
    /// "private" or "channel".
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
}

/// Asynchronous update pushed by the platform's delivery callback.
#[derive(Debug, Clone)]
pub enum PlatformUpdate {
    NewMessage(MessageRecord),
}

/// Sink the connector binds the platform's update callback to.
pub type UpdateSink = mpsc::UnboundedSender<PlatformUpdate>;

/// Supplies the one-time login code when the exchange requests it.
#[async_trait]
pub trait CodeProvider: Send + Sync {
    /// Block until a code is available or the flow is aborted.
    async fn code(&self, code_type: &str) -> Result<String, AuthError>;
}

/// A live connection handle to the remote platform.
///
/// Exactly one handle is authoritative at a time; it is replaced, never
/// mutated, on rebuild. Holders must not retain a handle across a rebuild -
/// operations against a torn-down handle surface as transient errors.
#[async_trait]
pub trait PlatformConnection: Send + Sync {
    /// Establish the underlying transport. Callers bound this with the
    /// initialization timeout.
    async fn connect(&self) -> Result<(), ClientError>;

    /// Run the authentication exchange if the persisted session is not
    /// already authorized, pulling codes from `codes` as needed.
    async fn authenticate(
        &self,
        phone: &str,
        codes: &dyn CodeProvider,
    ) -> Result<(), AuthError>;

    /// Query the current authorization status.
    async fn auth_status(&self) -> Result<AuthStatus, ClientError>;

    /// List group-like dialogs, newest first. A `limit` of zero means no cap.
    async fn list_dialogs(&self, limit: usize) -> Result<Vec<GroupInfo>, ClientError>;

    /// Fetch recent message history for a group, newest first.
    async fn group_history(
        &self,
        group_id: i64,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, ClientError>;
}

/// Factory for connection handles.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Build a fresh handle bound to a session store and an update sink.
    async fn build(
        &self,
        store: Arc<dyn SessionStore>,
        updates: UpdateSink,
    ) -> Result<Arc<dyn PlatformConnection>, ClientError>;
}
