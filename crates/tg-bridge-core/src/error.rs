//! Error taxonomy shared across the bridge.
//!
//! Each component boundary has its own enum; classification of failures from
//! the opaque platform client happens exactly once, at that boundary, via
//! [`classify_raw`] - never later from message text.

use thiserror::Error;

/// Configuration error. Fatal at startup: the process does not start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),
    #[error("{name} is invalid: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Session store error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No session persisted under the key. Expected on first run.
    #[error("session not found")]
    NotFound,
    /// Remote store unreachable. Fatal for the whole process: sessions can
    /// no longer be durably recovered or persisted.
    #[error("session store unreachable: {0}")]
    Connection(String),
    /// Local I/O failure on the file backend. Not process-fatal.
    #[error("session i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of an operation against the platform client handle.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Dead or timed-out connection; retried, escalated via the health
    /// monitor's consecutive-failure threshold.
    #[error("transient connection failure: {0}")]
    Transient(String),
    /// Unrecoverable for the current handle; triggers an immediate rebuild.
    #[error("fatal client failure: {0}")]
    Fatal(String),
    #[error("operation timed out")]
    Timeout,
    #[error("operation cancelled")]
    Cancelled,
    /// Handle not authorized or mid-rebuild; the message is safe to return
    /// to boundary callers as-is.
    #[error("{0}")]
    NotReady(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ClientError {
    /// Whether this failure requires replacing the handle right away,
    /// bypassing the consecutive-failure threshold.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Whether a caller may retry the same handle after a short pause.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout)
    }
}

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Cancelled => Self::Cancelled,
            other => Self::Transient(other.to_string()),
        }
    }
}

/// Authentication flow error.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A code was submitted while none was requested, or one was already
    /// provided for the current request.
    #[error("authentication code not requested or already provided")]
    InvalidState,
    #[error("authentication cancelled")]
    Cancelled,
    /// The exchange itself failed; retried after a fixed delay.
    #[error("authentication failed: {0}")]
    Exchange(String),
}

/// Markers that make a handle unrecoverable. Matched against error text from
/// the underlying platform library, which reports transport teardown only as
/// strings.
const FATAL_MARKERS: &[&str] = &[
    "engine was closed",
    "connection closed",
    "failed to connect",
    "broken pipe",
    "no such host",
    "network is unreachable",
];

/// Markers for a dead-but-replaceable connection.
const TRANSIENT_MARKERS: &[&str] = &["connection", "dead", "timeout", "reset by peer", "eof"];

/// Classify raw error text from the platform library into a typed variant.
///
/// This is the single place foreign error strings are inspected. Platform
/// connector implementations call it immediately around each library call;
/// everything downstream (monitor, lifecycle, queries) matches on the typed
/// variants instead.
#[must_use]
pub fn classify_raw(msg: &str) -> ClientError {
    let lowered = msg.to_ascii_lowercase();
    if FATAL_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ClientError::Fatal(msg.to_owned());
    }
    if lowered.contains("i/o timeout") {
        return ClientError::Fatal(msg.to_owned());
    }
    if TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ClientError::Transient(msg.to_owned());
    }
    // Unknown failures stay non-escalating.
    ClientError::Transient(msg.to_owned())
}
