//! Persisted-session contract.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Stable identity of a persisted session: a hex digest of the account
/// identifier. Safe to embed in file names and remote keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// Derive the key for an account identifier (phone number).
    #[must_use]
    pub fn for_account(account: &str) -> Self {
        let digest = Sha256::digest(account.as_bytes());
        Self(hex::encode(digest))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage backend for the opaque authentication-session blob.
///
/// The blob is created on first successful authentication, overwritten on
/// every persisted state change, and read once at handle construction.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the session blob for `key`.
    ///
    /// # Errors
    /// `StorageError::NotFound` when no session exists (expected on first
    /// run); `StorageError::Connection` when the backend is unreachable.
    async fn load(&self, key: &SessionKey) -> Result<Vec<u8>, StorageError>;

    /// Persist the session blob for `key`, replacing any previous value.
    ///
    /// # Errors
    /// `StorageError::Connection` when the backend is unreachable.
    async fn save(&self, key: &SessionKey, data: &[u8]) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_and_hex() {
        let a = SessionKey::for_account("+15551234567");
        let b = SessionKey::for_account("+15551234567");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_accounts_get_distinct_keys() {
        let a = SessionKey::for_account("+15551234567");
        let b = SessionKey::for_account("+15557654321");
        assert_ne!(a, b);
    }
}
