//! Environment-sourced configuration.
//!
//! The core consumes configuration, it does not own parsing UX: required
//! values come from the environment (with the alternative `TELEGRAM_`-prefixed
//! names the deployment images use), timing knobs carry production defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Timing and threshold knobs, separated so tests can shrink them.
#[derive(Debug, Clone)]
pub struct Timings {
    /// Pause between failed authentication attempts.
    pub auth_retry_delay: Duration,
    /// Periodic health probe interval. Longer than `probe_timeout`.
    pub probe_interval: Duration,
    /// Per-probe authorization status timeout.
    pub probe_timeout: Duration,
    /// Bound on transport establishment during setup.
    pub init_timeout: Duration,
    /// Best-effort drain window for in-flight operations during teardown.
    pub teardown_grace: Duration,
    /// Delay before a fatal-error rebuild is attempted.
    pub rebuild_delay: Duration,
    /// Per-attempt bound on data queries.
    pub request_timeout: Duration,
    /// Pause between retried data-query attempts.
    pub retry_pause: Duration,
    /// Data-query attempts before giving up.
    pub max_attempts: u32,
    /// Consecutive probe failures that escalate to a rebuild.
    pub failure_threshold: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            auth_retry_delay: Duration::from_secs(30),
            probe_interval: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(10),
            init_timeout: Duration::from_secs(30),
            teardown_grace: Duration::from_secs(2),
            rebuild_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            retry_pause: Duration::from_secs(2),
            max_attempts: 3,
            failure_threshold: 3,
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Account identifier (phone number in international format).
    pub phone: String,
    /// Application credential pair issued by the platform.
    pub app_id: i32,
    pub app_hash: String,
    /// Remote session store endpoint; `None` selects the file backend.
    pub etcd_endpoint: Option<String>,
    /// Directory for the file backend.
    pub session_dir: PathBuf,
    /// Listen port for the tool-invocation surface (required by servers,
    /// irrelevant to embedded use).
    pub port: Option<u16>,
    pub timings: Timings,
}

impl BridgeConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// `ConfigError` when a required value is missing or unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary lookup (testable without
    /// touching process-global environment).
    ///
    /// # Errors
    /// `ConfigError` when a required value is missing or unparsable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let first = |names: [&'static str; 2]| {
            names
                .into_iter()
                .find_map(|n| lookup(n).filter(|v| !v.is_empty()))
        };

        let phone = first(["PHONE", "TELEGRAM_PHONE"]).ok_or(ConfigError::Missing("PHONE"))?;
        let app_id_raw =
            first(["APP_ID", "TELEGRAM_APP_ID"]).ok_or(ConfigError::Missing("APP_ID"))?;
        let app_id: i32 = app_id_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "APP_ID",
            value: app_id_raw.clone(),
        })?;
        if app_id == 0 {
            return Err(ConfigError::Invalid {
                name: "APP_ID",
                value: app_id_raw,
            });
        }
        let app_hash =
            first(["APP_HASH", "TELEGRAM_APP_HASH"]).ok_or(ConfigError::Missing("APP_HASH"))?;

        let etcd_endpoint = lookup("ETCD_ENDPOINT").filter(|v| !v.is_empty());
        let session_dir = lookup("SESSION_DIR")
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from("session"), PathBuf::from);

        let port = match lookup("BRIDGE_SERVER_PORT").filter(|v| !v.is_empty()) {
            Some(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                name: "BRIDGE_SERVER_PORT",
                value: raw.clone(),
            })?),
            None => None,
        };

        Ok(Self {
            phone,
            app_id,
            app_hash,
            etcd_endpoint,
            session_dir,
            port,
            timings: Timings::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn full_configuration_parses() {
        let vars = env(&[
            ("PHONE", "+15551234567"),
            ("APP_ID", "12345"),
            ("APP_HASH", "abcdef"),
            ("ETCD_ENDPOINT", "http://etcd:2379"),
            ("BRIDGE_SERVER_PORT", "8080"),
        ]);
        let config = BridgeConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.phone, "+15551234567");
        assert_eq!(config.app_id, 12345);
        assert_eq!(config.etcd_endpoint.as_deref(), Some("http://etcd:2379"));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.session_dir, PathBuf::from("session"));
    }

    #[test]
    fn alternative_names_are_honored() {
        let vars = env(&[
            ("TELEGRAM_PHONE", "+15551234567"),
            ("TELEGRAM_APP_ID", "7"),
            ("TELEGRAM_APP_HASH", "h"),
        ]);
        let config = BridgeConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.phone, "+15551234567");
        assert_eq!(config.app_id, 7);
        assert!(config.etcd_endpoint.is_none());
    }

    #[test]
    fn missing_phone_is_config_error() {
        let vars = env(&[("APP_ID", "7"), ("APP_HASH", "h")]);
        let err = BridgeConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("PHONE")));
    }

    #[test]
    fn zero_app_id_is_invalid() {
        let vars = env(&[("PHONE", "+1"), ("APP_ID", "0"), ("APP_HASH", "h")]);
        let err = BridgeConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "APP_ID", .. }));
    }
}
