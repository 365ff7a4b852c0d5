//! Core abstractions for the Telegram bridge.
//!
//! This crate provides the fundamental building blocks:
//! - Typed error taxonomy (`ClientError`, `StorageError`, `AuthError`, `ConfigError`)
//! - `BridgeEvent` - notifications fanned out to external listeners
//! - `PlatformConnection` / `PlatformConnector` - the opaque remote-platform boundary
//! - `SessionStore` - persisted-session contract
//! - `SharedState` - handle slot, readiness flag and rebuild generation

pub mod config;
pub mod error;
pub mod event;
pub mod platform;
pub mod state;
pub mod store;

pub use config::{BridgeConfig, Timings};
pub use error::{AuthError, ClientError, ConfigError, StorageError};
pub use event::BridgeEvent;
pub use platform::{
    AuthStatus, CodeProvider, GroupInfo, MessageRecord, PlatformConnection, PlatformConnector,
    PlatformUpdate, UpdateSink,
};
pub use state::SharedState;
pub use store::{SessionKey, SessionStore};
