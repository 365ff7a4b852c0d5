//! Session persistence backends for the Telegram bridge.
//!
//! Provides:
//! - `FileSessionStore` - one blob file per account under a fixed directory
//! - `EtcdSessionStore` - JSON-over-HTTP key-value store with a startup probe
//! - `resolve_store` - backend selection from configuration

pub mod etcd;
pub mod file;
mod resolve;

pub use etcd::EtcdSessionStore;
pub use file::FileSessionStore;
pub use resolve::resolve_store;
