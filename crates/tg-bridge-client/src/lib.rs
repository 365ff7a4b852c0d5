//! Client lifecycle and authentication coordination.
//!
//! Provides:
//! - `NotificationDispatcher` - event fan-out to registered listeners
//! - `AuthCoordinator` - multi-step login flow with externally supplied codes
//! - `ClientLifecycleManager` - owns teardown and rebuild of the handle
//! - `HealthMonitor` - periodic + on-demand authorization probes
//! - `QueryService` - probe-first read-only data operations
//! - `Bridge` - wiring facade for embedders

pub mod auth;
pub mod bridge;
pub mod dispatch;
pub mod lifecycle;
pub mod monitor;
pub mod query;

pub use auth::{AuthCoordinator, AuthState};
pub use bridge::Bridge;
pub use dispatch::{ListenerId, NotificationDispatcher, Registration};
pub use lifecycle::ClientLifecycleManager;
pub use monitor::HealthMonitor;
pub use query::{GroupListing, MessageListing, QueryService};
