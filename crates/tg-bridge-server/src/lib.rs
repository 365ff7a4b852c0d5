//! HTTP serving surface for the bridge.
//!
//! Provides:
//! - Tool routes (submit code, list groups, list group messages)
//! - SSE event feed wired to the notification dispatcher
//! - Readiness endpoint
//! - `serve` with graceful shutdown on the root cancellation token

pub mod routes;

pub use routes::{AppState, router, serve};
