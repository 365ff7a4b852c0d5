//! Shared mutable state crossing task boundaries.
//!
//! The handle slot and the readiness flag are the only resources mutated
//! across tasks. All access goes through the named accessors here; critical
//! sections are short and never held across an await point.

use std::sync::{
    Arc, RwLock,
    atomic::{AtomicU64, Ordering},
};

use crate::platform::PlatformConnection;

/// Single shared instance passed by reference to every component.
pub struct SharedState {
    ready: RwLock<bool>,
    handle: RwLock<Option<Arc<dyn PlatformConnection>>>,
    generation: AtomicU64,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            handle: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Whether the handle is authorized and safe for data operations.
    ///
    /// Eventually consistent: a reader may observe a stale `true` briefly
    /// after a rebuild begins.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.ready.read().unwrap()
    }

    pub fn set_ready(&self, ready: bool) {
        *self.ready.write().unwrap() = ready;
    }

    /// Current authoritative handle, if any. The clone is only valid for the
    /// duration of the call the holder is about to make.
    #[must_use]
    pub fn handle(&self) -> Option<Arc<dyn PlatformConnection>> {
        self.handle.read().unwrap().clone()
    }

    pub fn install_handle(&self, handle: Arc<dyn PlatformConnection>) {
        *self.handle.write().unwrap() = Some(handle);
    }

    /// Remove and return the current handle, leaving the slot empty.
    pub fn take_handle(&self) -> Option<Arc<dyn PlatformConnection>> {
        self.handle.write().unwrap().take()
    }

    /// Rebuild generation, incremented at the start of every setup. Delayed
    /// rebuild tasks no-op when the generation has advanced past the one they
    /// were scheduled under.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Advance the generation and return the new value.
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_defaults_false() {
        let state = SharedState::new();
        assert!(!state.is_ready());
        state.set_ready(true);
        assert!(state.is_ready());
    }

    #[test]
    fn generation_is_monotonic() {
        let state = SharedState::new();
        assert_eq!(state.generation(), 0);
        assert_eq!(state.advance_generation(), 1);
        assert_eq!(state.advance_generation(), 2);
        assert_eq!(state.generation(), 2);
    }

    #[test]
    fn take_handle_empties_slot() {
        let state = SharedState::new();
        assert!(state.handle().is_none());
        assert!(state.take_handle().is_none());
    }
}
