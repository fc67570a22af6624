//! Shared owner-side plumbing for widget accessibility state.
//!
//! Every widget facade holds its state in an `Rc<RefCell<...>>`; the nodes
//! it hands out hold `Weak` references back, so a dropped owner surfaces
//! as [`AccessError::OwnerDetached`] instead of dangling. The state embeds
//! an [`OwnerCore`] carrying what every widget shares: the native window
//! handle, screen bounds, enabled/focused flags, and the registry-allocated
//! hash that feeds runtime-id composition.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use horizon_access_core::{
    AccessError, AccessResult, AccessibleStates, OwnerKey, Rect, RuntimeId, global_registry,
};

/// The widget state every owner shares.
pub struct OwnerCore {
    key: OwnerKey,
    hash: i32,
    handle: Option<i64>,
    bounds: Rect,
    enabled: bool,
    focused: bool,
    visible: bool,
}

impl OwnerCore {
    /// Register a new owner with the global registry.
    pub fn new() -> AccessResult<Self> {
        let (key, hash) = global_registry()?.register_owner();
        Ok(Self {
            key,
            hash,
            handle: None,
            bounds: Rect::ZERO,
            enabled: true,
            focused: false,
            visible: true,
        })
    }

    /// The registry key of this owner.
    pub fn key(&self) -> OwnerKey {
        self.key
    }

    /// The stable per-instance hash used in runtime ids.
    pub fn hash(&self) -> i32 {
        self.hash
    }

    /// The native window handle, if created.
    pub fn handle(&self) -> Option<i64> {
        self.handle
    }

    /// Whether the native handle exists.
    pub fn handle_created(&self) -> bool {
        self.handle.is_some()
    }

    /// The handle, or the precondition error for operations that need it.
    pub fn ensure_handle(&self) -> AccessResult<i64> {
        self.handle.ok_or(AccessError::HandleNotCreated)
    }

    /// Assign a (new) native handle. Runtime ids derived before this call
    /// are stale afterwards; callers clear their node caches.
    pub fn set_handle(&mut self, handle: i64) {
        self.handle = Some(handle);
    }

    /// Drop the native handle (window destroyed).
    pub fn clear_handle(&mut self) {
        self.handle = None;
    }

    /// The owner's screen-space bounds.
    pub fn bounds(&self) -> Rect {
        if self.handle_created() { self.bounds } else { Rect::ZERO }
    }

    /// Update the owner's screen-space bounds.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn focused(&self) -> bool {
        self.focused
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// The runtime id of the owner's root node.
    pub fn runtime_id(&self) -> RuntimeId {
        RuntimeId::for_owner(self.handle.unwrap_or(0), self.hash)
    }

    /// The state flags every node under this owner starts from.
    pub fn base_states(&self) -> AccessibleStates {
        let mut states = AccessibleStates::NONE;
        if !self.enabled {
            states |= AccessibleStates::UNAVAILABLE;
        }
        if !self.visible {
            states |= AccessibleStates::INVISIBLE;
        }
        states
    }
}

impl Drop for OwnerCore {
    fn drop(&mut self) {
        if let Ok(registry) = global_registry() {
            registry.unregister_owner(self.key);
        }
    }
}

/// Upgrade a node's weak owner reference, surfacing detachment as an error.
pub(crate) fn upgrade_owner<T>(owner: &Weak<RefCell<T>>) -> AccessResult<Rc<RefCell<T>>> {
    owner.upgrade().ok_or(AccessError::OwnerDetached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_access_core::init_global_registry;

    #[test]
    fn test_handle_gates_bounds() {
        init_global_registry();
        let mut core = OwnerCore::new().unwrap();
        core.set_bounds(Rect::new(10.0, 10.0, 100.0, 30.0));
        assert_eq!(core.bounds(), Rect::ZERO);
        core.set_handle(0x100);
        assert_eq!(core.bounds(), Rect::new(10.0, 10.0, 100.0, 30.0));
    }

    #[test]
    fn test_ensure_handle_error() {
        init_global_registry();
        let core = OwnerCore::new().unwrap();
        assert_eq!(core.ensure_handle(), Err(AccessError::HandleNotCreated));
    }

    #[test]
    fn test_runtime_id_tracks_handle() {
        init_global_registry();
        let mut core = OwnerCore::new().unwrap();
        let before = core.runtime_id();
        core.set_handle(0x200);
        let after = core.runtime_id();
        assert_ne!(before, after);
        core.set_handle(0x300);
        assert_ne!(after, core.runtime_id());
    }
}
