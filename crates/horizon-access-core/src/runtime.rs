//! Hooks into the OS accessibility runtime.
//!
//! The bridge never talks to the OS directly; the hosting toolkit injects a
//! [`PlatformRuntime`] at owner construction. Both hooks are fire-and-forget
//! notifications; nothing in this crate depends on a return value.

use std::cell::RefCell;

use crate::runtime_id::RuntimeId;

/// Automation events the bridge can raise toward assistive technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutomationEvent {
    /// Keyboard focus moved to the node.
    FocusChanged,
    /// The container's selection changed.
    SelectionChanged,
    /// The node became the selected element of its container.
    SelectionItemSelected,
    /// An expandable node expanded or collapsed.
    ExpandCollapseStateChanged,
    /// The subtree under the node was rebuilt.
    StructureChanged,
    /// Live text content under the node changed.
    LiveRegionChanged,
}

/// The OS accessibility runtime as seen from the bridge.
///
/// `disconnect_provider` must be called for every node reference the
/// bridge retires, before the node is discarded, so assistive-technology
/// clients holding that reference are told it is no longer valid.
pub trait PlatformRuntime {
    /// Invalidate a previously issued node reference.
    fn disconnect_provider(&self, id: &RuntimeId);

    /// Raise an automation event for a node.
    fn raise_event(&self, event: AutomationEvent, id: &RuntimeId);
}

/// A runtime that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRuntime;

impl PlatformRuntime for NullRuntime {
    fn disconnect_provider(&self, _id: &RuntimeId) {}

    fn raise_event(&self, _event: AutomationEvent, _id: &RuntimeId) {}
}

/// A runtime that records every notification, for tests.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    disconnected: RefCell<Vec<RuntimeId>>,
    events: RefCell<Vec<(AutomationEvent, RuntimeId)>>,
}

impl RecordingRuntime {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every disconnected id, in call order.
    pub fn disconnected(&self) -> Vec<RuntimeId> {
        self.disconnected.borrow().clone()
    }

    /// Every raised event, in call order.
    pub fn events(&self) -> Vec<(AutomationEvent, RuntimeId)> {
        self.events.borrow().clone()
    }

    /// How many times the id was disconnected.
    pub fn disconnect_count(&self, id: &RuntimeId) -> usize {
        self.disconnected
            .borrow()
            .iter()
            .filter(|entry| *entry == id)
            .count()
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        self.disconnected.borrow_mut().clear();
        self.events.borrow_mut().clear();
    }
}

impl PlatformRuntime for RecordingRuntime {
    fn disconnect_provider(&self, id: &RuntimeId) {
        self.disconnected.borrow_mut().push(id.clone());
    }

    fn raise_event(&self, event: AutomationEvent, id: &RuntimeId) {
        self.events.borrow_mut().push((event, id.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_runtime_records_in_order() {
        let runtime = RecordingRuntime::new();
        let a = RuntimeId::for_owner(1, 1);
        let b = RuntimeId::for_owner(1, 2);
        runtime.disconnect_provider(&a);
        runtime.raise_event(AutomationEvent::FocusChanged, &b);
        runtime.disconnect_provider(&a);
        assert_eq!(runtime.disconnect_count(&a), 2);
        assert_eq!(runtime.events(), vec![(AutomationEvent::FocusChanged, b)]);
    }
}
