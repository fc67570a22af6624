//! Accessible tree for tool strip widgets.
//!
//! The strip root is a ToolBar whose children are one node per item.
//! Buttons carry the Invoke pattern and report pressed state for toggle
//! buttons; labels and separators are inert.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use horizon_access_core::{
    AccessError, AccessResult, AccessibleNode, AccessibleRole, AccessibleStates, AutomationEvent,
    ChildKey, FragmentDirection, NodeCache, NodeRef, PatternId, PlatformRuntime, Point, Rect,
    RuntimeId, SystemProxyRef, SystemProxyWrapper,
};

use crate::owner::{OwnerCore, upgrade_owner};

mod parts {
    pub const ITEM: i32 = 1;
}

const ITEM_WIDTH: f32 = 28.0;
const SEPARATOR_WIDTH: f32 = 6.0;

/// What kind of control a strip item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStripItemKind {
    /// A momentary push button.
    Button,
    /// A two-state button that stays pressed until invoked again.
    ToggleButton,
    /// Static text.
    Label,
    /// A visual divider.
    Separator,
}

struct StripItem {
    id: u64,
    text: String,
    kind: ToolStripItemKind,
    enabled: bool,
    pressed: bool,
    clicks: u32,
}

impl StripItem {
    fn width(&self) -> f32 {
        match self.kind {
            ToolStripItemKind::Separator => SEPARATOR_WIDTH,
            _ => ITEM_WIDTH,
        }
    }
}

/// The widget state the accessible tree reads.
pub struct ToolStripState {
    core: OwnerCore,
    runtime: Rc<dyn PlatformRuntime>,
    wrapper: SystemProxyWrapper,
    items: Vec<StripItem>,
    focused_item: Option<u64>,
    root: Option<Rc<ToolStripAccessibleObject>>,
    item_nodes: NodeCache,
}

impl ToolStripState {
    fn item_index(&self, id: u64) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn item_bounds(&self, id: u64) -> Rect {
        let bounds = self.core.bounds();
        if bounds.is_empty() {
            return Rect::ZERO;
        }
        let mut x = bounds.left();
        for item in &self.items {
            let width = item.width();
            if item.id == id {
                return Rect::new(x, bounds.top(), width, bounds.size.height);
            }
            x += width;
        }
        Rect::ZERO
    }
}

/// A tool strip widget facade: the owner side of the accessible tree.
pub struct ToolStrip {
    state: Rc<RefCell<ToolStripState>>,
}

impl ToolStrip {
    pub fn new(runtime: Rc<dyn PlatformRuntime>) -> AccessResult<Self> {
        let state = ToolStripState {
            core: OwnerCore::new()?,
            runtime,
            wrapper: SystemProxyWrapper::detached(),
            items: Vec::new(),
            focused_item: None,
            root: None,
            item_nodes: NodeCache::new(),
        };
        Ok(Self {
            state: Rc::new(RefCell::new(state)),
        })
    }

    /// Attach the OS-supplied accessible proxy for the native window.
    pub fn attach_system_proxy(&self, proxy: SystemProxyRef) {
        self.state.borrow_mut().wrapper = SystemProxyWrapper::new(proxy);
    }

    pub fn create_handle(&self, handle: i64) {
        self.state.borrow_mut().core.set_handle(handle);
    }

    /// Destroy and recreate the native handle, disconnecting every node
    /// issued under the old handle.
    pub fn recreate_handle(&self, handle: i64) {
        let (runtime, stale) = {
            let mut state = self.state.borrow_mut();
            let mut stale: Vec<NodeRef> = Vec::new();
            if let Some(node) = state.root.take() {
                stale.push(node);
            }
            stale.append(&mut state.item_nodes.drain());
            (state.runtime.clone(), stale)
        };
        // Runtime ids must be captured before the handle changes.
        let stale_ids: Vec<RuntimeId> = stale.iter().map(|node| node.runtime_id()).collect();
        self.state.borrow_mut().core.set_handle(handle);
        tracing::debug!(target: "horizon_access::widgets", stale = stale_ids.len(), "tool strip handle recreated");
        for id in &stale_ids {
            runtime.disconnect_provider(id);
        }
    }

    pub fn set_bounds(&self, bounds: Rect) {
        self.state.borrow_mut().core.set_bounds(bounds);
    }

    pub fn set_focused(&self, focused: bool) {
        self.state.borrow_mut().core.set_focused(focused);
    }

    /// Append an item, returning its stable identity.
    pub fn add_item(&self, kind: ToolStripItemKind, text: impl Into<String>) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.items.iter().map(|item| item.id).max().unwrap_or(0) + 1;
        state.items.push(StripItem {
            id,
            text: text.into(),
            kind,
            enabled: true,
            pressed: false,
            clicks: 0,
        });
        id
    }

    /// Remove an item, disconnecting its cached node.
    pub fn remove_item(&self, id: u64) -> AccessResult<()> {
        let (runtime, stale, root_id) = {
            let mut state = self.state.borrow_mut();
            let index = state
                .item_index(id)
                .ok_or(AccessError::ChildIndexOutOfRange {
                    index: 0,
                    count: state.items.len(),
                })?;
            state.items.remove(index);
            if state.focused_item == Some(id) {
                state.focused_item = None;
            }
            let stale = state.item_nodes.take(ChildKey::Item(id));
            (state.runtime.clone(), stale, state.core.runtime_id())
        };
        if let Some(node) = stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
        runtime.raise_event(AutomationEvent::StructureChanged, &root_id);
        Ok(())
    }

    pub fn set_item_enabled(&self, id: u64, enabled: bool) {
        let mut state = self.state.borrow_mut();
        if let Some(index) = state.item_index(id) {
            state.items[index].enabled = enabled;
        }
    }

    /// Move keyboard focus within the strip. Raises FocusChanged on the
    /// item's node while the strip owns keyboard focus.
    pub fn set_focused_item(&self, id: u64) -> AccessResult<()> {
        let (runtime, event_target) = {
            let mut state = self.state.borrow_mut();
            if state.item_index(id).is_none() {
                return Err(AccessError::ChildIndexOutOfRange {
                    index: 0,
                    count: state.items.len(),
                });
            }
            state.focused_item = Some(id);
            let target = state
                .core
                .focused()
                .then(|| state.core.runtime_id().with_part(parts::ITEM, id as i32));
            (state.runtime.clone(), target)
        };
        if let Some(target) = event_target {
            runtime.raise_event(AutomationEvent::FocusChanged, &target);
        }
        Ok(())
    }

    /// How many times the item's default action ran.
    pub fn click_count(&self, id: u64) -> u32 {
        let state = self.state.borrow();
        state
            .item_index(id)
            .map(|index| state.items[index].clicks)
            .unwrap_or(0)
    }

    pub fn item_count(&self) -> usize {
        self.state.borrow().items.len()
    }

    /// The root accessible object for this tool strip.
    pub fn accessibility_object(&self) -> NodeRef {
        root_node(&self.state)
    }
}

fn root_node(state: &Rc<RefCell<ToolStripState>>) -> NodeRef {
    if let Some(node) = state.borrow().root.clone() {
        return node;
    }
    let node = Rc::new(ToolStripAccessibleObject {
        owner: Rc::downgrade(state),
        wrapper: state.borrow().wrapper.clone(),
    });
    state.borrow_mut().root = Some(node.clone());
    node
}

fn item_node(state: &Rc<RefCell<ToolStripState>>, item_id: u64) -> NodeRef {
    let owner = Rc::downgrade(state);
    state
        .borrow_mut()
        .item_nodes
        .get_or_insert_with(ChildKey::Item(item_id), || {
            Rc::new(ToolStripItemAccessibleObject { owner, item_id })
        })
}

fn strip_children(state: &Rc<RefCell<ToolStripState>>) -> Vec<NodeRef> {
    let ids: Vec<u64> = state.borrow().items.iter().map(|item| item.id).collect();
    ids.into_iter().map(|id| item_node(state, id)).collect()
}

fn sibling_in(
    children: &[NodeRef],
    me: &RuntimeId,
    direction: FragmentDirection,
) -> Option<NodeRef> {
    let index = children.iter().position(|child| child.runtime_id() == *me)?;
    match direction {
        FragmentDirection::NextSibling => children.get(index + 1).cloned(),
        FragmentDirection::PreviousSibling => {
            index.checked_sub(1).and_then(|i| children.get(i).cloned())
        }
        _ => None,
    }
}

/// The tool strip's own accessible object (the fragment root).
pub struct ToolStripAccessibleObject {
    owner: Weak<RefCell<ToolStripState>>,
    wrapper: SystemProxyWrapper,
}

impl AccessibleNode for ToolStripAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state.borrow().core.runtime_id(),
            None => RuntimeId::default(),
        }
    }

    fn system_wrapper(&self) -> Option<&SystemProxyWrapper> {
        Some(&self.wrapper)
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let bounds = state.borrow().core.bounds();
        Ok(bounds)
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::ToolBar)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states();
        if guard.core.focused() {
            states |= AccessibleStates::FOCUSED;
        }
        Ok(states)
    }

    fn child_count(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        let count = state.borrow().items.len();
        Some(count)
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let id = {
            let guard = state.borrow();
            guard
                .items
                .get(index)
                .map(|item| item.id)
                .ok_or(AccessError::ChildIndexOutOfRange {
                    index,
                    count: guard.items.len(),
                })?
        };
        Ok(Some(item_node(&state, id)))
    }

    fn hit_test(&self, point: Point) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        let hit = {
            let guard = state.borrow();
            guard
                .items
                .iter()
                .map(|item| item.id)
                .find(|&id| guard.item_bounds(id).contains(point))
        };
        hit.map(|id| item_node(&state, id))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::FirstChild => strip_children(&state).first().cloned(),
            FragmentDirection::LastChild => strip_children(&state).last().cloned(),
            _ => None,
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(pattern, PatternId::LegacyIAccessible)
    }
}

/// One item in the strip.
pub struct ToolStripItemAccessibleObject {
    owner: Weak<RefCell<ToolStripState>>,
    item_id: u64,
}

impl ToolStripItemAccessibleObject {
    fn kind(&self) -> Option<ToolStripItemKind> {
        let state = self.owner.upgrade()?;
        let guard = state.borrow();
        guard
            .item_index(self.item_id)
            .map(|index| guard.items[index].kind)
    }
}

impl AccessibleNode for ToolStripItemAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::ITEM, self.item_id as i32),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let bounds = state.borrow().item_bounds(self.item_id);
        Ok(bounds)
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        Ok(guard.item_index(self.item_id).and_then(|index| {
            let item = &guard.items[index];
            match item.kind {
                ToolStripItemKind::Separator => None,
                _ => Some(item.text.clone()),
            }
        }))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(match self.kind() {
            Some(ToolStripItemKind::Button | ToolStripItemKind::ToggleButton) => {
                AccessibleRole::PushButton
            }
            Some(ToolStripItemKind::Label) => AccessibleRole::StaticText,
            Some(ToolStripItemKind::Separator) => AccessibleRole::Separator,
            None => AccessibleRole::None,
        })
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states();
        let Some(index) = guard.item_index(self.item_id) else {
            return Ok(states);
        };
        let item = &guard.items[index];
        if !matches!(item.kind, ToolStripItemKind::Separator | ToolStripItemKind::Label) {
            states |= AccessibleStates::FOCUSABLE;
        }
        if !item.enabled {
            states |= AccessibleStates::UNAVAILABLE;
        }
        if item.pressed {
            states |= AccessibleStates::PRESSED;
        }
        if guard.focused_item == Some(self.item_id) && guard.core.focused() {
            states |= AccessibleStates::FOCUSED;
        }
        Ok(states)
    }

    fn default_action(&self) -> AccessResult<Option<String>> {
        Ok(match self.kind() {
            Some(ToolStripItemKind::Button | ToolStripItemKind::ToggleButton) => {
                Some("Press".to_string())
            }
            _ => None,
        })
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(root_node(&state)),
            _ => sibling_in(&strip_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        match self.kind() {
            Some(ToolStripItemKind::Button) => {
                matches!(pattern, PatternId::LegacyIAccessible | PatternId::Invoke)
            }
            Some(ToolStripItemKind::ToggleButton) => matches!(
                pattern,
                PatternId::LegacyIAccessible | PatternId::Invoke | PatternId::Toggle
            ),
            _ => matches!(pattern, PatternId::LegacyIAccessible),
        }
    }

    /// Press the item. Disabled items, labels and separators do nothing.
    fn do_default_action(&self) -> AccessResult<()> {
        let state = upgrade_owner(&self.owner)?;
        let mut guard = state.borrow_mut();
        guard.core.ensure_handle()?;
        let Some(index) = guard.item_index(self.item_id) else {
            return Ok(());
        };
        let item = &mut guard.items[index];
        if !item.enabled {
            return Ok(());
        }
        match item.kind {
            ToolStripItemKind::Button => item.clicks += 1,
            ToolStripItemKind::ToggleButton => {
                item.clicks += 1;
                item.pressed = !item.pressed;
            }
            ToolStripItemKind::Label | ToolStripItemKind::Separator => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use horizon_access_core::{RecordingRuntime, init_global_registry};

    fn strip() -> (ToolStrip, Rc<RecordingRuntime>) {
        init_global_registry();
        let runtime = Rc::new(RecordingRuntime::new());
        let strip = ToolStrip::new(runtime.clone()).unwrap();
        strip.create_handle(0x8000);
        strip.set_bounds(Rect::new(0.0, 0.0, 200.0, 26.0));
        (strip, runtime)
    }

    #[test]
    fn test_roles_per_item_kind() {
        let (strip, _) = strip();
        let save = strip.add_item(ToolStripItemKind::Button, "Save");
        let sep = strip.add_item(ToolStripItemKind::Separator, "");
        let status = strip.add_item(ToolStripItemKind::Label, "Ready");
        assert_eq!(
            item_node(&strip.state, save).role().unwrap(),
            AccessibleRole::PushButton
        );
        assert_eq!(
            item_node(&strip.state, sep).role().unwrap(),
            AccessibleRole::Separator
        );
        assert_eq!(
            item_node(&strip.state, status).role().unwrap(),
            AccessibleRole::StaticText
        );
    }

    #[test]
    fn test_separator_has_no_name_or_action() {
        let (strip, _) = strip();
        let sep = strip.add_item(ToolStripItemKind::Separator, "ignored");
        let node = item_node(&strip.state, sep);
        assert_eq!(node.name().unwrap(), None);
        assert_eq!(node.default_action().unwrap(), None);
        assert!(!node.is_pattern_supported(PatternId::Invoke));
    }

    #[test]
    fn test_button_invoke_counts_clicks() {
        let (strip, _) = strip();
        let save = strip.add_item(ToolStripItemKind::Button, "Save");
        let node = item_node(&strip.state, save);
        node.do_default_action().unwrap();
        node.do_default_action().unwrap();
        assert_eq!(strip.click_count(save), 2);
    }

    #[test]
    fn test_toggle_button_tracks_pressed() {
        let (strip, _) = strip();
        let bold = strip.add_item(ToolStripItemKind::ToggleButton, "Bold");
        let node = item_node(&strip.state, bold);
        assert!(node.is_pattern_supported(PatternId::Toggle));
        node.do_default_action().unwrap();
        assert!(node.state().unwrap().contains(AccessibleStates::PRESSED));
        node.do_default_action().unwrap();
        assert!(!node.state().unwrap().contains(AccessibleStates::PRESSED));
    }

    #[test]
    fn test_disabled_button_ignores_invoke() {
        let (strip, _) = strip();
        let save = strip.add_item(ToolStripItemKind::Button, "Save");
        strip.set_item_enabled(save, false);
        let node = item_node(&strip.state, save);
        node.do_default_action().unwrap();
        assert_eq!(strip.click_count(save), 0);
        assert!(node.state().unwrap().contains(AccessibleStates::UNAVAILABLE));
    }

    #[test]
    fn test_invoke_requires_handle() {
        init_global_registry();
        let runtime = Rc::new(RecordingRuntime::new());
        let strip = ToolStrip::new(runtime).unwrap();
        let save = strip.add_item(ToolStripItemKind::Button, "Save");
        let node = item_node(&strip.state, save);
        assert_eq!(node.do_default_action(), Err(AccessError::HandleNotCreated));
    }

    #[test]
    fn test_item_focus_event_gated_on_strip_focus() {
        let (strip, runtime) = strip();
        let save = strip.add_item(ToolStripItemKind::Button, "Save");
        strip.set_focused_item(save).unwrap();
        assert!(runtime.events().is_empty());
        strip.set_focused(true);
        strip.set_focused_item(save).unwrap();
        assert_eq!(runtime.events().len(), 1);
        let node = item_node(&strip.state, save);
        assert!(node.state().unwrap().contains(AccessibleStates::FOCUSED));
    }

    #[test]
    fn test_sibling_order_and_hit_test() {
        let (strip, _) = strip();
        let save = strip.add_item(ToolStripItemKind::Button, "Save");
        strip.add_item(ToolStripItemKind::Separator, "");
        let root = strip.accessibility_object();
        let first = root.fragment_navigate(FragmentDirection::FirstChild).unwrap();
        assert_eq!(first.runtime_id(), item_node(&strip.state, save).runtime_id());
        let next = first.fragment_navigate(FragmentDirection::NextSibling).unwrap();
        assert_eq!(next.role().unwrap(), AccessibleRole::Separator);
        // Separators start after the first item's 28px slot.
        let hit = root.hit_test(Point::new(30.0, 10.0)).unwrap();
        assert_eq!(hit.runtime_id(), next.runtime_id());
    }

    #[test]
    fn test_remove_item_disconnects_node() {
        let (strip, runtime) = strip();
        let save = strip.add_item(ToolStripItemKind::Button, "Save");
        let node = item_node(&strip.state, save);
        let rid = node.runtime_id();
        strip.remove_item(save).unwrap();
        assert_eq!(runtime.disconnect_count(&rid), 1);
        assert_eq!(strip.item_count(), 0);
    }
}
