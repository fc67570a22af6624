//! Accessible tree for tab control widgets.
//!
//! The fragment tree is custom: one page-tab node per page, then the
//! content pane of the selected page. Legacy child enumeration is the
//! opposite: the tab control defers to the system proxy's enumerator and
//! only reorders it, exposing proxy children in page display order via
//! [`AccessibleNode::system_child_order`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use horizon_access_core::{
    AccessError, AccessResult, AccessibleNode, AccessibleRole, AccessibleStates, AutomationEvent,
    ChildKey, FragmentDirection, NodeCache, NodeRef, PatternId, PlatformRuntime, PropertyId,
    PropertyValue, Rect, RuntimeId, SelectionFlags, SystemProxyRef, SystemProxyWrapper,
    default_property_value,
};

use crate::owner::{OwnerCore, upgrade_owner};

mod parts {
    pub const TAB: i32 = 1;
    pub const PANE: i32 = 2;
}

const TAB_HEIGHT: f32 = 22.0;
const TAB_WIDTH: f32 = 80.0;

struct TabPage {
    id: u64,
    title: String,
    enabled: bool,
    /// Position in the rendered tab strip; creation order otherwise.
    display_index: usize,
}

/// The widget state the accessible tree reads.
pub struct TabControlState {
    core: OwnerCore,
    runtime: Rc<dyn PlatformRuntime>,
    wrapper: SystemProxyWrapper,
    tabs: Vec<TabPage>,
    selected: Option<usize>,
    root: Option<Rc<TabControlAccessibleObject>>,
    tab_nodes: NodeCache,
    pane_nodes: NodeCache,
}

impl TabControlState {
    fn tab_index(&self, id: u64) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id == id)
    }

    /// Tab indices in display order.
    fn display_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.tabs.len()).collect();
        order.sort_by_key(|&index| self.tabs[index].display_index);
        order
    }

    fn tab_bounds(&self, id: u64) -> Rect {
        let bounds = self.core.bounds();
        if bounds.is_empty() {
            return Rect::ZERO;
        }
        let Some(index) = self.tab_index(id) else {
            return Rect::ZERO;
        };
        let Some(position) = self.display_order().iter().position(|&entry| entry == index)
        else {
            return Rect::ZERO;
        };
        Rect::new(
            bounds.left() + position as f32 * TAB_WIDTH,
            bounds.top(),
            TAB_WIDTH,
            TAB_HEIGHT,
        )
    }

    fn pane_bounds(&self) -> Rect {
        let bounds = self.core.bounds();
        if bounds.is_empty() {
            return Rect::ZERO;
        }
        Rect::new(
            bounds.left(),
            bounds.top() + TAB_HEIGHT,
            bounds.size.width,
            (bounds.size.height - TAB_HEIGHT).max(0.0),
        )
    }
}

/// A tab control widget facade: the owner side of the accessible tree.
pub struct TabControl {
    state: Rc<RefCell<TabControlState>>,
}

impl TabControl {
    pub fn new(runtime: Rc<dyn PlatformRuntime>) -> AccessResult<Self> {
        let state = TabControlState {
            core: OwnerCore::new()?,
            runtime,
            wrapper: SystemProxyWrapper::detached(),
            tabs: Vec::new(),
            selected: None,
            root: None,
            tab_nodes: NodeCache::new(),
            pane_nodes: NodeCache::new(),
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
            stale.append(&mut state.tab_nodes.drain());
            stale.append(&mut state.pane_nodes.drain());
            (state.runtime.clone(), stale)
        };
        // Runtime ids must be captured before the handle changes.
        let stale_ids: Vec<RuntimeId> = stale.iter().map(|node| node.runtime_id()).collect();
        self.state.borrow_mut().core.set_handle(handle);
        tracing::debug!(target: "horizon_access::widgets", stale = stale_ids.len(), "tab control handle recreated");
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

    /// Append a page, returning its stable identity. The first page is
    /// selected automatically.
    pub fn add_tab(&self, title: impl Into<String>) -> u64 {
        let mut state = self.state.borrow_mut();
        let id = state.tabs.iter().map(|tab| tab.id).max().unwrap_or(0) + 1;
        let display_index = state.tabs.len();
        state.tabs.push(TabPage {
            id,
            title: title.into(),
            enabled: true,
            display_index,
        });
        if state.selected.is_none() {
            state.selected = Some(state.tabs.len() - 1);
        }
        id
    }

    /// Remove a page, disconnecting its tab and pane nodes.
    pub fn remove_tab(&self, id: u64) -> AccessResult<()> {
        let (runtime, stale) = {
            let mut state = self.state.borrow_mut();
            let index = state
                .tab_index(id)
                .ok_or(AccessError::ChildIndexOutOfRange {
                    index: 0,
                    count: state.tabs.len(),
                })?;
            state.tabs.remove(index);
            match state.selected {
                Some(selected) if selected == index => {
                    state.selected = if state.tabs.is_empty() { None } else { Some(0) };
                }
                Some(selected) if selected > index => state.selected = Some(selected - 1),
                _ => {}
            }
            let mut stale: Vec<NodeRef> = Vec::new();
            if let Some(node) = state.tab_nodes.take(ChildKey::Item(id)) {
                stale.push(node);
            }
            if let Some(node) = state.pane_nodes.take(ChildKey::Item(id)) {
                stale.push(node);
            }
            (state.runtime.clone(), stale)
        };
        for node in stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
        Ok(())
    }

    pub fn set_tab_enabled(&self, id: u64, enabled: bool) {
        let mut state = self.state.borrow_mut();
        if let Some(index) = state.tab_index(id) {
            state.tabs[index].enabled = enabled;
        }
    }

    /// Reposition a tab in the rendered strip.
    pub fn set_tab_display_index(&self, id: u64, display_index: usize) {
        let mut state = self.state.borrow_mut();
        if let Some(index) = state.tab_index(id) {
            state.tabs[index].display_index = display_index;
        }
    }

    /// Select a page. Raises a selection event on the tab's node while the
    /// control owns keyboard focus.
    pub fn select_tab(&self, id: u64) -> AccessResult<()> {
        let (runtime, event_target) = {
            let mut state = self.state.borrow_mut();
            let index = state
                .tab_index(id)
                .ok_or(AccessError::ChildIndexOutOfRange {
                    index: 0,
                    count: state.tabs.len(),
                })?;
            state.selected = Some(index);
            let target = state
                .core
                .focused()
                .then(|| state.core.runtime_id().with_part(parts::TAB, id as i32));
            (state.runtime.clone(), target)
        };
        if let Some(target) = event_target {
            runtime.raise_event(AutomationEvent::SelectionItemSelected, &target);
        }
        Ok(())
    }

    pub fn selected_tab(&self) -> Option<u64> {
        let state = self.state.borrow();
        state.selected.map(|index| state.tabs[index].id)
    }

    pub fn tab_count(&self) -> usize {
        self.state.borrow().tabs.len()
    }

    /// The root accessible object for this tab control.
    pub fn accessibility_object(&self) -> NodeRef {
        root_node(&self.state)
    }
}

fn root_node(state: &Rc<RefCell<TabControlState>>) -> NodeRef {
    if let Some(node) = state.borrow().root.clone() {
        return node;
    }
    let node = Rc::new(TabControlAccessibleObject {
        owner: Rc::downgrade(state),
        wrapper: state.borrow().wrapper.clone(),
    });
    state.borrow_mut().root = Some(node.clone());
    node
}

fn tab_node(state: &Rc<RefCell<TabControlState>>, tab_id: u64) -> NodeRef {
    let owner = Rc::downgrade(state);
    state
        .borrow_mut()
        .tab_nodes
        .get_or_insert_with(ChildKey::Item(tab_id), || {
            Rc::new(TabAccessibleObject { owner, tab_id })
        })
}

fn pane_node(state: &Rc<RefCell<TabControlState>>, tab_id: u64) -> NodeRef {
    let owner = Rc::downgrade(state);
    state
        .borrow_mut()
        .pane_nodes
        .get_or_insert_with(ChildKey::Item(tab_id), || {
            Rc::new(TabPaneAccessibleObject { owner, tab_id })
        })
}

/// Fragment children: tabs in display order, then the selected pane.
fn tab_children(state: &Rc<RefCell<TabControlState>>) -> Vec<NodeRef> {
    let (tab_ids, selected) = {
        let guard = state.borrow();
        let ids: Vec<u64> = guard
            .display_order()
            .into_iter()
            .map(|index| guard.tabs[index].id)
            .collect();
        let selected = guard.selected.map(|index| guard.tabs[index].id);
        (ids, selected)
    };
    let mut children = Vec::with_capacity(tab_ids.len() + 1);
    for id in tab_ids {
        children.push(tab_node(state, id));
    }
    if let Some(id) = selected {
        children.push(pane_node(state, id));
    }
    children
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

/// The tab control's own accessible object (the fragment root).
pub struct TabControlAccessibleObject {
    owner: Weak<RefCell<TabControlState>>,
    wrapper: SystemProxyWrapper,
}

impl AccessibleNode for TabControlAccessibleObject {
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
        Ok(AccessibleRole::PageTabList)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states() | AccessibleStates::FOCUSABLE;
        if guard.core.focused() {
            states |= AccessibleStates::FOCUSED;
        }
        Ok(states)
    }

    // Legacy children come from the system proxy; only their order is
    // ours. A proxy child per tab, reordered to the rendered strip.
    fn system_child_order(&self) -> Option<Vec<usize>> {
        let state = self.owner.upgrade()?;
        let order = state.borrow().display_order();
        if order.is_empty() { None } else { Some(order) }
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::FirstChild => tab_children(&state).first().cloned(),
            FragmentDirection::LastChild => tab_children(&state).last().cloned(),
            _ => None,
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(pattern, PatternId::LegacyIAccessible | PatternId::Selection)
    }
}

/// One page tab in the strip.
pub struct TabAccessibleObject {
    owner: Weak<RefCell<TabControlState>>,
    tab_id: u64,
}

impl AccessibleNode for TabAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::TAB, self.tab_id as i32),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let bounds = state.borrow().tab_bounds(self.tab_id);
        Ok(bounds)
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        Ok(guard
            .tab_index(self.tab_id)
            .map(|index| guard.tabs[index].title.clone()))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::PageTab)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states =
            guard.core.base_states() | AccessibleStates::SELECTABLE | AccessibleStates::FOCUSABLE;
        if let Some(index) = guard.tab_index(self.tab_id) {
            if guard.selected == Some(index) {
                states |= AccessibleStates::SELECTED;
            }
            if !guard.tabs[index].enabled {
                states |= AccessibleStates::UNAVAILABLE;
            }
        }
        Ok(states)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(root_node(&state)),
            _ => sibling_in(&tab_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(pattern, PatternId::LegacyIAccessible | PatternId::SelectionItem)
    }

    fn property_value(&self, property: PropertyId) -> PropertyValue {
        match property {
            PropertyId::SelectionItemIsSelected => match self.state() {
                Ok(states) => PropertyValue::Bool(states.contains(AccessibleStates::SELECTED)),
                Err(_) => PropertyValue::Empty,
            },
            _ => default_property_value(self, property),
        }
    }

    fn select(&self, flags: SelectionFlags) -> AccessResult<()> {
        if !flags.contains(SelectionFlags::TAKE_SELECTION) {
            return Ok(());
        }
        let state = upgrade_owner(&self.owner)?;
        let my_id = self.runtime_id();
        let (runtime, event_target) = {
            let mut guard = state.borrow_mut();
            let Some(index) = guard.tab_index(self.tab_id) else {
                return Ok(());
            };
            guard.selected = Some(index);
            if flags.contains(SelectionFlags::TAKE_FOCUS) {
                guard.core.set_focused(true);
            }
            let target = guard.core.focused().then(|| my_id);
            (guard.runtime.clone(), target)
        };
        if let Some(id) = event_target {
            runtime.raise_event(AutomationEvent::SelectionItemSelected, &id);
        }
        Ok(())
    }

    fn do_default_action(&self) -> AccessResult<()> {
        self.select(SelectionFlags::TAKE_SELECTION)
    }
}

/// The content pane of the selected page.
pub struct TabPaneAccessibleObject {
    owner: Weak<RefCell<TabControlState>>,
    tab_id: u64,
}

impl AccessibleNode for TabPaneAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::PANE, self.tab_id as i32),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let selected = guard
            .tab_index(self.tab_id)
            .is_some_and(|index| guard.selected == Some(index));
        if !selected {
            return Ok(Rect::ZERO);
        }
        Ok(guard.pane_bounds())
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        Ok(guard
            .tab_index(self.tab_id)
            .map(|index| guard.tabs[index].title.clone()))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Pane)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states();
        let selected = guard
            .tab_index(self.tab_id)
            .is_some_and(|index| guard.selected == Some(index));
        if !selected {
            states |= AccessibleStates::INVISIBLE;
        }
        Ok(states)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(root_node(&state)),
            _ => sibling_in(&tab_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}
