//! Accessible tree for combo box widgets.
//!
//! A combo box exposes up to four parts: the item list, the editable text
//! part (editable styles only), the drop-down button (non-simple styles),
//! and one node per item. Part adjacency follows the visual layout: the
//! drop-down button is always the last part, so its next sibling is never
//! present, and its previous sibling is the text part for editable styles
//! or the list otherwise.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use horizon_access_core::{
    AccessError, AccessResult, AccessibleNode, AccessibleRole, AccessibleStates, AutomationEvent,
    ChildKey, ExpandCollapseState, FragmentDirection, NodeCache, NodeRef, PatternId,
    PlatformRuntime, Point, PropertyId, PropertyValue, Rect, RuntimeId, SelectionFlags,
    SystemProxyRef, SystemProxyWrapper, default_property_value,
};

use crate::owner::{OwnerCore, upgrade_owner};

/// Runtime-id part constants.
mod parts {
    pub const LIST: i32 = 1;
    pub const TEXT: i32 = 2;
    pub const BUTTON: i32 = 3;
    pub const ITEM: i32 = 4;
}

const BUTTON_WIDTH: f32 = 17.0;
const DEFAULT_ITEM_HEIGHT: f32 = 18.0;

/// The presentation style of a combo box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboBoxStyle {
    /// List always visible, editable text, no drop-down button.
    Simple,
    /// Editable text with a drop-down list.
    DropDown,
    /// Non-editable; the selection is picked from the drop-down list only.
    DropDownList,
}

impl ComboBoxStyle {
    /// Whether the text part exists and accepts typing.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Simple | Self::DropDown)
    }

    /// Whether the drop-down button part exists.
    pub fn has_button(self) -> bool {
        !matches!(self, Self::Simple)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::DropDown => "drop-down",
            Self::DropDownList => "drop-down-list",
        }
    }
}

/// One entry of the combo box list.
struct ComboBoxItem {
    id: u64,
    text: String,
}

/// The widget state the accessible tree reads.
pub struct ComboBoxState {
    core: OwnerCore,
    runtime: Rc<dyn PlatformRuntime>,
    wrapper: SystemProxyWrapper,
    style: ComboBoxStyle,
    items: Vec<ComboBoxItem>,
    next_item_id: u64,
    selected: Option<usize>,
    dropped_down: bool,
    item_height: f32,
    root: Option<Rc<ComboBoxAccessibleObject>>,
    list: Option<Rc<ComboBoxListAccessibleObject>>,
    text: Option<Rc<ComboBoxTextAccessibleObject>>,
    button: Option<Rc<ComboBoxButtonAccessibleObject>>,
    item_nodes: NodeCache,
}

impl ComboBoxState {
    fn list_visible(&self) -> bool {
        matches!(self.style, ComboBoxStyle::Simple) || self.dropped_down
    }

    fn item_index(&self, id: u64) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn display_text(&self) -> Option<String> {
        self.selected.map(|index| self.items[index].text.clone())
    }

    fn text_bounds(&self) -> Rect {
        let bounds = self.core.bounds();
        if bounds.is_empty() || !self.style.is_editable() {
            return Rect::ZERO;
        }
        let button = if self.style.has_button() { BUTTON_WIDTH } else { 0.0 };
        Rect::new(
            bounds.left(),
            bounds.top(),
            (bounds.size.width - button).max(0.0),
            bounds.size.height,
        )
    }

    fn button_bounds(&self) -> Rect {
        let bounds = self.core.bounds();
        if bounds.is_empty() || !self.style.has_button() {
            return Rect::ZERO;
        }
        Rect::new(
            bounds.right() - BUTTON_WIDTH,
            bounds.top(),
            BUTTON_WIDTH,
            bounds.size.height,
        )
    }

    fn list_bounds(&self) -> Rect {
        let bounds = self.core.bounds();
        if bounds.is_empty() || !self.list_visible() {
            return Rect::ZERO;
        }
        Rect::new(
            bounds.left(),
            bounds.bottom(),
            bounds.size.width,
            self.items.len() as f32 * self.item_height,
        )
    }

    fn item_bounds(&self, index: usize) -> Rect {
        let list = self.list_bounds();
        if list.is_empty() {
            return Rect::ZERO;
        }
        Rect::new(
            list.left(),
            list.top() + index as f32 * self.item_height,
            list.size.width,
            self.item_height,
        )
    }
}

/// A combo box widget facade: the owner side of the accessible tree.
pub struct ComboBox {
    state: Rc<RefCell<ComboBoxState>>,
}

impl ComboBox {
    /// Create a combo box with the given style.
    pub fn new(style: ComboBoxStyle, runtime: Rc<dyn PlatformRuntime>) -> AccessResult<Self> {
        let state = ComboBoxState {
            core: OwnerCore::new()?,
            runtime,
            wrapper: SystemProxyWrapper::detached(),
            style,
            items: Vec::new(),
            next_item_id: 0,
            selected: None,
            dropped_down: false,
            item_height: DEFAULT_ITEM_HEIGHT,
            root: None,
            list: None,
            text: None,
            button: None,
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

    /// The combo box style.
    pub fn style(&self) -> ComboBoxStyle {
        self.state.borrow().style
    }

    /// Create the native handle.
    pub fn create_handle(&self, handle: i64) {
        self.state.borrow_mut().core.set_handle(handle);
    }

    /// Destroy and recreate the native handle.
    ///
    /// OS-level identity is tied to the window handle, so every node issued
    /// before this call is disconnected and the tree rebuilds on demand.
    pub fn recreate_handle(&self, handle: i64) {
        let (runtime, stale) = {
            let mut state = self.state.borrow_mut();
            let mut stale: Vec<NodeRef> = Vec::new();
            if let Some(node) = state.root.take() {
                stale.push(node);
            }
            if let Some(node) = state.list.take() {
                stale.push(node);
            }
            if let Some(node) = state.text.take() {
                stale.push(node);
            }
            if let Some(node) = state.button.take() {
                stale.push(node);
            }
            stale.append(&mut state.item_nodes.drain());
            (state.runtime.clone(), stale)
        };
        // Runtime ids must be captured before the handle changes.
        let stale_ids: Vec<RuntimeId> = stale.iter().map(|node| node.runtime_id()).collect();
        self.state.borrow_mut().core.set_handle(handle);
        tracing::debug!(target: "horizon_access::widgets", stale = stale_ids.len(), "combo box handle recreated");
        for id in &stale_ids {
            runtime.disconnect_provider(id);
        }
    }

    /// Update the control's screen bounds.
    pub fn set_bounds(&self, bounds: Rect) {
        self.state.borrow_mut().core.set_bounds(bounds);
    }

    /// Update the control's keyboard focus flag.
    pub fn set_focused(&self, focused: bool) {
        self.state.borrow_mut().core.set_focused(focused);
    }

    /// Append an item, returning its stable identity.
    pub fn add_item(&self, text: impl Into<String>) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_item_id += 1;
        let id = state.next_item_id;
        state.items.push(ComboBoxItem {
            id,
            text: text.into(),
        });
        id
    }

    /// Insert an item at an index, returning its stable identity.
    pub fn insert_item(&self, index: usize, text: impl Into<String>) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_item_id += 1;
        let id = state.next_item_id;
        let index = index.min(state.items.len());
        state.items.insert(index, ComboBoxItem { id, text: text.into() });
        if let Some(selected) = state.selected {
            if selected >= index {
                state.selected = Some(selected + 1);
            }
        }
        id
    }

    /// Remove the item at an index. The node cached for it (if any) is
    /// disconnected before any replacement for that index can be handed
    /// out.
    pub fn remove_item(&self, index: usize) -> AccessResult<()> {
        let mut state = self.state.borrow_mut();
        if index >= state.items.len() {
            return Err(AccessError::ChildIndexOutOfRange {
                index,
                count: state.items.len(),
            });
        }
        let removed = state.items.remove(index);
        match state.selected {
            Some(selected) if selected == index => state.selected = None,
            Some(selected) if selected > index => state.selected = Some(selected - 1),
            _ => {}
        }
        let runtime = state.runtime.clone();
        let stale = state.item_nodes.take(ChildKey::Item(removed.id));
        drop(state);
        if let Some(node) = stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
        Ok(())
    }

    /// Number of items.
    pub fn item_count(&self) -> usize {
        self.state.borrow().items.len()
    }

    /// Change the selected index. Raises a selection event on the item's
    /// node, but only while this combo box owns keyboard focus, so a
    /// sibling combo instance changing selection stays silent.
    pub fn select(&self, index: Option<usize>) -> AccessResult<()> {
        let (runtime, event_target) = {
            let mut state = self.state.borrow_mut();
            if let Some(index) = index {
                if index >= state.items.len() {
                    return Err(AccessError::ChildIndexOutOfRange {
                        index,
                        count: state.items.len(),
                    });
                }
            }
            state.selected = index;
            let target = if state.core.focused() {
                index.map(|index| {
                    state
                        .core
                        .runtime_id()
                        .with_part(parts::ITEM, state.items[index].id as i32)
                })
            } else {
                None
            };
            (state.runtime.clone(), target)
        };
        if let Some(id) = event_target {
            runtime.raise_event(AutomationEvent::SelectionChanged, &id);
        }
        Ok(())
    }

    /// The selected index, if any.
    pub fn selected_index(&self) -> Option<usize> {
        self.state.borrow().selected
    }

    /// Whether the drop-down list is currently open.
    pub fn dropped_down(&self) -> bool {
        self.state.borrow().dropped_down
    }

    /// The root accessible object for this combo box.
    pub fn accessibility_object(&self) -> NodeRef {
        root_node(&self.state)
    }
}

fn set_dropped_down(state: &Rc<RefCell<ComboBoxState>>, open: bool) -> AccessResult<()> {
    let (runtime, root_id) = {
        let mut guard = state.borrow_mut();
        guard.core.ensure_handle()?;
        if !guard.style.has_button() {
            return Err(AccessError::ViewMismatch {
                required: "drop-down",
                actual: guard.style.as_str(),
            });
        }
        if guard.dropped_down == open {
            return Ok(());
        }
        guard.dropped_down = open;
        (guard.runtime.clone(), guard.core.runtime_id())
    };
    tracing::debug!(target: "horizon_access::widgets", open, "combo box dropdown toggled");
    runtime.raise_event(AutomationEvent::ExpandCollapseStateChanged, &root_id);
    Ok(())
}

fn root_node(state: &Rc<RefCell<ComboBoxState>>) -> NodeRef {
    if let Some(node) = state.borrow().root.clone() {
        return node;
    }
    let node = Rc::new(ComboBoxAccessibleObject {
        owner: Rc::downgrade(state),
        wrapper: state.borrow().wrapper.clone(),
    });
    state.borrow_mut().root = Some(node.clone());
    node
}

fn list_node(state: &Rc<RefCell<ComboBoxState>>) -> NodeRef {
    if let Some(node) = state.borrow().list.clone() {
        return node;
    }
    let node = Rc::new(ComboBoxListAccessibleObject {
        owner: Rc::downgrade(state),
    });
    state.borrow_mut().list = Some(node.clone());
    node
}

fn text_node(state: &Rc<RefCell<ComboBoxState>>) -> NodeRef {
    if let Some(node) = state.borrow().text.clone() {
        return node;
    }
    let node = Rc::new(ComboBoxTextAccessibleObject {
        owner: Rc::downgrade(state),
    });
    state.borrow_mut().text = Some(node.clone());
    node
}

fn button_node(state: &Rc<RefCell<ComboBoxState>>) -> NodeRef {
    if let Some(node) = state.borrow().button.clone() {
        return node;
    }
    let node = Rc::new(ComboBoxButtonAccessibleObject {
        owner: Rc::downgrade(state),
    });
    state.borrow_mut().button = Some(node.clone());
    node
}

fn item_node(state: &Rc<RefCell<ComboBoxState>>, index: usize) -> Option<NodeRef> {
    let id = {
        let guard = state.borrow();
        guard.items.get(index)?.id
    };
    let owner = Rc::downgrade(state);
    let mut guard = state.borrow_mut();
    Some(
        guard
            .item_nodes
            .get_or_insert_with(ChildKey::Item(id), || {
                Rc::new(ComboBoxItemAccessibleObject { owner, item_id: id })
            }),
    )
}

/// The visible parts of the combo box, in visual order. The drop-down
/// button is always last.
fn part_nodes(state: &Rc<RefCell<ComboBoxState>>) -> Vec<NodeRef> {
    let (list_visible, editable, has_button) = {
        let guard = state.borrow();
        (
            guard.list_visible(),
            guard.style.is_editable(),
            guard.style.has_button(),
        )
    };
    let mut parts = Vec::new();
    if list_visible {
        parts.push(list_node(state));
    }
    if editable {
        parts.push(text_node(state));
    }
    if has_button {
        parts.push(button_node(state));
    }
    parts
}

fn part_sibling(
    state: &Rc<RefCell<ComboBoxState>>,
    me: &RuntimeId,
    direction: FragmentDirection,
) -> Option<NodeRef> {
    let parts = part_nodes(state);
    let index = parts.iter().position(|part| part.runtime_id() == *me)?;
    match direction {
        FragmentDirection::NextSibling => parts.get(index + 1).cloned(),
        FragmentDirection::PreviousSibling => index.checked_sub(1).and_then(|i| parts.get(i).cloned()),
        FragmentDirection::Parent => Some(root_node(state)),
        _ => None,
    }
}

/// The combo box's own accessible object (the fragment root).
pub struct ComboBoxAccessibleObject {
    owner: Weak<RefCell<ComboBoxState>>,
    wrapper: SystemProxyWrapper,
}

impl ComboBoxAccessibleObject {
    /// Open the drop-down list.
    pub fn expand(&self) -> AccessResult<()> {
        let state = upgrade_owner(&self.owner)?;
        set_dropped_down(&state, true)
    }

    /// Close the drop-down list.
    pub fn collapse(&self) -> AccessResult<()> {
        let state = upgrade_owner(&self.owner)?;
        set_dropped_down(&state, false)
    }

    /// The current expand/collapse condition.
    pub fn expand_collapse_state(&self) -> AccessResult<ExpandCollapseState> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        if !guard.style.has_button() {
            return Ok(ExpandCollapseState::LeafNode);
        }
        Ok(if guard.dropped_down {
            ExpandCollapseState::Expanded
        } else {
            ExpandCollapseState::Collapsed
        })
    }
}

impl AccessibleNode for ComboBoxAccessibleObject {
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
        Ok(AccessibleRole::ComboBox)
    }

    fn value(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let text = state.borrow().display_text();
        Ok(text)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states() | AccessibleStates::FOCUSABLE;
        if guard.core.focused() {
            states |= AccessibleStates::FOCUSED;
        }
        if guard.style.has_button() {
            states |= AccessibleStates::HASPOPUP;
            states |= if guard.dropped_down {
                AccessibleStates::EXPANDED
            } else {
                AccessibleStates::COLLAPSED
            };
        }
        Ok(states)
    }

    fn child_count(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        Some(part_nodes(&state).len())
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let parts = part_nodes(&state);
        if index >= parts.len() {
            return Err(AccessError::ChildIndexOutOfRange {
                index,
                count: parts.len(),
            });
        }
        Ok(Some(parts[index].clone()))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::FirstChild => part_nodes(&state).first().cloned(),
            FragmentDirection::LastChild => part_nodes(&state).last().cloned(),
            _ => None,
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        match pattern {
            PatternId::LegacyIAccessible | PatternId::Value => true,
            PatternId::ExpandCollapse => {
                self.owner
                    .upgrade()
                    .is_some_and(|state| state.borrow().style.has_button())
            }
            _ => false,
        }
    }

    fn property_value(&self, property: PropertyId) -> PropertyValue {
        match property {
            PropertyId::ExpandCollapseState => match self.expand_collapse_state() {
                Ok(value) => PropertyValue::from(value),
                Err(_) => PropertyValue::Empty,
            },
            _ => default_property_value(self, property),
        }
    }

    fn do_default_action(&self) -> AccessResult<()> {
        let state = upgrade_owner(&self.owner)?;
        let open = !state.borrow().dropped_down;
        set_dropped_down(&state, open)
    }

    fn set_focus(&self) -> AccessResult<()> {
        let state = upgrade_owner(&self.owner)?;
        let (runtime, id) = {
            let mut guard = state.borrow_mut();
            guard.core.ensure_handle()?;
            guard.core.set_focused(true);
            (guard.runtime.clone(), guard.core.runtime_id())
        };
        runtime.raise_event(AutomationEvent::FocusChanged, &id);
        Ok(())
    }

    fn hit_test(&self, point: Point) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        for part in part_nodes(&state) {
            if part.bounds().is_ok_and(|bounds| bounds.contains(point)) {
                return Some(part);
            }
        }
        let bounds = state.borrow().core.bounds();
        bounds.contains(point).then(|| root_node(&state))
    }
}

/// The item list part.
pub struct ComboBoxListAccessibleObject {
    owner: Weak<RefCell<ComboBoxState>>,
}

impl AccessibleNode for ComboBoxListAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state.borrow().core.runtime_id().with_part(parts::LIST, 0),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let bounds = state.borrow().list_bounds();
        Ok(bounds)
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        let state = upgrade_owner(&self.owner)?;
        let simple = matches!(state.borrow().style, ComboBoxStyle::Simple);
        Ok(if simple { AccessibleRole::List } else { AccessibleRole::DropList })
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states() | AccessibleStates::FOCUSABLE;
        if !guard.list_visible() {
            states |= AccessibleStates::INVISIBLE;
        }
        Ok(states)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn child_count(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        let count = state.borrow().items.len();
        Some(count)
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let count = state.borrow().items.len();
        if index >= count {
            return Err(AccessError::ChildIndexOutOfRange { index, count });
        }
        Ok(item_node(&state, index))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::FirstChild => item_node(&state, 0),
            FragmentDirection::LastChild => {
                let count = state.borrow().items.len();
                count.checked_sub(1).and_then(|last| item_node(&state, last))
            }
            _ => part_sibling(&state, &self.runtime_id(), direction),
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

/// The editable text part.
pub struct ComboBoxTextAccessibleObject {
    owner: Weak<RefCell<ComboBoxState>>,
}

impl AccessibleNode for ComboBoxTextAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state.borrow().core.runtime_id().with_part(parts::TEXT, 0),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let bounds = state.borrow().text_bounds();
        Ok(bounds)
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Text)
    }

    fn value(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let text = state.borrow().display_text();
        Ok(text)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        Ok(guard.core.base_states() | AccessibleStates::FOCUSABLE)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        part_sibling(&state, &self.runtime_id(), direction)
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(pattern, PatternId::LegacyIAccessible | PatternId::Value)
    }
}

/// The drop-down button part. Always the last part of the combo box.
pub struct ComboBoxButtonAccessibleObject {
    owner: Weak<RefCell<ComboBoxState>>,
}

impl AccessibleNode for ComboBoxButtonAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state.borrow().core.runtime_id().with_part(parts::BUTTON, 0),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let bounds = state.borrow().button_bounds();
        Ok(bounds)
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::PushButton)
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let open = state.borrow().dropped_down;
        Ok(Some(if open { "Close" } else { "Open" }.to_string()))
    }

    fn default_action(&self) -> AccessResult<Option<String>> {
        self.name()
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states();
        if guard.dropped_down {
            states |= AccessibleStates::PRESSED;
        }
        Ok(states)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        // Last part: never a next sibling.
        if direction == FragmentDirection::NextSibling {
            return None;
        }
        let state = self.owner.upgrade()?;
        part_sibling(&state, &self.runtime_id(), direction)
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(pattern, PatternId::LegacyIAccessible | PatternId::Invoke)
    }

    fn do_default_action(&self) -> AccessResult<()> {
        let state = upgrade_owner(&self.owner)?;
        let open = !state.borrow().dropped_down;
        set_dropped_down(&state, open)
    }
}

/// One list entry's accessible object.
pub struct ComboBoxItemAccessibleObject {
    owner: Weak<RefCell<ComboBoxState>>,
    item_id: u64,
}

impl ComboBoxItemAccessibleObject {
    fn index(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        let index = state.borrow().item_index(self.item_id);
        index
    }
}

impl AccessibleNode for ComboBoxItemAccessibleObject {
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
        let guard = state.borrow();
        match guard.item_index(self.item_id) {
            Some(index) => Ok(guard.item_bounds(index)),
            None => Ok(Rect::ZERO),
        }
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::ListItem)
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        Ok(guard
            .item_index(self.item_id)
            .map(|index| guard.items[index].text.clone()))
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states =
            guard.core.base_states() | AccessibleStates::SELECTABLE | AccessibleStates::FOCUSABLE;
        let index = guard.item_index(self.item_id);
        if index.is_some() && index == guard.selected {
            states |= AccessibleStates::SELECTED;
        }
        if !guard.list_visible() {
            states |= AccessibleStates::OFFSCREEN;
        }
        Ok(states)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(list_node(&state))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        let index = self.index()?;
        match direction {
            FragmentDirection::Parent => Some(list_node(&state)),
            FragmentDirection::NextSibling => item_node(&state, index + 1),
            FragmentDirection::PreviousSibling => {
                index.checked_sub(1).and_then(|prev| item_node(&state, prev))
            }
            _ => None,
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(
            pattern,
            PatternId::LegacyIAccessible | PatternId::SelectionItem | PatternId::ScrollItem
        )
    }

    fn property_value(&self, property: PropertyId) -> PropertyValue {
        match property {
            PropertyId::SelectionItemIsSelected => {
                match self.state() {
                    Ok(states) => PropertyValue::Bool(states.contains(AccessibleStates::SELECTED)),
                    Err(_) => PropertyValue::Empty,
                }
            }
            _ => default_property_value(self, property),
        }
    }

    fn select(&self, flags: SelectionFlags) -> AccessResult<()> {
        let state = upgrade_owner(&self.owner)?;
        let (runtime, event_target) = {
            let mut guard = state.borrow_mut();
            let Some(index) = guard.item_index(self.item_id) else {
                return Ok(());
            };
            if flags.contains(SelectionFlags::TAKE_SELECTION) {
                guard.selected = Some(index);
            } else if flags.contains(SelectionFlags::REMOVE_SELECTION)
                && guard.selected == Some(index)
            {
                guard.selected = None;
            }
            if flags.contains(SelectionFlags::TAKE_FOCUS) {
                guard.core.set_focused(true);
            }
            let target = guard
                .core
                .focused()
                .then(|| self.runtime_id());
            (guard.runtime.clone(), target)
        };
        if let Some(id) = event_target {
            runtime.raise_event(AutomationEvent::SelectionItemSelected, &id);
        }
        Ok(())
    }
}
