//! Accessible tree for list view widgets.
//!
//! Items either hang directly off the root or, when grouping is active,
//! off group nodes whose headers auto-number through the registry when the
//! application supplies none. Sub-item nodes exist only in the details
//! view; a column position the item carries no text for yet is served by a
//! placeholder node keyed by position, promoted to a real node on the
//! first text write.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use horizon_access_core::{
    AccessError, AccessResult, AccessibleNode, AccessibleRole, AccessibleStates, AutomationEvent,
    ChildKey, FragmentDirection, NodeCache, NodeRef, PatternId, PlatformRuntime, PropertyValue,
    PropertyId, Rect, RuntimeId, SelectionFlags, SystemProxyRef, SystemProxyWrapper,
    default_property_value, global_registry,
};

use crate::owner::{OwnerCore, upgrade_owner};

mod parts {
    pub const ITEM: i32 = 1;
    pub const SUB_ITEM: i32 = 2;
    pub const FAKE_SUB_ITEM: i32 = 3;
    pub const GROUP: i32 = 4;
    pub const IMAGE: i32 = 5;
}

const ROW_HEIGHT: f32 = 18.0;
const IMAGE_SIZE: f32 = 16.0;
const GROUP_HEADER_HEIGHT: f32 = 24.0;
const DEFAULT_COLUMN_WIDTH: f32 = 120.0;

/// The presentation mode of a list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListViewMode {
    Details,
    List,
    LargeIcon,
    SmallIcon,
    Tile,
}

impl ListViewMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Details => "details",
            Self::List => "list",
            Self::LargeIcon => "large-icon",
            Self::SmallIcon => "small-icon",
            Self::Tile => "tile",
        }
    }

    /// Grouping renders in every mode except the plain list.
    fn supports_groups(self) -> bool {
        !matches!(self, Self::List)
    }
}

struct ListColumn {
    id: u64,
    name: String,
    width: f32,
}

struct ListItem {
    id: u64,
    text: String,
    /// Sub-item texts by column identity, first column excluded.
    sub_texts: FxHashMap<u64, String>,
    image_index: Option<u32>,
    group: Option<u64>,
    selected: bool,
}

struct ListGroup {
    id: u64,
    header: String,
}

/// The widget state the accessible tree reads.
pub struct ListViewState {
    core: OwnerCore,
    runtime: Rc<dyn PlatformRuntime>,
    wrapper: SystemProxyWrapper,
    mode: ListViewMode,
    columns: Vec<ListColumn>,
    items: Vec<ListItem>,
    groups: Vec<ListGroup>,
    show_groups: bool,
    next_id: u64,
    root: Option<Rc<ListViewAccessibleObject>>,
    item_nodes: NodeCache,
    group_nodes: NodeCache,
    image_nodes: NodeCache,
    sub_item_caches: FxHashMap<u64, NodeCache>,
}

impl ListViewState {
    fn item_index(&self, id: u64) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn group_index(&self, id: u64) -> Option<usize> {
        self.groups.iter().position(|group| group.id == id)
    }

    fn grouped(&self) -> bool {
        self.show_groups && !self.groups.is_empty() && self.mode.supports_groups()
    }

    fn group_members(&self, group_id: u64) -> Vec<u64> {
        self.items
            .iter()
            .filter(|item| item.group == Some(group_id))
            .map(|item| item.id)
            .collect()
    }

    /// The flat display order: grouped items follow their group's order,
    /// ungrouped items come last.
    fn display_rows(&self) -> Vec<u64> {
        if !self.grouped() {
            return self.items.iter().map(|item| item.id).collect();
        }
        let mut rows = Vec::with_capacity(self.items.len());
        for group in &self.groups {
            rows.extend(self.group_members(group.id));
        }
        rows.extend(
            self.items
                .iter()
                .filter(|item| {
                    item.group
                        .is_none_or(|group| self.group_index(group).is_none())
                })
                .map(|item| item.id),
        );
        rows
    }

    fn item_bounds(&self, id: u64) -> Rect {
        let bounds = self.core.bounds();
        if bounds.is_empty() {
            return Rect::ZERO;
        }
        let Some(row) = self.display_rows().iter().position(|&entry| entry == id) else {
            return Rect::ZERO;
        };
        Rect::new(
            bounds.left(),
            bounds.top() + row as f32 * ROW_HEIGHT,
            bounds.size.width,
            ROW_HEIGHT,
        )
    }
}

/// A list view widget facade: the owner side of the accessible tree.
pub struct ListView {
    state: Rc<RefCell<ListViewState>>,
}

impl ListView {
    pub fn new(mode: ListViewMode, runtime: Rc<dyn PlatformRuntime>) -> AccessResult<Self> {
        let state = ListViewState {
            core: OwnerCore::new()?,
            runtime,
            wrapper: SystemProxyWrapper::detached(),
            mode,
            columns: Vec::new(),
            items: Vec::new(),
            groups: Vec::new(),
            show_groups: true,
            next_id: 0,
            root: None,
            item_nodes: NodeCache::new(),
            group_nodes: NodeCache::new(),
            image_nodes: NodeCache::new(),
            sub_item_caches: FxHashMap::default(),
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
            stale.append(&mut state.group_nodes.drain());
            stale.append(&mut state.image_nodes.drain());
            for (_, mut cache) in state.sub_item_caches.drain() {
                stale.append(&mut cache.drain());
            }
            (state.runtime.clone(), stale)
        };
        // Runtime ids must be captured before the handle changes.
        let stale_ids: Vec<RuntimeId> = stale.iter().map(|node| node.runtime_id()).collect();
        self.state.borrow_mut().core.set_handle(handle);
        tracing::debug!(target: "horizon_access::widgets", stale = stale_ids.len(), "list view handle recreated");
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

    pub fn mode(&self) -> ListViewMode {
        self.state.borrow().mode
    }

    /// Switch presentation mode. Sub-item nodes only exist in the details
    /// view, so leaving it disconnects them; the change is structural
    /// either way.
    pub fn set_mode(&self, mode: ListViewMode) {
        let (runtime, stale, root_id) = {
            let mut state = self.state.borrow_mut();
            if state.mode == mode {
                return;
            }
            let leaving_details = state.mode == ListViewMode::Details;
            state.mode = mode;
            let mut stale: Vec<NodeRef> = Vec::new();
            if leaving_details {
                for (_, mut cache) in state.sub_item_caches.drain() {
                    stale.append(&mut cache.drain());
                }
            }
            (state.runtime.clone(), stale, state.core.runtime_id())
        };
        for node in stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
        runtime.raise_event(AutomationEvent::StructureChanged, &root_id);
    }

    pub fn add_column(&self, name: impl Into<String>) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.columns.push(ListColumn {
            id,
            name: name.into(),
            width: DEFAULT_COLUMN_WIDTH,
        });
        id
    }

    /// Append an item, returning its stable identity.
    pub fn add_item(&self, text: impl Into<String>) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.items.push(ListItem {
            id,
            text: text.into(),
            sub_texts: FxHashMap::default(),
            image_index: None,
            group: None,
            selected: false,
        });
        id
    }

    /// Remove an item, disconnecting its node and its sub-item nodes.
    pub fn remove_item(&self, id: u64) -> AccessResult<()> {
        let (runtime, stale) = {
            let mut state = self.state.borrow_mut();
            let index = state
                .item_index(id)
                .ok_or(AccessError::ChildIndexOutOfRange {
                    index: 0,
                    count: state.items.len(),
                })?;
            state.items.remove(index);
            let mut stale: Vec<NodeRef> = Vec::new();
            if let Some(node) = state.item_nodes.take(ChildKey::Item(id)) {
                stale.push(node);
            }
            if let Some(node) = state.image_nodes.take(ChildKey::Item(id)) {
                stale.push(node);
            }
            if let Some(mut cache) = state.sub_item_caches.remove(&id) {
                stale.append(&mut cache.drain());
            }
            (state.runtime.clone(), stale)
        };
        for node in stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
        Ok(())
    }

    /// Add a group. Without an explicit header the registry hands out the
    /// next auto-numbered default.
    pub fn add_group(&self, header: Option<String>) -> AccessResult<u64> {
        let header = match header {
            Some(header) => header,
            None => global_registry()?.next_default_name("ListViewGroup"),
        };
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.groups.push(ListGroup { id, header });
        Ok(id)
    }

    pub fn group_header(&self, group_id: u64) -> Option<String> {
        let state = self.state.borrow();
        let index = state.group_index(group_id)?;
        Some(state.groups[index].header.clone())
    }

    pub fn set_item_group(&self, item_id: u64, group_id: Option<u64>) {
        let mut state = self.state.borrow_mut();
        if let Some(index) = state.item_index(item_id) {
            state.items[index].group = group_id;
        }
    }

    pub fn set_show_groups(&self, show: bool) {
        self.state.borrow_mut().show_groups = show;
    }

    /// Write a sub-item text. The first write for a column promotes the
    /// placeholder node handed out for that position, disconnecting it.
    pub fn set_sub_item_text(
        &self,
        item_id: u64,
        column_id: u64,
        text: impl Into<String>,
    ) -> AccessResult<()> {
        let mut state = self.state.borrow_mut();
        let item_index = state
            .item_index(item_id)
            .ok_or(AccessError::ChildIndexOutOfRange {
                index: 0,
                count: state.items.len(),
            })?;
        let column_position = state
            .columns
            .iter()
            .position(|column| column.id == column_id)
            .ok_or(AccessError::ChildIndexOutOfRange {
                index: 0,
                count: state.columns.len(),
            })?;
        let was_fake = !state.items[item_index].sub_texts.contains_key(&column_id);
        let mut stale = None;
        if was_fake {
            if let Some(cache) = state.sub_item_caches.get_mut(&item_id) {
                stale = cache.take(ChildKey::Slot(column_position));
            }
        }
        state.items[item_index]
            .sub_texts
            .insert(column_id, text.into());
        let runtime = state.runtime.clone();
        drop(state);
        if let Some(node) = stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
        Ok(())
    }

    /// Set or clear an item's image-list index. Clearing disconnects the
    /// image node issued for the item.
    pub fn set_item_image(&self, item_id: u64, image_index: Option<u32>) {
        let (runtime, stale) = {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.item_index(item_id) else {
                return;
            };
            state.items[index].image_index = image_index;
            let stale = if image_index.is_none() {
                state.image_nodes.take(ChildKey::Item(item_id))
            } else {
                None
            };
            (state.runtime.clone(), stale)
        };
        if let Some(node) = stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
    }

    /// Select a single item. Raises a selection event on its node while
    /// the list view owns keyboard focus.
    pub fn select_item(&self, item_id: u64) -> AccessResult<()> {
        let (runtime, event_target) = {
            let mut state = self.state.borrow_mut();
            let index = state
                .item_index(item_id)
                .ok_or(AccessError::ChildIndexOutOfRange {
                    index: 0,
                    count: state.items.len(),
                })?;
            for item in &mut state.items {
                item.selected = false;
            }
            state.items[index].selected = true;
            let target = state.core.focused().then(|| {
                state
                    .core
                    .runtime_id()
                    .with_part(parts::ITEM, item_id as i32)
            });
            (state.runtime.clone(), target)
        };
        if let Some(id) = event_target {
            runtime.raise_event(AutomationEvent::SelectionItemSelected, &id);
        }
        Ok(())
    }

    pub fn item_count(&self) -> usize {
        self.state.borrow().items.len()
    }

    /// The root accessible object for this list view.
    pub fn accessibility_object(&self) -> NodeRef {
        root_node(&self.state)
    }
}

fn root_node(state: &Rc<RefCell<ListViewState>>) -> NodeRef {
    if let Some(node) = state.borrow().root.clone() {
        return node;
    }
    let node = Rc::new(ListViewAccessibleObject {
        owner: Rc::downgrade(state),
        wrapper: state.borrow().wrapper.clone(),
    });
    state.borrow_mut().root = Some(node.clone());
    node
}

fn group_node(state: &Rc<RefCell<ListViewState>>, group_id: u64) -> NodeRef {
    let owner = Rc::downgrade(state);
    state
        .borrow_mut()
        .group_nodes
        .get_or_insert_with(ChildKey::Item(group_id), || {
            Rc::new(ListViewGroupAccessibleObject { owner, group_id })
        })
}

fn item_node(state: &Rc<RefCell<ListViewState>>, item_id: u64) -> NodeRef {
    let owner = Rc::downgrade(state);
    state
        .borrow_mut()
        .item_nodes
        .get_or_insert_with(ChildKey::Item(item_id), || {
            Rc::new(ListViewItemAccessibleObject { owner, item_id })
        })
}

/// The sub-item node for a column position past the first, real or
/// placeholder depending on whether the item carries text for it.
fn sub_item_node(
    state: &Rc<RefCell<ListViewState>>,
    item_id: u64,
    column_position: usize,
) -> Option<NodeRef> {
    let (key, backing) = {
        let guard = state.borrow();
        let column = guard.columns.get(column_position)?;
        let item_index = guard.item_index(item_id)?;
        if guard.items[item_index].sub_texts.contains_key(&column.id) {
            (
                ChildKey::Item(column.id),
                SubItemBacking::Real { column_id: column.id },
            )
        } else {
            (
                ChildKey::Slot(column_position),
                SubItemBacking::Fake { column_position },
            )
        }
    };
    let owner = Rc::downgrade(state);
    let mut guard = state.borrow_mut();
    Some(
        guard
            .sub_item_caches
            .entry(item_id)
            .or_default()
            .get_or_insert_with(key, || {
                Rc::new(ListViewSubItemAccessibleObject {
                    owner,
                    item_id,
                    backing,
                })
            }),
    )
}

/// The image node for an item, present only while it has an image index.
fn image_node(state: &Rc<RefCell<ListViewState>>, item_id: u64) -> Option<NodeRef> {
    {
        let guard = state.borrow();
        let index = guard.item_index(item_id)?;
        guard.items[index].image_index?;
    }
    let owner = Rc::downgrade(state);
    let mut guard = state.borrow_mut();
    Some(
        guard
            .image_nodes
            .get_or_insert_with(ChildKey::Item(item_id), || {
                Rc::new(ListViewItemImageAccessibleObject { owner, item_id })
            }),
    )
}

/// The root's direct children: group nodes followed by ungrouped items
/// when grouping renders, the items in display order otherwise.
fn list_children(state: &Rc<RefCell<ListViewState>>) -> Vec<NodeRef> {
    let (group_ids, item_ids) = {
        let guard = state.borrow();
        if guard.grouped() {
            let groups: Vec<u64> = guard.groups.iter().map(|group| group.id).collect();
            let ungrouped: Vec<u64> = guard
                .items
                .iter()
                .filter(|item| {
                    item.group
                        .is_none_or(|group| guard.group_index(group).is_none())
                })
                .map(|item| item.id)
                .collect();
            (groups, ungrouped)
        } else {
            (Vec::new(), guard.display_rows())
        }
    };
    let mut children = Vec::with_capacity(group_ids.len() + item_ids.len());
    for group_id in group_ids {
        children.push(group_node(state, group_id));
    }
    for item_id in item_ids {
        children.push(item_node(state, item_id));
    }
    children
}

fn group_children(state: &Rc<RefCell<ListViewState>>, group_id: u64) -> Vec<NodeRef> {
    let members = state.borrow().group_members(group_id);
    members
        .into_iter()
        .map(|item_id| item_node(state, item_id))
        .collect()
}

/// An item's parts: the image node when an image index is set, then one
/// sub-item node per column past the first (details view only).
fn item_children(state: &Rc<RefCell<ListViewState>>, item_id: u64) -> Vec<NodeRef> {
    let mut children = Vec::new();
    if let Some(image) = image_node(state, item_id) {
        children.push(image);
    }
    let columns = {
        let guard = state.borrow();
        if guard.mode != ListViewMode::Details {
            return children;
        }
        guard.columns.len()
    };
    children.extend((1..columns).filter_map(|position| sub_item_node(state, item_id, position)));
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

/// The list view's own accessible object (the fragment root).
pub struct ListViewAccessibleObject {
    owner: Weak<RefCell<ListViewState>>,
    wrapper: SystemProxyWrapper,
}

impl AccessibleNode for ListViewAccessibleObject {
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
        Ok(AccessibleRole::List)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states()
            | AccessibleStates::FOCUSABLE
            | AccessibleStates::MULTISELECTABLE;
        if guard.core.focused() {
            states |= AccessibleStates::FOCUSED;
        }
        Ok(states)
    }

    fn child_count(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        Some(list_children(&state).len())
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let children = list_children(&state);
        if index >= children.len() {
            return Err(AccessError::ChildIndexOutOfRange {
                index,
                count: children.len(),
            });
        }
        Ok(Some(children[index].clone()))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::FirstChild => list_children(&state).first().cloned(),
            FragmentDirection::LastChild => list_children(&state).last().cloned(),
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

/// One group header plus its member items.
pub struct ListViewGroupAccessibleObject {
    owner: Weak<RefCell<ListViewState>>,
    group_id: u64,
}

impl AccessibleNode for ListViewGroupAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::GROUP, self.group_id as i32),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let bounds = guard.core.bounds();
        if bounds.is_empty() || !guard.grouped() {
            return Ok(Rect::ZERO);
        }
        let members = guard.group_members(self.group_id).len() as f32;
        Ok(Rect::new(
            bounds.left(),
            bounds.top(),
            bounds.size.width,
            GROUP_HEADER_HEIGHT + members * ROW_HEIGHT,
        ))
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        Ok(guard
            .group_index(self.group_id)
            .map(|index| guard.groups[index].header.clone()))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Grouping)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        Ok(state.borrow().core.base_states())
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn child_count(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        let count = state.borrow().group_members(self.group_id).len();
        Some(count)
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let members = state.borrow().group_members(self.group_id);
        if index >= members.len() {
            return Err(AccessError::ChildIndexOutOfRange {
                index,
                count: members.len(),
            });
        }
        Ok(Some(item_node(&state, members[index])))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(root_node(&state)),
            FragmentDirection::FirstChild => group_children(&state, self.group_id).first().cloned(),
            FragmentDirection::LastChild => group_children(&state, self.group_id).last().cloned(),
            _ => sibling_in(&list_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}

/// One list item.
pub struct ListViewItemAccessibleObject {
    owner: Weak<RefCell<ListViewState>>,
    item_id: u64,
}

impl ListViewItemAccessibleObject {
    /// The sub-item node for a 0-based column position past the first.
    ///
    /// Sub-items only exist in the details view; any other mode is a
    /// mismatch error.
    pub fn sub_item(&self, column_position: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let mode = state.borrow().mode;
        if mode != ListViewMode::Details {
            return Err(AccessError::ViewMismatch {
                required: ListViewMode::Details.as_str(),
                actual: mode.as_str(),
            });
        }
        if column_position == 0 {
            return Ok(None);
        }
        Ok(sub_item_node(&state, self.item_id, column_position))
    }
}

impl AccessibleNode for ListViewItemAccessibleObject {
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
        Ok(guard
            .item_index(self.item_id)
            .map(|index| guard.items[index].text.clone()))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::ListItem)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states =
            guard.core.base_states() | AccessibleStates::SELECTABLE | AccessibleStates::FOCUSABLE;
        let selected = guard
            .item_index(self.item_id)
            .is_some_and(|index| guard.items[index].selected);
        if selected {
            states |= AccessibleStates::SELECTED;
        }
        Ok(states)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        let group = {
            let guard = state.borrow();
            if guard.grouped() {
                guard
                    .item_index(self.item_id)
                    .and_then(|index| guard.items[index].group)
                    .filter(|&group| guard.group_index(group).is_some())
            } else {
                None
            }
        };
        match group {
            Some(group_id) => Some(group_node(&state, group_id)),
            None => Some(root_node(&state)),
        }
    }

    fn child_count(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        Some(item_children(&state, self.item_id).len())
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let children = item_children(&state, self.item_id);
        if index >= children.len() {
            return Err(AccessError::ChildIndexOutOfRange {
                index,
                count: children.len(),
            });
        }
        Ok(Some(children[index].clone()))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => self.parent(),
            FragmentDirection::FirstChild => item_children(&state, self.item_id).first().cloned(),
            FragmentDirection::LastChild => item_children(&state, self.item_id).last().cloned(),
            _ => {
                let group = {
                    let guard = state.borrow();
                    if guard.grouped() {
                        guard
                            .item_index(self.item_id)
                            .and_then(|index| guard.items[index].group)
                            .filter(|&group| guard.group_index(group).is_some())
                    } else {
                        None
                    }
                };
                let siblings = match group {
                    Some(group_id) => group_children(&state, group_id),
                    None => list_children(&state),
                };
                sibling_in(&siblings, &self.runtime_id(), direction)
            }
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
            PropertyId::SelectionItemIsSelected => match self.state() {
                Ok(states) => PropertyValue::Bool(states.contains(AccessibleStates::SELECTED)),
                Err(_) => PropertyValue::Empty,
            },
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
                for item in &mut guard.items {
                    item.selected = false;
                }
                guard.items[index].selected = true;
            } else if flags.contains(SelectionFlags::ADD_SELECTION) {
                guard.items[index].selected = true;
            } else if flags.contains(SelectionFlags::REMOVE_SELECTION) {
                guard.items[index].selected = false;
            }
            if flags.contains(SelectionFlags::TAKE_FOCUS) {
                guard.core.set_focused(true);
            }
            let target = guard.core.focused().then(|| self.runtime_id());
            (guard.runtime.clone(), target)
        };
        if let Some(id) = event_target {
            runtime.raise_event(AutomationEvent::SelectionItemSelected, &id);
        }
        Ok(())
    }
}

/// The image of a list item, shown left of its text.
pub struct ListViewItemImageAccessibleObject {
    owner: Weak<RefCell<ListViewState>>,
    item_id: u64,
}

impl AccessibleNode for ListViewItemImageAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::ITEM, self.item_id as i32)
                .with_part(parts::IMAGE, 0),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let row = state.borrow().item_bounds(self.item_id);
        if row.is_empty() {
            return Ok(Rect::ZERO);
        }
        Ok(Rect::new(row.left(), row.top(), IMAGE_SIZE, IMAGE_SIZE))
    }

    fn name(&self) -> AccessResult<Option<String>> {
        // The image announces its item's text.
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        Ok(guard
            .item_index(self.item_id)
            .map(|index| guard.items[index].text.clone()))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Graphic)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        Ok(state.borrow().core.base_states() | AccessibleStates::READONLY)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(item_node(&state, self.item_id))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(item_node(&state, self.item_id)),
            _ => sibling_in(
                &item_children(&state, self.item_id),
                &self.runtime_id(),
                direction,
            ),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}

/// What a sub-item node is backed by.
#[derive(Debug, Clone, Copy)]
enum SubItemBacking {
    /// Text exists for the column, keyed by column identity.
    Real { column_id: u64 },
    /// No text yet, keyed by column position.
    Fake { column_position: usize },
}

/// One detail cell of a list item.
pub struct ListViewSubItemAccessibleObject {
    owner: Weak<RefCell<ListViewState>>,
    item_id: u64,
    backing: SubItemBacking,
}

impl AccessibleNode for ListViewSubItemAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        let Some(state) = self.owner.upgrade() else {
            return RuntimeId::default();
        };
        let base = state
            .borrow()
            .core
            .runtime_id()
            .with_part(parts::ITEM, self.item_id as i32);
        match self.backing {
            SubItemBacking::Real { column_id } => {
                base.with_part(parts::SUB_ITEM, column_id as i32)
            }
            SubItemBacking::Fake { column_position } => {
                base.with_part(parts::FAKE_SUB_ITEM, column_position as i32)
            }
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let row = guard.item_bounds(self.item_id);
        if row.is_empty() {
            return Ok(Rect::ZERO);
        }
        let position = match self.backing {
            SubItemBacking::Fake { column_position } => Some(column_position),
            SubItemBacking::Real { column_id } => {
                guard.columns.iter().position(|column| column.id == column_id)
            }
        };
        let Some(position) = position else {
            return Ok(Rect::ZERO);
        };
        let left: f32 = guard.columns[..position].iter().map(|column| column.width).sum();
        Ok(Rect::new(
            row.left() + left,
            row.top(),
            guard.columns[position].width,
            ROW_HEIGHT,
        ))
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        match self.backing {
            SubItemBacking::Fake { .. } => Ok(None),
            SubItemBacking::Real { column_id } => {
                let Some(index) = guard.item_index(self.item_id) else {
                    return Ok(None);
                };
                Ok(guard.items[index].sub_texts.get(&column_id).cloned())
            }
        }
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::StaticText)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        Ok(state.borrow().core.base_states() | AccessibleStates::READONLY)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(item_node(&state, self.item_id))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(item_node(&state, self.item_id)),
            _ => sibling_in(
                &item_children(&state, self.item_id),
                &self.runtime_id(),
                direction,
            ),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use horizon_access_core::{RecordingRuntime, init_global_registry};

    fn list(mode: ListViewMode) -> (ListView, Rc<RecordingRuntime>) {
        init_global_registry();
        let runtime = Rc::new(RecordingRuntime::new());
        let list = ListView::new(mode, runtime.clone()).unwrap();
        list.create_handle(0x5000);
        list.set_bounds(Rect::new(0.0, 0.0, 300.0, 200.0));
        (list, runtime)
    }

    #[test]
    fn test_flat_children_without_groups() {
        let (list, _) = list(ListViewMode::Details);
        list.add_item("alpha");
        list.add_item("beta");
        let root = list.accessibility_object();
        assert_eq!(root.child_count(), Some(2));
        assert_eq!(
            root.child(0).unwrap().unwrap().name().unwrap().as_deref(),
            Some("alpha")
        );
    }

    #[test]
    fn test_grouped_children() {
        let (list, _) = list(ListViewMode::Details);
        let group = list.add_group(Some("Done".to_string())).unwrap();
        let a = list.add_item("alpha");
        list.add_item("beta");
        list.set_item_group(a, Some(group));
        let root = list.accessibility_object();
        // One group node, then the ungrouped item.
        assert_eq!(root.child_count(), Some(2));
        let group_node = root.child(0).unwrap().unwrap();
        assert_eq!(group_node.role().unwrap(), AccessibleRole::Grouping);
        assert_eq!(group_node.name().unwrap().as_deref(), Some("Done"));
        assert_eq!(group_node.child_count(), Some(1));
        assert_eq!(
            root.child(1).unwrap().unwrap().name().unwrap().as_deref(),
            Some("beta")
        );
    }

    #[test]
    fn test_group_headers_auto_number() {
        let (list, _) = list(ListViewMode::Details);
        let first = list.add_group(None).unwrap();
        let second = list.add_group(None).unwrap();
        let a = list.group_header(first).unwrap();
        let b = list.group_header(second).unwrap();
        assert!(a.starts_with("ListViewGroup"));
        assert!(b.starts_with("ListViewGroup"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_list_mode_ignores_groups() {
        let (list, _) = list(ListViewMode::List);
        let group = list.add_group(Some("G".to_string())).unwrap();
        let a = list.add_item("alpha");
        list.set_item_group(a, Some(group));
        let root = list.accessibility_object();
        assert_eq!(root.child_count(), Some(1));
        assert_eq!(
            root.child(0).unwrap().unwrap().role().unwrap(),
            AccessibleRole::ListItem
        );
    }

    #[test]
    fn test_sub_items_only_in_details_mode() {
        let (list, _) = list(ListViewMode::LargeIcon);
        list.add_column("Name");
        list.add_column("Size");
        let item_id = list.add_item("alpha");
        let node = item_node(&list.state, item_id);
        assert_eq!(node.child_count(), Some(0));
        // Direct sub-item access is a mode mismatch.
        let concrete = ListViewItemAccessibleObject {
            owner: Rc::downgrade(&list.state),
            item_id,
        };
        assert!(matches!(
            concrete.sub_item(1),
            Err(AccessError::ViewMismatch { .. })
        ));
    }

    #[test]
    fn test_fake_sub_item_promotes_on_first_text() {
        let (list, runtime) = list(ListViewMode::Details);
        list.add_column("Name");
        let size = list.add_column("Size");
        let item_id = list.add_item("alpha");
        let fake = sub_item_node(&list.state, item_id, 1).unwrap();
        assert!(fake.name().unwrap().is_none());
        let fake_id = fake.runtime_id();

        list.set_sub_item_text(item_id, size, "12 kB").unwrap();
        assert_eq!(runtime.disconnect_count(&fake_id), 1);

        let real = sub_item_node(&list.state, item_id, 1).unwrap();
        assert_ne!(real.runtime_id(), fake_id);
        assert_eq!(real.name().unwrap().as_deref(), Some("12 kB"));
        let again = sub_item_node(&list.state, item_id, 1).unwrap();
        assert!(Rc::ptr_eq(&real, &again));
    }

    #[test]
    fn test_leaving_details_disconnects_sub_items() {
        let (list, runtime) = list(ListViewMode::Details);
        list.add_column("Name");
        list.add_column("Size");
        let item_id = list.add_item("alpha");
        let fake = sub_item_node(&list.state, item_id, 1).unwrap();
        let fake_id = fake.runtime_id();
        list.set_mode(ListViewMode::LargeIcon);
        assert_eq!(runtime.disconnect_count(&fake_id), 1);
        assert!(runtime
            .events()
            .iter()
            .any(|(event, _)| *event == AutomationEvent::StructureChanged));
    }

    #[test]
    fn test_remove_item_disconnects_item_and_sub_items() {
        let (list, runtime) = list(ListViewMode::Details);
        list.add_column("Name");
        let size = list.add_column("Size");
        let item_id = list.add_item("alpha");
        list.set_sub_item_text(item_id, size, "1").unwrap();
        let item = item_node(&list.state, item_id);
        let sub = sub_item_node(&list.state, item_id, 1).unwrap();
        let item_rid = item.runtime_id();
        let sub_rid = sub.runtime_id();
        list.remove_item(item_id).unwrap();
        assert_eq!(runtime.disconnect_count(&item_rid), 1);
        assert_eq!(runtime.disconnect_count(&sub_rid), 1);
    }

    #[test]
    fn test_image_node_appears_with_image_index() {
        let (list, runtime) = list(ListViewMode::LargeIcon);
        let item_id = list.add_item("alpha");
        assert!(image_node(&list.state, item_id).is_none());
        list.set_item_image(item_id, Some(3));
        let image = image_node(&list.state, item_id).unwrap();
        assert_eq!(image.role().unwrap(), AccessibleRole::Graphic);
        assert_eq!(image.name().unwrap().as_deref(), Some("alpha"));
        let item = item_node(&list.state, item_id);
        assert_eq!(item.child_count(), Some(1));
        let image_id = image.runtime_id();
        list.set_item_image(item_id, None);
        assert_eq!(runtime.disconnect_count(&image_id), 1);
        assert!(image_node(&list.state, item_id).is_none());
    }

    #[test]
    fn test_image_precedes_sub_items() {
        let (list, _) = list(ListViewMode::Details);
        list.add_column("Name");
        let size = list.add_column("Size");
        let item_id = list.add_item("alpha");
        list.set_item_image(item_id, Some(0));
        list.set_sub_item_text(item_id, size, "9").unwrap();
        let item = item_node(&list.state, item_id);
        assert_eq!(item.child_count(), Some(2));
        let first = item.fragment_navigate(FragmentDirection::FirstChild).unwrap();
        assert_eq!(first.role().unwrap(), AccessibleRole::Graphic);
        let next = first.fragment_navigate(FragmentDirection::NextSibling).unwrap();
        assert_eq!(next.name().unwrap().as_deref(), Some("9"));
    }

    #[test]
    fn test_selection_event_gated_on_focus() {
        let (list, runtime) = list(ListViewMode::Details);
        let item_id = list.add_item("alpha");
        list.select_item(item_id).unwrap();
        assert!(runtime.events().is_empty());
        list.set_focused(true);
        list.select_item(item_id).unwrap();
        assert_eq!(runtime.events().len(), 1);
    }

    #[test]
    fn test_sub_item_sibling_navigation() {
        let (list, _) = list(ListViewMode::Details);
        list.add_column("Name");
        let size = list.add_column("Size");
        list.add_column("Date");
        let item_id = list.add_item("alpha");
        list.set_sub_item_text(item_id, size, "1").unwrap();
        let first = sub_item_node(&list.state, item_id, 1).unwrap();
        let next = first
            .fragment_navigate(FragmentDirection::NextSibling)
            .unwrap();
        assert!(next.name().unwrap().is_none());
        assert!(next.fragment_navigate(FragmentDirection::NextSibling).is_none());
        let back = next
            .fragment_navigate(FragmentDirection::PreviousSibling)
            .unwrap();
        assert!(Rc::ptr_eq(&first, &back));
    }
}
