//! Accessible tree for data grid widgets.
//!
//! The grid root exposes a header row (the "top row") followed by one node
//! per data row; rows expose an optional row header followed by cells in
//! column display order. Cells that have never been assigned a value are
//! represented by placeholder nodes keyed by slot position; the first
//! value write promotes the slot to a real cell keyed by the backing
//! object's identity, disconnecting the placeholder first.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use horizon_access_core::{
    AccessError, AccessResult, AccessibleNode, AccessibleRole, AccessibleStates, AutomationEvent,
    ChildKey, FragmentDirection, NodeCache, NodeRef, PatternId, PlatformRuntime, PropertyId,
    PropertyValue, Rect, RuntimeId, SystemProxyRef, SystemProxyWrapper, default_property_value,
};

use crate::owner::{OwnerCore, upgrade_owner};

mod parts {
    pub const TOP_ROW: i32 = 1;
    pub const TOP_LEFT: i32 = 2;
    pub const COLUMN_HEADER: i32 = 3;
    pub const ROW: i32 = 4;
    pub const ROW_HEADER: i32 = 5;
    pub const CELL: i32 = 6;
    pub const PLACEHOLDER: i32 = 7;
}

const HEADER_HEIGHT: f32 = 22.0;
const ROW_HEIGHT: f32 = 20.0;
const ROW_HEADER_WIDTH: f32 = 40.0;
const DEFAULT_COLUMN_WIDTH: f32 = 100.0;

struct Column {
    id: u64,
    name: String,
    display_index: usize,
    visible: bool,
    width: f32,
}

struct GridRow {
    id: u64,
    header_text: Option<String>,
    /// Sparse cell values by column identity. Absent means placeholder.
    values: FxHashMap<u64, String>,
    selected: bool,
}

/// The widget state the accessible tree reads.
pub struct DataGridState {
    core: OwnerCore,
    runtime: Rc<dyn PlatformRuntime>,
    wrapper: SystemProxyWrapper,
    columns: Vec<Column>,
    rows: Vec<GridRow>,
    next_id: u64,
    row_headers_visible: bool,
    column_headers_visible: bool,
    root: Option<Rc<DataGridAccessibleObject>>,
    top_row: Option<Rc<DataGridTopRowAccessibleObject>>,
    header_nodes: NodeCache,
    row_nodes: NodeCache,
    cell_caches: FxHashMap<u64, NodeCache>,
}

impl DataGridState {
    /// Visible columns as `(display position, column index)` pairs, in
    /// display order.
    fn display_order(&self) -> Vec<usize> {
        let mut visible: Vec<usize> = (0..self.columns.len())
            .filter(|&index| self.columns[index].visible)
            .collect();
        visible.sort_by_key(|&index| self.columns[index].display_index);
        visible
    }

    fn column_index(&self, id: u64) -> Option<usize> {
        self.columns.iter().position(|column| column.id == id)
    }

    fn row_index(&self, id: u64) -> Option<usize> {
        self.rows.iter().position(|row| row.id == id)
    }

    fn row_bounds(&self, row_index: usize) -> Rect {
        let bounds = self.core.bounds();
        if bounds.is_empty() {
            return Rect::ZERO;
        }
        let header = if self.column_headers_visible { HEADER_HEIGHT } else { 0.0 };
        Rect::new(
            bounds.left(),
            bounds.top() + header + row_index as f32 * ROW_HEIGHT,
            bounds.size.width,
            ROW_HEIGHT,
        )
    }

    fn column_left(&self, position: usize) -> f32 {
        let bounds = self.core.bounds();
        let mut left = bounds.left();
        if self.row_headers_visible {
            left += ROW_HEADER_WIDTH;
        }
        for &index in self.display_order().iter().take(position) {
            left += self.columns[index].width;
        }
        left
    }

    fn cell_bounds(&self, row_index: usize, position: usize) -> Rect {
        let row = self.row_bounds(row_index);
        if row.is_empty() {
            return Rect::ZERO;
        }
        let order = self.display_order();
        let Some(&column_index) = order.get(position) else {
            return Rect::ZERO;
        };
        Rect::new(
            self.column_left(position),
            row.top(),
            self.columns[column_index].width,
            ROW_HEIGHT,
        )
    }
}

/// A data grid widget facade: the owner side of the accessible tree.
pub struct DataGrid {
    state: Rc<RefCell<DataGridState>>,
}

impl DataGrid {
    pub fn new(runtime: Rc<dyn PlatformRuntime>) -> AccessResult<Self> {
        let state = DataGridState {
            core: OwnerCore::new()?,
            runtime,
            wrapper: SystemProxyWrapper::detached(),
            columns: Vec::new(),
            rows: Vec::new(),
            next_id: 0,
            row_headers_visible: true,
            column_headers_visible: true,
            root: None,
            top_row: None,
            header_nodes: NodeCache::new(),
            row_nodes: NodeCache::new(),
            cell_caches: FxHashMap::default(),
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
            if let Some(node) = state.top_row.take() {
                stale.push(node);
            }
            stale.append(&mut state.header_nodes.drain());
            stale.append(&mut state.row_nodes.drain());
            for (_, mut cache) in state.cell_caches.drain() {
                stale.append(&mut cache.drain());
            }
            (state.runtime.clone(), stale)
        };
        // Runtime ids must be captured before the handle changes.
        let stale_ids: Vec<RuntimeId> = stale.iter().map(|node| node.runtime_id()).collect();
        self.state.borrow_mut().core.set_handle(handle);
        tracing::debug!(target: "horizon_access::widgets", stale = stale_ids.len(), "grid handle recreated");
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

    pub fn set_row_headers_visible(&self, visible: bool) {
        self.state.borrow_mut().row_headers_visible = visible;
    }

    pub fn set_column_headers_visible(&self, visible: bool) {
        self.state.borrow_mut().column_headers_visible = visible;
    }

    /// Append a column, returning its stable identity. Display index
    /// starts equal to insertion order.
    pub fn add_column(&self, name: impl Into<String>) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        let display_index = state.columns.len();
        state.columns.push(Column {
            id,
            name: name.into(),
            display_index,
            visible: true,
            width: DEFAULT_COLUMN_WIDTH,
        });
        id
    }

    /// Reposition a column in display order. Structural: assistive
    /// technology is told the header row changed.
    pub fn set_column_display_index(&self, id: u64, display_index: usize) -> AccessResult<()> {
        let (runtime, top_row_id) = {
            let mut state = self.state.borrow_mut();
            let index = state
                .column_index(id)
                .ok_or(AccessError::ChildIndexOutOfRange {
                    index: 0,
                    count: state.columns.len(),
                })?;
            state.columns[index].display_index = display_index;
            (
                state.runtime.clone(),
                state.core.runtime_id().with_part(parts::TOP_ROW, 0),
            )
        };
        runtime.raise_event(AutomationEvent::StructureChanged, &top_row_id);
        Ok(())
    }

    /// Hide or show a column. Hidden columns keep their header node cached
    /// but leave the child lists.
    pub fn set_column_visible(&self, id: u64, visible: bool) {
        let mut state = self.state.borrow_mut();
        if let Some(index) = state.column_index(id) {
            state.columns[index].visible = visible;
        }
    }

    /// Remove a column, disconnecting its header node and every real cell
    /// node under it. Placeholder nodes are position-keyed, and positions
    /// shift, so they are all dropped too.
    pub fn remove_column(&self, id: u64) {
        let (runtime, stale) = {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.column_index(id) else {
                return;
            };
            state.columns.remove(index);
            for row in &mut state.rows {
                row.values.remove(&id);
            }
            let mut stale: Vec<NodeRef> = Vec::new();
            if let Some(node) = state.header_nodes.take(ChildKey::Item(id)) {
                stale.push(node);
            }
            for cache in state.cell_caches.values_mut() {
                stale.append(&mut cache.extract(|key| {
                    key != ChildKey::Item(id) && !matches!(key, ChildKey::Slot(_))
                }));
            }
            (state.runtime.clone(), stale)
        };
        for node in stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
    }

    /// Append a row, returning its stable identity.
    pub fn add_row(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.rows.push(GridRow {
            id,
            header_text: None,
            values: FxHashMap::default(),
            selected: false,
        });
        id
    }

    /// Remove the row at an index, disconnecting its node and every cell
    /// node under it.
    pub fn remove_row(&self, index: usize) -> AccessResult<()> {
        let (runtime, stale, root_id) = {
            let mut state = self.state.borrow_mut();
            if index >= state.rows.len() {
                return Err(AccessError::ChildIndexOutOfRange {
                    index,
                    count: state.rows.len(),
                });
            }
            let removed = state.rows.remove(index);
            let mut stale: Vec<NodeRef> = Vec::new();
            if let Some(node) = state.row_nodes.take(ChildKey::Item(removed.id)) {
                stale.push(node);
            }
            if let Some(mut cache) = state.cell_caches.remove(&removed.id) {
                stale.append(&mut cache.drain());
            }
            (state.runtime.clone(), stale, state.core.runtime_id())
        };
        for node in stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
        runtime.raise_event(AutomationEvent::StructureChanged, &root_id);
        Ok(())
    }

    pub fn set_row_header(&self, row_id: u64, text: impl Into<String>) {
        let mut state = self.state.borrow_mut();
        if let Some(index) = state.row_index(row_id) {
            state.rows[index].header_text = Some(text.into());
        }
    }

    /// Write a cell value. The first write to a cell promotes its
    /// placeholder node, if one was handed out, by disconnecting it; the
    /// next query builds a real cell keyed by column identity.
    pub fn set_cell_value(
        &self,
        row_id: u64,
        column_id: u64,
        value: impl Into<String>,
    ) -> AccessResult<()> {
        let mut state = self.state.borrow_mut();
        let row_index = state
            .row_index(row_id)
            .ok_or(AccessError::ChildIndexOutOfRange {
                index: 0,
                count: state.rows.len(),
            })?;
        let column_index = state
            .column_index(column_id)
            .ok_or(AccessError::ChildIndexOutOfRange {
                index: 0,
                count: state.columns.len(),
            })?;
        let was_placeholder = !state.rows[row_index].values.contains_key(&column_id);
        let mut stale = None;
        if was_placeholder {
            let position = state
                .display_order()
                .iter()
                .position(|&index| index == column_index);
            if let Some(position) = position {
                if let Some(cache) = state.cell_caches.get_mut(&row_id) {
                    stale = cache.take(ChildKey::Slot(position));
                }
            }
        }
        state.rows[row_index].values.insert(column_id, value.into());
        let runtime = state.runtime.clone();
        drop(state);
        if let Some(node) = stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
        Ok(())
    }

    pub fn cell_value(&self, row_id: u64, column_id: u64) -> Option<String> {
        let state = self.state.borrow();
        let index = state.row_index(row_id)?;
        state.rows[index].values.get(&column_id).cloned()
    }

    /// Select a single row. Raises a selection event on its node while the
    /// grid owns keyboard focus.
    pub fn select_row(&self, row_id: u64) -> AccessResult<()> {
        let (runtime, event_target) = {
            let mut state = self.state.borrow_mut();
            let index = state
                .row_index(row_id)
                .ok_or(AccessError::ChildIndexOutOfRange {
                    index: 0,
                    count: state.rows.len(),
                })?;
            for row in &mut state.rows {
                row.selected = false;
            }
            state.rows[index].selected = true;
            let target = state
                .core
                .focused()
                .then(|| state.core.runtime_id().with_part(parts::ROW, row_id as i32));
            (state.runtime.clone(), target)
        };
        if let Some(id) = event_target {
            runtime.raise_event(AutomationEvent::SelectionItemSelected, &id);
        }
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.state.borrow().rows.len()
    }

    pub fn visible_column_count(&self) -> usize {
        self.state.borrow().display_order().len()
    }

    /// The root accessible object for this grid.
    pub fn accessibility_object(&self) -> NodeRef {
        root_node(&self.state)
    }
}

fn root_node(state: &Rc<RefCell<DataGridState>>) -> NodeRef {
    if let Some(node) = state.borrow().root.clone() {
        return node;
    }
    let node = Rc::new(DataGridAccessibleObject {
        owner: Rc::downgrade(state),
        wrapper: state.borrow().wrapper.clone(),
    });
    state.borrow_mut().root = Some(node.clone());
    node
}

fn top_row_node(state: &Rc<RefCell<DataGridState>>) -> NodeRef {
    if let Some(node) = state.borrow().top_row.clone() {
        return node;
    }
    let node = Rc::new(DataGridTopRowAccessibleObject {
        owner: Rc::downgrade(state),
    });
    state.borrow_mut().top_row = Some(node.clone());
    node
}

fn top_left_header_node(state: &Rc<RefCell<DataGridState>>) -> NodeRef {
    let owner = Rc::downgrade(state);
    state
        .borrow_mut()
        .header_nodes
        .get_or_insert_with(ChildKey::Slot(0), || {
            Rc::new(DataGridTopLeftHeaderAccessibleObject { owner })
        })
}

fn column_header_node(state: &Rc<RefCell<DataGridState>>, column_id: u64) -> NodeRef {
    let owner = Rc::downgrade(state);
    state
        .borrow_mut()
        .header_nodes
        .get_or_insert_with(ChildKey::Item(column_id), || {
            Rc::new(DataGridColumnHeaderAccessibleObject { owner, column_id })
        })
}

fn row_node(state: &Rc<RefCell<DataGridState>>, row_id: u64) -> NodeRef {
    let owner = Rc::downgrade(state);
    state
        .borrow_mut()
        .row_nodes
        .get_or_insert_with(ChildKey::Item(row_id), || {
            Rc::new(DataGridRowAccessibleObject { owner, row_id })
        })
}

fn row_header_node(state: &Rc<RefCell<DataGridState>>, row_id: u64) -> NodeRef {
    let owner = Rc::downgrade(state);
    let mut guard = state.borrow_mut();
    guard
        .cell_caches
        .entry(row_id)
        .or_default()
        .get_or_insert_with(ChildKey::Item(row_id), || {
            Rc::new(DataGridRowHeaderAccessibleObject { owner, row_id })
        })
}

/// The cell node at a display position, real or placeholder depending on
/// whether the row carries a value for that column.
fn cell_node(state: &Rc<RefCell<DataGridState>>, row_id: u64, position: usize) -> Option<NodeRef> {
    let (key, backing) = {
        let guard = state.borrow();
        let order = guard.display_order();
        let &column_index = order.get(position)?;
        let column_id = guard.columns[column_index].id;
        let row_index = guard.row_index(row_id)?;
        if guard.rows[row_index].values.contains_key(&column_id) {
            (ChildKey::Item(column_id), CellBacking::Real { column_id })
        } else {
            (ChildKey::Slot(position), CellBacking::Placeholder { position })
        }
    };
    let owner = Rc::downgrade(state);
    let mut guard = state.borrow_mut();
    Some(
        guard
            .cell_caches
            .entry(row_id)
            .or_default()
            .get_or_insert_with(key, || {
                Rc::new(DataGridCellAccessibleObject {
                    owner,
                    row_id,
                    backing,
                })
            }),
    )
}

/// The grid root's children: the top row when column headers show, then
/// every data row.
fn grid_children(state: &Rc<RefCell<DataGridState>>) -> Vec<NodeRef> {
    let (headers, row_ids) = {
        let guard = state.borrow();
        (
            guard.column_headers_visible,
            guard.rows.iter().map(|row| row.id).collect::<Vec<_>>(),
        )
    };
    let mut children = Vec::with_capacity(row_ids.len() + 1);
    if headers {
        children.push(top_row_node(state));
    }
    for row_id in row_ids {
        children.push(row_node(state, row_id));
    }
    children
}

///// The top row's children: the top-left header when row headers show,
/// then one header per visible column in display order.
fn top_row_children(state: &Rc<RefCell<DataGridState>>) -> Vec<NodeRef> {
    let (row_headers, column_ids) = {
        let guard = state.borrow();
        let ids = guard
            .display_order()
            .into_iter()
            .map(|index| guard.columns[index].id)
            .collect::<Vec<_>>();
        (guard.row_headers_visible, ids)
    };
    let mut children = Vec::with_capacity(column_ids.len() + 1);
    if row_headers {
        children.push(top_left_header_node(state));
    }
    for column_id in column_ids {
        children.push(column_header_node(state, column_id));
    }
    children
}

/// A data row's children: the row header when row headers show, then one
/// cell per visible column in display order.
fn row_children(state: &Rc<RefCell<DataGridState>>, row_id: u64) -> Vec<NodeRef> {
    let (row_headers, positions) = {
        let guard = state.borrow();
        (guard.row_headers_visible, guard.display_order().len())
    };
    let mut children = Vec::with_capacity(positions + 1);
    if row_headers {
        children.push(row_header_node(state, row_id));
    }
    for position in 0..positions {
        if let Some(cell) = cell_node(state, row_id, position) {
            children.push(cell);
        }
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

/// The grid's own accessible object (the fragment root).
pub struct DataGridAccessibleObject {
    owner: Weak<RefCell<DataGridState>>,
    wrapper: SystemProxyWrapper,
}

impl AccessibleNode for DataGridAccessibleObject {
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
        Ok(AccessibleRole::Table)
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

    fn child_count(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        Some(grid_children(&state).len())
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let children = grid_children(&state);
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
            FragmentDirection::FirstChild => grid_children(&state).first().cloned(),
            FragmentDirection::LastChild => grid_children(&state).last().cloned(),
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
            PatternId::LegacyIAccessible
                | PatternId::Grid
                | PatternId::Table
                | PatternId::Selection
        )
    }

    fn property_value(&self, property: PropertyId) -> PropertyValue {
        let Some(state) = self.owner.upgrade() else {
            return PropertyValue::Empty;
        };
        match property {
            PropertyId::GridRowCount => PropertyValue::I32(state.borrow().rows.len() as i32),
            PropertyId::GridColumnCount => {
                PropertyValue::I32(state.borrow().display_order().len() as i32)
            }
            _ => default_property_value(self, property),
        }
    }
}

/// The header row.
pub struct DataGridTopRowAccessibleObject {
    owner: Weak<RefCell<DataGridState>>,
}

impl AccessibleNode for DataGridTopRowAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state.borrow().core.runtime_id().with_part(parts::TOP_ROW, 0),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let bounds = guard.core.bounds();
        if bounds.is_empty() || !guard.column_headers_visible {
            return Ok(Rect::ZERO);
        }
        Ok(Rect::new(
            bounds.left(),
            bounds.top(),
            bounds.size.width,
            HEADER_HEIGHT,
        ))
    }

    fn name(&self) -> AccessResult<Option<String>> {
        Ok(Some("Top Row".to_string()))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Row)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        Ok(state.borrow().core.base_states() | AccessibleStates::READONLY)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn child_count(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        Some(top_row_children(&state).len())
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let children = top_row_children(&state);
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
            FragmentDirection::Parent => Some(root_node(&state)),
            FragmentDirection::FirstChild => top_row_children(&state).first().cloned(),
            FragmentDirection::LastChild => top_row_children(&state).last().cloned(),
            _ => sibling_in(&grid_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}

/// The blank header cell above the row headers.
pub struct DataGridTopLeftHeaderAccessibleObject {
    owner: Weak<RefCell<DataGridState>>,
}

impl AccessibleNode for DataGridTopLeftHeaderAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::TOP_LEFT, 0),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let bounds = guard.core.bounds();
        if bounds.is_empty() || !guard.row_headers_visible || !guard.column_headers_visible {
            return Ok(Rect::ZERO);
        }
        Ok(Rect::new(
            bounds.left(),
            bounds.top(),
            ROW_HEADER_WIDTH,
            HEADER_HEIGHT,
        ))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::ColumnHeader)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        Ok(state.borrow().core.base_states() | AccessibleStates::READONLY)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(top_row_node(&state))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(top_row_node(&state)),
            _ => sibling_in(&top_row_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}

/// One column's header cell.
pub struct DataGridColumnHeaderAccessibleObject {
    owner: Weak<RefCell<DataGridState>>,
    column_id: u64,
}

impl AccessibleNode for DataGridColumnHeaderAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::COLUMN_HEADER, self.column_id as i32),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let bounds = guard.core.bounds();
        if bounds.is_empty() || !guard.column_headers_visible {
            return Ok(Rect::ZERO);
        }
        let Some(column_index) = guard.column_index(self.column_id) else {
            return Ok(Rect::ZERO);
        };
        let order = guard.display_order();
        let Some(position) = order.iter().position(|&index| index == column_index) else {
            return Ok(Rect::ZERO);
        };
        Ok(Rect::new(
            guard.column_left(position),
            bounds.top(),
            guard.columns[column_index].width,
            HEADER_HEIGHT,
        ))
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        Ok(guard
            .column_index(self.column_id)
            .map(|index| guard.columns[index].name.clone()))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::ColumnHeader)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states() | AccessibleStates::READONLY;
        let hidden = guard
            .column_index(self.column_id)
            .is_none_or(|index| !guard.columns[index].visible);
        if hidden {
            states |= AccessibleStates::INVISIBLE;
        }
        Ok(states)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(top_row_node(&state))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(top_row_node(&state)),
            _ => sibling_in(&top_row_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}

/// One data row.
pub struct DataGridRowAccessibleObject {
    owner: Weak<RefCell<DataGridState>>,
    row_id: u64,
}

impl AccessibleNode for DataGridRowAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::ROW, self.row_id as i32),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        match guard.row_index(self.row_id) {
            Some(index) => Ok(guard.row_bounds(index)),
            None => Ok(Rect::ZERO),
        }
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let index = state.borrow().row_index(self.row_id);
        Ok(index.map(|index| format!("Row {index}")))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Row)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states() | AccessibleStates::SELECTABLE;
        let selected = guard
            .row_index(self.row_id)
            .is_some_and(|index| guard.rows[index].selected);
        if selected {
            states |= AccessibleStates::SELECTED;
        }
        Ok(states)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn child_count(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        Some(row_children(&state, self.row_id).len())
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let children = row_children(&state, self.row_id);
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
            FragmentDirection::Parent => Some(root_node(&state)),
            FragmentDirection::FirstChild => row_children(&state, self.row_id).first().cloned(),
            FragmentDirection::LastChild => row_children(&state, self.row_id).last().cloned(),
            _ => sibling_in(&grid_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(pattern, PatternId::LegacyIAccessible | PatternId::SelectionItem)
    }
}

/// One row's header cell.
pub struct DataGridRowHeaderAccessibleObject {
    owner: Weak<RefCell<DataGridState>>,
    row_id: u64,
}

impl AccessibleNode for DataGridRowHeaderAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::ROW_HEADER, self.row_id as i32),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        if !guard.row_headers_visible {
            return Ok(Rect::ZERO);
        }
        match guard.row_index(self.row_id) {
            Some(index) => {
                let row = guard.row_bounds(index);
                if row.is_empty() {
                    return Ok(Rect::ZERO);
                }
                Ok(Rect::new(row.left(), row.top(), ROW_HEADER_WIDTH, ROW_HEIGHT))
            }
            None => Ok(Rect::ZERO),
        }
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        Ok(guard
            .row_index(self.row_id)
            .and_then(|index| guard.rows[index].header_text.clone()))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::RowHeader)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        Ok(state.borrow().core.base_states() | AccessibleStates::READONLY)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(row_node(&state, self.row_id))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(row_node(&state, self.row_id)),
            _ => sibling_in(
                &row_children(&state, self.row_id),
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

/// What a cell node is backed by.
#[derive(Debug, Clone, Copy)]
enum CellBacking {
    /// A cell the row holds a value for, keyed by column identity.
    Real { column_id: u64 },
    /// A cell with no backing value yet, keyed by display position.
    Placeholder { position: usize },
}

/// One cell of a data row.
pub struct DataGridCellAccessibleObject {
    owner: Weak<RefCell<DataGridState>>,
    row_id: u64,
    backing: CellBacking,
}

impl DataGridCellAccessibleObject {
    /// The display position this cell currently occupies.
    fn position(&self, guard: &DataGridState) -> Option<usize> {
        match self.backing {
            CellBacking::Placeholder { position } => Some(position),
            CellBacking::Real { column_id } => {
                let column_index = guard.column_index(column_id)?;
                guard
                    .display_order()
                    .iter()
                    .position(|&index| index == column_index)
            }
        }
    }
}

impl AccessibleNode for DataGridCellAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        let Some(state) = self.owner.upgrade() else {
            return RuntimeId::default();
        };
        let base = state
            .borrow()
            .core
            .runtime_id()
            .with_part(parts::ROW, self.row_id as i32);
        match self.backing {
            CellBacking::Real { column_id } => base.with_part(parts::CELL, column_id as i32),
            CellBacking::Placeholder { position } => {
                base.with_part(parts::PLACEHOLDER, position as i32)
            }
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let Some(row_index) = guard.row_index(self.row_id) else {
            return Ok(Rect::ZERO);
        };
        match self.position(&guard) {
            Some(position) => Ok(guard.cell_bounds(row_index, position)),
            None => Ok(Rect::ZERO),
        }
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Cell)
    }

    fn value(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        match self.backing {
            CellBacking::Placeholder { .. } => Ok(None),
            CellBacking::Real { column_id } => {
                let Some(row_index) = guard.row_index(self.row_id) else {
                    return Ok(None);
                };
                Ok(guard.rows[row_index].values.get(&column_id).cloned())
            }
        }
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states() | AccessibleStates::SELECTABLE;
        if matches!(self.backing, CellBacking::Placeholder { .. }) {
            states |= AccessibleStates::READONLY;
        }
        Ok(states)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(row_node(&state, self.row_id))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(row_node(&state, self.row_id)),
            _ => sibling_in(
                &row_children(&state, self.row_id),
                &self.runtime_id(),
                direction,
            ),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(
            pattern,
            PatternId::LegacyIAccessible
                | PatternId::GridItem
                | PatternId::TableItem
                | PatternId::SelectionItem
                | PatternId::Value
        )
    }

    fn property_value(&self, property: PropertyId) -> PropertyValue {
        let Some(state) = self.owner.upgrade() else {
            return PropertyValue::Empty;
        };
        let guard = state.borrow();
        match property {
            PropertyId::GridItemRow => match guard.row_index(self.row_id) {
                Some(index) => PropertyValue::I32(index as i32),
                None => PropertyValue::Empty,
            },
            PropertyId::GridItemColumn => match self.position(&guard) {
                Some(position) => PropertyValue::I32(position as i32),
                None => PropertyValue::Empty,
            },
            _ => {
                drop(guard);
                default_property_value(self, property)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use horizon_access_core::{RecordingRuntime, init_global_registry};

    fn grid() -> (DataGrid, Rc<RecordingRuntime>) {
        init_global_registry();
        let runtime = Rc::new(RecordingRuntime::new());
        let grid = DataGrid::new(runtime.clone()).unwrap();
        grid.create_handle(0x3000);
        grid.set_bounds(Rect::new(0.0, 0.0, 400.0, 300.0));
        (grid, runtime)
    }

    #[test]
    fn test_top_row_children_count_with_row_headers() {
        let (grid, _) = grid();
        grid.add_column("Name");
        grid.add_column("Size");
        grid.add_column("Date");
        let root = grid.accessibility_object();
        let top = root.fragment_navigate(FragmentDirection::FirstChild).unwrap();
        assert_eq!(top.name().unwrap().as_deref(), Some("Top Row"));
        // Top-left header plus three column headers.
        assert_eq!(top.child_count(), Some(4));
        assert_eq!(
            top.child(0).unwrap().unwrap().role().unwrap(),
            AccessibleRole::ColumnHeader
        );
        assert_eq!(
            top.child(1).unwrap().unwrap().name().unwrap().as_deref(),
            Some("Name")
        );
    }

    #[test]
    fn test_top_row_without_row_headers() {
        let (grid, _) = grid();
        grid.add_column("Name");
        grid.set_row_headers_visible(false);
        let root = grid.accessibility_object();
        let top = root.child(0).unwrap().unwrap();
        assert_eq!(top.child_count(), Some(1));
        assert_eq!(
            top.child(0).unwrap().unwrap().name().unwrap().as_deref(),
            Some("Name")
        );
    }

    #[test]
    fn test_headers_follow_display_order() {
        let (grid, _) = grid();
        let a = grid.add_column("A");
        let b = grid.add_column("B");
        grid.set_column_display_index(a, 1).unwrap();
        grid.set_column_display_index(b, 0).unwrap();
        grid.set_row_headers_visible(false);
        let root = grid.accessibility_object();
        let top = root.child(0).unwrap().unwrap();
        assert_eq!(
            top.child(0).unwrap().unwrap().name().unwrap().as_deref(),
            Some("B")
        );
        assert_eq!(
            top.child(1).unwrap().unwrap().name().unwrap().as_deref(),
            Some("A")
        );
    }

    #[test]
    fn test_hidden_column_leaves_child_list() {
        let (grid, _) = grid();
        let a = grid.add_column("A");
        grid.add_column("B");
        grid.set_row_headers_visible(false);
        grid.set_column_visible(a, false);
        let root = grid.accessibility_object();
        let top = root.child(0).unwrap().unwrap();
        assert_eq!(top.child_count(), Some(1));
        assert_eq!(
            top.child(0).unwrap().unwrap().name().unwrap().as_deref(),
            Some("B")
        );
    }

    #[test]
    fn test_placeholder_cell_promotes_on_first_value() {
        let (grid, runtime) = grid();
        let column = grid.add_column("Name");
        let row = grid.add_row();
        let placeholder = cell_node(&grid.state, row, 0).unwrap();
        assert!(placeholder.value().unwrap().is_none());
        let placeholder_id = placeholder.runtime_id();

        grid.set_cell_value(row, column, "alpha").unwrap();
        assert_eq!(runtime.disconnect_count(&placeholder_id), 1);

        let real = cell_node(&grid.state, row, 0).unwrap();
        assert_ne!(real.runtime_id(), placeholder_id);
        assert_eq!(real.value().unwrap().as_deref(), Some("alpha"));
        // The real cell survives later writes.
        grid.set_cell_value(row, column, "beta").unwrap();
        let again = cell_node(&grid.state, row, 0).unwrap();
        assert!(Rc::ptr_eq(&real, &again));
        assert_eq!(again.value().unwrap().as_deref(), Some("beta"));
    }

    #[test]
    fn test_row_nodes_are_cached_by_identity() {
        let (grid, _) = grid();
        grid.add_column("Name");
        let row = grid.add_row();
        let first = row_node(&grid.state, row);
        let again = row_node(&grid.state, row);
        assert!(Rc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_remove_row_disconnects_row_and_cells() {
        let (grid, runtime) = grid();
        let column = grid.add_column("Name");
        let row = grid.add_row();
        grid.set_cell_value(row, column, "alpha").unwrap();
        let row_node = row_node(&grid.state, row);
        let cell = cell_node(&grid.state, row, 0).unwrap();
        let row_id = row_node.runtime_id();
        let cell_id = cell.runtime_id();
        grid.remove_row(0).unwrap();
        assert_eq!(runtime.disconnect_count(&row_id), 1);
        assert_eq!(runtime.disconnect_count(&cell_id), 1);
    }

    #[test]
    fn test_grid_properties() {
        let (grid, _) = grid();
        let a = grid.add_column("A");
        grid.add_column("B");
        grid.add_row();
        grid.add_row();
        grid.set_column_visible(a, false);
        let root = grid.accessibility_object();
        assert_eq!(
            root.property_value(PropertyId::GridRowCount),
            PropertyValue::I32(2)
        );
        assert_eq!(
            root.property_value(PropertyId::GridColumnCount),
            PropertyValue::I32(1)
        );
    }

    #[test]
    fn test_cell_grid_item_coordinates() {
        let (grid, _) = grid();
        let a = grid.add_column("A");
        let b = grid.add_column("B");
        let row = grid.add_row();
        grid.add_row();
        grid.set_cell_value(row, b, "x").unwrap();
        let _ = a;
        let cell = cell_node(&grid.state, row, 1).unwrap();
        assert_eq!(
            cell.property_value(PropertyId::GridItemRow),
            PropertyValue::I32(0)
        );
        assert_eq!(
            cell.property_value(PropertyId::GridItemColumn),
            PropertyValue::I32(1)
        );
    }

    #[test]
    fn test_row_selection_event_gated_on_focus() {
        let (grid, runtime) = grid();
        grid.add_column("A");
        let row = grid.add_row();
        grid.select_row(row).unwrap();
        assert!(runtime.events().is_empty());
        grid.set_focused(true);
        grid.select_row(row).unwrap();
        assert_eq!(runtime.events().len(), 1);
        assert_eq!(
            runtime.events()[0].0,
            AutomationEvent::SelectionItemSelected
        );
    }

    #[test]
    fn test_recreate_handle_disconnects_everything() {
        let (grid, runtime) = grid();
        let column = grid.add_column("A");
        let row = grid.add_row();
        grid.set_cell_value(row, column, "x").unwrap();
        let root = grid.accessibility_object();
        let cell = cell_node(&grid.state, row, 0).unwrap();
        let root_id = root.runtime_id();
        let cell_id = cell.runtime_id();
        grid.recreate_handle(0x4000);
        assert_eq!(runtime.disconnect_count(&root_id), 1);
        assert_eq!(runtime.disconnect_count(&cell_id), 1);
        assert_ne!(grid.accessibility_object().runtime_id(), root_id);
    }
}
