//! Accessible tree for month calendar widgets.
//!
//! The calendar root exposes the two navigation buttons, the title header,
//! and the date grid. Grid content depends on the zoom level: day cells in
//! the month view, month cells in the year view, year cells in the decade
//! view. Switching level rebuilds the grid, so every previously issued
//! row and cell node is disconnected first.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

use horizon_access_core::{
    AccessError, AccessResult, AccessibleNode, AccessibleRole, AccessibleStates, AutomationEvent,
    ChildKey, FragmentDirection, NodeCache, NodeRef, PatternId, PlatformRuntime, Rect, RuntimeId,
    SystemProxyRef, SystemProxyWrapper,
};

use crate::owner::{OwnerCore, upgrade_owner};

mod parts {
    pub const PREV_BUTTON: i32 = 1;
    pub const NEXT_BUTTON: i32 = 2;
    pub const HEADER: i32 = 3;
    pub const GRID: i32 = 4;
    pub const ROW: i32 = 5;
    pub const DAY_CELL: i32 = 6;
    pub const MONTH_CELL: i32 = 7;
    pub const YEAR_CELL: i32 = 8;
    pub const WEEK_NUMBER: i32 = 9;
}

const HEADER_HEIGHT: f32 = 24.0;
const CELL_SIZE: f32 = 24.0;
const GRID_COLUMNS: usize = 7;
const GRID_ROWS: usize = 6;

/// The zoom level of the calendar grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarView {
    /// Day cells of one month.
    Month,
    /// Month cells of one year.
    Year,
    /// Year cells of one decade.
    Decade,
}

/// What one grid cell stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalendarCell {
    Day(NaiveDate),
    Month { year: i32, month: u32 },
    Year(i32),
}

impl CalendarCell {
    fn key(self) -> ChildKey {
        match self {
            Self::Day(date) => ChildKey::Item(date.num_days_from_ce() as u64),
            Self::Month { year, month } => ChildKey::Item((year as u64) << 8 | month as u64),
            Self::Year(year) => ChildKey::Item(year as u64),
        }
    }

    fn id_part(self) -> (i32, i32) {
        match self {
            Self::Day(date) => (parts::DAY_CELL, date.num_days_from_ce()),
            Self::Month { year, month } => (parts::MONTH_CELL, year * 16 + month as i32),
            Self::Year(year) => (parts::YEAR_CELL, year),
        }
    }
}

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// The widget state the accessible tree reads.
pub struct MonthCalendarState {
    core: OwnerCore,
    runtime: Rc<dyn PlatformRuntime>,
    wrapper: SystemProxyWrapper,
    view: CalendarView,
    /// First day of the visible month.
    visible_month: NaiveDate,
    selected: NaiveDate,
    focused_date: NaiveDate,
    show_week_numbers: bool,
    root: Option<Rc<MonthCalendarAccessibleObject>>,
    prev_button: Option<Rc<CalendarButtonAccessibleObject>>,
    next_button: Option<Rc<CalendarButtonAccessibleObject>>,
    header: Option<Rc<CalendarHeaderAccessibleObject>>,
    grid: Option<Rc<CalendarGridAccessibleObject>>,
    row_nodes: NodeCache,
    cell_nodes: NodeCache,
    week_number_nodes: NodeCache,
}

impl MonthCalendarState {
    fn decade_start(&self) -> i32 {
        self.visible_month.year() / 10 * 10
    }

    /// The date of the top-left day cell: the visible month's first day
    /// rolled back to the start of its week.
    fn grid_start(&self) -> NaiveDate {
        let back = self
            .visible_month
            .weekday()
            .days_since(Weekday::Sun);
        self.visible_month - Days::new(back as u64)
    }

    fn cell_at(&self, row: usize, column: usize) -> Option<CalendarCell> {
        match self.view {
            CalendarView::Month => {
                if row >= GRID_ROWS || column >= GRID_COLUMNS {
                    return None;
                }
                let offset = (row * GRID_COLUMNS + column) as u64;
                Some(CalendarCell::Day(self.grid_start() + Days::new(offset)))
            }
            CalendarView::Year => {
                let index = row * 4 + column;
                if column >= 4 || index >= 12 {
                    return None;
                }
                Some(CalendarCell::Month {
                    year: self.visible_month.year(),
                    month: index as u32 + 1,
                })
            }
            CalendarView::Decade => {
                let index = row * 4 + column;
                if column >= 4 || index >= 10 {
                    return None;
                }
                Some(CalendarCell::Year(self.decade_start() + index as i32))
            }
        }
    }

    fn row_count(&self) -> usize {
        match self.view {
            CalendarView::Month => GRID_ROWS,
            CalendarView::Year => 3,
            CalendarView::Decade => 3,
        }
    }

    fn header_title(&self) -> String {
        match self.view {
            CalendarView::Month => format!(
                "{} {}",
                MONTH_NAMES[self.visible_month.month0() as usize],
                self.visible_month.year()
            ),
            CalendarView::Year => self.visible_month.year().to_string(),
            CalendarView::Decade => {
                let start = self.decade_start();
                format!("{}-{}", start, start + 9)
            }
        }
    }

    fn cell_name(&self, cell: CalendarCell) -> String {
        match cell {
            CalendarCell::Day(date) => format!(
                "{} {} {}",
                date.day(),
                MONTH_NAMES[date.month0() as usize],
                date.year()
            ),
            CalendarCell::Month { month, .. } => MONTH_NAMES[month as usize - 1].to_string(),
            CalendarCell::Year(year) => year.to_string(),
        }
    }

    fn grid_bounds(&self) -> Rect {
        let bounds = self.core.bounds();
        if bounds.is_empty() {
            return Rect::ZERO;
        }
        Rect::new(
            bounds.left(),
            bounds.top() + HEADER_HEIGHT,
            bounds.size.width,
            (bounds.size.height - HEADER_HEIGHT).max(0.0),
        )
    }

    fn cell_bounds(&self, row: usize, column: usize) -> Rect {
        let grid = self.grid_bounds();
        if grid.is_empty() {
            return Rect::ZERO;
        }
        let week_offset = if self.show_week_numbers && self.view == CalendarView::Month {
            CELL_SIZE
        } else {
            0.0
        };
        Rect::new(
            grid.left() + week_offset + column as f32 * CELL_SIZE,
            grid.top() + row as f32 * CELL_SIZE,
            CELL_SIZE,
            CELL_SIZE,
        )
    }
}

/// A month calendar widget facade: the owner side of the accessible tree.
pub struct MonthCalendar {
    state: Rc<RefCell<MonthCalendarState>>,
}

impl MonthCalendar {
    pub fn new(today: NaiveDate, runtime: Rc<dyn PlatformRuntime>) -> AccessResult<Self> {
        let visible_month = today.with_day(1).unwrap_or(today);
        let state = MonthCalendarState {
            core: OwnerCore::new()?,
            runtime,
            wrapper: SystemProxyWrapper::detached(),
            view: CalendarView::Month,
            visible_month,
            selected: today,
            focused_date: today,
            show_week_numbers: false,
            root: None,
            prev_button: None,
            next_button: None,
            header: None,
            grid: None,
            row_nodes: NodeCache::new(),
            cell_nodes: NodeCache::new(),
            week_number_nodes: NodeCache::new(),
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
            if let Some(node) = state.prev_button.take() {
                stale.push(node);
            }
            if let Some(node) = state.next_button.take() {
                stale.push(node);
            }
            if let Some(node) = state.header.take() {
                stale.push(node);
            }
            if let Some(node) = state.grid.take() {
                stale.push(node);
            }
            stale.append(&mut state.row_nodes.drain());
            stale.append(&mut state.cell_nodes.drain());
            stale.append(&mut state.week_number_nodes.drain());
            (state.runtime.clone(), stale)
        };
        // Runtime ids must be captured before the handle changes.
        let stale_ids: Vec<RuntimeId> = stale.iter().map(|node| node.runtime_id()).collect();
        self.state.borrow_mut().core.set_handle(handle);
        tracing::debug!(target: "horizon_access::widgets", stale = stale_ids.len(), "calendar handle recreated");
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

    pub fn view(&self) -> CalendarView {
        self.state.borrow().view
    }

    /// Switch zoom level. The grid is rebuilt: every row and cell node is
    /// disconnected before any replacement can be handed out.
    pub fn set_view(&self, view: CalendarView) {
        let (runtime, stale, grid_id) = {
            let mut state = self.state.borrow_mut();
            if state.view == view {
                return;
            }
            state.view = view;
            let mut stale = state.row_nodes.drain();
            stale.append(&mut state.cell_nodes.drain());
            stale.append(&mut state.week_number_nodes.drain());
            (
                state.runtime.clone(),
                stale,
                state.core.runtime_id().with_part(parts::GRID, 0),
            )
        };
        for node in &stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
        runtime.raise_event(AutomationEvent::StructureChanged, &grid_id);
    }

    pub fn visible_month(&self) -> NaiveDate {
        self.state.borrow().visible_month
    }

    /// Scroll the visible range by whole months (negative scrolls back).
    /// Structural for the grid content.
    pub fn navigate_months(&self, delta: i32) {
        let (runtime, stale, grid_id) = {
            let mut state = self.state.borrow_mut();
            let moved = if delta >= 0 {
                state
                    .visible_month
                    .checked_add_months(Months::new(delta as u32))
            } else {
                state
                    .visible_month
                    .checked_sub_months(Months::new(delta.unsigned_abs()))
            };
            let Some(moved) = moved else {
                return;
            };
            state.visible_month = moved;
            let mut stale = state.row_nodes.drain();
            stale.append(&mut state.cell_nodes.drain());
            stale.append(&mut state.week_number_nodes.drain());
            (
                state.runtime.clone(),
                stale,
                state.core.runtime_id().with_part(parts::GRID, 0),
            )
        };
        for node in &stale {
            runtime.disconnect_provider(&node.runtime_id());
        }
        runtime.raise_event(AutomationEvent::StructureChanged, &grid_id);
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.state.borrow().selected
    }

    /// Select a date, scrolling the visible month when it lies outside.
    /// Raises a selection event on the day cell while the calendar owns
    /// keyboard focus.
    pub fn set_date(&self, date: NaiveDate) {
        let first = date.with_day(1).unwrap_or(date);
        if self.state.borrow().visible_month != first {
            let delta = (first.year() - self.visible_month().year()) * 12
                + (first.month() as i32 - self.visible_month().month() as i32);
            self.navigate_months(delta);
        }
        let (runtime, event_target) = {
            let mut state = self.state.borrow_mut();
            state.selected = date;
            state.focused_date = date;
            let target = state.core.focused().then(|| {
                state
                    .core
                    .runtime_id()
                    .with_part(parts::DAY_CELL, date.num_days_from_ce())
            });
            (state.runtime.clone(), target)
        };
        if let Some(id) = event_target {
            runtime.raise_event(AutomationEvent::SelectionChanged, &id);
        }
    }

    /// Move the keyboard focus cell. The focus event only fires while the
    /// calendar itself owns keyboard focus, so background calendars stay
    /// silent.
    pub fn set_focused_date(&self, date: NaiveDate) {
        let (runtime, event_target) = {
            let mut state = self.state.borrow_mut();
            state.focused_date = date;
            let target = state.core.focused().then(|| {
                state
                    .core
                    .runtime_id()
                    .with_part(parts::DAY_CELL, date.num_days_from_ce())
            });
            (state.runtime.clone(), target)
        };
        if let Some(id) = event_target {
            runtime.raise_event(AutomationEvent::FocusChanged, &id);
        }
    }

    pub fn set_show_week_numbers(&self, show: bool) {
        self.state.borrow_mut().show_week_numbers = show;
    }

    /// The root accessible object for this calendar.
    pub fn accessibility_object(&self) -> NodeRef {
        root_node(&self.state)
    }
}

fn root_node(state: &Rc<RefCell<MonthCalendarState>>) -> NodeRef {
    if let Some(node) = state.borrow().root.clone() {
        return node;
    }
    let node = Rc::new(MonthCalendarAccessibleObject {
        owner: Rc::downgrade(state),
        wrapper: state.borrow().wrapper.clone(),
    });
    state.borrow_mut().root = Some(node.clone());
    node
}

fn button_node(state: &Rc<RefCell<MonthCalendarState>>, forward: bool) -> NodeRef {
    {
        let guard = state.borrow();
        let cached = if forward { &guard.next_button } else { &guard.prev_button };
        if let Some(node) = cached.clone() {
            return node;
        }
    }
    let node = Rc::new(CalendarButtonAccessibleObject {
        owner: Rc::downgrade(state),
        forward,
    });
    let mut guard = state.borrow_mut();
    if forward {
        guard.next_button = Some(node.clone());
    } else {
        guard.prev_button = Some(node.clone());
    }
    node
}

fn header_node(state: &Rc<RefCell<MonthCalendarState>>) -> NodeRef {
    if let Some(node) = state.borrow().header.clone() {
        return node;
    }
    let node = Rc::new(CalendarHeaderAccessibleObject {
        owner: Rc::downgrade(state),
    });
    state.borrow_mut().header = Some(node.clone());
    node
}

fn grid_node(state: &Rc<RefCell<MonthCalendarState>>) -> NodeRef {
    if let Some(node) = state.borrow().grid.clone() {
        return node;
    }
    let node = Rc::new(CalendarGridAccessibleObject {
        owner: Rc::downgrade(state),
    });
    state.borrow_mut().grid = Some(node.clone());
    node
}

fn row_node(state: &Rc<RefCell<MonthCalendarState>>, row: usize) -> NodeRef {
    let owner = Rc::downgrade(state);
    state
        .borrow_mut()
        .row_nodes
        .get_or_insert_with(ChildKey::Slot(row), || {
            Rc::new(CalendarRowAccessibleObject { owner, row })
        })
}

fn cell_node(state: &Rc<RefCell<MonthCalendarState>>, row: usize, column: usize) -> Option<NodeRef> {
    let cell = state.borrow().cell_at(row, column)?;
    let owner = Rc::downgrade(state);
    let mut guard = state.borrow_mut();
    Some(
        guard
            .cell_nodes
            .get_or_insert_with(cell.key(), || {
                Rc::new(CalendarCellAccessibleObject {
                    owner,
                    cell,
                    row,
                    column,
                })
            }),
    )
}

fn week_number_node(state: &Rc<RefCell<MonthCalendarState>>, row: usize) -> Option<NodeRef> {
    {
        let guard = state.borrow();
        if guard.view != CalendarView::Month || !guard.show_week_numbers {
            return None;
        }
    }
    let owner = Rc::downgrade(state);
    let mut guard = state.borrow_mut();
    Some(
        guard
            .week_number_nodes
            .get_or_insert_with(ChildKey::Slot(row), || {
                Rc::new(CalendarWeekNumberAccessibleObject { owner, row })
            }),
    )
}

fn calendar_children(state: &Rc<RefCell<MonthCalendarState>>) -> Vec<NodeRef> {
    vec![
        button_node(state, false),
        header_node(state),
        button_node(state, true),
        grid_node(state),
    ]
}

fn grid_rows(state: &Rc<RefCell<MonthCalendarState>>) -> Vec<NodeRef> {
    let rows = state.borrow().row_count();
    (0..rows).map(|row| row_node(state, row)).collect()
}

fn row_cells(state: &Rc<RefCell<MonthCalendarState>>, row: usize) -> Vec<NodeRef> {
    let mut cells = Vec::new();
    if let Some(week) = week_number_node(state, row) {
        cells.push(week);
    }
    let mut column = 0;
    while let Some(cell) = cell_node(state, row, column) {
        cells.push(cell);
        column += 1;
    }
    cells
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

/// The calendar's own accessible object (the fragment root).
pub struct MonthCalendarAccessibleObject {
    owner: Weak<RefCell<MonthCalendarState>>,
    wrapper: SystemProxyWrapper,
}

impl AccessibleNode for MonthCalendarAccessibleObject {
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

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let title = state.borrow().header_title();
        Ok(Some(title))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Calendar)
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
        Some(4)
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let children = calendar_children(&state);
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
            FragmentDirection::FirstChild => calendar_children(&state).first().cloned(),
            FragmentDirection::LastChild => calendar_children(&state).last().cloned(),
            _ => None,
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}

/// One of the two month scroll buttons.
pub struct CalendarButtonAccessibleObject {
    owner: Weak<RefCell<MonthCalendarState>>,
    forward: bool,
}

impl AccessibleNode for CalendarButtonAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        let part = if self.forward { parts::NEXT_BUTTON } else { parts::PREV_BUTTON };
        match self.owner.upgrade() {
            Some(state) => state.borrow().core.runtime_id().with_part(part, 0),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let bounds = state.borrow().core.bounds();
        if bounds.is_empty() {
            return Ok(Rect::ZERO);
        }
        let left = if self.forward {
            bounds.right() - CELL_SIZE
        } else {
            bounds.left()
        };
        Ok(Rect::new(left, bounds.top(), CELL_SIZE, HEADER_HEIGHT))
    }

    fn name(&self) -> AccessResult<Option<String>> {
        Ok(Some(
            if self.forward { "Next" } else { "Previous" }.to_string(),
        ))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::PushButton)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        Ok(state.borrow().core.base_states())
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(root_node(&state)),
            _ => sibling_in(&calendar_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(pattern, PatternId::LegacyIAccessible | PatternId::Invoke)
    }
}

/// The title between the scroll buttons.
pub struct CalendarHeaderAccessibleObject {
    owner: Weak<RefCell<MonthCalendarState>>,
}

impl AccessibleNode for CalendarHeaderAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state.borrow().core.runtime_id().with_part(parts::HEADER, 0),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let bounds = state.borrow().core.bounds();
        if bounds.is_empty() {
            return Ok(Rect::ZERO);
        }
        Ok(Rect::new(
            bounds.left() + CELL_SIZE,
            bounds.top(),
            (bounds.size.width - 2.0 * CELL_SIZE).max(0.0),
            HEADER_HEIGHT,
        ))
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let title = state.borrow().header_title();
        Ok(Some(title))
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
        Some(root_node(&state))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(root_node(&state)),
            _ => sibling_in(&calendar_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}

/// The date grid.
pub struct CalendarGridAccessibleObject {
    owner: Weak<RefCell<MonthCalendarState>>,
}

impl AccessibleNode for CalendarGridAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state.borrow().core.runtime_id().with_part(parts::GRID, 0),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let bounds = state.borrow().grid_bounds();
        Ok(bounds)
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Table)
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
        let count = state.borrow().row_count();
        Some(count)
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let count = state.borrow().row_count();
        if index >= count {
            return Err(AccessError::ChildIndexOutOfRange { index, count });
        }
        Ok(Some(row_node(&state, index)))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(root_node(&state)),
            FragmentDirection::FirstChild => grid_rows(&state).first().cloned(),
            FragmentDirection::LastChild => grid_rows(&state).last().cloned(),
            _ => sibling_in(&calendar_children(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(pattern, PatternId::LegacyIAccessible | PatternId::Grid)
    }
}

/// One week (or month/year band) of the grid.
pub struct CalendarRowAccessibleObject {
    owner: Weak<RefCell<MonthCalendarState>>,
    row: usize,
}

impl AccessibleNode for CalendarRowAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::ROW, self.row as i32),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let grid = guard.grid_bounds();
        if grid.is_empty() {
            return Ok(Rect::ZERO);
        }
        Ok(Rect::new(
            grid.left(),
            grid.top() + self.row as f32 * CELL_SIZE,
            grid.size.width,
            CELL_SIZE,
        ))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Row)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        Ok(state.borrow().core.base_states())
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(grid_node(&state))
    }

    fn child_count(&self) -> Option<usize> {
        let state = self.owner.upgrade()?;
        Some(row_cells(&state, self.row).len())
    }

    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let state = upgrade_owner(&self.owner)?;
        let cells = row_cells(&state, self.row);
        if index >= cells.len() {
            return Err(AccessError::ChildIndexOutOfRange {
                index,
                count: cells.len(),
            });
        }
        Ok(Some(cells[index].clone()))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(grid_node(&state)),
            FragmentDirection::FirstChild => row_cells(&state, self.row).first().cloned(),
            FragmentDirection::LastChild => row_cells(&state, self.row).last().cloned(),
            _ => sibling_in(&grid_rows(&state), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}

/// The ISO week number cell at the left edge of a week row.
pub struct CalendarWeekNumberAccessibleObject {
    owner: Weak<RefCell<MonthCalendarState>>,
    row: usize,
}

impl AccessibleNode for CalendarWeekNumberAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        match self.owner.upgrade() {
            Some(state) => state
                .borrow()
                .core
                .runtime_id()
                .with_part(parts::WEEK_NUMBER, self.row as i32),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let grid = guard.grid_bounds();
        if grid.is_empty() {
            return Ok(Rect::ZERO);
        }
        Ok(Rect::new(
            grid.left(),
            grid.top() + self.row as f32 * CELL_SIZE,
            CELL_SIZE,
            CELL_SIZE,
        ))
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        match guard.cell_at(self.row, 0) {
            Some(CalendarCell::Day(date)) => {
                Ok(Some(format!("Week {}", date.iso_week().week())))
            }
            _ => Ok(None),
        }
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
        Some(row_node(&state, self.row))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(row_node(&state, self.row)),
            _ => sibling_in(&row_cells(&state, self.row), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }
}

/// One date cell of the grid.
pub struct CalendarCellAccessibleObject {
    owner: Weak<RefCell<MonthCalendarState>>,
    cell: CalendarCell,
    row: usize,
    column: usize,
}

impl AccessibleNode for CalendarCellAccessibleObject {
    fn runtime_id(&self) -> RuntimeId {
        let (part, value) = self.cell.id_part();
        match self.owner.upgrade() {
            Some(state) => state.borrow().core.runtime_id().with_part(part, value),
            None => RuntimeId::default(),
        }
    }

    fn bounds(&self) -> AccessResult<Rect> {
        let state = upgrade_owner(&self.owner)?;
        let bounds = state.borrow().cell_bounds(self.row, self.column);
        Ok(bounds)
    }

    fn name(&self) -> AccessResult<Option<String>> {
        let state = upgrade_owner(&self.owner)?;
        let name = state.borrow().cell_name(self.cell);
        Ok(Some(name))
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Cell)
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        let state = upgrade_owner(&self.owner)?;
        let guard = state.borrow();
        let mut states = guard.core.base_states()
            | AccessibleStates::SELECTABLE
            | AccessibleStates::FOCUSABLE;
        if let CalendarCell::Day(date) = self.cell {
            if date == guard.selected {
                states |= AccessibleStates::SELECTED;
            }
            if date == guard.focused_date && guard.core.focused() {
                states |= AccessibleStates::FOCUSED;
            }
            // Leading/trailing days of the adjacent months.
            if date.month() != guard.visible_month.month() {
                states |= AccessibleStates::OFFSCREEN;
            }
        }
        Ok(states)
    }

    fn parent(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(row_node(&state, self.row))
    }

    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        match direction {
            FragmentDirection::Parent => Some(row_node(&state, self.row)),
            _ => sibling_in(&row_cells(&state, self.row), &self.runtime_id(), direction),
        }
    }

    fn fragment_root(&self) -> Option<NodeRef> {
        let state = self.owner.upgrade()?;
        Some(root_node(&state))
    }

    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(
            pattern,
            PatternId::LegacyIAccessible | PatternId::SelectionItem | PatternId::GridItem
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use horizon_access_core::{RecordingRuntime, init_global_registry};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn calendar(today: NaiveDate) -> (MonthCalendar, Rc<RecordingRuntime>) {
        init_global_registry();
        let runtime = Rc::new(RecordingRuntime::new());
        let calendar = MonthCalendar::new(today, runtime.clone()).unwrap();
        calendar.create_handle(0x6000);
        calendar.set_bounds(Rect::new(0.0, 0.0, 200.0, 180.0));
        (calendar, runtime)
    }

    #[test]
    fn test_root_children() {
        let (calendar, _) = calendar(date(2026, 8, 25));
        let root = calendar.accessibility_object();
        assert_eq!(root.child_count(), Some(4));
        assert_eq!(
            root.child(0).unwrap().unwrap().name().unwrap().as_deref(),
            Some("Previous")
        );
        assert_eq!(
            root.child(1).unwrap().unwrap().name().unwrap().as_deref(),
            Some("August 2026")
        );
        assert_eq!(
            root.child(3).unwrap().unwrap().role().unwrap(),
            AccessibleRole::Table
        );
    }

    #[test]
    fn test_month_grid_cells() {
        let (calendar, _) = calendar(date(2026, 8, 25));
        // August 2026 starts on a Saturday; the grid starts that Sunday.
        let first = cell_node(&calendar.state, 0, 0).unwrap();
        assert_eq!(first.name().unwrap().as_deref(), Some("26 July 2026"));
        let start_of_month = cell_node(&calendar.state, 0, 6).unwrap();
        assert_eq!(start_of_month.name().unwrap().as_deref(), Some("1 August 2026"));
        // Day cells outside the visible month read as offscreen.
        assert!(first
            .state()
            .unwrap()
            .contains(AccessibleStates::OFFSCREEN));
        assert!(!start_of_month
            .state()
            .unwrap()
            .contains(AccessibleStates::OFFSCREEN));
    }

    #[test]
    fn test_cell_nodes_are_cached_by_date() {
        let (calendar, _) = calendar(date(2026, 8, 25));
        let first = cell_node(&calendar.state, 1, 3).unwrap();
        let again = cell_node(&calendar.state, 1, 3).unwrap();
        assert!(Rc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_view_change_disconnects_grid_nodes() {
        let (calendar, runtime) = calendar(date(2026, 8, 25));
        let cell = cell_node(&calendar.state, 0, 0).unwrap();
        let row = row_node(&calendar.state, 0);
        let cell_id = cell.runtime_id();
        let row_id = row.runtime_id();
        calendar.set_view(CalendarView::Year);
        assert_eq!(runtime.disconnect_count(&cell_id), 1);
        assert_eq!(runtime.disconnect_count(&row_id), 1);
        // The rebuilt grid serves month cells now.
        let month_cell = cell_node(&calendar.state, 0, 0).unwrap();
        assert_eq!(month_cell.name().unwrap().as_deref(), Some("January"));
    }

    #[test]
    fn test_navigate_months_is_structural() {
        let (calendar, runtime) = calendar(date(2026, 8, 25));
        let cell = cell_node(&calendar.state, 2, 0).unwrap();
        let cell_id = cell.runtime_id();
        calendar.navigate_months(1);
        assert_eq!(calendar.visible_month(), date(2026, 9, 1));
        assert_eq!(runtime.disconnect_count(&cell_id), 1);
        assert!(runtime
            .events()
            .iter()
            .any(|(event, _)| *event == AutomationEvent::StructureChanged));
    }

    #[test]
    fn test_set_date_scrolls_and_selects() {
        let (calendar, runtime) = calendar(date(2026, 8, 25));
        calendar.set_focused(true);
        calendar.set_date(date(2026, 10, 3));
        assert_eq!(calendar.visible_month(), date(2026, 10, 1));
        assert_eq!(calendar.selected_date(), date(2026, 10, 3));
        assert!(runtime
            .events()
            .iter()
            .any(|(event, _)| *event == AutomationEvent::SelectionChanged));
    }

    #[test]
    fn test_focus_event_gated_on_owner_focus() {
        let (calendar, runtime) = calendar(date(2026, 8, 25));
        calendar.set_focused_date(date(2026, 8, 26));
        assert!(runtime.events().is_empty());
        calendar.set_focused(true);
        calendar.set_focused_date(date(2026, 8, 27));
        assert_eq!(runtime.events().len(), 1);
        assert_eq!(runtime.events()[0].0, AutomationEvent::FocusChanged);
    }

    #[test]
    fn test_week_numbers_appear_when_enabled() {
        let (calendar, _) = calendar(date(2026, 8, 25));
        let row = row_node(&calendar.state, 0);
        assert_eq!(row.child_count(), Some(7));
        calendar.set_show_week_numbers(true);
        assert_eq!(row.child_count(), Some(8));
        let week = row.child(0).unwrap().unwrap();
        assert_eq!(week.role().unwrap(), AccessibleRole::RowHeader);
        assert!(week.name().unwrap().unwrap().starts_with("Week "));
    }

    #[test]
    fn test_decade_view_title() {
        let (calendar, _) = calendar(date(2026, 8, 25));
        calendar.set_view(CalendarView::Decade);
        let root = calendar.accessibility_object();
        assert_eq!(root.name().unwrap().as_deref(), Some("2020-2029"));
    }
}
