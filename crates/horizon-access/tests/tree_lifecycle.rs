//! Cross-widget lifecycle scenarios: node identity across navigation and
//! handle recreation, disconnect-before-reconstruct, legacy enumeration,
//! and proxy fallback, all exercised through the public facade surface.

use std::rc::Rc;

use horizon_access::widgets::{
    ComboBox, ComboBoxStyle, DataGrid, ListView, ListViewMode, TabControl, ToolStrip,
    ToolStripItemKind,
};
use horizon_access_core::{
    AccessibleRole, AccessibleStates, AutomationEvent, ChildEnumerator, ChildId, EnumeratedChild,
    FragmentDirection, NavDirection, Point, ProxyChild, ProxyError, Rect, RecordingRuntime,
    SelectionFlags, SystemChildIter, SystemProxy, fragment_children, init_global_registry,
};

fn runtime() -> Rc<RecordingRuntime> {
    init_global_registry();
    Rc::new(RecordingRuntime::new())
}

#[test]
fn combo_item_identity_survives_navigation() {
    let runtime = runtime();
    // The simple style renders its list inline, so items are reachable
    // without dropping down.
    let combo = ComboBox::new(ComboBoxStyle::Simple, runtime).unwrap();
    combo.create_handle(0x11);
    combo.add_item("one");
    combo.add_item("two");

    let root = combo.accessibility_object();
    let list = root.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    let first = list.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    let id = first.runtime_id();

    // Re-navigating must serve the same instance with the same id.
    let again = list.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    assert!(Rc::ptr_eq(&first, &again));
    assert_eq!(again.runtime_id(), id);
}

#[test]
fn recreate_handle_reissues_every_runtime_id() {
    let runtime = runtime();
    let combo = ComboBox::new(ComboBoxStyle::Simple, runtime.clone()).unwrap();
    combo.create_handle(0x21);
    combo.add_item("one");

    let root = combo.accessibility_object();
    let list = root.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    let item = list.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    let old_root_id = root.runtime_id();
    let old_item_id = item.runtime_id();

    combo.recreate_handle(0x22);

    // The old references were disconnected exactly once, under their old ids.
    assert_eq!(runtime.disconnect_count(&old_root_id), 1);
    assert_eq!(runtime.disconnect_count(&old_item_id), 1);

    // Fresh navigation yields new identities.
    let root = combo.accessibility_object();
    assert_ne!(root.runtime_id(), old_root_id);
    let list = root.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    let item = list.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    assert_ne!(item.runtime_id(), old_item_id);
}

#[test]
fn sibling_navigation_is_symmetric() {
    let runtime = runtime();
    let strip = ToolStrip::new(runtime).unwrap();
    strip.create_handle(0x31);
    strip.set_bounds(Rect::new(0.0, 0.0, 200.0, 26.0));
    strip.add_item(ToolStripItemKind::Button, "Open");
    strip.add_item(ToolStripItemKind::Separator, "");
    strip.add_item(ToolStripItemKind::Button, "Save");

    let root = strip.accessibility_object();
    let children = fragment_children(&*root);
    assert_eq!(children.len(), 3);
    for pair in children.windows(2) {
        let forward = pair[0]
            .fragment_navigate(FragmentDirection::NextSibling)
            .unwrap();
        assert_eq!(forward.runtime_id(), pair[1].runtime_id());
        let back = pair[1]
            .fragment_navigate(FragmentDirection::PreviousSibling)
            .unwrap();
        assert_eq!(back.runtime_id(), pair[0].runtime_id());
    }
    assert!(
        children[0]
            .fragment_navigate(FragmentDirection::PreviousSibling)
            .is_none()
    );
    assert!(
        children[2]
            .fragment_navigate(FragmentDirection::NextSibling)
            .is_none()
    );
}

#[test]
fn enumeration_short_count_signals_exhaustion() {
    let runtime = runtime();
    let strip = ToolStrip::new(runtime).unwrap();
    strip.create_handle(0x41);
    for index in 0..3 {
        strip.add_item(ToolStripItemKind::Button, format!("b{index}"));
    }

    let mut iter = ChildEnumerator::new(strip.accessibility_object());
    let first = iter.next(2).unwrap();
    assert_eq!(first.len(), 2);
    let rest = iter.next(5).unwrap();
    assert_eq!(rest.len(), 1);
    assert!(iter.next(1).unwrap().is_empty());

    iter.reset().unwrap();
    assert!(iter.skip(2).unwrap());
    assert_eq!(
        iter.next(5).unwrap(),
        vec![EnumeratedChild::ChildId(ChildId(3))]
    );
}

#[test]
fn combo_dropdown_expands_through_button_action() {
    let runtime = runtime();
    let combo = ComboBox::new(ComboBoxStyle::DropDown, runtime.clone()).unwrap();
    combo.create_handle(0x51);
    combo.add_item("one");
    assert!(!combo.dropped_down());

    let root = combo.accessibility_object();
    let button = root.fragment_navigate(FragmentDirection::LastChild).unwrap();
    assert_eq!(button.role().unwrap(), AccessibleRole::PushButton);

    button.do_default_action().unwrap();
    assert!(combo.dropped_down());
    assert!(
        runtime
            .events()
            .iter()
            .any(|(event, _)| *event == AutomationEvent::ExpandCollapseStateChanged)
    );

    button.do_default_action().unwrap();
    assert!(!combo.dropped_down());
}

#[test]
fn grid_top_row_follows_display_order() {
    let runtime = runtime();
    let grid = DataGrid::new(runtime).unwrap();
    grid.create_handle(0x61);
    grid.set_bounds(Rect::new(0.0, 0.0, 400.0, 200.0));
    let name = grid.add_column("Name");
    grid.add_column("Size");
    grid.add_column("Date");

    let root = grid.accessibility_object();
    let top_row = root.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    let headers = fragment_children(&*top_row);
    // Top-left header plus the three column headers.
    assert_eq!(headers.len(), 4);
    assert_eq!(headers[1].name().unwrap().as_deref(), Some("Name"));

    // Moving the first column to the end reorders the header row.
    grid.set_column_display_index(name, 9).unwrap();
    let headers = fragment_children(&*top_row);
    assert_eq!(headers.len(), 4);
    assert_eq!(headers[3].name().unwrap().as_deref(), Some("Name"));
}

#[test]
fn placeholder_cell_promotion_disconnects_exactly_once() {
    let runtime = runtime();
    let grid = DataGrid::new(runtime.clone()).unwrap();
    grid.create_handle(0x71);
    grid.set_row_headers_visible(false);
    let column = grid.add_column("Name");
    let row_id = grid.add_row();

    let root = grid.accessibility_object();
    let row = root.fragment_navigate(FragmentDirection::LastChild).unwrap();
    assert_eq!(row.role().unwrap(), AccessibleRole::Row);
    let placeholder = row.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    assert!(placeholder.name().unwrap().is_none());
    let placeholder_id = placeholder.runtime_id();

    grid.set_cell_value(row_id, column, "alpha").unwrap();
    assert_eq!(runtime.disconnect_count(&placeholder_id), 1);

    let real = row.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    assert_ne!(real.runtime_id(), placeholder_id);
    assert_eq!(real.value().unwrap().as_deref(), Some("alpha"));

    // No further disconnects for the same slot.
    grid.set_cell_value(row_id, column, "beta").unwrap();
    assert_eq!(runtime.disconnect_count(&placeholder_id), 1);
}

#[test]
fn fake_sub_item_promotion_observable_through_navigation() {
    let runtime = runtime();
    let list = ListView::new(ListViewMode::Details, runtime.clone()).unwrap();
    list.create_handle(0x81);
    list.add_column("Name");
    let size = list.add_column("Size");
    let item_id = list.add_item("alpha");

    let root = list.accessibility_object();
    let item = root.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    let fake = item.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    assert!(fake.name().unwrap().is_none());
    let fake_id = fake.runtime_id();

    list.set_sub_item_text(item_id, size, "12 kB").unwrap();
    assert_eq!(runtime.disconnect_count(&fake_id), 1);

    let real = item.fragment_navigate(FragmentDirection::FirstChild).unwrap();
    assert_ne!(real.runtime_id(), fake_id);
    assert_eq!(real.name().unwrap().as_deref(), Some("12 kB"));
}

#[test]
fn selection_events_only_from_focused_owner() {
    let runtime = runtime();
    let tabs = TabControl::new(runtime.clone()).unwrap();
    tabs.create_handle(0x91);
    tabs.add_tab("General");
    let advanced = tabs.add_tab("Advanced");

    tabs.select_tab(advanced).unwrap();
    assert!(runtime.events().is_empty());

    tabs.set_focused(true);
    tabs.select_tab(advanced).unwrap();
    let events = runtime.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, AutomationEvent::SelectionItemSelected);
}

/// A proxy scripted to fail every member with the given error while still
/// enumerating two children.
struct ScriptedProxy {
    error: ProxyError,
}

struct ScriptedIter {
    cursor: usize,
}

impl SystemChildIter for ScriptedIter {
    fn next(&mut self, count: usize) -> Result<Vec<ProxyChild>, ProxyError> {
        let mut out = Vec::new();
        while out.len() < count && self.cursor < 2 {
            out.push(ProxyChild {
                id: ChildId::from_index(self.cursor),
                name: Some(format!("native{}", self.cursor)),
            });
            self.cursor += 1;
        }
        Ok(out)
    }

    fn skip(&mut self, count: usize) -> Result<bool, ProxyError> {
        self.cursor += count;
        Ok(self.cursor <= 2)
    }

    fn reset(&mut self) -> Result<(), ProxyError> {
        self.cursor = 0;
        Ok(())
    }
}

impl SystemProxy for ScriptedProxy {
    fn name(&self, _: ChildId) -> Result<String, ProxyError> {
        Err(self.error)
    }
    fn value(&self, _: ChildId) -> Result<String, ProxyError> {
        Err(self.error)
    }
    fn role(&self, _: ChildId) -> Result<AccessibleRole, ProxyError> {
        Err(self.error)
    }
    fn state(&self, _: ChildId) -> Result<AccessibleStates, ProxyError> {
        Err(self.error)
    }
    fn location(&self, _: ChildId) -> Result<Rect, ProxyError> {
        Err(self.error)
    }
    fn default_action(&self, _: ChildId) -> Result<String, ProxyError> {
        Err(self.error)
    }
    fn keyboard_shortcut(&self, _: ChildId) -> Result<String, ProxyError> {
        Err(self.error)
    }
    fn help(&self, _: ChildId) -> Result<String, ProxyError> {
        Err(self.error)
    }
    fn child_count(&self) -> Result<usize, ProxyError> {
        Ok(2)
    }
    fn navigate(&self, _: NavDirection, _: ChildId) -> Result<Option<ChildId>, ProxyError> {
        Ok(None)
    }
    fn hit_test(&self, _: Point) -> Result<Option<ChildId>, ProxyError> {
        Ok(None)
    }
    fn select(&self, _: SelectionFlags, _: ChildId) -> Result<(), ProxyError> {
        Ok(())
    }
    fn do_default_action(&self, _: ChildId) -> Result<(), ProxyError> {
        Ok(())
    }
    fn enum_children(&self) -> Option<Box<dyn SystemChildIter>> {
        Some(Box::new(ScriptedIter { cursor: 0 }))
    }
}

#[test]
fn proxy_capability_gaps_read_as_no_data() {
    let runtime = runtime();
    let combo = ComboBox::new(ComboBoxStyle::DropDownList, runtime).unwrap();
    combo.attach_system_proxy(Rc::new(ScriptedProxy {
        error: ProxyError::MemberNotFound,
    }));
    combo.create_handle(0xa1);

    // The root has no custom name; the proxy gap degrades to "no data"
    // instead of failing the query.
    let root = combo.accessibility_object();
    assert_eq!(root.name().unwrap(), None);
    assert_eq!(root.help().unwrap(), None);
    assert_eq!(root.keyboard_shortcut().unwrap(), None);
}

#[test]
fn empty_owner_enumeration_falls_back_to_proxy() {
    let runtime = runtime();
    let tabs = TabControl::new(runtime).unwrap();
    tabs.attach_system_proxy(Rc::new(ScriptedProxy {
        error: ProxyError::MemberNotFound,
    }));
    tabs.create_handle(0xb1);

    // No tabs: the root defers enumeration to the proxy's own iterator.
    let mut iter = ChildEnumerator::new(tabs.accessibility_object());
    let children = iter.next(10).unwrap();
    let names: Vec<_> = children
        .iter()
        .map(|child| match child {
            EnumeratedChild::Proxy(proxy) => proxy.name.clone().unwrap(),
            EnumeratedChild::ChildId(id) => panic!("unexpected custom child {}", id.0),
        })
        .collect();
    assert_eq!(names, vec!["native0", "native1"]);
}
