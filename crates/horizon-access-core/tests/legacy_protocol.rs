//! Cross-module behavior of the legacy protocol through the public API:
//! proxy-backed navigation, enumeration, and the debug tree formatter.

use std::rc::Rc;

use horizon_access_core::{
    AccessibleNode, AccessibleRole, AccessibleStates, ChildEnumerator, ChildId, EnumeratedChild,
    NavDirection, NodeRef, Point, PropertyId, PropertyValue, ProxyChild, ProxyError, Rect,
    RuntimeId, SelectionFlags, SystemChildIter, SystemProxy, SystemProxyWrapper,
};
use horizon_access_core::logging::{TreeFormatOptions, format_tree};
use horizon_access_core::node::FragmentDirection;

/// A proxy exposing `count` named children and sibling navigation over
/// them. Descriptive members answer only for the object itself.
struct WindowProxy {
    count: usize,
}

struct WindowIter {
    count: usize,
    cursor: usize,
}

impl SystemChildIter for WindowIter {
    fn next(&mut self, count: usize) -> Result<Vec<ProxyChild>, ProxyError> {
        let mut out = Vec::new();
        while out.len() < count && self.cursor < self.count {
            out.push(ProxyChild {
                id: ChildId::from_index(self.cursor),
                name: Some(format!("window{}", self.cursor)),
            });
            self.cursor += 1;
        }
        Ok(out)
    }

    fn skip(&mut self, count: usize) -> Result<bool, ProxyError> {
        self.cursor += count;
        Ok(self.cursor <= self.count)
    }

    fn reset(&mut self) -> Result<(), ProxyError> {
        self.cursor = 0;
        Ok(())
    }
}

impl SystemProxy for WindowProxy {
    fn name(&self, child: ChildId) -> Result<String, ProxyError> {
        if child == ChildId::SELF {
            Ok("window".to_string())
        } else if (child.0 as usize) <= self.count {
            Ok(format!("window{}", child.0 - 1))
        } else {
            Err(ProxyError::InvalidArgument)
        }
    }
    fn value(&self, _: ChildId) -> Result<String, ProxyError> {
        Err(ProxyError::MemberNotFound)
    }
    fn role(&self, _: ChildId) -> Result<AccessibleRole, ProxyError> {
        Ok(AccessibleRole::Window)
    }
    fn state(&self, _: ChildId) -> Result<AccessibleStates, ProxyError> {
        Ok(AccessibleStates::FOCUSABLE)
    }
    fn location(&self, _: ChildId) -> Result<Rect, ProxyError> {
        Err(ProxyError::MemberNotFound)
    }
    fn default_action(&self, _: ChildId) -> Result<String, ProxyError> {
        Err(ProxyError::MemberNotFound)
    }
    fn keyboard_shortcut(&self, _: ChildId) -> Result<String, ProxyError> {
        Err(ProxyError::MemberNotFound)
    }
    fn help(&self, _: ChildId) -> Result<String, ProxyError> {
        Err(ProxyError::MemberNotFound)
    }
    fn child_count(&self) -> Result<usize, ProxyError> {
        Ok(self.count)
    }
    fn navigate(&self, direction: NavDirection, start: ChildId) -> Result<Option<ChildId>, ProxyError> {
        match direction {
            NavDirection::FirstChild if start == ChildId::SELF && self.count > 0 => {
                Ok(Some(ChildId(1)))
            }
            NavDirection::Next if start.0 > 0 && (start.0 as usize) < self.count => {
                Ok(Some(ChildId(start.0 + 1)))
            }
            NavDirection::Previous if start.0 > 1 => Ok(Some(ChildId(start.0 - 1))),
            _ => Ok(None),
        }
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
        Some(Box::new(WindowIter {
            count: self.count,
            cursor: 0,
        }))
    }
}

/// A node with no custom children that leans entirely on the proxy.
struct ProxiedRoot {
    wrapper: SystemProxyWrapper,
}

impl ProxiedRoot {
    fn with_children(count: usize) -> Rc<Self> {
        Rc::new(Self {
            wrapper: SystemProxyWrapper::new(Rc::new(WindowProxy { count })),
        })
    }
}

impl AccessibleNode for ProxiedRoot {
    fn runtime_id(&self) -> RuntimeId {
        RuntimeId::for_owner(0x40, 7)
    }
    fn system_wrapper(&self) -> Option<&SystemProxyWrapper> {
        Some(&self.wrapper)
    }
}

#[test]
fn navigation_surfaces_proxy_children_as_nodes() {
    let root = ProxiedRoot::with_children(3);
    let first = root
        .navigate(NavDirection::FirstChild)
        .unwrap()
        .expect("proxy reports a first child");
    assert_eq!(first.name().unwrap().as_deref(), Some("window0"));
    // The wrapper node extends the base id, so siblings stay distinct.
    assert_ne!(first.runtime_id(), root.runtime_id());

    let second = first
        .navigate(NavDirection::Next)
        .unwrap()
        .expect("two more siblings follow");
    assert_eq!(second.name().unwrap().as_deref(), Some("window1"));
    assert_ne!(second.runtime_id(), first.runtime_id());

    let back = second.navigate(NavDirection::Previous).unwrap().unwrap();
    assert_eq!(back.runtime_id(), first.runtime_id());
}

#[test]
fn navigation_ends_with_none_past_the_last_sibling() {
    let root = ProxiedRoot::with_children(1);
    let only = root.navigate(NavDirection::FirstChild).unwrap().unwrap();
    assert!(only.navigate(NavDirection::Next).unwrap().is_none());
}

#[test]
fn enumeration_delegates_and_survives_clone() {
    let root: NodeRef = ProxiedRoot::with_children(4);
    let mut iter = ChildEnumerator::new(root);
    let first_two = iter.next(2).unwrap();
    assert_eq!(first_two.len(), 2);

    let mut clone = iter.clone_iter().unwrap();
    let rest: Vec<String> = clone
        .next(10)
        .unwrap()
        .into_iter()
        .map(|child| match child {
            EnumeratedChild::Proxy(p) => p.name.unwrap(),
            EnumeratedChild::ChildId(id) => format!("#{}", id.0),
        })
        .collect();
    assert_eq!(rest, vec!["window2", "window3"]);
    // The original cursor was untouched by the clone.
    assert_eq!(iter.next(10).unwrap().len(), 2);
}

#[test]
fn descriptive_gaps_degrade_to_no_data() {
    let root = ProxiedRoot::with_children(2);
    assert_eq!(root.value().unwrap(), None);
    assert_eq!(root.help().unwrap(), None);
    assert_eq!(root.name().unwrap().as_deref(), Some("window"));
    assert_eq!(root.role().unwrap(), AccessibleRole::Window);
}

#[test]
fn property_queries_answer_through_the_proxy() {
    let root = ProxiedRoot::with_children(2);
    assert_eq!(
        root.property_value(PropertyId::Name),
        PropertyValue::Str("window".to_string())
    );
    assert_eq!(
        root.property_value(PropertyId::IsKeyboardFocusable),
        PropertyValue::Bool(true)
    );
    assert_eq!(root.property_value(PropertyId::ValueValue), PropertyValue::Empty);
}

struct LabeledNode {
    id: RuntimeId,
    label: &'static str,
    children: Vec<NodeRef>,
}

impl AccessibleNode for LabeledNode {
    fn runtime_id(&self) -> RuntimeId {
        self.id.clone()
    }
    fn name(&self) -> horizon_access_core::AccessResult<Option<String>> {
        Ok(Some(self.label.to_string()))
    }
    fn role(&self) -> horizon_access_core::AccessResult<AccessibleRole> {
        Ok(AccessibleRole::Client)
    }
    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        match direction {
            FragmentDirection::FirstChild => self.children.first().cloned(),
            FragmentDirection::LastChild => self.children.last().cloned(),
            _ => None,
        }
    }
}

#[test]
fn tree_formatter_walks_fragment_children() {
    let base = RuntimeId::for_owner(1, 1);
    let leaf: NodeRef = Rc::new(LabeledNode {
        id: base.with_part(2, 0),
        label: "leaf",
        children: Vec::new(),
    });
    let root = LabeledNode {
        id: base,
        label: "root",
        children: vec![leaf],
    };

    let text = format_tree(&root, &TreeFormatOptions::default());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"root\""));
    assert!(lines[1].starts_with("  "));
    assert!(lines[1].contains("\"leaf\""));
}
