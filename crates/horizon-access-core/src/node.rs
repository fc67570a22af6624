//! The accessible node capability surface.
//!
//! Every entry in the accessibility tree implements [`AccessibleNode`]:
//! widget roots, widget parts, items, rows, cells, and plain wrappers
//! around system proxy children. The trait carries both protocols the OS
//! clients speak as parallel method families: the legacy child-id model
//! ([`navigate`], [`child`], [`child_count`]) and the modern fragment model
//! ([`fragment_navigate`], [`fragment_root`]). Clients invoke them
//! independently, so they are intentionally not unified.
//!
//! [`navigate`]: AccessibleNode::navigate
//! [`child`]: AccessibleNode::child
//! [`child_count`]: AccessibleNode::child_count
//! [`fragment_navigate`]: AccessibleNode::fragment_navigate
//! [`fragment_root`]: AccessibleNode::fragment_root

use std::rc::Rc;

use static_assertions::assert_obj_safe;

use crate::error::AccessResult;
use crate::geometry::{Point, Rect};
use crate::property::{PatternId, PropertyId, PropertyValue};
use crate::proxy::{ChildId, SystemProxyNode, SystemProxyWrapper};
use crate::role::AccessibleRole;
use crate::runtime_id::RuntimeId;
use crate::state::{AccessibleStates, SelectionFlags};

/// Navigation directions of the legacy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavDirection {
    Up,
    Down,
    Left,
    Right,
    Next,
    Previous,
    FirstChild,
    LastChild,
}

/// Navigation directions of the modern fragment protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentDirection {
    Parent,
    NextSibling,
    PreviousSibling,
    FirstChild,
    LastChild,
}

/// A shared handle to an accessible node.
pub type NodeRef = Rc<dyn AccessibleNode>;

/// The uniform capability set every accessibility-tree node implements.
///
/// Defaults answer from the node's [`system_wrapper`] when one is attached
/// and degrade to neutral values otherwise, so a node only overrides the
/// members it has opinions about.
///
/// All operations run synchronously on the UI thread; the only concurrency
/// visible is reentrancy from the message pump.
///
/// [`system_wrapper`]: AccessibleNode::system_wrapper
pub trait AccessibleNode {
    /// The stable identifier of this node.
    ///
    /// Equal sequences mean the same tree entity. Must change when the
    /// owner's window handle is recreated.
    fn runtime_id(&self) -> RuntimeId;

    /// The wrapped system proxy this node falls back to, if any.
    fn system_wrapper(&self) -> Option<&SystemProxyWrapper> {
        None
    }

    /// Screen-space bounds, computed on demand from current widget layout.
    ///
    /// Policy: `Err(OwnerDetached)` when the owner was dropped,
    /// `Ok(Rect::ZERO)` when the owner has no created handle.
    fn bounds(&self) -> AccessResult<Rect> {
        match self.system_wrapper() {
            Some(wrapper) => Ok(wrapper.location(ChildId::SELF)?.unwrap_or(Rect::ZERO)),
            None => Ok(Rect::ZERO),
        }
    }

    /// The display name announced by assistive technology.
    fn name(&self) -> AccessResult<Option<String>> {
        match self.system_wrapper() {
            Some(wrapper) => wrapper.name(ChildId::SELF),
            None => Ok(None),
        }
    }

    /// The semantic role.
    fn role(&self) -> AccessResult<AccessibleRole> {
        match self.system_wrapper() {
            Some(wrapper) => Ok(wrapper.role(ChildId::SELF)?.unwrap_or_default()),
            None => Ok(AccessibleRole::None),
        }
    }

    /// The current state flags.
    fn state(&self) -> AccessResult<AccessibleStates> {
        match self.system_wrapper() {
            Some(wrapper) => Ok(wrapper.state(ChildId::SELF)?.unwrap_or_default()),
            None => Ok(AccessibleStates::NONE),
        }
    }

    /// The current value, for nodes that carry one.
    fn value(&self) -> AccessResult<Option<String>> {
        match self.system_wrapper() {
            Some(wrapper) => wrapper.value(ChildId::SELF),
            None => Ok(None),
        }
    }

    /// The name of the default action, if any.
    fn default_action(&self) -> AccessResult<Option<String>> {
        match self.system_wrapper() {
            Some(wrapper) => wrapper.default_action(ChildId::SELF),
            None => Ok(None),
        }
    }

    /// Help text, if any.
    fn help(&self) -> AccessResult<Option<String>> {
        match self.system_wrapper() {
            Some(wrapper) => wrapper.help(ChildId::SELF),
            None => Ok(None),
        }
    }

    /// The keyboard shortcut, if any.
    fn keyboard_shortcut(&self) -> AccessResult<Option<String>> {
        match self.system_wrapper() {
            Some(wrapper) => wrapper.keyboard_shortcut(ChildId::SELF),
            None => Ok(None),
        }
    }

    /// A longer description, if any.
    fn description(&self) -> AccessResult<Option<String>> {
        Ok(None)
    }

    /// The legacy parent of this node.
    fn parent(&self) -> Option<NodeRef> {
        None
    }

    /// The number of custom children, or `None` to defer enumeration to
    /// the system proxy.
    fn child_count(&self) -> Option<usize> {
        None
    }

    /// The custom child at a 0-based index.
    ///
    /// Out-of-range requests on a node with custom children are an error;
    /// a node without custom children answers `Ok(None)`.
    fn child(&self, index: usize) -> AccessResult<Option<NodeRef>> {
        let _ = index;
        Ok(None)
    }

    /// Legacy navigation. Total over the direction enum: `Ok(None)` means
    /// "no such neighbor".
    ///
    /// The default resolves first/last child from the custom child
    /// collection when one exists, leaves sibling navigation to the parent
    /// when the parent also has custom children, and otherwise defers to
    /// the system proxy.
    fn navigate(&self, direction: NavDirection) -> AccessResult<Option<NodeRef>> {
        if let Some(count) = self.child_count() {
            match direction {
                NavDirection::FirstChild => {
                    return if count > 0 { self.child(0) } else { Ok(None) };
                }
                NavDirection::LastChild => {
                    return if count > 0 { self.child(count - 1) } else { Ok(None) };
                }
                NavDirection::Previous | NavDirection::Up | NavDirection::Left
                | NavDirection::Next | NavDirection::Down | NavDirection::Right => {
                    let parent_has_custom = self
                        .parent()
                        .is_some_and(|parent| parent.child_count().unwrap_or(0) > 0);
                    if parent_has_custom {
                        return Ok(None);
                    }
                }
            }
        }

        let Some(wrapper) = self.system_wrapper() else {
            return Ok(None);
        };
        match wrapper.navigate(direction, ChildId::SELF)? {
            Some(child) => Ok(Some(Rc::new(SystemProxyNode::new(
                wrapper.clone(),
                child,
                self.runtime_id(),
            )) as NodeRef)),
            None => Ok(None),
        }
    }

    /// Fragment navigation. Total: `None` means "no such neighbor".
    fn fragment_navigate(&self, direction: FragmentDirection) -> Option<NodeRef> {
        let _ = direction;
        None
    }

    /// The fragment root this node belongs to (the top-level owner's own
    /// accessible object). `None` for detached nodes.
    fn fragment_root(&self) -> Option<NodeRef> {
        None
    }

    /// Whether a control pattern is supported.
    fn is_pattern_supported(&self, pattern: PatternId) -> bool {
        matches!(pattern, PatternId::LegacyIAccessible)
    }

    /// Answer a property query. Total over [`PropertyId`]; unknown or
    /// unsupported ids yield [`PropertyValue::Empty`], never an error.
    fn property_value(&self, property: PropertyId) -> PropertyValue {
        default_property_value(self, property)
    }

    /// The reorder/filter hook for system-proxy child enumeration: the
    /// 0-based proxy indices to expose, in exposure order. `None` keeps
    /// the proxy's natural order.
    fn system_child_order(&self) -> Option<Vec<usize>> {
        None
    }

    /// Legacy selection.
    fn select(&self, flags: SelectionFlags) -> AccessResult<()> {
        match self.system_wrapper() {
            Some(wrapper) => wrapper.select(flags, ChildId::SELF),
            None => Ok(()),
        }
    }

    /// Perform the node's default action.
    fn do_default_action(&self) -> AccessResult<()> {
        match self.system_wrapper() {
            Some(wrapper) => wrapper.do_default_action(ChildId::SELF),
            None => Ok(()),
        }
    }

    /// Move keyboard focus to this node.
    fn set_focus(&self) -> AccessResult<()> {
        Ok(())
    }

    /// The deepest node at a screen point, or `None` when the point is
    /// outside this node.
    fn hit_test(&self, point: Point) -> Option<NodeRef> {
        let _ = point;
        None
    }
}

assert_obj_safe!(AccessibleNode);

/// The shared default answers for property queries.
///
/// Concrete nodes call this after handling the ids they override, so every
/// node answers identity, geometry, and state questions consistently.
pub fn default_property_value<N>(node: &N, property: PropertyId) -> PropertyValue
where
    N: AccessibleNode + ?Sized,
{
    match property {
        PropertyId::RuntimeId => PropertyValue::IntList(node.runtime_id().to_vec()),
        PropertyId::BoundingRectangle => match node.bounds() {
            Ok(rect) => PropertyValue::Rect(rect),
            Err(_) => PropertyValue::Empty,
        },
        PropertyId::Name => match node.name() {
            Ok(Some(name)) => PropertyValue::Str(name),
            _ => PropertyValue::Empty,
        },
        PropertyId::ControlType => match node.role() {
            Ok(role) => PropertyValue::Str(role.as_str().to_string()),
            Err(_) => PropertyValue::Empty,
        },
        PropertyId::IsEnabled => match node.state() {
            Ok(state) => PropertyValue::Bool(!state.contains(AccessibleStates::UNAVAILABLE)),
            Err(_) => PropertyValue::Empty,
        },
        PropertyId::HasKeyboardFocus => match node.state() {
            Ok(state) => PropertyValue::Bool(state.contains(AccessibleStates::FOCUSED)),
            Err(_) => PropertyValue::Empty,
        },
        PropertyId::IsKeyboardFocusable => match node.state() {
            Ok(state) => PropertyValue::Bool(state.contains(AccessibleStates::FOCUSABLE)),
            Err(_) => PropertyValue::Empty,
        },
        PropertyId::IsOffscreen => match node.state() {
            Ok(state) => PropertyValue::Bool(state.contains(AccessibleStates::OFFSCREEN)),
            Err(_) => PropertyValue::Empty,
        },
        PropertyId::IsControlElement | PropertyId::IsContentElement => PropertyValue::Bool(true),
        PropertyId::ValueValue => match node.value() {
            Ok(Some(value)) => PropertyValue::Str(value),
            _ => PropertyValue::Empty,
        },
        PropertyId::ValueIsReadOnly => match node.state() {
            Ok(state) => PropertyValue::Bool(state.contains(AccessibleStates::READONLY)),
            Err(_) => PropertyValue::Empty,
        },
        PropertyId::SelectionItemIsSelected => match node.state() {
            Ok(state) => PropertyValue::Bool(state.contains(AccessibleStates::SELECTED)),
            Err(_) => PropertyValue::Empty,
        },
        PropertyId::LegacyDefaultAction => match node.default_action() {
            Ok(Some(action)) => PropertyValue::Str(action),
            _ => PropertyValue::Empty,
        },
        PropertyId::LegacyKeyboardShortcut => match node.keyboard_shortcut() {
            Ok(Some(shortcut)) => PropertyValue::Str(shortcut),
            _ => PropertyValue::Empty,
        },
        PropertyId::LegacyHelp => match node.help() {
            Ok(Some(help)) => PropertyValue::Str(help),
            _ => PropertyValue::Empty,
        },
        _ => PropertyValue::Empty,
    }
}

/// Enumerate a node's fragment children: `FirstChild` then `NextSibling`
/// until exhaustion.
pub fn fragment_children(node: &dyn AccessibleNode) -> Vec<NodeRef> {
    let mut children = Vec::new();
    let mut cursor = node.fragment_navigate(FragmentDirection::FirstChild);
    while let Some(child) = cursor {
        cursor = child.fragment_navigate(FragmentDirection::NextSibling);
        children.push(child);
    }
    children
}
