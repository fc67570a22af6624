//! Wrapping of OS-furnished legacy accessible proxies.
//!
//! When a widget has no custom behavior for some part of its tree, the OS
//! supplies a best-effort accessible implementation for the native window.
//! [`SystemProxyWrapper`] adapts that proxy so the rest of the tree can
//! treat "native proxy data" and "custom data" uniformly: an absent proxy
//! or an unimplemented member degrades to "no data" instead of failing the
//! caller, while genuinely unexpected native failures still propagate.

use std::rc::Rc;

use crate::error::{AccessResult, ProxyError};
use crate::geometry::{Point, Rect};
use crate::node::{AccessibleNode, NavDirection, NodeRef};
use crate::role::AccessibleRole;
use crate::runtime_id::RuntimeId;
use crate::state::{AccessibleStates, SelectionFlags};

/// A child identifier in the legacy protocol.
///
/// Zero addresses the object itself; positive values address 1-based
/// children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChildId(pub i32);

impl ChildId {
    /// The object itself rather than one of its children.
    pub const SELF: Self = Self(0);

    /// The 1-based id of a child at a 0-based index.
    pub fn from_index(index: usize) -> Self {
        Self(index as i32 + 1)
    }
}

/// A child produced by a system proxy's own enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyChild {
    /// The proxy-side child id.
    pub id: ChildId,
    /// The proxy-reported name, when cheaply available.
    pub name: Option<String>,
}

/// The enumerate-children protocol of a system proxy.
pub trait SystemChildIter {
    /// Fetch up to `count` children, advancing the cursor. A short return
    /// is the exhaustion signal.
    fn next(&mut self, count: usize) -> Result<Vec<ProxyChild>, ProxyError>;

    /// Advance the cursor without fetching. Returns false when the cursor
    /// ran past the end.
    fn skip(&mut self, count: usize) -> Result<bool, ProxyError>;

    /// Rewind the cursor to the first child.
    fn reset(&mut self) -> Result<(), ProxyError>;
}

/// The OS-furnished legacy accessible object for a native window.
///
/// Every member is best-effort: a proxy signals an unimplemented member
/// with [`ProxyError::MemberNotFound`] and an unresolvable child id with
/// [`ProxyError::InvalidArgument`]. Host platform bindings implement this
/// trait over their native accessibility API.
pub trait SystemProxy {
    fn name(&self, child: ChildId) -> Result<String, ProxyError>;
    fn value(&self, child: ChildId) -> Result<String, ProxyError>;
    fn role(&self, child: ChildId) -> Result<AccessibleRole, ProxyError>;
    fn state(&self, child: ChildId) -> Result<AccessibleStates, ProxyError>;
    fn location(&self, child: ChildId) -> Result<Rect, ProxyError>;
    fn default_action(&self, child: ChildId) -> Result<String, ProxyError>;
    fn keyboard_shortcut(&self, child: ChildId) -> Result<String, ProxyError>;
    fn help(&self, child: ChildId) -> Result<String, ProxyError>;
    fn child_count(&self) -> Result<usize, ProxyError>;
    fn navigate(&self, direction: NavDirection, start: ChildId) -> Result<Option<ChildId>, ProxyError>;
    fn hit_test(&self, point: Point) -> Result<Option<ChildId>, ProxyError>;
    fn select(&self, flags: SelectionFlags, child: ChildId) -> Result<(), ProxyError>;
    fn do_default_action(&self, child: ChildId) -> Result<(), ProxyError>;

    /// The proxy's own child enumerator, when it provides one.
    fn enum_children(&self) -> Option<Box<dyn SystemChildIter>>;
}

/// A shared handle to a system proxy.
pub type SystemProxyRef = Rc<dyn SystemProxy>;

/// Forwards legacy accessibility calls to an optional system proxy,
/// absorbing the two recoverable failure classes.
///
/// Every forwarding call returns the neutral default when the proxy is
/// absent or the member is unimplemented; any other native failure
/// propagates as an error.
#[derive(Clone, Default)]
pub struct SystemProxyWrapper {
    proxy: Option<SystemProxyRef>,
}

impl SystemProxyWrapper {
    /// Wrap a system proxy.
    pub fn new(proxy: SystemProxyRef) -> Self {
        Self { proxy: Some(proxy) }
    }

    /// A wrapper with no proxy; every call yields the neutral default.
    pub fn detached() -> Self {
        Self { proxy: None }
    }

    /// Whether a proxy is attached.
    pub fn is_attached(&self) -> bool {
        self.proxy.is_some()
    }

    /// The wrapped proxy, if any.
    pub fn proxy(&self) -> Option<&SystemProxyRef> {
        self.proxy.as_ref()
    }

    fn absorb<T>(result: Result<T, ProxyError>) -> AccessResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_recoverable() => {
                tracing::trace!(target: "horizon_access_core::proxy", %err, "proxy capability gap");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn name(&self, child: ChildId) -> AccessResult<Option<String>> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.name(child)),
            None => Ok(None),
        }
    }

    pub fn value(&self, child: ChildId) -> AccessResult<Option<String>> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.value(child)),
            None => Ok(None),
        }
    }

    pub fn role(&self, child: ChildId) -> AccessResult<Option<AccessibleRole>> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.role(child)),
            None => Ok(None),
        }
    }

    pub fn state(&self, child: ChildId) -> AccessResult<Option<AccessibleStates>> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.state(child)),
            None => Ok(None),
        }
    }

    pub fn location(&self, child: ChildId) -> AccessResult<Option<Rect>> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.location(child)),
            None => Ok(None),
        }
    }

    pub fn default_action(&self, child: ChildId) -> AccessResult<Option<String>> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.default_action(child)),
            None => Ok(None),
        }
    }

    pub fn keyboard_shortcut(&self, child: ChildId) -> AccessResult<Option<String>> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.keyboard_shortcut(child)),
            None => Ok(None),
        }
    }

    pub fn help(&self, child: ChildId) -> AccessResult<Option<String>> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.help(child)),
            None => Ok(None),
        }
    }

    pub fn child_count(&self) -> AccessResult<Option<usize>> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.child_count()),
            None => Ok(None),
        }
    }

    pub fn navigate(
        &self,
        direction: NavDirection,
        start: ChildId,
    ) -> AccessResult<Option<ChildId>> {
        match &self.proxy {
            Some(proxy) => Ok(Self::absorb(proxy.navigate(direction, start))?.flatten()),
            None => Ok(None),
        }
    }

    pub fn hit_test(&self, point: Point) -> AccessResult<Option<ChildId>> {
        match &self.proxy {
            Some(proxy) => Ok(Self::absorb(proxy.hit_test(point))?.flatten()),
            None => Ok(None),
        }
    }

    pub fn select(&self, flags: SelectionFlags, child: ChildId) -> AccessResult<()> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.select(flags, child)).map(|_| ()),
            None => Ok(()),
        }
    }

    pub fn do_default_action(&self, child: ChildId) -> AccessResult<()> {
        match &self.proxy {
            Some(proxy) => Self::absorb(proxy.do_default_action(child)).map(|_| ()),
            None => Ok(()),
        }
    }

    /// The proxy's own enumerator, if a proxy is attached and provides one.
    pub fn enum_children(&self) -> Option<Box<dyn SystemChildIter>> {
        self.proxy.as_ref().and_then(|proxy| proxy.enum_children())
    }
}

/// Runtime-id part constant for plain system-proxy children.
pub const PART_SYSTEM_CHILD: i32 = 0x53;

/// An accessible node that is nothing but a view over a system proxy child.
///
/// Produced when navigation lands on a proxy-side neighbor that has no
/// custom node; every capability delegates to the wrapper at the fixed
/// child id.
pub struct SystemProxyNode {
    wrapper: SystemProxyWrapper,
    child: ChildId,
    base: RuntimeId,
    runtime_id: RuntimeId,
}

impl SystemProxyNode {
    /// Wrap one proxy child. `base` is the runtime id of the node the
    /// navigation started from; the child id keeps siblings distinct.
    pub fn new(wrapper: SystemProxyWrapper, child: ChildId, base: RuntimeId) -> Self {
        let runtime_id = base.with_part(PART_SYSTEM_CHILD, child.0);
        Self {
            wrapper,
            child,
            base,
            runtime_id,
        }
    }

    /// The proxy-side child id this node views.
    pub fn child_id(&self) -> ChildId {
        self.child
    }
}

impl AccessibleNode for SystemProxyNode {
    fn runtime_id(&self) -> RuntimeId {
        self.runtime_id.clone()
    }

    fn system_wrapper(&self) -> Option<&SystemProxyWrapper> {
        Some(&self.wrapper)
    }

    fn bounds(&self) -> AccessResult<Rect> {
        Ok(self.wrapper.location(self.child)?.unwrap_or(Rect::ZERO))
    }

    fn name(&self) -> AccessResult<Option<String>> {
        self.wrapper.name(self.child)
    }

    fn value(&self) -> AccessResult<Option<String>> {
        self.wrapper.value(self.child)
    }

    fn role(&self) -> AccessResult<AccessibleRole> {
        Ok(self.wrapper.role(self.child)?.unwrap_or_default())
    }

    fn state(&self) -> AccessResult<AccessibleStates> {
        Ok(self.wrapper.state(self.child)?.unwrap_or_default())
    }

    fn default_action(&self) -> AccessResult<Option<String>> {
        self.wrapper.default_action(self.child)
    }

    fn keyboard_shortcut(&self) -> AccessResult<Option<String>> {
        self.wrapper.keyboard_shortcut(self.child)
    }

    fn help(&self) -> AccessResult<Option<String>> {
        self.wrapper.help(self.child)
    }

    /// Sibling navigation runs on the proxy from this node's own child id,
    /// so the result is another view over the same base.
    fn navigate(&self, direction: NavDirection) -> AccessResult<Option<NodeRef>> {
        match self.wrapper.navigate(direction, self.child)? {
            Some(next) => Ok(Some(Rc::new(SystemProxyNode::new(
                self.wrapper.clone(),
                next,
                self.base.clone(),
            )) as NodeRef)),
            None => Ok(None),
        }
    }

    fn select(&self, flags: SelectionFlags) -> AccessResult<()> {
        self.wrapper.select(flags, self.child)
    }

    fn do_default_action(&self) -> AccessResult<()> {
        self.wrapper.do_default_action(self.child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;

    /// A proxy stub where every member reports a chosen failure.
    struct FailingProxy(ProxyError);

    impl SystemProxy for FailingProxy {
        fn name(&self, _: ChildId) -> Result<String, ProxyError> {
            Err(self.0)
        }
        fn value(&self, _: ChildId) -> Result<String, ProxyError> {
            Err(self.0)
        }
        fn role(&self, _: ChildId) -> Result<AccessibleRole, ProxyError> {
            Err(self.0)
        }
        fn state(&self, _: ChildId) -> Result<AccessibleStates, ProxyError> {
            Err(self.0)
        }
        fn location(&self, _: ChildId) -> Result<Rect, ProxyError> {
            Err(self.0)
        }
        fn default_action(&self, _: ChildId) -> Result<String, ProxyError> {
            Err(self.0)
        }
        fn keyboard_shortcut(&self, _: ChildId) -> Result<String, ProxyError> {
            Err(self.0)
        }
        fn help(&self, _: ChildId) -> Result<String, ProxyError> {
            Err(self.0)
        }
        fn child_count(&self) -> Result<usize, ProxyError> {
            Err(self.0)
        }
        fn navigate(&self, _: NavDirection, _: ChildId) -> Result<Option<ChildId>, ProxyError> {
            Err(self.0)
        }
        fn hit_test(&self, _: Point) -> Result<Option<ChildId>, ProxyError> {
            Err(self.0)
        }
        fn select(&self, _: SelectionFlags, _: ChildId) -> Result<(), ProxyError> {
            Err(self.0)
        }
        fn do_default_action(&self, _: ChildId) -> Result<(), ProxyError> {
            Err(self.0)
        }
        fn enum_children(&self) -> Option<Box<dyn SystemChildIter>> {
            None
        }
    }

    #[test]
    fn test_detached_wrapper_yields_neutral_defaults() {
        let wrapper = SystemProxyWrapper::detached();
        assert_eq!(wrapper.name(ChildId::SELF).unwrap(), None);
        assert_eq!(wrapper.child_count().unwrap(), None);
        assert!(wrapper.select(SelectionFlags::TAKE_FOCUS, ChildId::SELF).is_ok());
    }

    #[test]
    fn test_member_not_found_is_absorbed() {
        let wrapper = SystemProxyWrapper::new(Rc::new(FailingProxy(ProxyError::MemberNotFound)));
        assert_eq!(wrapper.keyboard_shortcut(ChildId(3)).unwrap(), None);
        assert_eq!(wrapper.name(ChildId::SELF).unwrap(), None);
    }

    #[test]
    fn test_invalid_argument_is_absorbed() {
        let wrapper = SystemProxyWrapper::new(Rc::new(FailingProxy(ProxyError::InvalidArgument)));
        assert_eq!(wrapper.help(ChildId(99)).unwrap(), None);
    }

    #[test]
    fn test_unexpected_failure_propagates() {
        let wrapper = SystemProxyWrapper::new(Rc::new(FailingProxy(ProxyError::Failure(-0x7ff8))));
        match wrapper.name(ChildId::SELF) {
            Err(AccessError::Proxy(ProxyError::Failure(code))) => assert_eq!(code, -0x7ff8),
            other => panic!("expected native failure, got {other:?}"),
        }
    }
}
