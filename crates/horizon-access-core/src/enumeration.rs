//! The legacy enumerate-children protocol.
//!
//! OS clients enumerate an accessible object's children through a
//! reset/skip/next/clone iterator. The iteration strategy is chosen at
//! each `next` call from the owner's *current* state, not fixed at
//! construction, because the owner's child collection can change between
//! calls:
//!
//! 1. the owner reports a custom child count: sequential 1-based child ids;
//! 2. no custom children and no system proxy: exhausted;
//! 3. the owner requests system children in a custom order: per-slot
//!    reset + skip + fetch-one splice, stopping early on a short fetch;
//! 4. otherwise: straight delegation to the proxy's own iterator.
//!
//! A short return from `next` is the sole exhaustion signal.

use crate::error::AccessResult;
use crate::node::NodeRef;
use crate::proxy::{ChildId, ProxyChild, SystemChildIter};

/// One enumerated child slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumeratedChild {
    /// A custom child, addressed by its 1-based child id.
    ChildId(ChildId),
    /// A child surfaced from the system proxy's own enumerator.
    Proxy(ProxyChild),
}

/// The legacy child iterator over one accessible node.
pub struct ChildEnumerator {
    owner: NodeRef,
    cursor: usize,
    system_iter: Option<Box<dyn SystemChildIter>>,
}

impl ChildEnumerator {
    /// Create an iterator positioned at the first child.
    pub fn new(owner: NodeRef) -> Self {
        let system_iter = owner
            .system_wrapper()
            .and_then(|wrapper| wrapper.enum_children());
        Self {
            owner,
            cursor: 0,
            system_iter,
        }
    }

    /// The current cursor position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Fetch up to `count` children, advancing the cursor.
    ///
    /// Returns fewer than `count` items exactly when the collection is
    /// exhausted; the caller compares lengths, there is no separate end
    /// marker.
    pub fn next(&mut self, count: usize) -> AccessResult<Vec<EnumeratedChild>> {
        // Strategy 1: the owner exposes its own child collection.
        if let Some(total) = self.owner.child_count() {
            let mut out = Vec::new();
            while out.len() < count && self.cursor < total {
                out.push(EnumeratedChild::ChildId(ChildId::from_index(self.cursor)));
                self.cursor += 1;
            }
            return Ok(out);
        }

        // Strategy 2: nothing custom, nothing native.
        let Some(iter) = self.system_iter.as_mut() else {
            return Ok(Vec::new());
        };

        // Strategy 3: native children exposed in a custom order. Each
        // output slot rewinds the proxy iterator, skips to the mapped
        // index, and fetches exactly one item; a failed fetch ends the
        // enumeration with a short count.
        if let Some(order) = self.owner.system_child_order() {
            let mut out = Vec::new();
            while out.len() < count && self.cursor < order.len() {
                iter.reset()?;
                let index = order[self.cursor];
                if index > 0 && !iter.skip(index)? {
                    break;
                }
                let Some(child) = iter.next(1)?.pop() else {
                    break;
                };
                out.push(EnumeratedChild::Proxy(child));
                self.cursor += 1;
            }
            return Ok(out);
        }

        // Strategy 4: straight delegation.
        let fetched = iter.next(count)?;
        self.cursor += fetched.len();
        Ok(fetched.into_iter().map(EnumeratedChild::Proxy).collect())
    }

    /// Advance the cursor without fetching. Returns false when the cursor
    /// ran past the end of the collection.
    pub fn skip(&mut self, count: usize) -> AccessResult<bool> {
        self.cursor += count;
        if let Some(total) = self.owner.child_count() {
            return Ok(self.cursor <= total);
        }
        if self.owner.system_child_order().is_some() {
            // Strategy 3 repositions the proxy per slot; only our cursor
            // needs to move.
            return Ok(true);
        }
        match self.system_iter.as_mut() {
            Some(iter) => Ok(iter.skip(count)?),
            None => Ok(false),
        }
    }

    /// Rewind to the first child, resetting the proxy iterator alongside
    /// the internal cursor.
    pub fn reset(&mut self) -> AccessResult<()> {
        self.cursor = 0;
        if let Some(iter) = self.system_iter.as_mut() {
            iter.reset()?;
        }
        Ok(())
    }

    /// Produce an independent iterator positioned at the same cursor.
    pub fn clone_iter(&self) -> AccessResult<ChildEnumerator> {
        let mut clone = ChildEnumerator::new(self.owner.clone());
        if self.cursor > 0 {
            if let Some(iter) = clone.system_iter.as_mut() {
                iter.reset()?;
                iter.skip(self.cursor)?;
            }
            clone.cursor = self.cursor;
        }
        Ok(clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::error::ProxyError;
    use crate::geometry::{Point, Rect};
    use crate::node::AccessibleNode;
    use crate::proxy::{SystemProxy, SystemProxyRef, SystemProxyWrapper};
    use crate::role::AccessibleRole;
    use crate::runtime_id::RuntimeId;
    use crate::state::{AccessibleStates, SelectionFlags};

    /// A proxy exposing `count` children named "sys0".."sysN".
    struct CountedProxy {
        count: usize,
    }

    struct CountedIter {
        count: usize,
        cursor: Rc<RefCell<usize>>,
    }

    impl SystemChildIter for CountedIter {
        fn next(&mut self, count: usize) -> Result<Vec<ProxyChild>, ProxyError> {
            let mut out = Vec::new();
            let mut cursor = self.cursor.borrow_mut();
            while out.len() < count && *cursor < self.count {
                out.push(ProxyChild {
                    id: ChildId::from_index(*cursor),
                    name: Some(format!("sys{}", *cursor)),
                });
                *cursor += 1;
            }
            Ok(out)
        }

        fn skip(&mut self, count: usize) -> Result<bool, ProxyError> {
            let mut cursor = self.cursor.borrow_mut();
            *cursor += count;
            Ok(*cursor <= self.count)
        }

        fn reset(&mut self) -> Result<(), ProxyError> {
            *self.cursor.borrow_mut() = 0;
            Ok(())
        }
    }

    impl SystemProxy for CountedProxy {
        fn name(&self, _: ChildId) -> Result<String, ProxyError> {
            Err(ProxyError::MemberNotFound)
        }
        fn value(&self, _: ChildId) -> Result<String, ProxyError> {
            Err(ProxyError::MemberNotFound)
        }
        fn role(&self, _: ChildId) -> Result<AccessibleRole, ProxyError> {
            Err(ProxyError::MemberNotFound)
        }
        fn state(&self, _: ChildId) -> Result<AccessibleStates, ProxyError> {
            Err(ProxyError::MemberNotFound)
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
        fn navigate(
            &self,
            _: crate::node::NavDirection,
            _: ChildId,
        ) -> Result<Option<ChildId>, ProxyError> {
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
            Some(Box::new(CountedIter {
                count: self.count,
                cursor: Rc::new(RefCell::new(0)),
            }))
        }
    }

    struct TestOwner {
        custom_count: Option<usize>,
        order: Option<Vec<usize>>,
        wrapper: SystemProxyWrapper,
    }

    impl TestOwner {
        fn custom(count: usize) -> Rc<Self> {
            Rc::new(Self {
                custom_count: Some(count),
                order: None,
                wrapper: SystemProxyWrapper::detached(),
            })
        }

        fn empty() -> Rc<Self> {
            Rc::new(Self {
                custom_count: None,
                order: None,
                wrapper: SystemProxyWrapper::detached(),
            })
        }

        fn proxied(count: usize, order: Option<Vec<usize>>) -> Rc<Self> {
            let proxy: SystemProxyRef = Rc::new(CountedProxy { count });
            Rc::new(Self {
                custom_count: None,
                order,
                wrapper: SystemProxyWrapper::new(proxy),
            })
        }
    }

    impl AccessibleNode for TestOwner {
        fn runtime_id(&self) -> RuntimeId {
            RuntimeId::for_owner(1, 1)
        }
        fn system_wrapper(&self) -> Option<&SystemProxyWrapper> {
            Some(&self.wrapper)
        }
        fn child_count(&self) -> Option<usize> {
            self.custom_count
        }
        fn system_child_order(&self) -> Option<Vec<usize>> {
            self.order.clone()
        }
    }

    fn proxy_names(children: &[EnumeratedChild]) -> Vec<String> {
        children
            .iter()
            .map(|child| match child {
                EnumeratedChild::Proxy(p) => p.name.clone().unwrap(),
                EnumeratedChild::ChildId(id) => format!("#{}", id.0),
            })
            .collect()
    }

    #[test]
    fn test_custom_children_short_count() {
        let mut iter = ChildEnumerator::new(TestOwner::custom(3));
        let fetched = iter.next(5).unwrap();
        assert_eq!(fetched.len(), 3);
        assert_eq!(
            fetched,
            vec![
                EnumeratedChild::ChildId(ChildId(1)),
                EnumeratedChild::ChildId(ChildId(2)),
                EnumeratedChild::ChildId(ChildId(3)),
            ]
        );
        // Exhausted: further calls return nothing.
        assert!(iter.next(1).unwrap().is_empty());
    }

    #[test]
    fn test_custom_children_multiple_calls_cover_all() {
        let mut iter = ChildEnumerator::new(TestOwner::custom(4));
        let first = iter.next(2).unwrap();
        let second = iter.next(2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(
            second,
            vec![
                EnumeratedChild::ChildId(ChildId(3)),
                EnumeratedChild::ChildId(ChildId(4)),
            ]
        );
    }

    #[test]
    fn test_empty_owner_no_proxy_returns_zero_items() {
        let mut iter = ChildEnumerator::new(TestOwner::empty());
        assert!(iter.next(1).unwrap().is_empty());
    }

    #[test]
    fn test_proxy_delegation() {
        let mut iter = ChildEnumerator::new(TestOwner::proxied(3, None));
        let fetched = iter.next(10).unwrap();
        assert_eq!(proxy_names(&fetched), vec!["sys0", "sys1", "sys2"]);
    }

    #[test]
    fn test_reordered_proxy_children() {
        let mut iter = ChildEnumerator::new(TestOwner::proxied(4, Some(vec![2, 0, 3])));
        let fetched = iter.next(10).unwrap();
        assert_eq!(proxy_names(&fetched), vec!["sys2", "sys0", "sys3"]);
    }

    #[test]
    fn test_reordered_stops_early_on_missing_slot() {
        // Index 9 is past the proxy's end; enumeration stops there.
        let mut iter = ChildEnumerator::new(TestOwner::proxied(4, Some(vec![1, 9, 0])));
        let fetched = iter.next(10).unwrap();
        assert_eq!(proxy_names(&fetched), vec!["sys1"]);
    }

    #[test]
    fn test_reset_and_skip() {
        let mut iter = ChildEnumerator::new(TestOwner::custom(5));
        iter.next(3).unwrap();
        iter.reset().unwrap();
        assert_eq!(iter.position(), 0);
        assert!(iter.skip(4).unwrap());
        let fetched = iter.next(3).unwrap();
        assert_eq!(fetched, vec![EnumeratedChild::ChildId(ChildId(5))]);
    }

    #[test]
    fn test_skip_past_end_reports_false() {
        let mut iter = ChildEnumerator::new(TestOwner::custom(2));
        assert!(!iter.skip(3).unwrap());
    }

    #[test]
    fn test_clone_is_independent_at_same_cursor() {
        let mut iter = ChildEnumerator::new(TestOwner::custom(4));
        iter.next(2).unwrap();
        let mut clone = iter.clone_iter().unwrap();
        assert_eq!(clone.position(), 2);
        let from_clone = clone.next(10).unwrap();
        let from_original = iter.next(10).unwrap();
        assert_eq!(from_clone, from_original);
    }
}
