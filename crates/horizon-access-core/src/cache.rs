//! Lazy caches of child accessible nodes.
//!
//! Repeated navigation must hand back the same node instance for the same
//! logical child, so each owner memoizes constructed nodes per child kind.
//! Eviction always removes entries from the map first and notifies the
//! platform runtime afterwards: a disconnect callback can reenter the
//! tree, and it must never observe a half-invalidated cache.

use rustc_hash::FxHashMap;

use crate::node::NodeRef;
use crate::runtime::PlatformRuntime;

/// The key of one cached child node.
///
/// Children backed by a real item are keyed by the item's stable identity,
/// never by position, so index-shifting mutations cannot hand a stale node
/// to the wrong logical item. Placeholder children with no backing object
/// are keyed by their synthetic slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKey {
    /// Stable backing-object identity.
    Item(u64),
    /// Synthetic slot index for placeholder children.
    Slot(usize),
}

/// A memoization cache of constructed child nodes, one per child kind.
#[derive(Default)]
pub struct NodeCache {
    nodes: FxHashMap<ChildKey, NodeRef>,
}

impl NodeCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
        }
    }

    /// Number of cached nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the cache holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a cached node without constructing.
    pub fn get(&self, key: ChildKey) -> Option<NodeRef> {
        self.nodes.get(&key).cloned()
    }

    /// Whether a node is cached for the key.
    pub fn contains(&self, key: ChildKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Return the cached node for the key, constructing and caching it on
    /// first request.
    pub fn get_or_insert_with<F>(&mut self, key: ChildKey, build: F) -> NodeRef
    where
        F: FnOnce() -> NodeRef,
    {
        self.nodes.entry(key).or_insert_with(build).clone()
    }

    /// Remove one entry without notifying the runtime.
    ///
    /// For owners that compute node runtime ids from their own state: the
    /// id lookup reborrows the owner, so the owner removes entries while
    /// it holds its state borrow and disconnects the returned nodes after
    /// releasing it.
    pub fn take(&mut self, key: ChildKey) -> Option<NodeRef> {
        self.nodes.remove(&key)
    }

    /// Remove every entry without notifying the runtime. See [`take`].
    ///
    /// [`take`]: NodeCache::take
    pub fn drain(&mut self) -> Vec<NodeRef> {
        self.nodes.drain().map(|(_, node)| node).collect()
    }

    /// Remove every entry whose key fails the predicate, without notifying
    /// the runtime. Returns the removed nodes.
    pub fn extract<F>(&mut self, mut keep: F) -> Vec<NodeRef>
    where
        F: FnMut(ChildKey) -> bool,
    {
        let mut removed = Vec::new();
        self.nodes.retain(|key, node| {
            if keep(*key) {
                true
            } else {
                removed.push(node.clone());
                false
            }
        });
        removed
    }

    /// Evict one entry, disconnecting the node after it left the map.
    ///
    /// Returns true when an entry existed.
    pub fn invalidate(&mut self, key: ChildKey, runtime: &dyn PlatformRuntime) -> bool {
        match self.nodes.remove(&key) {
            Some(node) => {
                disconnect(runtime, &node);
                true
            }
            None => false,
        }
    }

    /// Evict every entry whose key fails the predicate.
    pub fn retain<F>(&mut self, runtime: &dyn PlatformRuntime, keep: F)
    where
        F: FnMut(ChildKey) -> bool,
    {
        for node in self.extract(keep) {
            disconnect(runtime, &node);
        }
    }

    /// Evict every entry. Mandatory on handle recreation and on
    /// tree-rebuilding structural changes.
    pub fn clear(&mut self, runtime: &dyn PlatformRuntime) {
        for node in self.drain() {
            disconnect(runtime, &node);
        }
    }
}

fn disconnect(runtime: &dyn PlatformRuntime, node: &NodeRef) {
    let id = node.runtime_id();
    tracing::trace!(target: "horizon_access_core::cache", runtime_id = %id, "disconnecting provider");
    runtime.disconnect_provider(&id);
}
