//! The process-wide accessibility registry.
//!
//! Owns the two pieces of truly global state the bridge needs: stable
//! per-owner hashes for runtime-id composition and the counters behind
//! auto-numbered default display names (for example list-view group
//! headers). Tests call [`reset_global_registry`] to get deterministic
//! numbering; production code initializes once and never resets.

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::error::{AccessError, AccessResult};

new_key_type! {
    /// Key of a registered accessibility owner.
    pub struct OwnerKey;
}

#[derive(Debug)]
struct OwnerRecord {
    hash: i32,
}

/// Registry storage: registered owners plus default-name counters.
#[derive(Default)]
struct AccessRegistry {
    owners: SlotMap<OwnerKey, OwnerRecord>,
    next_hash: i32,
    name_counters: FxHashMap<&'static str, u64>,
}

impl AccessRegistry {
    fn register_owner(&mut self) -> (OwnerKey, i32) {
        self.next_hash += 1;
        let hash = self.next_hash;
        let key = self.owners.insert(OwnerRecord { hash });
        (key, hash)
    }

    fn unregister_owner(&mut self, key: OwnerKey) -> bool {
        self.owners.remove(key).is_some()
    }

    fn owner_hash(&self, key: OwnerKey) -> Option<i32> {
        self.owners.get(key).map(|record| record.hash)
    }

    fn next_default_name(&mut self, prefix: &'static str) -> String {
        let counter = self.name_counters.entry(prefix).or_insert(0);
        *counter += 1;
        format!("{prefix}{counter}")
    }
}

/// A thread-safe wrapper around the registry storage.
#[derive(Default)]
pub struct SharedAccessRegistry {
    inner: RwLock<AccessRegistry>,
}

impl SharedAccessRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an owner, returning its key and stable hash.
    pub fn register_owner(&self) -> (OwnerKey, i32) {
        self.inner.write().register_owner()
    }

    /// Remove an owner. Returns false for unknown keys.
    pub fn unregister_owner(&self, key: OwnerKey) -> bool {
        self.inner.write().unregister_owner(key)
    }

    /// Whether the owner is still registered.
    pub fn contains(&self, key: OwnerKey) -> bool {
        self.inner.read().owners.contains_key(key)
    }

    /// The stable hash allocated to an owner.
    pub fn owner_hash(&self, key: OwnerKey) -> Option<i32> {
        self.inner.read().owner_hash(key)
    }

    /// The next auto-numbered default display name for a prefix.
    pub fn next_default_name(&self, prefix: &'static str) -> String {
        self.inner.write().next_default_name(prefix)
    }
}

/// Global access registry (lazy initialized).
static GLOBAL_REGISTRY: Mutex<Option<&'static SharedAccessRegistry>> = Mutex::new(None);

/// Initialize the global access registry. Idempotent.
pub fn init_global_registry() {
    let mut guard = GLOBAL_REGISTRY.lock();
    if guard.is_none() {
        *guard = Some(Box::leak(Box::new(SharedAccessRegistry::new())));
    }
}

/// Reset the global registry to an empty one.
///
/// Test-only semantics: owner hashes and default-name counters restart
/// from scratch, so numbering is deterministic per test. Owners created
/// before the reset keep their allocated hashes but are no longer
/// registered.
pub fn reset_global_registry() {
    // The replaced registry is intentionally leaked; nodes created before
    // the reset may still hold hashes allocated from it.
    *GLOBAL_REGISTRY.lock() = Some(Box::leak(Box::new(SharedAccessRegistry::new())));
}

/// Get the global access registry.
///
/// Returns an error if [`init_global_registry`] has not run.
pub fn global_registry() -> AccessResult<&'static SharedAccessRegistry> {
    (*GLOBAL_REGISTRY.lock()).ok_or(AccessError::RegistryNotInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let registry = SharedAccessRegistry::new();
        let (key, hash) = registry.register_owner();
        assert!(registry.contains(key));
        assert_eq!(registry.owner_hash(key), Some(hash));
        assert!(registry.unregister_owner(key));
        assert!(!registry.contains(key));
        assert!(!registry.unregister_owner(key));
    }

    #[test]
    fn test_hashes_are_distinct() {
        let registry = SharedAccessRegistry::new();
        let (_, a) = registry.register_owner();
        let (_, b) = registry.register_owner();
        assert_ne!(a, b);
    }

    #[test]
    fn test_default_names_count_per_prefix() {
        let registry = SharedAccessRegistry::new();
        assert_eq!(registry.next_default_name("ListViewGroup"), "ListViewGroup1");
        assert_eq!(registry.next_default_name("ListViewGroup"), "ListViewGroup2");
        assert_eq!(registry.next_default_name("Column"), "Column1");
    }
}
