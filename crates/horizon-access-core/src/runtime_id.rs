//! Stable runtime identifiers for accessible nodes.
//!
//! Accessibility clients correlate node references by runtime id: two nodes
//! are the same tree entity iff their id sequences are equal. Ids embed the
//! owning window handle, so destroying and recreating the handle changes
//! every id under that owner and forces clients to re-fetch the tree.

use std::fmt;

use smallvec::SmallVec;

/// The well-known sentinel that starts every runtime id sequence.
pub const RUNTIME_ID_FIRST_ITEM: i32 = 0x2a;

/// An ordered sequence of integers identifying one accessibility-tree entity.
///
/// Built via [`RuntimeId::for_owner`] and extended with
/// [`with_part`](Self::with_part) for widget parts that have multiple
/// same-typed children. Stable for the lifetime of a node; recomputed from
/// the same owner state it always yields the same sequence.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct RuntimeId(SmallVec<[i32; 8]>);

impl RuntimeId {
    /// Compose the id of an owner's root node from its window handle and
    /// per-instance hash.
    pub fn for_owner(window_handle: i64, owner_hash: i32) -> Self {
        let mut parts = SmallVec::new();
        parts.push(RUNTIME_ID_FIRST_ITEM);
        parts.push(window_handle as i32);
        parts.push(owner_hash);
        Self(parts)
    }

    /// Extend the id with a part constant and a positional index.
    ///
    /// The part constant keeps two different part kinds from colliding even
    /// when their indices coincide.
    pub fn with_part(&self, part: i32, index: i32) -> Self {
        let mut parts = self.0.clone();
        parts.push(part);
        parts.push(index);
        Self(parts)
    }

    /// The id elements in order.
    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    /// The id elements as an owned vec, for property answers.
    pub fn to_vec(&self) -> Vec<i32> {
        self.0.to_vec()
    }

    /// Number of elements in the sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence is empty (only a default-constructed id is).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuntimeId{:?}", self.0.as_slice())
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for part in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{part:x}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_first() {
        let id = RuntimeId::for_owner(0x1234, 77);
        assert_eq!(id.as_slice()[0], RUNTIME_ID_FIRST_ITEM);
        assert_eq!(id.as_slice(), &[0x2a, 0x1234, 77]);
    }

    #[test]
    fn test_same_inputs_same_id() {
        let a = RuntimeId::for_owner(10, 3).with_part(2, 5);
        let b = RuntimeId::for_owner(10, 3).with_part(2, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_parts_do_not_collide() {
        let owner = RuntimeId::for_owner(10, 3);
        assert_ne!(owner.with_part(1, 0), owner.with_part(2, 0));
        assert_ne!(owner.with_part(1, 0), owner.with_part(1, 1));
    }

    #[test]
    fn test_handle_change_changes_id() {
        let before = RuntimeId::for_owner(10, 3);
        let after = RuntimeId::for_owner(11, 3);
        assert_ne!(before, after);
    }
}
