//! State flags and selection flags for accessible nodes.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// A set of state flags describing an accessible node's current condition.
///
/// States combine with `|` and are tested with [`contains`](Self::contains).
/// The empty set is the default for plain static nodes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessibleStates(u32);

impl AccessibleStates {
    /// No state flags set.
    pub const NONE: Self = Self(0);
    /// The node can receive keyboard focus.
    pub const FOCUSABLE: Self = Self(1 << 0);
    /// The node currently has keyboard focus.
    pub const FOCUSED: Self = Self(1 << 1);
    /// The node can be selected.
    pub const SELECTABLE: Self = Self(1 << 2);
    /// The node is currently selected.
    pub const SELECTED: Self = Self(1 << 3);
    /// The node is expanded (dropdowns, tree items).
    pub const EXPANDED: Self = Self(1 << 4);
    /// The node is collapsed.
    pub const COLLAPSED: Self = Self(1 << 5);
    /// The node is not visible at all.
    pub const INVISIBLE: Self = Self(1 << 6);
    /// The node is scrolled out of view but reachable.
    pub const OFFSCREEN: Self = Self(1 << 7);
    /// The node is disabled.
    pub const UNAVAILABLE: Self = Self(1 << 8);
    /// The node's value cannot be changed.
    pub const READONLY: Self = Self(1 << 9);
    /// Activating the node opens a popup.
    pub const HASPOPUP: Self = Self(1 << 10);
    /// The node is pressed (buttons).
    pub const PRESSED: Self = Self(1 << 11);
    /// The container allows multiple selected children.
    pub const MULTISELECTABLE: Self = Self(1 << 12);
    /// The node is the default action target in its window.
    pub const DEFAULT: Self = Self(1 << 13);

    /// Create a state set from raw bits.
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw bit representation.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check whether every flag in `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check whether no flags are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Return a copy with the given flags set or cleared.
    #[inline]
    pub const fn with(self, flags: Self, set: bool) -> Self {
        if set {
            Self(self.0 | flags.0)
        } else {
            Self(self.0 & !flags.0)
        }
    }
}

impl BitOr for AccessibleStates {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessibleStates {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for AccessibleStates {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for AccessibleStates {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for AccessibleStates {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for AccessibleStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: &[(AccessibleStates, &str)] = &[
            (AccessibleStates::FOCUSABLE, "FOCUSABLE"),
            (AccessibleStates::FOCUSED, "FOCUSED"),
            (AccessibleStates::SELECTABLE, "SELECTABLE"),
            (AccessibleStates::SELECTED, "SELECTED"),
            (AccessibleStates::EXPANDED, "EXPANDED"),
            (AccessibleStates::COLLAPSED, "COLLAPSED"),
            (AccessibleStates::INVISIBLE, "INVISIBLE"),
            (AccessibleStates::OFFSCREEN, "OFFSCREEN"),
            (AccessibleStates::UNAVAILABLE, "UNAVAILABLE"),
            (AccessibleStates::READONLY, "READONLY"),
            (AccessibleStates::HASPOPUP, "HASPOPUP"),
            (AccessibleStates::PRESSED, "PRESSED"),
            (AccessibleStates::MULTISELECTABLE, "MULTISELECTABLE"),
            (AccessibleStates::DEFAULT, "DEFAULT"),
        ];
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(*flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Flags for the legacy `select` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SelectionFlags(u32);

impl SelectionFlags {
    /// Perform no selection change.
    pub const NONE: Self = Self(0);
    /// Move keyboard focus to the node.
    pub const TAKE_FOCUS: Self = Self(1 << 0);
    /// Make the node the only selected node.
    pub const TAKE_SELECTION: Self = Self(1 << 1);
    /// Add the node to the selection.
    pub const ADD_SELECTION: Self = Self(1 << 2);
    /// Remove the node from the selection.
    pub const REMOVE_SELECTION: Self = Self(1 << 3);

    /// Check whether every flag in `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SelectionFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_composition() {
        let state = AccessibleStates::FOCUSABLE | AccessibleStates::SELECTED;
        assert!(state.contains(AccessibleStates::FOCUSABLE));
        assert!(state.contains(AccessibleStates::SELECTED));
        assert!(!state.contains(AccessibleStates::FOCUSED));
    }

    #[test]
    fn test_with_clears_and_sets() {
        let state = AccessibleStates::EXPANDED;
        let collapsed = state
            .with(AccessibleStates::EXPANDED, false)
            .with(AccessibleStates::COLLAPSED, true);
        assert!(!collapsed.contains(AccessibleStates::EXPANDED));
        assert!(collapsed.contains(AccessibleStates::COLLAPSED));
    }

    #[test]
    fn test_debug_names() {
        let state = AccessibleStates::FOCUSABLE | AccessibleStates::HASPOPUP;
        let text = format!("{state:?}");
        assert!(text.contains("FOCUSABLE"));
        assert!(text.contains("HASPOPUP"));
        assert_eq!(format!("{:?}", AccessibleStates::NONE), "NONE");
    }
}
