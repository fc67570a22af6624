//! Property and pattern identifiers for modern accessibility queries.

use crate::geometry::Rect;

/// Identifiers for node property queries.
///
/// The set is closed but extensible; `property_value` must answer every
/// variant, falling back to [`PropertyValue::Empty`] for ids a node has no
/// opinion about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PropertyId {
    RuntimeId,
    BoundingRectangle,
    Name,
    ControlType,
    IsEnabled,
    HasKeyboardFocus,
    IsKeyboardFocusable,
    IsOffscreen,
    IsControlElement,
    IsContentElement,
    ValueValue,
    ValueIsReadOnly,
    ExpandCollapseState,
    GridRowCount,
    GridColumnCount,
    GridItemRow,
    GridItemColumn,
    SelectionItemIsSelected,
    LegacyDefaultAction,
    LegacyKeyboardShortcut,
    LegacyHelp,
}

/// Identifiers for control pattern support queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PatternId {
    LegacyIAccessible,
    ExpandCollapse,
    Value,
    Selection,
    SelectionItem,
    Grid,
    GridItem,
    Table,
    TableItem,
    ScrollItem,
    Invoke,
    Toggle,
}

/// The expand/collapse condition of a collapsible node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpandCollapseState {
    Collapsed,
    Expanded,
    LeafNode,
}

/// A property query answer.
///
/// `Empty` is the "not supported" sentinel; property queries never fail.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Empty,
    Bool(bool),
    I32(i32),
    F64(f64),
    Str(String),
    IntList(Vec<i32>),
    Rect(Rect),
}

impl PropertyValue {
    /// Whether this is the "not supported" sentinel.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// The integer payload, if any.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<Rect> for PropertyValue {
    fn from(value: Rect) -> Self {
        Self::Rect(value)
    }
}

impl From<ExpandCollapseState> for PropertyValue {
    fn from(value: ExpandCollapseState) -> Self {
        Self::I32(match value {
            ExpandCollapseState::Collapsed => 0,
            ExpandCollapseState::Expanded => 1,
            ExpandCollapseState::LeafNode => 3,
        })
    }
}
