//! Semantic roles reported for accessible nodes.

/// The semantic role of an accessible node.
///
/// Roles describe what kind of thing a node is to assistive technology.
/// The set mirrors the legacy accessibility role taxonomy; widget parts
/// pick the closest match rather than inventing new kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum AccessibleRole {
    /// A node with no specific semantic.
    #[default]
    None,

    /// A window's client area.
    Client,

    /// A top-level window.
    Window,

    /// A push button.
    PushButton,

    /// A combo box (editable or not).
    ComboBox,

    /// The drop-down list portion of a combo box.
    DropList,

    /// Editable text (single line).
    Text,

    /// A list of items.
    List,

    /// An item within a list.
    ListItem,

    /// A table or grid.
    Table,

    /// A row within a table.
    Row,

    /// A cell within a table row.
    Cell,

    /// A column header cell.
    ColumnHeader,

    /// A row header cell.
    RowHeader,

    /// A tab list container.
    PageTabList,

    /// A single tab.
    PageTab,

    /// A menu bar.
    MenuBar,

    /// A toolbar.
    ToolBar,

    /// A grouping of related nodes.
    Grouping,

    /// A non-interactive image.
    Graphic,

    /// A calendar.
    Calendar,

    /// A visual separator between groups of controls.
    Separator,

    /// Static informational text.
    StaticText,

    /// A pane within a window.
    Pane,
}

impl AccessibleRole {
    /// A short lowercase name for logs and debug output.
    pub fn as_str(self) -> &'static str {
        match self {
            AccessibleRole::None => "none",
            AccessibleRole::Client => "client",
            AccessibleRole::Window => "window",
            AccessibleRole::PushButton => "push-button",
            AccessibleRole::ComboBox => "combo-box",
            AccessibleRole::DropList => "drop-list",
            AccessibleRole::Text => "text",
            AccessibleRole::List => "list",
            AccessibleRole::ListItem => "list-item",
            AccessibleRole::Table => "table",
            AccessibleRole::Row => "row",
            AccessibleRole::Cell => "cell",
            AccessibleRole::ColumnHeader => "column-header",
            AccessibleRole::RowHeader => "row-header",
            AccessibleRole::PageTabList => "page-tab-list",
            AccessibleRole::PageTab => "page-tab",
            AccessibleRole::MenuBar => "menu-bar",
            AccessibleRole::ToolBar => "tool-bar",
            AccessibleRole::Grouping => "grouping",
            AccessibleRole::Graphic => "graphic",
            AccessibleRole::Calendar => "calendar",
            AccessibleRole::Separator => "separator",
            AccessibleRole::StaticText => "static-text",
            AccessibleRole::Pane => "pane",
        }
    }
}

impl std::fmt::Display for AccessibleRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
