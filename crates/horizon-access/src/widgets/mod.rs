//! Per-widget accessible node families.
//!
//! One module per widget kind. Each follows the same shape: a facade type
//! the application drives (`ComboBox`, `DataGrid`, ...), a shared state
//! struct behind `Rc<RefCell<...>>`, and the accessible node types handed
//! to OS clients, which hold weak references back to the state.

pub mod combo_box;
pub mod data_grid;
pub mod list_view;
pub mod month_calendar;
pub mod tab_control;
pub mod tool_strip;

pub use combo_box::{ComboBox, ComboBoxStyle};
pub use data_grid::DataGrid;
pub use list_view::{ListView, ListViewMode};
pub use month_calendar::{CalendarView, MonthCalendar};
pub use tab_control::TabControl;
pub use tool_strip::{ToolStrip, ToolStripItemKind};
