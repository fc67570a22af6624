//! Horizon Access: accessibility trees for desktop widgets.
//!
//! This crate builds on `horizon-access-core` and supplies the per-widget
//! node families: combo boxes, data grids, list views, month calendars,
//! tab controls, and tool strips. Each widget exposes a facade the
//! application mutates and an accessible object tree OS clients navigate;
//! the facade keeps the two consistent, disconnecting every node it
//! invalidates before a replacement can be observed.
//!
//! ```no_run
//! use std::rc::Rc;
//! use horizon_access::widgets::{ComboBox, ComboBoxStyle};
//! use horizon_access_core::{NullRuntime, init_global_registry};
//!
//! init_global_registry();
//! let combo = ComboBox::new(ComboBoxStyle::DropDown, Rc::new(NullRuntime)).unwrap();
//! combo.create_handle(0x1000);
//! combo.add_item("First");
//! let root = combo.accessibility_object();
//! assert!(root.name().unwrap().is_none());
//! ```

pub mod owner;
pub mod widgets;

pub use owner::OwnerCore;
