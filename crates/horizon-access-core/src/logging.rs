//! Logging and debugging facilities for the accessibility bridge.
//!
//! The bridge instruments itself with the `tracing` crate; install a
//! subscriber in the host application to see logs:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! [`format_tree`] renders an accessible subtree for debug output, walking
//! fragment navigation exactly the way an automation client would.

use std::fmt::Write as FmtWrite;

use crate::node::{AccessibleNode, fragment_children};

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core machinery target.
    pub const CORE: &str = "horizon_access_core";
    /// System proxy wrapper target.
    pub const PROXY: &str = "horizon_access_core::proxy";
    /// Lazy cache / invalidation target.
    pub const CACHE: &str = "horizon_access_core::cache";
    /// Child enumeration target.
    pub const ENUMERATION: &str = "horizon_access_core::enumeration";
    /// Per-widget node types target.
    pub const WIDGETS: &str = "horizon_access::widgets";
}

/// Options for accessible-tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// Whether to show runtime ids.
    pub show_runtime_ids: bool,
    /// Whether to show node bounds.
    pub show_bounds: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            show_runtime_ids: true,
            show_bounds: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

/// Render a node and its fragment subtree as an indented listing.
pub fn format_tree(root: &dyn AccessibleNode, options: &TreeFormatOptions) -> String {
    let mut out = String::new();
    format_node(root, options, 0, &mut out);
    out
}

fn format_node(node: &dyn AccessibleNode, options: &TreeFormatOptions, depth: usize, out: &mut String) {
    if let Some(max) = options.max_depth {
        if depth > max {
            return;
        }
    }

    let indent = " ".repeat(depth * options.indent_size);
    let role = node.role().map(|role| role.as_str()).unwrap_or("<error>");
    let name = match node.name() {
        Ok(Some(name)) => name,
        Ok(None) => String::new(),
        Err(_) => "<error>".to_string(),
    };
    let _ = write!(out, "{indent}{role}");
    if !name.is_empty() {
        let _ = write!(out, " \"{name}\"");
    }
    if options.show_runtime_ids {
        let _ = write!(out, " [{}]", node.runtime_id());
    }
    if options.show_bounds {
        if let Ok(bounds) = node.bounds() {
            let _ = write!(
                out,
                " ({}, {}, {}x{})",
                bounds.origin.x, bounds.origin.y, bounds.size.width, bounds.size.height
            );
        }
    }
    out.push('\n');

    for child in fragment_children(node) {
        format_node(child.as_ref(), options, depth + 1, out);
    }
}
