//! Core machinery for Horizon Access, the accessibility bridge of the
//! Horizon toolkit family.
//!
//! This crate is widget-independent: it defines the capability surface
//! every accessible node implements ([`AccessibleNode`]), the wrapper that
//! adapts OS-furnished legacy proxies ([`SystemProxyWrapper`]), the legacy
//! child enumerator ([`ChildEnumerator`]), the lazy node cache
//! ([`NodeCache`]), the platform runtime hooks ([`PlatformRuntime`]), and
//! the process-wide registry. The per-widget node types live in the
//! `horizon-access` crate.
//!
//! # Threading
//!
//! The tree is single-threaded: every operation runs synchronously on the
//! UI thread, reentrant only from the OS message pump. The registry is the
//! one exception and is thread-safe.

pub mod cache;
pub mod enumeration;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod node;
pub mod property;
pub mod proxy;
pub mod registry;
pub mod role;
pub mod runtime;
pub mod runtime_id;
pub mod state;

pub use cache::{ChildKey, NodeCache};
pub use enumeration::{ChildEnumerator, EnumeratedChild};
pub use error::{AccessError, AccessResult, ProxyError};
pub use geometry::{Point, Rect, Size};
pub use node::{
    AccessibleNode, FragmentDirection, NavDirection, NodeRef, default_property_value,
    fragment_children,
};
pub use property::{ExpandCollapseState, PatternId, PropertyId, PropertyValue};
pub use proxy::{
    ChildId, ProxyChild, SystemChildIter, SystemProxy, SystemProxyNode, SystemProxyRef,
    SystemProxyWrapper,
};
pub use registry::{
    OwnerKey, SharedAccessRegistry, global_registry, init_global_registry, reset_global_registry,
};
pub use role::AccessibleRole;
pub use runtime::{AutomationEvent, NullRuntime, PlatformRuntime, RecordingRuntime};
pub use runtime_id::{RUNTIME_ID_FIRST_ITEM, RuntimeId};
pub use state::{AccessibleStates, SelectionFlags};
