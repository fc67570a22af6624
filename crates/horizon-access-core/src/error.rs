//! Error types for the accessibility bridge.

use thiserror::Error;

/// Errors surfaced by accessible node operations.
///
/// Precondition and range violations are programming errors in the hosting
/// widget code and are raised loudly; system proxy capability gaps never
/// reach this type (the wrapper absorbs them), only unexpected proxy
/// failures do.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The node's owning widget was dropped or never wired up.
    #[error("owning widget is detached or was never assigned")]
    OwnerDetached,

    /// The operation requires the owner's native handle to exist.
    #[error("owning widget's handle has not been created")]
    HandleNotCreated,

    /// A child index outside the valid range was requested.
    #[error("child index {index} out of range (count {count})")]
    ChildIndexOutOfRange { index: usize, count: usize },

    /// The operation is only valid in a different widget view mode.
    #[error("operation requires {required} view, widget is in {actual} view")]
    ViewMismatch {
        required: &'static str,
        actual: &'static str,
    },

    /// An unexpected system proxy failure (not a capability gap).
    #[error("system proxy failure: {0}")]
    Proxy(#[from] ProxyError),

    /// The process-wide registry has not been initialized.
    #[error("access registry not initialized; call init_global_registry() first")]
    RegistryNotInitialized,
}

/// Failures signalled by an OS-furnished accessible proxy.
///
/// `MemberNotFound` and `InvalidArgument` are the two recoverable classes:
/// the proxy simply does not implement the member (or the child id does not
/// resolve once the primary lookup already failed). The wrapper converts
/// both to "no data". Anything else travels as [`ProxyError::Failure`] and
/// propagates.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyError {
    /// The proxy does not implement this member for this object.
    #[error("member not found")]
    MemberNotFound,

    /// The child id did not resolve.
    #[error("invalid argument")]
    InvalidArgument,

    /// Any other native failure, carrying the platform's error code.
    #[error("native failure (code {0:#x})")]
    Failure(i32),
}

impl ProxyError {
    /// Whether this failure class degrades to "no data" at the wrapper.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::MemberNotFound | Self::InvalidArgument)
    }
}

/// A specialized Result type for accessibility operations.
pub type AccessResult<T> = Result<T, AccessError>;
