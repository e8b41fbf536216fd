//! Control-plane error taxonomy.

use thiserror::Error;

/// Errors reported to clients by every management operation.
///
/// Each variant carries a static detail string surfaced alongside the wire
/// error name. Validation failures are always produced before any state is
/// touched; asynchronous failures surface as signals instead (see the
/// provisioning session manager).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ManagerError {
    /// Malformed, out-of-range, or wrong-length input.
    #[error("invalid arguments: {0}")]
    InvalidArguments(&'static str),

    /// Requester is not the node owner, or the node lacks the provisioner
    /// role or an authentication agent.
    #[error("not authorized: {0}")]
    NotAuthorized(&'static str),

    /// A referenced key or session does not exist.
    #[error("does not exist: {0}")]
    DoesNotExist(&'static str),

    /// A create collided with an existing record holding a different value.
    #[error("already exists: {0}")]
    AlreadyExists(&'static str),

    /// The operation conflicts with one already underway.
    #[error("in progress: {0}")]
    InProgress(&'static str),

    /// Store- or engine-level failure with no more specific cause.
    #[error("failed: {0}")]
    Failed(&'static str),
}

impl ManagerError {
    /// Stable wire name for the RPC error reply.
    #[must_use]
    pub const fn wire_name(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "InvalidArguments",
            Self::NotAuthorized(_) => "NotAuthorized",
            Self::DoesNotExist(_) => "DoesNotExist",
            Self::AlreadyExists(_) => "AlreadyExists",
            Self::InProgress(_) => "InProgress",
            Self::Failed(_) => "Failed",
        }
    }
}
