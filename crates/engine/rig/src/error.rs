//! Rig error types.

use crate::protocol::ViewerId;
use thiserror::Error;

/// Failure reported by the transport for a single message to a single viewer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The viewer is no longer connected.
    #[error("viewer {0} is not connected")]
    ViewerGone(ViewerId),

    /// The viewer's outbound queue is closed or full.
    #[error("send to {viewer} failed: {reason}")]
    SendFailed { viewer: ViewerId, reason: String },

    /// The message could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Failure reported by the host's native entity capability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NativeError {
    #[error("native entity {0} does not exist")]
    UnknownEntity(u64),

    #[error("native host rejected the call: {0}")]
    Rejected(String),
}

/// Errors surfaced by rig construction and lifecycle operations.
#[derive(Error, Debug)]
pub enum RigError {
    /// View distance must be finite and strictly positive.
    #[error("invalid view distance {0}")]
    InvalidViewDistance(f64),

    /// Scheduler period must be non-zero.
    #[error("scheduler period must be greater than zero")]
    InvalidPeriod,

    /// Direction vectors must be finite and non-zero.
    #[error("invalid direction vector {0:?}")]
    InvalidDirection([f64; 3]),

    /// A rig with this name is already registered.
    #[error("rig '{0}' already exists")]
    DuplicateRig(String),

    /// A segment with this name already exists on the rig.
    #[error("segment '{segment}' already exists on rig '{rig}'")]
    DuplicateSegment { rig: String, segment: String },

    /// No segment with this name exists on the rig.
    #[error("segment '{segment}' not found on rig '{rig}'")]
    UnknownSegment { rig: String, segment: String },

    /// The rig has been removed and no longer accepts segments.
    #[error("rig '{0}' has been removed")]
    RigRemoved(String),

    /// Native mode was requested but the registry has no native capability.
    #[error("native mode requested but no native entity host is configured")]
    NativeHostUnavailable,

    /// The operation would run off the host loop for a native-mode rig.
    #[error("rig '{0}' uses native entities and must be moved on the host loop")]
    NativeModeRequiresHostLoop(String),

    /// The visibility task is already running.
    #[error("visibility task for rig '{0}' is already running")]
    SchedulerRunning(String),

    /// No Tokio runtime is available to host the visibility task.
    #[error("no async runtime available to start the visibility task")]
    NoRuntime,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Native(#[from] NativeError),
}

/// Convenience result type for rig operations.
pub type RigResult<T> = Result<T, RigError>;
