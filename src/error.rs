//! Error taxonomy for the tracer core: invalid input is reported back to
//! the caller and the frame continues with defaults, capacity overruns are
//! dropped and logged, a stale handle resolves to `None` rather than
//! erroring, and fatal conditions are unrecoverable.

use thiserror::Error;

/// Errors produced by the geometry, acceleration-structure, and frame
/// coordination layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied data failed a structural check. Component-local
    /// recovery: the caller substitutes defaults and the frame continues.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    /// A per-frame capacity was exceeded. Frame-local recovery: excess
    /// submissions are dropped and logged.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(#[from] CapacityExceeded),

    /// A handle did not resolve to a live resource. Component-local
    /// recovery: the caller substitutes a default or skips the instance.
    #[error("resource not found: {0}")]
    ResourceNotFound(#[from] ResourceNotFound),

    /// An unrecoverable condition: virtual-memory reservation failure,
    /// device loss, or a core-invariant assertion violation. The caller
    /// should surface this to the user and terminate the process.
    #[error("fatal error: {0}")]
    Fatal(#[from] Fatal),
}

/// Structural validation failures.
#[derive(Debug, Error)]
pub enum InvalidInput {
    #[error("index count {0} is not divisible by 3")]
    IndexCountNotTriple(usize),

    #[error("mesh geometry is empty (zero triangles)")]
    EmptyGeometry,

    #[error("texture has a zero dimension ({width}x{height})")]
    ZeroSizedTexture { width: u32, height: u32 },

    #[error("malformed DDS header: {0}")]
    MalformedDds(String),

    #[error("out-of-range enum value {value} for {field}")]
    EnumOutOfRange { field: &'static str, value: u32 },
}

/// Per-frame capacity overruns.
#[derive(Debug, Error)]
pub enum CapacityExceeded {
    #[error(
        "instance submission would exceed the {max} instance-per-frame cap (attempted {attempted})"
    )]
    InstanceCount { attempted: u32, max: u32 },

    #[error(
        "ring buffer exhausted for a single oversized job batch of {requested} jobs (capacity {capacity})"
    )]
    RingBufferExhausted { requested: usize, capacity: usize },
}

/// A referenced resource handle does not resolve to a live slot.
///
/// Direct slotmap lookups (`GeometryStore::lookup`) return `Option::None`
/// on a stale handle. This variant is for the one step up: an instance or
/// material reference that is *looked up on behalf of the caller* during
/// scene submission, where silently returning `None` would lose the
/// context of which submission failed.
#[derive(Debug, Error)]
pub enum ResourceNotFound {
    #[error("instance references mesh handle {0:?} which is not registered")]
    MeshHandle(crate::slotmap::Handle),
}

/// Unrecoverable conditions. Callers that see this variant should log it
/// and terminate rather than attempt to continue the frame loop.
#[derive(Debug, Error)]
pub enum Fatal {
    #[error("virtual memory reservation of {size} bytes failed: {reason}")]
    ReservationFailed { size: u64, reason: String },

    #[error("core invariant violated: {0}")]
    InvariantViolation(&'static str),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
