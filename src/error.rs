//! Structured error types for the optimization engine.

use crate::format::FormatTag;
use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Variants map one-to-one onto the error taxonomy the facade relies on to
/// decide whether a failure aborts the whole request or is merely recorded
/// as a per-format diagnostic. See [`crate::engine::optimize`] for the
/// propagation policy.
#[derive(Debug, Error, Clone)]
pub enum PyjamazError {
    /// The input could not be identified or decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Image dimensions (or total pixel count) fall outside the supported
    /// range. Carries the bomb guard's accounting so callers can log it.
    #[error("image dimensions out of range: {width}x{height} ({pixels} pixels, max {max_pixels})")]
    Overflow {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },

    /// A codec failed to produce a valid encoding.
    #[error("{format} encode failed: {reason}")]
    Encode { format: FormatTag, reason: String },

    /// The perceptual metric could not be computed.
    #[error("metric failed: {0}")]
    Metric(String),

    /// An on-disk cache operation failed. Always absorbed internally; never
    /// returned to a caller of [`crate::engine::optimize`]. Kept as a typed
    /// variant purely so cache code has something to log.
    #[error("cache error: {0}")]
    Cache(String),

    /// A request violated a precondition the engine asserts at its public
    /// boundary (non-positive concurrency, empty format list, oversized
    /// input, null FFI pointer, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The optimization ran to completion but no candidate satisfied both
    /// constraints. This is a normal outcome, not a hard failure — see
    /// [`crate::selector`].
    #[error("no candidate satisfied the requested constraints")]
    NoPassingCandidate,
}

impl PyjamazError {
    /// True for the two error kinds that must surface to the caller
    /// (everything else is either absorbed or recorded as a diagnostic).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::Overflow { .. } | Self::InvalidArgument(_)
        )
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, PyjamazError>;
