//! Budget-and-quality-aware image optimizer.
//!
//! Given an input image and a byte-size budget plus a perceptual-diff
//! ceiling, [`engine::optimize`] picks the smallest JPEG/PNG/WebP/AVIF
//! encoding that satisfies both constraints. The pipeline is:
//!
//! decode & normalize → cache lookup → generate candidates (parallel,
//! one per requested format) → select → cache put.
//!
//! [`capi`] exposes the same entry point as a stable C ABI for embedding
//! in non-Rust hosts.

pub mod cache;
pub mod candidate;
pub mod capi;
pub mod codec;
pub mod decode;
pub mod engine;
pub mod error;
pub mod format;
pub mod generator;
pub mod metric;
pub mod ops;
pub mod pixel;
pub mod request;
pub mod search;
pub mod selector;

pub use candidate::EncodedCandidate;
pub use engine::optimize;
pub use error::{PyjamazError, Result};
pub use format::FormatTag;
pub use metric::Metric;
pub use request::{CacheConfig, OptimizationRequest, OptimizationResult, RejectionReason, Timings};
