//! The engine's entire configuration surface: one request in, one result
//! out, no hidden global state.

use std::time::Duration;

use crate::candidate::EncodedCandidate;
use crate::error::{PyjamazError, Result};
use crate::format::FormatTag;
use crate::metric::Metric;

/// Input to [`crate::engine::optimize`]. Read-only for the duration of a
/// call; the caller retains ownership.
#[derive(Debug, Clone)]
pub struct OptimizationRequest {
    pub input: Vec<u8>,
    /// `0` means unbounded.
    pub max_bytes: u32,
    /// `0` means unbounded.
    pub max_diff: f64,
    pub metric: Metric,
    /// At least one format; order has no effect on the outcome, only on
    /// scheduling.
    pub formats: Vec<FormatTag>,
    pub concurrency: u32,
    /// Background color a 4-channel buffer is flattened onto before
    /// handing it to a codec without alpha support.
    pub flatten_color: [u8; 3],
    pub cache: Option<CacheConfig>,
}

/// Where and how large the on-disk cache is allowed to grow.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub directory: std::path::PathBuf,
    pub max_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            max_size_bytes: 1 << 30, // 1 GiB
        }
    }
}

/// `$XDG_CACHE_HOME/pyjamaz/` on Unix, `%LOCALAPPDATA%\pyjamaz\cache\` on
/// Windows, falling back to a `pyjamaz` directory under the OS temp dir
/// if neither is resolvable.
fn default_cache_dir() -> std::path::PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("pyjamaz"))
        .unwrap_or_else(|| std::env::temp_dir().join("pyjamaz"))
}

impl OptimizationRequest {
    /// Validate the boundary preconditions every caller must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.input.is_empty() {
            return Err(PyjamazError::InvalidArgument("input is empty".to_string()));
        }
        if self.formats.is_empty() {
            return Err(PyjamazError::InvalidArgument("formats list is empty".to_string()));
        }
        if self.concurrency == 0 {
            return Err(PyjamazError::InvalidArgument("concurrency must be >= 1".to_string()));
        }
        const MAX_INPUT_BYTES: usize = 4 << 30; // 4 GiB, matches the ABI's u32 max_bytes ceiling
        if self.input.len() > MAX_INPUT_BYTES {
            return Err(PyjamazError::InvalidArgument(format!(
                "input of {} bytes exceeds the {MAX_INPUT_BYTES} byte ceiling",
                self.input.len()
            )));
        }
        Ok(())
    }
}

/// Why the selector came back empty-handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    Budget,
    DiffCeiling,
    Both,
}

/// Output of [`crate::engine::optimize`].
#[derive(Debug, Clone, Default)]
pub struct OptimizationResult {
    pub selected: Option<EncodedCandidate>,
    pub all_candidates: Vec<EncodedCandidate>,
    pub timings: Timings,
    pub diagnostics: Vec<String>,
    pub rejection_reason: Option<RejectionReason>,
}

impl Default for RejectionReason {
    fn default() -> Self {
        Self::Both
    }
}

/// Wall-clock breakdown of one `optimize` call, useful for the cache-hit
/// property test (second call should be markedly faster).
#[derive(Debug, Clone, Copy, Default)]
pub struct Timings {
    pub decode: Duration,
    pub generate: Duration,
    pub select: Duration,
    pub total: Duration,
}
