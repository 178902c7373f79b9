//! Bounded binary search over quality, converging on the highest quality
//! that still fits a byte budget.

use std::time::{Duration, Instant};

use crate::codec::Codec;
use crate::error::Result;
use crate::pixel::PixelBuffer;

/// Hard bound on search iterations. Together with the bomb guard and the
/// cache's bounded eviction loop, this caps worst-case wall time even on
/// hostile inputs.
pub const MAX_ITERATIONS: u32 = 7;

/// Per-encode soft wall-clock ceiling. Crossing it only logs a warning —
/// the encode still completes and its bytes are still used.
const SOFT_TIMEOUT: Duration = Duration::from_secs(5);

/// One observed (quality, bytes) pair from the search.
pub struct SearchOutcome {
    pub quality: u8,
    pub bytes: Vec<u8>,
    /// True if `bytes.len() <= max_bytes` (or the budget was unbounded).
    pub within_budget: bool,
    pub iterations: u32,
}

/// Run the quality-to-size search for one codec against one reference
/// buffer. `max_bytes == 0` means unbounded: a single encode at
/// `codec.default_quality()` is returned immediately.
pub fn search(
    codec: &dyn Codec,
    buffer: &PixelBuffer,
    max_bytes: u32,
    flatten_color: [u8; 3],
) -> Result<SearchOutcome> {
    if max_bytes == 0 {
        let quality = codec.default_quality();
        let bytes = timed_encode(codec, buffer, quality, flatten_color)?;
        return Ok(SearchOutcome {
            quality,
            bytes,
            within_budget: true,
            iterations: 1,
        });
    }

    let (q_min_range, q_max_range) = codec.quality_range();
    if q_min_range == q_max_range {
        // PNG and any other fixed-point codec: single encode, no search.
        let bytes = timed_encode(codec, buffer, q_min_range, flatten_color)?;
        let within_budget = (bytes.len() as u64) <= u64::from(max_bytes);
        return Ok(SearchOutcome {
            quality: q_min_range,
            bytes,
            within_budget,
            iterations: 1,
        });
    }

    let mut q_min = i32::from(q_min_range);
    let mut q_max = i32::from(q_max_range);
    let mut best: Option<(u8, Vec<u8>)> = None;
    let mut smallest_over_budget: Option<(u8, Vec<u8>)> = None;
    let mut iterations = 0u32;

    while q_min <= q_max && iterations < MAX_ITERATIONS {
        iterations += 1;
        let q_mid = q_min + (q_max - q_min) / 2;
        let quality = q_mid.clamp(1, 100) as u8;
        let bytes = timed_encode(codec, buffer, quality, flatten_color)?;

        if (bytes.len() as u64) <= u64::from(max_bytes) {
            let better = best
                .as_ref()
                .map(|(q, _)| quality > *q)
                .unwrap_or(true);
            if better {
                best = Some((quality, bytes));
            }
            q_min = q_mid + 1;
        } else {
            let smaller = smallest_over_budget
                .as_ref()
                .map(|(_, b)| bytes.len() < b.len())
                .unwrap_or(true);
            if smaller {
                smallest_over_budget = Some((quality, bytes));
            }
            q_max = q_mid - 1;
        }
    }

    debug_assert!(iterations <= MAX_ITERATIONS, "search must respect its iteration bound");

    if let Some((quality, bytes)) = best {
        debug_assert!((bytes.len() as u64) <= u64::from(max_bytes));
        Ok(SearchOutcome {
            quality,
            bytes,
            within_budget: true,
            iterations,
        })
    } else if let Some((quality, bytes)) = smallest_over_budget {
        Ok(SearchOutcome {
            quality,
            bytes,
            within_budget: false,
            iterations,
        })
    } else {
        // Every candidate in range was rejected without even recording an
        // over-budget fallback; this only happens if the range was empty,
        // which quality_range() never returns. Fall back to one encode at
        // the codec's own default so the caller still gets a candidate.
        let quality = codec.default_quality();
        let bytes = timed_encode(codec, buffer, quality, flatten_color)?;
        let within_budget = (bytes.len() as u64) <= u64::from(max_bytes);
        Ok(SearchOutcome {
            quality,
            bytes,
            within_budget,
            iterations,
        })
    }
}

fn timed_encode(
    codec: &dyn Codec,
    buffer: &PixelBuffer,
    quality: u8,
    flatten_color: [u8; 3],
) -> Result<Vec<u8>> {
    let started = Instant::now();
    let bytes = codec.encode(buffer, quality, flatten_color)?;
    let elapsed = started.elapsed();
    if elapsed > SOFT_TIMEOUT {
        log::warn!(
            "{} encode at quality {quality} took {elapsed:?}, exceeding the {SOFT_TIMEOUT:?} soft ceiling",
            codec.format()
        );
    }
    Ok(bytes)
}
