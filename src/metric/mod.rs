//! Perceptual difference scoring between the reference buffer and a
//! decoded candidate.

mod dssim;
mod ssimulacra2;

use crate::error::{PyjamazError, Result};
use crate::pixel::PixelBuffer;

/// Which perceptual metric to use, or none at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Dssim,
    Ssimulacra2,
    /// Always `0.0`; skips the decode-back step entirely.
    None,
}

impl Metric {
    /// Compute the scalar difference between `reference` and `candidate`.
    /// Both must have identical dimensions and channel count.
    ///
    /// For candidates derived from the original input the caller should
    /// short-circuit to `0.0` directly rather than calling this — the
    /// contract only applies to re-encoded candidates.
    pub fn compute(self, reference: &PixelBuffer, candidate: &PixelBuffer) -> Result<f64> {
        if reference.width() != candidate.width() || reference.height() != candidate.height() {
            return Err(PyjamazError::Metric(format!(
                "dimension mismatch: reference {}x{}, candidate {}x{}",
                reference.width(),
                reference.height(),
                candidate.width(),
                candidate.height()
            )));
        }
        if reference.channels() != candidate.channels() {
            return Err(PyjamazError::Metric(format!(
                "channel count mismatch: reference {}, candidate {}",
                reference.channels(),
                candidate.channels()
            )));
        }

        match self {
            Self::Dssim => dssim::compute(reference, candidate),
            Self::Ssimulacra2 => ssimulacra2::compute(reference, candidate),
            Self::None => Ok(0.0),
        }
    }
}
