//! The unit the generator produces and the selector chooses among.

use crate::format::FormatTag;

/// One encoded byte slice, produced either by a codec search or by the
/// original-file fallback.
#[derive(Debug, Clone)]
pub struct EncodedCandidate {
    pub format: FormatTag,
    pub bytes: Vec<u8>,
    /// `0-100`, or the sentinel `100` for the original-file candidate.
    pub quality: u8,
    /// Perceptual difference from the reference buffer. `0.0` for the
    /// original-file candidate (defined, not measured).
    pub diff: f64,
    pub passed_constraints: bool,
    pub encode_time: std::time::Duration,
}

impl EncodedCandidate {
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    /// The original-file candidate: input bytes verbatim, diff defined as
    /// `0.0`, quality pinned to the sentinel `100`.
    #[must_use]
    pub fn original(format: FormatTag, bytes: Vec<u8>, passed_constraints: bool) -> Self {
        Self {
            format,
            bytes,
            quality: 100,
            diff: 0.0,
            passed_constraints,
            encode_time: std::time::Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_candidate_has_zero_diff_and_full_quality() {
        let candidate = EncodedCandidate::original(FormatTag::Png, vec![1, 2, 3], true);
        assert_eq!(candidate.diff, 0.0);
        assert_eq!(candidate.quality, 100);
        assert_eq!(candidate.byte_size(), 3);
    }
}
