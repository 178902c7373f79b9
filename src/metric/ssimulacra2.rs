//! SSIMULACRA2: a perceptual metric tuned to match human judgment on
//! modern codecs (JPEG XL, AVIF) better than plain SSIM variants.

use image::{DynamicImage, RgbImage, RgbaImage};

use crate::error::{PyjamazError, Result};
use crate::pixel::PixelBuffer;

/// `compute_frame_ssimulacra2` reports a *quality* score on a
/// `(-inf..=100)` scale where 100 means identical and lower is worse —
/// the opposite of this crate's metric contract (0 = identical, higher =
/// more different, `diff <= max_diff` gates selection). Flip it to a
/// dissimilarity before returning it.
pub fn compute(reference: &PixelBuffer, candidate: &PixelBuffer) -> Result<f64> {
    let reference_img = to_dynamic(reference);
    let candidate_img = to_dynamic(candidate);

    let quality = ssimulacra2::compute_frame_ssimulacra2(&reference_img, &candidate_img)
        .map_err(|e| PyjamazError::Metric(format!("ssimulacra2 failed: {e}")))?;

    Ok((100.0 - quality).max(0.0))
}

fn to_dynamic(buffer: &PixelBuffer) -> DynamicImage {
    if buffer.channels() == 4 {
        DynamicImage::ImageRgba8(
            RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.as_bytes().to_vec())
                .expect("PixelBuffer invariant: bytes match width/height/channels"),
        )
    } else {
        DynamicImage::ImageRgb8(
            RgbImage::from_raw(buffer.width(), buffer.height(), buffer.as_bytes().to_vec())
                .expect("PixelBuffer invariant: bytes match width/height/channels"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_buffers_score_near_zero() {
        let buf = PixelBuffer::new(vec![100; 16 * 16 * 3], 16, 16, 3).unwrap();
        let diff = compute(&buf, &buf).unwrap();
        assert!(diff.abs() < 0.01, "expected near-zero dissimilarity, got {diff}");
    }

    #[test]
    fn dissimilarity_is_never_negative() {
        let reference = PixelBuffer::new(vec![10; 16 * 16 * 3], 16, 16, 3).unwrap();
        let mut bytes = vec![10u8; 16 * 16 * 3];
        for (i, b) in bytes.iter_mut().enumerate() {
            if i % 3 == 0 {
                *b = 240;
            }
        }
        let candidate = PixelBuffer::new(bytes, 16, 16, 3).unwrap();
        let diff = compute(&reference, &candidate).unwrap();
        assert!(diff >= 0.0, "dissimilarity must never be negative, got {diff}");
    }
}
