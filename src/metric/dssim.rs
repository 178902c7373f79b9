//! DSSIM: structural dissimilarity, `0.0` for identical images.

use dssim::Dssim;
use rgb::FromSlice;

use crate::error::{PyjamazError, Result};
use crate::pixel::PixelBuffer;

pub fn compute(reference: &PixelBuffer, candidate: &PixelBuffer) -> Result<f64> {
    let attr = Dssim::new();

    let reference_image = to_dssim_image(&attr, reference)?;
    let candidate_image = to_dssim_image(&attr, candidate)?;

    let (diff, _maps) = attr.compare(&reference_image, candidate_image);
    Ok(f64::from(diff))
}

fn to_dssim_image(attr: &Dssim, buffer: &PixelBuffer) -> Result<dssim::DssimImage<f32>> {
    let width = buffer.width() as usize;
    let height = buffer.height() as usize;

    let image = if buffer.channels() == 4 {
        let pixels = buffer.as_bytes().as_rgba();
        imgref::Img::new(pixels.to_vec(), width, height)
    } else {
        let pixels = buffer.as_bytes().as_rgb();
        let rgba: Vec<rgb::RGBA8> = pixels
            .iter()
            .map(|p| rgb::RGBA8 {
                r: p.r,
                g: p.g,
                b: p.b,
                a: 255,
            })
            .collect();
        imgref::Img::new(rgba, width, height)
    };

    attr.create_image(&image)
        .ok_or_else(|| PyjamazError::Metric("dssim: failed to build comparison image".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_buffers_score_near_zero() {
        let buf = PixelBuffer::new(vec![100; 8 * 8 * 3], 8, 8, 3).unwrap();
        let score = compute(&buf, &buf).unwrap();
        assert!(score < 0.0001, "expected near-zero score, got {score}");
    }

    #[test]
    fn differing_buffers_score_above_zero() {
        let reference = PixelBuffer::new(vec![10; 8 * 8 * 3], 8, 8, 3).unwrap();
        let mut bytes = vec![10u8; 8 * 8 * 3];
        for (i, b) in bytes.iter_mut().enumerate() {
            if i % 3 == 0 {
                *b = 240;
            }
        }
        let candidate = PixelBuffer::new(bytes, 8, 8, 3).unwrap();
        let score = compute(&reference, &candidate).unwrap();
        assert!(score > 0.0);
    }
}
