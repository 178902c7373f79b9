//! JPEG encoding via mozjpeg (libjpeg-turbo bindings).

use mozjpeg::{ColorSpace, Compress, ScanMode};

use crate::decode::run_with_panic_guard;
use crate::error::{PyjamazError, Result};
use crate::format::FormatTag;
use crate::pixel::PixelBuffer;

/// Encode `buffer` to JPEG at `quality`. 4-channel input is flattened
/// onto `flatten_color` first, since JPEG has no alpha channel.
pub fn encode(buffer: &PixelBuffer, quality: u8, flatten_color: [u8; 3]) -> Result<Vec<u8>> {
    let rgb_owned;
    let rgb: &PixelBuffer = if buffer.channels() == 4 {
        rgb_owned = buffer.flatten_alpha(flatten_color);
        &rgb_owned
    } else {
        buffer
    };

    let width = rgb.width();
    let height = rgb.height();
    let quality = quality.min(100);

    run_with_panic_guard("encode:jpeg", || {
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(f32::from(quality));
        comp.set_chroma_sampling_pixel_sizes((2, 2), (2, 2));
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        comp.set_optimize_scans(true);
        comp.set_scan_optimization_mode(ScanMode::AllComponentsTogether);

        let estimated = (width as usize * height as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated);

        let encoded = {
            let mut writer = comp.start_compress(&mut output).map_err(|e| PyjamazError::Encode {
                format: FormatTag::Jpeg,
                reason: format!("start_compress failed: {e:?}"),
            })?;

            for row in rgb.rows() {
                writer.write_scanlines(row).map_err(|e| PyjamazError::Encode {
                    format: FormatTag::Jpeg,
                    reason: format!("write_scanlines failed: {e:?}"),
                })?;
            }

            writer.finish().map_err(|e| PyjamazError::Encode {
                format: FormatTag::Jpeg,
                reason: format!("finish failed: {e:?}"),
            })?;

            output
        };

        if encoded.is_empty() || encoded[0..2] != [0xFF, 0xD8] {
            return Err(PyjamazError::Encode {
                format: FormatTag::Jpeg,
                reason: "encoded output missing JPEG magic number".to_string(),
            });
        }

        Ok(encoded)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32, channels: u8) -> PixelBuffer {
        let mut bytes = Vec::with_capacity(width as usize * height as usize * channels as usize);
        for y in 0..height {
            for x in 0..width {
                bytes.push((x % 256) as u8);
                bytes.push((y % 256) as u8);
                bytes.push(128);
                if channels == 4 {
                    bytes.push(200);
                }
            }
        }
        PixelBuffer::new(bytes, width, height, channels).unwrap()
    }

    #[test]
    fn encodes_rgb_to_valid_jpeg() {
        let buf = gradient(32, 24, 3);
        let out = encode(&buf, 80, [255, 255, 255]).unwrap();
        assert_eq!(&out[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn flattens_alpha_before_encoding() {
        let buf = gradient(16, 16, 4);
        let out = encode(&buf, 80, [255, 255, 255]).unwrap();
        assert_eq!(&out[0..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn higher_quality_does_not_shrink_estimate_below_floor() {
        let buf = gradient(8, 8, 3);
        let low = encode(&buf, 10, [0, 0, 0]).unwrap();
        let high = encode(&buf, 95, [0, 0, 0]).unwrap();
        assert!(!low.is_empty());
        assert!(!high.is_empty());
    }
}
