//! PNG encoding via the `image` crate's encoder, losslessly recompressed
//! with `oxipng`.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

use crate::decode::run_with_panic_guard;
use crate::error::{PyjamazError, Result};
use crate::format::FormatTag;
use crate::pixel::PixelBuffer;

/// Encode `buffer` to PNG. PNG has no quality knob — this is always a
/// lossless encode, optimized for size with `oxipng`.
pub fn encode(buffer: &PixelBuffer) -> Result<Vec<u8>> {
    let width = buffer.width();
    let height = buffer.height();

    run_with_panic_guard("encode:png", || {
        let dynamic = if buffer.channels() == 4 {
            DynamicImage::ImageRgba8(
                RgbaImage::from_raw(width, height, buffer.as_bytes().to_vec()).ok_or_else(|| {
                    PyjamazError::Encode {
                        format: FormatTag::Png,
                        reason: "failed to build RGBA image from buffer".to_string(),
                    }
                })?,
            )
        } else {
            DynamicImage::ImageRgb8(
                RgbImage::from_raw(width, height, buffer.as_bytes().to_vec()).ok_or_else(|| {
                    PyjamazError::Encode {
                        format: FormatTag::Png,
                        reason: "failed to build RGB image from buffer".to_string(),
                    }
                })?,
            )
        };

        let mut raw = Vec::new();
        dynamic
            .write_to(&mut Cursor::new(&mut raw), ImageFormat::Png)
            .map_err(|e| PyjamazError::Encode {
                format: FormatTag::Png,
                reason: format!("PNG encode failed: {e}"),
            })?;

        let options = oxipng::Options::from_preset(4);
        let optimized = oxipng::optimize_from_memory(&raw, &options).map_err(|e| PyjamazError::Encode {
            format: FormatTag::Png,
            reason: format!("oxipng optimization failed: {e}"),
        })?;

        const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        if optimized.len() < 8 || optimized[0..8] != PNG_MAGIC {
            return Err(PyjamazError::Encode {
                format: FormatTag::Png,
                reason: "encoded output missing PNG magic number".to_string(),
            });
        }

        Ok(optimized)
    })
}
