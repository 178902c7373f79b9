//! WebP encoding via libwebp bindings.

use crate::decode::run_with_panic_guard;
use crate::error::{PyjamazError, Result};
use crate::format::FormatTag;
use crate::pixel::PixelBuffer;

/// Encode `buffer` to lossy WebP at `quality`. Alpha is carried through
/// directly — WebP supports it natively, no flatten needed.
pub fn encode(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
    let width = buffer.width();
    let height = buffer.height();
    let channels = buffer.channels();
    let quality = quality.min(100);

    run_with_panic_guard("encode:webp", || {
        let mut config = webp::WebPConfig::new().map_err(|()| PyjamazError::Encode {
            format: FormatTag::WebP,
            reason: "failed to create WebPConfig".to_string(),
        })?;
        config.quality = f32::from(quality);
        config.method = 4;
        config.autofilter = 1;

        let encoded = if channels == 4 {
            webp::Encoder::from_rgba(buffer.as_bytes(), width, height).encode_advanced(&config)
        } else {
            webp::Encoder::from_rgb(buffer.as_bytes(), width, height).encode_advanced(&config)
        }
        .map_err(|e| PyjamazError::Encode {
            format: FormatTag::WebP,
            reason: format!("WebP encode failed: {e:?}"),
        })?;

        let out = encoded.to_vec();
        if out.len() < 12 || &out[0..4] != b"RIFF" || &out[8..12] != b"WEBP" {
            return Err(PyjamazError::Encode {
                format: FormatTag::WebP,
                reason: "encoded output missing WebP magic number".to_string(),
            });
        }

        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_rgb_to_valid_webp() {
        let buf = PixelBuffer::new(vec![50; 8 * 8 * 3], 8, 8, 3).unwrap();
        let out = encode(&buf, 80).unwrap();
        assert_eq!(&out[0..4], b"RIFF");
        assert_eq!(&out[8..12], b"WEBP");
    }

    #[test]
    fn encodes_rgba_to_valid_webp() {
        let buf = PixelBuffer::new(vec![50; 8 * 8 * 4], 8, 8, 4).unwrap();
        let out = encode(&buf, 80).unwrap();
        assert_eq!(&out[0..4], b"RIFF");
        assert_eq!(&out[8..12], b"WEBP");
    }
}
