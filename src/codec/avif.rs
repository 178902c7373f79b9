//! AVIF encoding via libavif (AOMedia reference implementation), using
//! the RAII wrappers in [`super::avif_safe`].

use std::cmp;

use libavif_sys::*;

use super::avif_safe::{create_rgb_image, SafeAvifEncoder, SafeAvifImage, SafeAvifRwData};
use crate::decode::run_with_panic_guard;
use crate::error::{PyjamazError, Result};
use crate::format::FormatTag;
use crate::pixel::PixelBuffer;

/// Map a 1-100 quality into libavif's speed knob (0 = slowest/best,
/// 10 = fastest). Higher quality buys more time for a better rate-distortion
/// tradeoff.
fn speed_for_quality(quality: u8) -> i32 {
    match quality {
        90..=100 => 4,
        70..=89 => 6,
        50..=69 => 8,
        _ => 9,
    }
}

/// Encode `buffer` to AVIF at `quality`. Alpha is carried through as a
/// separate plane when present.
pub fn encode(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
    let width = buffer.width();
    let height = buffer.height();
    let has_alpha = buffer.channels() == 4;
    let quality = quality.min(100);
    let speed = speed_for_quality(quality);

    run_with_panic_guard("encode:avif", || {
        // libavif always wants RGBA8 input; pad 3-channel buffers with an
        // opaque alpha byte so create_rgb_image sees a uniform layout.
        let rgba_owned;
        let rgba: &[u8] = if has_alpha {
            buffer.as_bytes()
        } else {
            let mut padded = Vec::with_capacity(width as usize * height as usize * 4);
            for px in buffer.as_bytes().chunks_exact(3) {
                padded.extend_from_slice(px);
                padded.push(255);
            }
            rgba_owned = padded;
            &rgba_owned
        };

        let mut avif_image = SafeAvifImage::new(width, height, 8, AVIF_PIXEL_FORMAT_YUV420)?;
        avif_image.set_color_properties(
            AVIF_COLOR_PRIMARIES_BT709 as u16,
            AVIF_TRANSFER_CHARACTERISTICS_SRGB as u16,
            AVIF_MATRIX_COEFFICIENTS_BT709 as u16,
            AVIF_RANGE_FULL,
        );

        let rgb = create_rgb_image(&mut avif_image, rgba, width, height)?;

        avif_image.allocate_planes(AVIF_PLANES_YUV)?;
        avif_image.rgb_to_yuv(&rgb)?;

        if has_alpha {
            avif_image.allocate_planes(AVIF_PLANES_A)?;
            unsafe {
                let alpha_plane = avif_image.alpha_plane_mut()?;
                let alpha_row_bytes = avif_image.alpha_row_bytes();
                for y in 0..height as usize {
                    for x in 0..width as usize {
                        let src_idx = (y * width as usize + x) * 4 + 3;
                        let dst_idx = y * alpha_row_bytes + x;
                        *alpha_plane.add(dst_idx) = rgba[src_idx];
                    }
                }
            }
        }

        let mut encoder = SafeAvifEncoder::new()?;
        let cpu_threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
        let encoder_threads = cmp::max(2, cmp::min(8, cpu_threads)) as i32;
        encoder.configure(quality, quality, speed, encoder_threads);

        let mut output = SafeAvifRwData::new();
        encoder.add_image(&mut avif_image, 1, AVIF_ADD_IMAGE_FLAG_SINGLE)?;
        encoder.finish(&mut output)?;

        let bytes = output.to_vec();
        if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
            return Err(PyjamazError::Encode {
                format: FormatTag::Avif,
                reason: "encoded output missing AVIF ftyp box".to_string(),
            });
        }

        Ok(bytes)
    })
}
