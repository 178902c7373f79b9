//! Decode + normalize: turn arbitrary input bytes into a canonical,
//! orientation-corrected [`PixelBuffer`].

use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};

use exif::{In, Reader, Tag, Value};
use image::{DynamicImage, GenericImageView};
use mozjpeg::Decompress;

use crate::error::{PyjamazError, Result};
use crate::format::FormatTag;
use crate::pixel::{check_dimensions, PixelBuffer};

/// Run a closure that may panic inside an external C library (mozjpeg,
/// libavif) and convert any panic into a [`PyjamazError::Decode`].
///
/// A handful of decoder/encoder code paths cross into FFI; a malformed
/// input that trips an assertion on the other side of that boundary must
/// not take the whole process down with it.
pub(crate) fn run_with_panic_guard<F, T>(label: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::warn!("{label} panicked: {reason}");
            Err(PyjamazError::Decode(format!("{label} panicked: {reason}")))
        }
    }
}

/// EXIF orientation tag values, as defined by the TIFF/EXIF spec.
/// `1` is the default (no-op) orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation(pub u32);

impl Orientation {
    const IDENTITY: Self = Self(1);

    fn read(bytes: &[u8]) -> Self {
        let Ok(exif) = Reader::new().read_from_container(&mut Cursor::new(bytes)) else {
            return Self::IDENTITY;
        };
        let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) else {
            return Self::IDENTITY;
        };
        match field.value {
            Value::Short(ref v) if !v.is_empty() => Self(u32::from(v[0])),
            _ => Self::IDENTITY,
        }
    }

    /// Apply the orientation's rotation/flip to a decoded image.
    fn apply(self, img: DynamicImage) -> DynamicImage {
        match self.0 {
            2 => img.fliph(),
            3 => img.rotate180(),
            4 => img.flipv(),
            5 => img.rotate90().fliph(),
            6 => img.rotate90(),
            7 => img.rotate270().fliph(),
            8 => img.rotate270(),
            _ => img,
        }
    }
}

/// Decode `bytes` (whose container is sniffed, not taken on faith) into a
/// canonical, orientation-corrected, bomb-guard-checked [`PixelBuffer`].
///
/// JPEG goes through `mozjpeg`; every other recognized container goes
/// through the `image` crate. Alpha is preserved only when at least one
/// pixel actually uses it (see [`PixelBuffer::alpha_is_significant`]),
/// otherwise the buffer is stored as 3-channel.
pub fn decode_and_normalize(bytes: &[u8]) -> Result<(FormatTag, PixelBuffer)> {
    let format = FormatTag::sniff(bytes)
        .ok_or_else(|| PyjamazError::Decode("unrecognized input container".to_string()))?;

    let orientation = Orientation::read(bytes);

    let dynamic = if format == FormatTag::Jpeg {
        decode_jpeg(bytes)?
    } else {
        decode_generic(bytes)
    }?;

    let (width, height) = dynamic.dimensions();
    check_dimensions(width, height)?;

    let oriented = orientation.apply(dynamic);
    let (width, height) = oriented.dimensions();
    check_dimensions(width, height)?;

    let rgba = oriented.to_rgba8();
    let buffer = PixelBuffer::new(rgba.into_raw(), width, height, 4)?;

    if buffer.alpha_is_significant() {
        Ok((format, buffer))
    } else {
        // Every pixel is fully opaque, so blending against any background
        // color is a lossless channel drop.
        Ok((format, buffer.flatten_alpha([0, 0, 0])))
    }
}

/// Decode JPEG bytes via mozjpeg (libjpeg-turbo), the faster path for the
/// one format that dominates real-world input traffic.
fn decode_jpeg(bytes: &[u8]) -> Result<DynamicImage> {
    run_with_panic_guard("decode:mozjpeg", || {
        let decompress = Decompress::new_mem(bytes)
            .map_err(|e| PyjamazError::Decode(format!("mozjpeg init failed: {e:?}")))?;
        let mut decompress = decompress
            .rgb()
            .map_err(|e| PyjamazError::Decode(format!("mozjpeg rgb() failed: {e:?}")))?;

        let width = decompress.width() as u32;
        let height = decompress.height() as u32;
        check_dimensions(width, height)?;

        let pixels: Vec<[u8; 3]> = decompress
            .read_scanlines()
            .map_err(|e| PyjamazError::Decode(format!("mozjpeg scanline read failed: {e:?}")))?;
        let flat: Vec<u8> = pixels.into_iter().flatten().collect();

        image::RgbImage::from_raw(width, height, flat)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| PyjamazError::Decode("mozjpeg: raw buffer size mismatch".to_string()))
    })
}

/// Decode anything else (PNG, WebP) via the `image` crate's memory
/// decoders.
///
/// `image` is built with only the `jpeg`/`png`/`webp` features (see
/// `Cargo.toml`), so an AVIF-sniffed input still reaches this path but
/// fails here with a `DecodeError` — this crate can *encode* AVIF via
/// `libavif-sys` but cannot yet decode an AVIF *reference input* back into
/// a `PixelBuffer`. Carried over from the teacher, which has the same gap;
/// closing it would mean adding `image`'s (non-default) `avif` feature or a
/// dedicated libavif decode path.
fn decode_generic(bytes: &[u8]) -> Result<DynamicImage> {
    run_with_panic_guard("decode:image", || {
        image::load_from_memory(bytes)
            .map_err(|e| PyjamazError::Decode(format!("image crate decode failed: {e}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn decodes_png_to_canonical_buffer() {
        let bytes = encode_png(8, 6);
        let (format, buf) = decode_and_normalize(&bytes).unwrap();
        assert_eq!(format, FormatTag::Png);
        assert_eq!(buf.width(), 8);
        assert_eq!(buf.height(), 6);
    }

    #[test]
    fn rejects_unrecognized_container() {
        let err = decode_and_normalize(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, PyjamazError::Decode(_)));
    }

    #[test]
    fn identity_orientation_is_noop() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(4, 2, |_, _| Rgb([1, 2, 3])));
        let same = Orientation::IDENTITY.apply(img.clone());
        assert_eq!(same.dimensions(), img.dimensions());
    }

    #[test]
    fn rotating_orientation_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(4, 2, |_, _| Rgb([1, 2, 3])));
        let rotated = Orientation(6).apply(img);
        assert_eq!(rotated.dimensions(), (2, 4));
    }
}
