//! The bounded transform pipeline: resize, sharpen, flatten.
//!
//! Auto-rotation and sRGB/channel normalization happen in [`crate::decode`]
//! as part of producing the canonical buffer; everything here is an
//! explicit, optional step a caller opts into through
//! [`crate::request::OptimizationRequest`].

use fast_image_resize as fir;
use image::{DynamicImage, RgbImage, RgbaImage};

use crate::error::{PyjamazError, Result};
use crate::pixel::PixelBuffer;

/// A target size for the resize step. Aspect ratio is always preserved;
/// the buffer is scaled down to fit within `width x height`, never
/// upscaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeTarget {
    pub width: u32,
    pub height: u32,
}

/// Compute the largest dimensions that fit inside the target box without
/// exceeding it and without enlarging the source.
fn fit_within(src_w: u32, src_h: u32, target: ResizeTarget) -> (u32, u32) {
    if src_w <= target.width && src_h <= target.height {
        return (src_w, src_h);
    }
    let scale = f64::min(
        f64::from(target.width) / f64::from(src_w),
        f64::from(target.height) / f64::from(src_h),
    );
    let w = ((f64::from(src_w) * scale).round() as u32).max(1);
    let h = ((f64::from(src_h) * scale).round() as u32).max(1);
    (w, h)
}

/// Resize a buffer to fit within `target`, using a SIMD-accelerated
/// Lanczos3 filter. No-op if the buffer already fits.
pub fn resize(buffer: &PixelBuffer, target: ResizeTarget) -> Result<PixelBuffer> {
    let (dst_w, dst_h) = fit_within(buffer.width(), buffer.height(), target);
    if dst_w == buffer.width() && dst_h == buffer.height() {
        return Ok(buffer.clone());
    }

    let pixel_type = if buffer.channels() == 4 {
        fir::PixelType::U8x4
    } else {
        fir::PixelType::U8x3
    };

    let mut src_image = fir::images::Image::from_vec_u8(
        buffer.width(),
        buffer.height(),
        buffer.as_bytes().to_vec(),
        pixel_type,
    )
    .map_err(|e| PyjamazError::InvalidArgument(format!("resize source buffer invalid: {e:?}")))?;

    let mut dst_image = fir::images::Image::new(dst_w, dst_h, pixel_type);

    let mul_div = fir::MulDiv::default();
    if pixel_type == fir::PixelType::U8x4 {
        mul_div
            .multiply_alpha_inplace(&mut src_image)
            .map_err(|e| PyjamazError::InvalidArgument(format!("premultiply failed: {e}")))?;
    }

    let mut resizer = fir::Resizer::new();
    let options =
        fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| PyjamazError::InvalidArgument(format!("resize failed: {e:?}")))?;

    if pixel_type == fir::PixelType::U8x4 {
        mul_div
            .divide_alpha_inplace(&mut dst_image)
            .map_err(|e| PyjamazError::InvalidArgument(format!("unpremultiply failed: {e}")))?;
    }

    PixelBuffer::new(dst_image.into_vec(), dst_w, dst_h, buffer.channels())
}

/// Apply an unsharp-mask sharpen pass. `sigma` is the Gaussian blur radius
/// used to build the mask, `amount` the contribution applied back (both
/// map directly onto `image::imageops::unsharpen`).
#[must_use]
pub fn sharpen(buffer: &PixelBuffer, sigma: f32, amount: i32) -> PixelBuffer {
    let dynamic = to_dynamic(buffer);
    let sharpened = dynamic.unsharpen(sigma, amount);
    from_dynamic(sharpened, buffer.channels())
}

/// Flatten alpha onto an opaque background. Thin wrapper kept here so
/// callers building a transform pipeline don't need to reach into
/// [`crate::pixel`] directly.
#[must_use]
pub fn flatten(buffer: &PixelBuffer, background: [u8; 3]) -> PixelBuffer {
    buffer.flatten_alpha(background)
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

fn from_dynamic(img: DynamicImage, channels: u8) -> PixelBuffer {
    let (width, height) = (img.width(), img.height());
    let bytes = if channels == 4 {
        img.to_rgba8().into_raw()
    } else {
        img.to_rgb8().into_raw()
    };
    PixelBuffer::new(bytes, width, height, channels)
        .expect("dynamic image round-trip preserves dimensions")
}
