//! RAII wrappers around the libavif FFI surface.
//!
//! Everything here exists to keep `unsafe` out of [`super::avif`]: raw
//! `avifImage`/`avifEncoder`/`avifRWData` pointers are owned exactly once
//! and released on drop.

use std::num::NonZeroU32;

use libavif_sys::*;

use crate::error::{PyjamazError, Result};
use crate::pixel::{MAX_DIMENSION, MAX_PIXELS};

fn validate_dimensions(width: u32, height: u32) -> Result<(NonZeroU32, NonZeroU32)> {
    let w = NonZeroU32::new(width).ok_or_else(|| {
        PyjamazError::Encode {
            format: crate::format::FormatTag::Avif,
            reason: "width must be greater than 0".to_string(),
        }
    })?;
    let h = NonZeroU32::new(height).ok_or_else(|| PyjamazError::Encode {
        format: crate::format::FormatTag::Avif,
        reason: "height must be greater than 0".to_string(),
    })?;

    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PyjamazError::Encode {
            format: crate::format::FormatTag::Avif,
            reason: format!("dimensions exceed {MAX_DIMENSION} ({width}x{height})"),
        });
    }

    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_PIXELS {
        return Err(PyjamazError::Encode {
            format: crate::format::FormatTag::Avif,
            reason: format!("pixel count {pixels} exceeds {MAX_PIXELS}"),
        });
    }

    Ok((w, h))
}

/// Owns an `avifImage*` for its lifetime.
pub struct SafeAvifImage {
    ptr: *mut avifImage,
}

impl SafeAvifImage {
    pub fn new(width: u32, height: u32, depth: u32, pixel_format: avifPixelFormat) -> Result<Self> {
        validate_dimensions(width, height)?;
        let ptr = unsafe { avifImageCreate(width, height, depth, pixel_format) };
        if ptr.is_null() {
            return Err(PyjamazError::Encode {
                format: crate::format::FormatTag::Avif,
                reason: "avifImageCreate returned null".to_string(),
            });
        }
        Ok(Self { ptr })
    }

    pub fn set_color_properties(
        &mut self,
        primaries: u16,
        transfer: u16,
        matrix: u16,
        yuv_range: avifRange,
    ) {
        unsafe {
            (*self.ptr).colorPrimaries = primaries;
            (*self.ptr).transferCharacteristics = transfer;
            (*self.ptr).matrixCoefficients = matrix;
            (*self.ptr).yuvRange = yuv_range;
        }
    }

    pub fn allocate_planes(&mut self, planes: u32) -> Result<()> {
        let result = unsafe { avifImageAllocatePlanes(self.ptr, planes) };
        if result != AVIF_RESULT_OK {
            return Err(PyjamazError::Encode {
                format: crate::format::FormatTag::Avif,
                reason: format!("avifImageAllocatePlanes failed: {result:?}"),
            });
        }
        Ok(())
    }

    pub fn rgb_to_yuv(&mut self, rgb: &avifRGBImage) -> Result<()> {
        let result = unsafe { avifImageRGBToYUV(self.ptr, rgb) };
        if result != AVIF_RESULT_OK {
            return Err(PyjamazError::Encode {
                format: crate::format::FormatTag::Avif,
                reason: format!("avifImageRGBToYUV failed: {result:?}"),
            });
        }
        Ok(())
    }

    /// # Safety
    /// The alpha plane must have been allocated via [`Self::allocate_planes`]
    /// with `AVIF_PLANES_A` before this is called.
    pub unsafe fn alpha_plane_mut(&mut self) -> Result<*mut u8> {
        let ptr = (*self.ptr).alphaPlane;
        if ptr.is_null() {
            return Err(PyjamazError::Encode {
                format: crate::format::FormatTag::Avif,
                reason: "alpha plane not allocated".to_string(),
            });
        }
        Ok(ptr)
    }

    #[must_use]
    pub fn alpha_row_bytes(&self) -> usize {
        unsafe { (*self.ptr).alphaRowBytes as usize }
    }

    /// # Safety
    /// The returned pointer must not outlive `self`.
    pub unsafe fn as_mut_ptr(&mut self) -> *mut avifImage {
        self.ptr
    }
}

impl Drop for SafeAvifImage {
    fn drop(&mut self) {
        unsafe {
            if !self.ptr.is_null() {
                avifImageDestroy(self.ptr);
            }
        }
    }
}

/// Owns an `avifEncoder*` for its lifetime.
pub struct SafeAvifEncoder {
    ptr: *mut avifEncoder,
}

impl SafeAvifEncoder {
    pub fn new() -> Result<Self> {
        let ptr = unsafe { avifEncoderCreate() };
        if ptr.is_null() {
            return Err(PyjamazError::Encode {
                format: crate::format::FormatTag::Avif,
                reason: "avifEncoderCreate returned null".to_string(),
            });
        }
        Ok(Self { ptr })
    }

    pub fn configure(&mut self, quality: u8, quality_alpha: u8, speed: i32, max_threads: i32) {
        unsafe {
            (*self.ptr).quality = i32::from(quality);
            (*self.ptr).qualityAlpha = i32::from(quality_alpha);
            (*self.ptr).speed = speed;
            (*self.ptr).maxThreads = max_threads;
        }
    }

    pub fn add_image(&mut self, image: &mut SafeAvifImage, duration: u64, flags: u32) -> Result<()> {
        let result = unsafe { avifEncoderAddImage(self.ptr, image.as_mut_ptr(), duration, flags) };
        if result != AVIF_RESULT_OK {
            return Err(PyjamazError::Encode {
                format: crate::format::FormatTag::Avif,
                reason: format!("avifEncoderAddImage failed: {result:?}"),
            });
        }
        Ok(())
    }

    pub fn finish(&mut self, output: &mut SafeAvifRwData) -> Result<()> {
        let result = unsafe { avifEncoderFinish(self.ptr, output.as_mut_ptr()) };
        if result != AVIF_RESULT_OK {
            return Err(PyjamazError::Encode {
                format: crate::format::FormatTag::Avif,
                reason: format!("avifEncoderFinish failed: {result:?}"),
            });
        }
        Ok(())
    }
}

impl Drop for SafeAvifEncoder {
    fn drop(&mut self) {
        unsafe {
            if !self.ptr.is_null() {
                avifEncoderDestroy(self.ptr);
            }
        }
    }
}

/// Owns the output buffer libavif allocates for the finished bitstream.
pub struct SafeAvifRwData {
    data: avifRWData,
}

impl SafeAvifRwData {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: unsafe { std::mem::zeroed() },
        }
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        if self.data.data.is_null() || self.data.size == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(self.data.data, self.data.size) }.to_vec()
        }
    }

    /// # Safety
    /// The returned pointer must not outlive `self`.
    pub unsafe fn as_mut_ptr(&mut self) -> *mut avifRWData {
        &mut self.data
    }
}

impl Default for SafeAvifRwData {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SafeAvifRwData {
    fn drop(&mut self) {
        unsafe {
            avifRWDataFree(&mut self.data);
        }
    }
}

/// Build an `avifRGBImage` describing `pixels` as an RGBA8 view of
/// `image`, ready to hand to [`SafeAvifImage::rgb_to_yuv`].
pub fn create_rgb_image(
    image: &mut SafeAvifImage,
    pixels: &[u8],
    width: u32,
    height: u32,
) -> Result<avifRGBImage> {
    validate_dimensions(width, height)?;

    let row_bytes: u32 = width.checked_mul(4).ok_or_else(|| PyjamazError::Encode {
        format: crate::format::FormatTag::Avif,
        reason: "row bytes overflow".to_string(),
    })?;
    let total: usize = (row_bytes as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| PyjamazError::Encode {
            format: crate::format::FormatTag::Avif,
            reason: "pixel buffer size overflow".to_string(),
        })?;
    if pixels.len() != total {
        return Err(PyjamazError::Encode {
            format: crate::format::FormatTag::Avif,
            reason: "pixel buffer length does not match width*height*4".to_string(),
        });
    }

    let mut rgb: avifRGBImage = unsafe { std::mem::zeroed() };
    unsafe {
        avifRGBImageSetDefaults(&mut rgb, image.as_mut_ptr());
        rgb.format = AVIF_RGB_FORMAT_RGBA;
        rgb.depth = 8;
        rgb.pixels = pixels.as_ptr() as *mut u8;
        rgb.rowBytes = row_bytes;
    }
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_zero_dimensions() {
        let err = SafeAvifImage::new(0, 10, 8, AVIF_PIXEL_FORMAT_YUV420).unwrap_err();
        assert!(matches!(err, PyjamazError::Encode { .. }));
    }

    #[test]
    fn new_rejects_dimension_limits() {
        let over = MAX_DIMENSION + 1;
        let err = SafeAvifImage::new(over, 10, 8, AVIF_PIXEL_FORMAT_YUV420).unwrap_err();
        assert!(matches!(err, PyjamazError::Encode { .. }));
    }

    #[test]
    fn create_rgb_image_sets_row_bytes() {
        let mut img = SafeAvifImage::new(4, 2, 8, AVIF_PIXEL_FORMAT_YUV420).unwrap();
        let pixels = [0u8; 32];
        let rgb = create_rgb_image(&mut img, &pixels, 4, 2).unwrap();
        assert_eq!(rgb.rowBytes, 16);
        assert_eq!(rgb.format, AVIF_RGB_FORMAT_RGBA);
    }

    #[test]
    fn create_rgb_image_rejects_length_mismatch() {
        let mut img = SafeAvifImage::new(4, 2, 8, AVIF_PIXEL_FORMAT_YUV420).unwrap();
        let pixels = [0u8; 4];
        let err = create_rgb_image(&mut img, &pixels, 4, 2).unwrap_err();
        assert!(matches!(err, PyjamazError::Encode { .. }));
    }
}
