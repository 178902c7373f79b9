//! Stable C ABI surface. Every entry point validates its pointers before
//! use and every heap allocation made here is freed here or by
//! `pyj_free_result` — nothing crosses the boundary relying on the
//! caller's allocator.

use std::ffi::CString;
use std::os::raw::c_char;
use std::slice;

use crate::engine;
use crate::format::FormatTag;
use crate::metric::Metric;
use crate::request::{CacheConfig, OptimizationRequest};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Mirrors [`OptimizationRequest`] at a stable, `repr(C)` layout.
#[repr(C)]
pub struct OptimizeOptions {
    pub input_bytes: *const u8,
    pub input_len: usize,
    pub max_bytes: u32,
    pub max_diff: f64,
    pub metric: u8,
    pub formats: *const u8,
    pub formats_len: usize,
    pub concurrency: u32,
    pub cache_enabled: u8,
    pub cache_dir: *const u8,
    pub cache_dir_len: usize,
    pub cache_max_size: u64,
}

/// Mirrors [`crate::candidate::EncodedCandidate`] plus the error channel,
/// at a stable `repr(C)` layout. Owned fields (`output_bytes`,
/// `error_message`) must be released via [`pyj_free_result`].
#[repr(C)]
pub struct OptimizeResult {
    pub output_bytes: *mut u8,
    pub output_len: usize,
    pub format: u8,
    pub diff_value: f64,
    pub passed: u8,
    pub error_message: *mut c_char,
    pub error_len: usize,
}

impl OptimizeResult {
    fn success(format: FormatTag, diff: f64, passed: bool, bytes: Vec<u8>) -> Self {
        let mut boxed = bytes.into_boxed_slice();
        let output_bytes = boxed.as_mut_ptr();
        let output_len = boxed.len();
        std::mem::forget(boxed);
        Self {
            output_bytes,
            output_len,
            format: format.abi_code(),
            diff_value: diff,
            passed: u8::from(passed),
            error_message: std::ptr::null_mut(),
            error_len: 0,
        }
    }

    fn failure(message: &str) -> Self {
        let error_len = message.len();
        let c_string = CString::new(message.replace('\0', "")).unwrap_or_default();
        Self {
            output_bytes: std::ptr::null_mut(),
            output_len: 0,
            format: 0,
            diff_value: 0.0,
            passed: 0,
            error_message: c_string.into_raw(),
            error_len,
        }
    }

    fn no_candidate() -> Self {
        Self {
            output_bytes: std::ptr::null_mut(),
            output_len: 0,
            format: 0,
            diff_value: 0.0,
            passed: 0,
            error_message: std::ptr::null_mut(),
            error_len: 0,
        }
    }
}

/// Static version string, NUL-terminated. No ownership transfer — do not
/// free the returned pointer.
#[no_mangle]
pub extern "C" fn pyj_version() -> *const c_char {
    VERSION.as_ptr().cast()
}

/// Run one optimization. `options` must be non-null and point to a fully
/// initialized [`OptimizeOptions`]. Returns a heap-allocated
/// [`OptimizeResult`] that the caller must release via
/// [`pyj_free_result`]; never returns null.
///
/// # Safety
/// `options` must be non-null, properly aligned, and every pointer field
/// it names (`input_bytes`, `formats`, `cache_dir`) must be valid for
/// reads of the corresponding `*_len` for the duration of this call.
#[no_mangle]
pub unsafe extern "C" fn pyj_optimize(options: *const OptimizeOptions) -> *mut OptimizeResult {
    let result = if options.is_null() {
        OptimizeResult::failure("options pointer is null")
    } else {
        match run(&*options) {
            Ok(Some((format, diff, bytes))) => OptimizeResult::success(format, diff, true, bytes),
            Ok(None) => OptimizeResult::no_candidate(),
            Err(message) => OptimizeResult::failure(&message),
        }
    };
    Box::into_raw(Box::new(result))
}

unsafe fn run(options: &OptimizeOptions) -> Result<Option<(FormatTag, f64, Vec<u8>)>, String> {
    if options.input_bytes.is_null() || options.input_len == 0 {
        return Err("input_bytes is null or empty".to_string());
    }
    if options.formats.is_null() || options.formats_len == 0 {
        return Err("formats is null or empty".to_string());
    }
    const MAX_PATH_LEN: usize = 4096;
    if options.cache_enabled != 0 && options.cache_dir_len > MAX_PATH_LEN {
        return Err(format!("cache_dir exceeds {MAX_PATH_LEN} bytes"));
    }

    let input = slice::from_raw_parts(options.input_bytes, options.input_len).to_vec();
    let format_codes = slice::from_raw_parts(options.formats, options.formats_len);
    let formats = format_codes
        .iter()
        .map(|&code| {
            FormatTag::from_abi_code(code).ok_or_else(|| format!("unknown format code {code}"))
        })
        .collect::<Result<Vec<_>, String>>()?;

    let metric = match options.metric {
        0 => Metric::Dssim,
        1 => Metric::Ssimulacra2,
        2 => Metric::None,
        other => return Err(format!("unknown metric code {other}")),
    };

    let cache = if options.cache_enabled != 0 {
        if options.cache_dir.is_null() {
            None
        } else {
            let dir_bytes = slice::from_raw_parts(options.cache_dir, options.cache_dir_len);
            let dir = std::str::from_utf8(dir_bytes)
                .map_err(|e| format!("cache_dir is not valid UTF-8: {e}"))?;
            Some(CacheConfig {
                directory: std::path::PathBuf::from(dir),
                max_size_bytes: options.cache_max_size,
            })
        }
    } else {
        None
    };

    let request = OptimizationRequest {
        input,
        max_bytes: options.max_bytes,
        max_diff: options.max_diff,
        metric,
        formats,
        concurrency: options.concurrency.max(1),
        flatten_color: [255, 255, 255],
        cache,
    };

    let outcome = engine::optimize(&request).map_err(|e| e.to_string())?;
    Ok(outcome
        .selected
        .map(|candidate| (candidate.format, candidate.diff, candidate.bytes)))
}

/// Release a result returned by [`pyj_optimize`], including its owned
/// byte buffer and error message. Safe to call with a null pointer (a
/// no-op), and safe to call at most once per result.
///
/// # Safety
/// `result`, if non-null, must have been returned by [`pyj_optimize`] and
/// not yet freed.
#[no_mangle]
pub unsafe extern "C" fn pyj_free_result(result: *mut OptimizeResult) {
    if result.is_null() {
        return;
    }
    let boxed = Box::from_raw(result);
    if !boxed.output_bytes.is_null() {
        let _ = Vec::from_raw_parts(boxed.output_bytes, boxed.output_len, boxed.output_len);
    }
    if !boxed.error_message.is_null() {
        let _ = CString::from_raw(boxed.error_message);
    }
}

/// Release process-global resources. Currently a no-op: this crate
/// allocates per-call thread pools and opens the cache fresh on each
/// `optimize` call rather than holding process-global handles, so there
/// is nothing to tear down yet. Present for ABI stability should that
/// change.
#[no_mangle]
pub extern "C" fn pyj_cleanup() {}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        use image::{ImageBuffer, Rgb};
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 5) as u8, (y * 9) as u8, ((x + y) * 2) as u8])
        });
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn version_is_a_valid_nul_terminated_string() {
        let ptr = pyj_version();
        assert!(!ptr.is_null());
        let c_str = unsafe { std::ffi::CStr::from_ptr(ptr) };
        assert!(!c_str.to_str().unwrap().is_empty());
    }

    #[test]
    fn null_options_pointer_is_reported_as_a_failure_not_a_crash() {
        unsafe {
            let result = pyj_optimize(std::ptr::null());
            assert!(!result.is_null());
            assert_eq!((*result).output_len, 0);
            assert!((*result).error_len > 0);
            pyj_free_result(result);
        }
    }

    #[test]
    fn free_result_is_a_no_op_on_null() {
        unsafe {
            pyj_free_result(std::ptr::null_mut());
        }
    }

    #[test]
    fn round_trips_a_basic_request_through_the_abi() {
        let bytes = png_bytes(8, 8);
        let formats = [FormatTag::Png.abi_code()];
        let options = OptimizeOptions {
            input_bytes: bytes.as_ptr(),
            input_len: bytes.len(),
            max_bytes: 0,
            max_diff: 0.0,
            metric: 2, // none
            formats: formats.as_ptr(),
            formats_len: formats.len(),
            concurrency: 1,
            cache_enabled: 0,
            cache_dir: std::ptr::null(),
            cache_dir_len: 0,
            cache_max_size: 0,
        };
        unsafe {
            let result = pyj_optimize(&options);
            assert!(!result.is_null());
            assert_eq!((*result).error_len, 0);
            assert!((*result).output_len > 0);
            assert_eq!((*result).passed, 1);
            pyj_free_result(result);
        }
    }
}
