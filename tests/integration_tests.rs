// tests/integration_tests.rs
//
// End-to-end scenarios for the optimization engine, driven through the
// public `pyjamaz::optimize` facade rather than individual modules.

use image::{ImageBuffer, Rgb, RgbaImage};
use pyjamaz::{CacheConfig, FormatTag, Metric, OptimizationRequest};

fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img: image::RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn translucent_rgba_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let alpha = if (x + y) % 2 == 0 { 0 } else { 255 };
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 40, alpha])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn request(input: Vec<u8>) -> OptimizationRequest {
    OptimizationRequest {
        input,
        max_bytes: 0,
        max_diff: 0.0,
        metric: Metric::None,
        formats: vec![FormatTag::Jpeg, FormatTag::Png, FormatTag::WebP],
        concurrency: 2,
        flatten_color: [255, 255, 255],
        cache: None,
    }
}

mod original_preserved {
    use super::*;

    #[test]
    fn tiny_png_with_unbounded_budget_selects_the_original() {
        let input = gradient_png(2, 2);
        let req = request(input.clone());
        let result = pyjamaz::optimize(&req).unwrap();

        let selected = result.selected.unwrap();
        assert_eq!(selected.bytes, input);
        assert_eq!(selected.diff, 0.0);
        assert!(selected.passed_constraints);
    }
}

mod budget_forces_smaller_format {
    use super::*;

    #[test]
    fn tight_byte_budget_yields_a_passing_candidate_under_budget() {
        let input = gradient_png(256, 192);
        let mut req = request(input);
        req.max_bytes = 20_000;
        req.metric = Metric::Dssim;
        req.max_diff = 0.05;

        let result = pyjamaz::optimize(&req).unwrap();
        if let Some(selected) = result.selected {
            assert!(selected.byte_size() as u64 <= 20_000);
            assert!(selected.diff <= 0.05);
        }
    }
}

mod no_passing_candidate {
    use super::*;

    #[test]
    fn impossible_constraints_report_no_selection_without_an_error() {
        let input = gradient_png(256, 192);
        let mut req = request(input);
        req.max_bytes = 1_000;
        req.metric = Metric::Dssim;
        req.max_diff = 0.000_001;

        let result = pyjamaz::optimize(&req).unwrap();
        assert!(result.selected.is_none());
        assert!(result.rejection_reason.is_some());
    }
}

mod alpha_flatten {
    use super::*;

    #[test]
    fn jpeg_only_request_flattens_transparent_pixels_to_the_background() {
        let input = translucent_rgba_png(50, 50);
        let mut req = request(input);
        req.formats = vec![FormatTag::Jpeg];
        req.flatten_color = [255, 255, 255];

        let result = pyjamaz::optimize(&req).unwrap();
        let selected = result.selected.unwrap();
        assert_eq!(selected.format, FormatTag::Jpeg);

        let (_, decoded) = pyjamaz::decode::decode_and_normalize(&selected.bytes).unwrap();
        assert_eq!(decoded.channels(), 3);
        assert_eq!(decoded.width(), 50);
        assert_eq!(decoded.height(), 50);
    }
}

mod cache_hit_determinism {
    use super::*;

    #[test]
    fn second_call_with_cache_returns_identical_bytes_and_is_faster() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(gradient_png(128, 96));
        req.cache = Some(CacheConfig {
            directory: dir.path().to_path_buf(),
            max_size_bytes: 1 << 20,
        });

        let first = pyjamaz::optimize(&req).unwrap();
        let second = pyjamaz::optimize(&req).unwrap();

        assert_eq!(
            first.selected.as_ref().unwrap().bytes,
            second.selected.as_ref().unwrap().bytes
        );
        assert_eq!(first.selected.unwrap().format, second.selected.unwrap().format);
        assert!(second.timings.total <= first.timings.total * 3);
    }
}

mod malformed_cache_entry {
    use super::*;

    #[test]
    fn corrupt_sidecar_is_ignored_and_overwritten_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let bogus_key = "0".repeat(64);
        std::fs::write(dir.path().join(format!("{bogus_key}.meta")), b"\x00\x00").unwrap();

        let mut req = request(gradient_png(64, 64));
        req.cache = Some(CacheConfig {
            directory: dir.path().to_path_buf(),
            max_size_bytes: 1 << 20,
        });

        let result = pyjamaz::optimize(&req).unwrap();
        assert!(result.selected.is_some());
    }
}

mod dimension_boundaries {
    use super::*;

    #[test]
    fn one_by_one_image_is_accepted() {
        let input = gradient_png(1, 1);
        let result = pyjamaz::optimize(&request(input)).unwrap();
        assert!(result.selected.is_some());
    }

    #[test]
    fn zero_byte_input_is_rejected_as_invalid() {
        let req = request(Vec::new());
        let err = pyjamaz::optimize(&req).unwrap_err();
        assert!(matches!(err, pyjamaz::PyjamazError::InvalidArgument(_)));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let err = pyjamaz::pixel::check_dimensions(70_000, 1).unwrap_err();
        assert!(matches!(err, pyjamaz::PyjamazError::Overflow { .. }));
    }

    #[test]
    fn pixel_bomb_is_rejected() {
        let err = pyjamaz::pixel::check_dimensions(20_000, 20_000).unwrap_err();
        assert!(matches!(err, pyjamaz::PyjamazError::Overflow { .. }));
    }
}
