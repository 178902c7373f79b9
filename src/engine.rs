//! The facade: one call in, one result out. Everything else in this
//! crate is a building block this module wires together.

use std::time::Instant;

use crate::cache::{self, Cache};
use crate::candidate::EncodedCandidate;
use crate::decode::decode_and_normalize;
use crate::error::Result;
use crate::generator::{generate, GeneratedCandidate};
use crate::request::{OptimizationRequest, OptimizationResult, Timings};
use crate::selector::select;

/// Run one optimization request end to end.
///
/// Order of operations: decode and normalize the input, consult the
/// cache (if configured), generate any missing candidates, insert the
/// original-file candidate first (so it wins true ties), select, and —
/// on a successful selection that wasn't already a cache hit — write the
/// winner back to the cache. Cache errors are always logged and
/// absorbed; they never change the outcome of a request.
pub fn optimize(request: &OptimizationRequest) -> Result<OptimizationResult> {
    request.validate()?;
    let total_started = Instant::now();

    let decode_started = Instant::now();
    let (original_format, reference) = decode_and_normalize(&request.input)?;
    let decode_time = decode_started.elapsed();

    let cache = request.cache.as_ref().and_then(|config| {
        match Cache::open(&config.directory, config.max_size_bytes) {
            Ok(cache) => Some(cache),
            Err(e) => {
                log::warn!("cache: failed to open {:?}: {e}", config.directory);
                None
            }
        }
    });

    let cache_key = cache.as_ref().map(|_| {
        cache::compute_key(
            &request.input,
            request.max_bytes,
            request.max_diff,
            request.metric,
            &request.formats,
        )
    });

    if let (Some(cache), Some(key)) = (cache.as_ref(), cache_key) {
        if let Some(hit) = cache.lookup(&key) {
            log::debug!("cache hit for key {}", hex_prefix(&key));
            let total_time = total_started.elapsed();
            let candidate = EncodedCandidate {
                format: hit.format,
                bytes: hit.bytes,
                quality: 0,
                diff: hit.diff,
                passed_constraints: true,
                encode_time: std::time::Duration::ZERO,
            };
            return Ok(OptimizationResult {
                selected: Some(candidate.clone()),
                all_candidates: vec![candidate],
                timings: Timings {
                    decode: decode_time,
                    generate: std::time::Duration::ZERO,
                    select: std::time::Duration::ZERO,
                    total: total_time,
                },
                diagnostics: vec!["served from cache".to_string()],
                rejection_reason: None,
            });
        }
    }

    let generate_started = Instant::now();
    let generated = generate(
        &reference,
        &request.formats,
        request.max_bytes,
        request.metric,
        request.flatten_color,
        request.concurrency,
    );
    let generate_time = generate_started.elapsed();

    let mut diagnostics = Vec::new();
    let mut candidates = vec![EncodedCandidate::original(
        original_format,
        request.input.clone(),
        true,
    )];
    for outcome in generated {
        match outcome {
            GeneratedCandidate::Ok(candidate) => candidates.push(candidate),
            GeneratedCandidate::Failed { format, reason } => {
                diagnostics.push(format!("{format} failed: {reason}"));
            }
        }
    }

    let select_started = Instant::now();
    let (selected_idx, rejection_reason) = select(&candidates, request.max_bytes, request.max_diff);
    let select_time = select_started.elapsed();

    let selected = selected_idx.map(|idx| candidates[idx].clone());

    if let (Some(cache), Some(key), Some(candidate)) = (cache.as_ref(), cache_key, selected.as_ref())
    {
        cache.put(key, candidate.format, &candidate.bytes, candidate.diff);
    }

    let total_time = total_started.elapsed();
    Ok(OptimizationResult {
        selected,
        all_candidates: candidates,
        timings: Timings {
            decode: decode_time,
            generate: generate_time,
            select: select_time,
            total: total_time,
        },
        diagnostics,
        rejection_reason,
    })
}

fn hex_prefix(key: &[u8; 32]) -> String {
    key[..4].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatTag;
    use crate::metric::Metric;

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

    fn minimal_request(input: Vec<u8>) -> OptimizationRequest {
        OptimizationRequest {
            input,
            max_bytes: 0,
            max_diff: 0.0,
            metric: Metric::None,
            formats: vec![FormatTag::Png],
            concurrency: 1,
            flatten_color: [255, 255, 255],
            cache: None,
        }
    }

    #[test]
    fn selects_a_candidate_for_a_basic_request() {
        let request = minimal_request(png_bytes(16, 16));
        let result = optimize(&request).unwrap();
        assert!(result.selected.is_some());
        assert!(result.rejection_reason.is_none());
    }

    #[test]
    fn impossible_budget_yields_no_selection_with_reason() {
        let mut request = minimal_request(png_bytes(16, 16));
        request.max_bytes = 1;
        let result = optimize(&request).unwrap();
        assert!(result.selected.is_none());
        assert!(result.rejection_reason.is_some());
    }

    #[test]
    fn second_call_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = minimal_request(png_bytes(16, 16));
        request.cache = Some(crate::request::CacheConfig {
            directory: dir.path().to_path_buf(),
            max_size_bytes: 1 << 20,
        });

        let first = optimize(&request).unwrap();
        assert!(first.selected.is_some());

        let second = optimize(&request).unwrap();
        assert!(second.diagnostics.iter().any(|d| d.contains("cache")));
        assert_eq!(
            second.selected.unwrap().bytes,
            first.selected.unwrap().bytes
        );
    }
}
