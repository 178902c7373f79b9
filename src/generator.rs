//! Fans a request's requested formats out across a bounded worker pool,
//! collecting one candidate (or a diagnostic) per format.

use std::time::Instant;

use crate::candidate::EncodedCandidate;
use crate::codec::codec_for;
use crate::decode::{decode_and_normalize, run_with_panic_guard};
use crate::format::FormatTag;
use crate::metric::Metric;
use crate::pixel::PixelBuffer;
use crate::search::search;

/// One per-format outcome: either a candidate, or a reason it couldn't be
/// produced (codec/metric failure never aborts the whole request).
pub enum GeneratedCandidate {
    Ok(EncodedCandidate),
    Failed { format: FormatTag, reason: String },
}

/// Generate one candidate per requested format, in parallel, bounded to
/// `min(concurrency, formats.len())` worker threads.
///
/// Each worker decodes its own encoded bytes back (unless `metric` is
/// [`Metric::None`]) to score against `reference`; a worker panic inside
/// an FFI codec call is caught and reported as a failed candidate rather
/// than unwinding past this call.
pub fn generate(
    reference: &PixelBuffer,
    formats: &[FormatTag],
    max_bytes: u32,
    metric: Metric,
    flatten_color: [u8; 3],
    concurrency: u32,
) -> Vec<GeneratedCandidate> {
    let num_threads = (concurrency as usize).min(formats.len()).max(1);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .unwrap_or_else(|_| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(1)
                .build()
                .expect("single-threaded rayon pool must always build")
        });

    pool.install(|| {
        use rayon::prelude::*;
        formats
            .par_iter()
            .map(|&format| generate_one(reference, format, max_bytes, metric, flatten_color))
            .collect()
    })
}

fn generate_one(
    reference: &PixelBuffer,
    format: FormatTag,
    max_bytes: u32,
    metric: Metric,
    flatten_color: [u8; 3],
) -> GeneratedCandidate {
    let guarded = run_with_panic_guard("generate:one_format", || {
        let codec = codec_for(format);
        let started = Instant::now();
        let outcome = search(codec, reference, max_bytes, flatten_color)?;
        let encode_time = started.elapsed();

        let diff = if matches!(metric, Metric::None) {
            0.0
        } else {
            let (_decoded_format, decoded) = decode_and_normalize(&outcome.bytes)?;
            metric.compute(reference, &decoded)?
        };

        Ok(EncodedCandidate {
            format,
            bytes: outcome.bytes,
            quality: outcome.quality,
            diff,
            passed_constraints: outcome.within_budget,
            encode_time,
        })
    });

    match guarded {
        Ok(candidate) => GeneratedCandidate::Ok(candidate),
        Err(e) => {
            log::debug!("{format} candidate generation failed: {e}");
            GeneratedCandidate::Failed {
                format,
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut bytes = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                bytes.push((x * 5) as u8);
                bytes.push((y * 9) as u8);
                bytes.push(((x + y) * 2) as u8);
            }
        }
        PixelBuffer::new(bytes, width, height, 3).unwrap()
    }

    #[test]
    fn generates_one_candidate_per_format() {
        let buf = gradient(16, 16);
        let formats = [FormatTag::Jpeg, FormatTag::Png];
        let results = generate(&buf, &formats, 0, Metric::None, [255, 255, 255], 2);
        assert_eq!(results.len(), 2);
        for result in results {
            assert!(matches!(result, GeneratedCandidate::Ok(_)));
        }
    }

    #[test]
    fn concurrency_is_bounded_by_format_count() {
        let buf = gradient(8, 8);
        let formats = [FormatTag::Png];
        // concurrency requested far above formats.len(); must not panic
        // building an oversized pool, and must still produce one result.
        let results = generate(&buf, &formats, 0, Metric::None, [255, 255, 255], 64);
        assert_eq!(results.len(), 1);
    }
}
