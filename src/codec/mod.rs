//! The codec interface and its four implementations.
//!
//! The set is closed by construction: [`FormatTag`] has exactly four
//! variants, [`codec_for`] matches all of them exhaustively, and nothing
//! in the engine reaches for dynamic registration.

mod avif;
mod avif_safe;
mod jpeg;
mod png;
mod webp;

use crate::error::Result;
use crate::format::FormatTag;
use crate::pixel::PixelBuffer;

/// Uniform per-format operations the search and candidate generator drive
/// without knowing which concrete format they're talking to.
pub trait Codec: Send + Sync {
    fn format(&self) -> FormatTag;

    /// Whether this container can carry an alpha channel at all.
    fn supports_alpha(&self) -> bool;

    /// Quality used for an unbounded (`max_bytes == 0`) request.
    fn default_quality(&self) -> u8;

    /// `(q_min, q_max)` the search is allowed to explore. PNG reports a
    /// single point since it has no quality knob (lossless only).
    fn quality_range(&self) -> (u8, u8);

    /// Encode `buffer` at `quality`. Implementations must not mutate
    /// `buffer`. 4-channel input handed to a format without alpha support
    /// is flattened onto `flatten_color` first.
    ///
    /// Post-condition the caller may rely on: on `Ok`, the returned bytes
    /// are non-empty and begin with this format's magic number.
    fn encode(&self, buffer: &PixelBuffer, quality: u8, flatten_color: [u8; 3]) -> Result<Vec<u8>>;
}

struct JpegCodec;
struct PngCodec;
struct WebpCodec;
struct AvifCodec;

impl Codec for JpegCodec {
    fn format(&self) -> FormatTag {
        FormatTag::Jpeg
    }
    fn supports_alpha(&self) -> bool {
        false
    }
    fn default_quality(&self) -> u8 {
        85
    }
    fn quality_range(&self) -> (u8, u8) {
        (1, 100)
    }
    fn encode(&self, buffer: &PixelBuffer, quality: u8, flatten_color: [u8; 3]) -> Result<Vec<u8>> {
        jpeg::encode(buffer, quality, flatten_color)
    }
}

impl Codec for PngCodec {
    fn format(&self) -> FormatTag {
        FormatTag::Png
    }
    fn supports_alpha(&self) -> bool {
        true
    }
    fn default_quality(&self) -> u8 {
        100
    }
    fn quality_range(&self) -> (u8, u8) {
        (100, 100)
    }
    fn encode(&self, buffer: &PixelBuffer, _quality: u8, _flatten_color: [u8; 3]) -> Result<Vec<u8>> {
        png::encode(buffer)
    }
}

impl Codec for WebpCodec {
    fn format(&self) -> FormatTag {
        FormatTag::WebP
    }
    fn supports_alpha(&self) -> bool {
        true
    }
    fn default_quality(&self) -> u8 {
        85
    }
    fn quality_range(&self) -> (u8, u8) {
        (1, 100)
    }
    fn encode(&self, buffer: &PixelBuffer, quality: u8, _flatten_color: [u8; 3]) -> Result<Vec<u8>> {
        webp::encode(buffer, quality)
    }
}

impl Codec for AvifCodec {
    fn format(&self) -> FormatTag {
        FormatTag::Avif
    }
    fn supports_alpha(&self) -> bool {
        true
    }
    fn default_quality(&self) -> u8 {
        50
    }
    fn quality_range(&self) -> (u8, u8) {
        (1, 100)
    }
    fn encode(&self, buffer: &PixelBuffer, quality: u8, _flatten_color: [u8; 3]) -> Result<Vec<u8>> {
        avif::encode(buffer, quality)
    }
}

const JPEG: JpegCodec = JpegCodec;
const PNG: PngCodec = PngCodec;
const WEBP: WebpCodec = WebpCodec;
const AVIF: AvifCodec = AvifCodec;

/// Look up the codec implementation for a format tag. Exhaustive match,
/// no fallback arm — adding a fifth format is a compile error here until
/// a fifth codec is wired in.
#[must_use]
pub fn codec_for(format: FormatTag) -> &'static dyn Codec {
    match format {
        FormatTag::Jpeg => &JPEG,
        FormatTag::Png => &PNG,
        FormatTag::WebP => &WEBP,
        FormatTag::Avif => &AVIF,
    }
}
