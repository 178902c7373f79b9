//! Output container tags and magic-byte sniffing.

use std::fmt;

/// One of the four output containers this crate can produce.
///
/// Closed by design: adding a fifth format means adding a fifth
/// [`crate::codec::Codec`] implementation and a new arm everywhere this
/// enum is matched exhaustively (no catch-all arms on this type anywhere
/// in the engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatTag {
    Jpeg,
    Png,
    WebP,
    Avif,
}

impl FormatTag {
    /// All four formats, in the engine's fixed tie-break order
    /// (highest-priority last): PNG, JPEG, WebP, AVIF.
    pub const ALL: [Self; 4] = [Self::Png, Self::Jpeg, Self::WebP, Self::Avif];

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    /// Tie-break rank used by the selector: higher wins. AVIF > WebP >
    /// JPEG > PNG.
    #[must_use]
    pub const fn tie_break_rank(self) -> u8 {
        match self {
            Self::Png => 0,
            Self::Jpeg => 1,
            Self::WebP => 2,
            Self::Avif => 3,
        }
    }

    /// The wire/ABI discriminator: `0=JPEG, 1=PNG, 2=WebP, 3=AVIF`. Used
    /// in the C ABI's `format` field and in the cache key's format-set
    /// bitmask.
    #[must_use]
    pub const fn abi_code(self) -> u8 {
        match self {
            Self::Jpeg => 0,
            Self::Png => 1,
            Self::WebP => 2,
            Self::Avif => 3,
        }
    }

    /// Inverse of [`Self::abi_code`]. Returns `None` for any value outside
    /// `0..=3`.
    #[must_use]
    pub const fn from_abi_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Jpeg),
            1 => Some(Self::Png),
            2 => Some(Self::WebP),
            3 => Some(Self::Avif),
            _ => None,
        }
    }

    /// Sniff the container format from its leading bytes.
    ///
    /// Returns `None` for anything that doesn't match one of the four
    /// known magic sequences; the caller treats that as a decode error
    /// rather than guessing.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 3 && bytes[0] == 0xFF && bytes[1] == 0xD8 && bytes[2] == 0xFF {
            return Some(Self::Jpeg);
        }
        if bytes.len() >= 8 && bytes[..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
            return Some(Self::Png);
        }
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
            let brand = &bytes[8..12];
            if brand == b"avif" || brand == b"avis" {
                return Some(Self::Avif);
            }
        }
        None
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        })
    }
}
