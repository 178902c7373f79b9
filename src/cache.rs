//! Content-addressed, on-disk result cache.
//!
//! Layout: a blob file `<64-hex-key>.<ext>` holding the encoded bytes and
//! a sidecar `<64-hex-key>.meta` holding a small fixed-layout record next
//! to it. Writes go through `write_atomic` (temp-file-then-rename) so a
//! crash never leaves a torn entry visible. The in-memory index is an
//! `lru`-ordered map loaded once at open time by scanning sidecars, so
//! `lookup`/`put` don't re-read the directory on every call.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use lru::LruCache;
use parking_lot::Mutex;

use crate::format::FormatTag;
use crate::metric::Metric;

/// Bounded at most this many evictions per `put`, so a pathological cache
/// size configuration can't turn one `put` into an unbounded loop.
const MAX_EVICTIONS_PER_PUT: usize = 1000;

const SIDECAR_EXT: &str = "meta";

/// One resolved cache hit.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: [u8; 32],
    pub format: FormatTag,
    pub bytes: Vec<u8>,
    pub diff: f64,
    pub last_access_ns: u64,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    format: FormatTag,
    diff: f64,
    size: u64,
    last_access_ns: u64,
}

/// Compute the cache key for a request: a BLAKE3 hash of the input bytes
/// and the normalized, order-independent request options that affect the
/// result.
#[must_use]
pub fn compute_key(
    input_bytes: &[u8],
    max_bytes: u32,
    max_diff: f64,
    metric: Metric,
    formats: &[FormatTag],
) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(input_bytes);
    hasher.update(&max_bytes.to_be_bytes());
    hasher.update(&max_diff.to_be_bytes());
    hasher.update(&[metric_code(metric)]);
    hasher.update(&[format_set_bitmask(formats)]);
    *hasher.finalize().as_bytes()
}

fn metric_code(metric: Metric) -> u8 {
    match metric {
        Metric::Dssim => 0,
        Metric::Ssimulacra2 => 1,
        Metric::None => 2,
    }
}

fn format_set_bitmask(formats: &[FormatTag]) -> u8 {
    formats.iter().fold(0u8, |mask, f| mask | (1 << f.abi_code()))
}

fn key_hex(key: &[u8; 32]) -> String {
    key.iter().map(|b| format!("{b:02x}")).collect()
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// The on-disk cache. Cheap to clone (an `Arc`-backed handle would be the
/// natural extension; for now callers share one instance behind a
/// reference since the facade serializes access through a single engine
/// call at a time).
pub struct Cache {
    directory: PathBuf,
    max_size_bytes: u64,
    index: Mutex<LruCache<[u8; 32], IndexEntry>>,
}

impl Cache {
    /// Open (creating if necessary) the cache directory and load its
    /// index by scanning sidecar files. Malformed sidecars are skipped,
    /// never treated as a fatal error.
    pub fn open(directory: impl Into<PathBuf>, max_size_bytes: u64) -> std::io::Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;

        let mut entries: Vec<([u8; 32], IndexEntry)> = Vec::new();
        if let Ok(read_dir) = std::fs::read_dir(&directory) {
            for dir_entry in read_dir.flatten() {
                let path = dir_entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(SIDECAR_EXT) {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let Some(key) = parse_hex_key(stem) else {
                    continue;
                };
                if let Some(index_entry) = read_sidecar(&path) {
                    entries.push((key, index_entry));
                }
            }
        }
        entries.sort_by_key(|(_, e)| e.last_access_ns);

        let mut index = LruCache::unbounded();
        for (key, entry) in entries {
            index.put(key, entry);
        }

        Ok(Self {
            directory,
            max_size_bytes,
            index: Mutex::new(index),
        })
    }

    fn blob_path(&self, key: &[u8; 32], format: FormatTag) -> PathBuf {
        self.directory.join(format!("{}.{}", key_hex(key), format.extension()))
    }

    fn sidecar_path(&self, key: &[u8; 32]) -> PathBuf {
        self.directory.join(format!("{}.{SIDECAR_EXT}", key_hex(key)))
    }

    /// Look up `key`, touching its recency on a hit.
    #[must_use]
    pub fn lookup(&self, key: &[u8; 32]) -> Option<CacheEntry> {
        let format = {
            let mut index = self.index.lock();
            let entry = index.get_mut(key)?;
            entry.last_access_ns = now_ns();
            entry.format
        };

        let blob_path = self.blob_path(key, format);
        let bytes = std::fs::read(&blob_path).ok()?;

        let (diff, last_access_ns) = {
            let index = self.index.lock();
            let entry = index.peek(key)?;
            (entry.diff, entry.last_access_ns)
        };

        // Persist the touched recency so it survives a restart; a failure
        // here only costs cache precision, never correctness.
        let _ = write_sidecar(
            &self.sidecar_path(key),
            &IndexEntry {
                format,
                diff,
                size: bytes.len() as u64,
                last_access_ns,
            },
        );

        Some(CacheEntry {
            key: *key,
            format,
            bytes,
            diff,
            last_access_ns,
        })
    }

    /// Insert `bytes` under `key`, evicting in strict LRU order (ties
    /// broken by lexicographic key order) if the cache would exceed
    /// `max_size_bytes`. Bounded at [`MAX_EVICTIONS_PER_PUT`] evictions.
    pub fn put(&self, key: [u8; 32], format: FormatTag, bytes: &[u8], diff: f64) {
        let entry = IndexEntry {
            format,
            diff,
            size: bytes.len() as u64,
            last_access_ns: now_ns(),
        };

        if write_atomic::write_file(self.blob_path(&key, format), bytes).is_err() {
            log::warn!("cache: failed to write blob for key {}", key_hex(&key));
            return;
        }
        if write_sidecar(&self.sidecar_path(&key), &entry).is_err() {
            log::warn!("cache: failed to write sidecar for key {}", key_hex(&key));
            return;
        }

        let mut index = self.index.lock();
        index.put(key, entry);
        self.evict_if_needed(&mut index);
    }

    fn total_size(index: &LruCache<[u8; 32], IndexEntry>) -> u64 {
        index.iter().map(|(_, e)| e.size).sum()
    }

    fn evict_if_needed(&self, index: &mut LruCache<[u8; 32], IndexEntry>) {
        let mut evictions = 0usize;
        while Self::total_size(index) > self.max_size_bytes && evictions < MAX_EVICTIONS_PER_PUT {
            let Some(victim) = self.next_eviction_victim(index) else {
                break;
            };
            if let Some((_, evicted)) = index.pop_entry(&victim) {
                let _ = std::fs::remove_file(self.blob_path(&victim, evicted.format));
                let _ = std::fs::remove_file(self.sidecar_path(&victim));
            }
            evictions += 1;
        }
        if evictions >= MAX_EVICTIONS_PER_PUT && Self::total_size(index) > self.max_size_bytes {
            log::warn!(
                "cache: still over max_size_bytes ({}) after {MAX_EVICTIONS_PER_PUT} evictions",
                self.max_size_bytes
            );
        }
    }

    /// Smallest `last_access_ns`, ties broken by lexicographic key order
    /// (this resolves the open question left by the strict-LRU spec: two
    /// entries written in the same nanosecond need a deterministic
    /// secondary key).
    fn next_eviction_victim(&self, index: &LruCache<[u8; 32], IndexEntry>) -> Option<[u8; 32]> {
        index
            .iter()
            .min_by(|(key_a, a), (key_b, b)| {
                a.last_access_ns
                    .cmp(&b.last_access_ns)
                    .then_with(|| key_a.cmp(key_b))
            })
            .map(|(key, _)| *key)
    }

    /// Remove every entry. Idempotent.
    pub fn clear(&self) {
        let mut index = self.index.lock();
        let keys: Vec<[u8; 32]> = index.iter().map(|(k, _)| *k).collect();
        for key in keys {
            if let Some((_, entry)) = index.pop_entry(&key) {
                let _ = std::fs::remove_file(self.blob_path(&key, entry.format));
            }
            let _ = std::fs::remove_file(self.sidecar_path(&key));
        }
    }
}

fn parse_hex_key(hex: &str) -> Option<[u8; 32]> {
    if hex.len() != 64 {
        return None;
    }
    let mut key = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks_exact(2).enumerate() {
        let byte_str = std::str::from_utf8(chunk).ok()?;
        key[i] = u8::from_str_radix(byte_str, 16).ok()?;
    }
    Some(key)
}

/// Sidecar layout, little-endian, forward-compatible (unknown trailing
/// bytes are ignored; a record shorter than `MIN_LEN` is malformed and
/// skipped):
/// `[version: u8][format: u8][diff: f64; 8][size: u64; 8][last_access_ns: u64; 8]`
const SIDECAR_VERSION: u8 = 1;
const SIDECAR_MIN_LEN: usize = 1 + 1 + 8 + 8 + 8;

fn write_sidecar(path: &Path, entry: &IndexEntry) -> std::io::Result<()> {
    let mut buf = Vec::with_capacity(SIDECAR_MIN_LEN);
    buf.push(SIDECAR_VERSION);
    buf.push(entry.format.abi_code());
    buf.extend_from_slice(&entry.diff.to_le_bytes());
    buf.extend_from_slice(&entry.size.to_le_bytes());
    buf.extend_from_slice(&entry.last_access_ns.to_le_bytes());
    write_atomic::write_file(path, &buf)
}

fn read_sidecar(path: &Path) -> Option<IndexEntry> {
    let bytes = std::fs::read(path).ok()?;
    if bytes.len() < SIDECAR_MIN_LEN || bytes[0] != SIDECAR_VERSION {
        return None;
    }
    let format = FormatTag::from_abi_code(bytes[1])?;
    let diff = f64::from_le_bytes(bytes[2..10].try_into().ok()?);
    let size = u64::from_le_bytes(bytes[10..18].try_into().ok()?);
    let last_access_ns = u64::from_le_bytes(bytes[18..26].try_into().ok()?);
    Some(IndexEntry {
        format,
        diff,
        size,
        last_access_ns,
    })
}
