//! Download cache for the asset fetcher.
//!
//! Re-running a build should not re-download every image. This module
//! records what was fetched so an unchanged asset can be skipped.
//!
//! # Design
//!
//! The cache is keyed by **destination path** (relative to the asset
//! directory) and stores two hashes:
//!
//! - **`url_hash`**: SHA-256 of the source URL. Pointing an asset at a new
//!   URL invalidates its entry.
//! - **`content_hash`**: SHA-256 of the bytes written. A hit requires the
//!   file on disk to still hash to this value, so a hand-edited or truncated
//!   file is fetched again.
//!
//! A cache hit therefore requires:
//! 1. An entry for the destination exists
//! 2. Its `url_hash` matches the asset's current URL
//! 3. The destination file exists and its content hash matches
//!
//! ## Storage
//!
//! The manifest is a JSON file at `<dest_dir>/.fetch-manifest.json`, next
//! to the assets it describes.
//!
//! ## Bypassing the cache
//!
//! Pass `--no-cache` to `build` or `fetch`. The freshness check is skipped,
//! so every asset is downloaded, but the existing manifest is still loaded
//! and updated. An asset that fails to download keeps its previous entry.
//!
//! ## Pruning
//!
//! The asset list is authoritative for its directory. Entries whose
//! destination is no longer listed are dropped before the manifest is saved.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io;
use std::path::Path;

/// Name of the cache manifest file within the asset directory.
const MANIFEST_FILENAME: &str = ".fetch-manifest.json";

/// Version of the cache manifest format. Bump to invalidate existing caches.
const MANIFEST_VERSION: u32 = 1;

/// Cache record for one downloaded file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub url_hash: String,
    pub content_hash: String,
}

/// On-disk manifest mapping destination paths to their cache entries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FetchManifest {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl FetchManifest {
    /// Create an empty manifest (first run).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load from the asset directory. Returns an empty manifest if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(dest_dir: &Path) -> Self {
        let path = dest_dir.join(MANIFEST_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "ignoring unreadable fetch manifest");
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest
    }

    /// Save to the asset directory.
    pub fn save(&self, dest_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        crate::document::write_atomic(&dest_dir.join(MANIFEST_FILENAME), json.as_bytes())
    }

    /// Whether `rel_path` under `dest_dir` is an up-to-date copy of `url`.
    pub fn is_fresh(&self, rel_path: &str, url: &str, dest_dir: &Path) -> bool {
        let Some(entry) = self.entries.get(rel_path) else {
            return false;
        };
        if entry.url_hash != hash_url(url) {
            return false;
        }
        match hash_file(&dest_dir.join(rel_path)) {
            Ok(hash) => hash == entry.content_hash,
            Err(_) => false,
        }
    }

    /// Record a completed download.
    pub fn insert(&mut self, rel_path: String, url: &str, content_hash: String) {
        self.entries.insert(
            rel_path,
            CacheEntry {
                url_hash: hash_url(url),
                content_hash,
            },
        );
    }

    /// Drop every entry whose path is not in `keep`. Returns how many were
    /// removed.
    pub fn retain_paths<'a>(&mut self, keep: impl IntoIterator<Item = &'a str>) -> usize {
        let keep: HashSet<&str> = keep.into_iter().collect();
        let before = self.entries.len();
        self.entries.retain(|path, _| keep.contains(path.as_str()));
        before - self.entries.len()
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// SHA-256 of a byte slice as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 of a source URL.
pub fn hash_url(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"url\0");
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a fetch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub downloads: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.downloads
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} downloaded ({} total)",
                self.hits,
                self.downloads,
                self.total()
            )
        } else {
            write!(f, "{} downloaded", self.downloads)
        }
    }
}
