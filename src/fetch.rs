//! Asset fetcher.
//!
//! Downloads a list of named URLs into a destination directory. Every asset
//! is independent: a failed download is recorded in the [`FetchReport`] and
//! the batch carries on. Nothing is retried.
//!
//! ## Assets file
//!
//! ```toml
//! dest_dir = "images"        # relative to the assets file
//!
//! [[asset]]
//! name = "hero-bg.jpg"
//! url = "https://example.com/hero.jpg"
//! dest = "hero/bg.jpg"       # optional, relative to dest_dir; defaults to name
//! ```
//!
//! ## Parallelism
//!
//! Downloads run on a dedicated rayon pool sized by
//! [`effective_threads`](crate::config::effective_threads). Each asset writes
//! its own file (temp file + rename), so workers never share output. The
//! [`FetchManifest`] is read before the parallel phase and written after it,
//! on the calling thread. Outcomes are reported in input order regardless of
//! completion order.
//!
//! The transport is behind [`AssetSource`] so tests run without a network.

use crate::cache::{self, CacheStats, FetchManifest};
use crate::config::{FetchConfig, effective_threads};
use crate::document::write_atomic;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid asset #{index} ({name}): {reason}")]
    Invalid {
        index: usize,
        name: String,
        reason: String,
    },
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Why a single download failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("HTTP {0}")]
    Http(u16),
    #[error("{0}")]
    Network(String),
}

/// Where asset bytes come from.
///
/// Must be `Sync`: one source is shared by every worker in the pool.
pub trait AssetSource: Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

/// Production source: a blocking HTTP client with a per-request timeout.
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }
}

impl AssetSource for HttpSource {
    fn get(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| SourceError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http(status.as_u16()));
        }
        let body = response
            .bytes()
            .map_err(|e| SourceError::Network(e.to_string()))?;
        Ok(body.to_vec())
    }
}

// ============================================================================
// Asset list
// ============================================================================

/// One asset to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRef {
    /// Logical name, used in reports.
    pub name: String,
    pub url: String,
    /// Destination relative to the asset directory, `/`-separated.
    pub dest: String,
}

/// A batch of assets sharing one destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetList {
    pub dest_dir: PathBuf,
    pub assets: Vec<AssetRef>,
}

impl AssetList {
    /// Number of assets whose destination is already an up-to-date copy.
    pub fn fresh_count(&self, manifest: &FetchManifest) -> usize {
        self.assets
            .iter()
            .filter(|a| manifest.is_fresh(&a.dest, &a.url, &self.dest_dir))
            .count()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AssetsFile {
    #[serde(default)]
    dest_dir: Option<PathBuf>,
    #[serde(default, rename = "asset")]
    assets: Vec<RawAsset>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAsset {
    name: String,
    url: String,
    dest: Option<String>,
}

/// Load an assets file. `dest_dir` is resolved relative to the file.
pub fn load_assets(path: &Path) -> Result<AssetList, FetchError> {
    let text = fs::read_to_string(path).map_err(|source| FetchError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    parse_assets(&text, base_dir)
}

/// Parse assets TOML, resolving `dest_dir` against `base_dir`.
pub fn parse_assets(text: &str, base_dir: &Path) -> Result<AssetList, FetchError> {
    let file: AssetsFile = toml::from_str(text)?;
    let dest_dir = match file.dest_dir {
        Some(dir) => base_dir.join(dir),
        None => base_dir.to_path_buf(),
    };

    let mut seen = HashSet::new();
    let mut assets = Vec::with_capacity(file.assets.len());
    for (index, raw) in file.assets.into_iter().enumerate() {
        let invalid = |reason: &str| FetchError::Invalid {
            index,
            name: raw.name.clone(),
            reason: reason.to_string(),
        };
        if raw.name.trim().is_empty() {
            return Err(invalid("`name` must not be empty"));
        }
        if raw.url.trim().is_empty() {
            return Err(invalid("`url` must not be empty"));
        }
        let raw_dest = raw.dest.as_deref().unwrap_or(&raw.name);
        let Some(dest) = normalize_dest(raw_dest) else {
            return Err(invalid("`dest` must be a relative path inside dest_dir"));
        };
        if !seen.insert(dest.clone()) {
            return Err(invalid("another asset already writes to this `dest`"));
        }
        assets.push(AssetRef {
            name: raw.name,
            url: raw.url,
            dest,
        });
    }

    Ok(AssetList { dest_dir, assets })
}

/// Canonical `/`-joined form of a destination inside the asset directory.
///
/// `./a.png`, `a.png` and `.//a.png` all name the same file. Returns `None`
/// for absolute paths, `..` components, and paths with no file name.
fn normalize_dest(dest: &str) -> Option<String> {
    let mut parts = Vec::new();
    for component in Path::new(dest).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

// ============================================================================
// Report
// ============================================================================

/// Final state of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchStatus {
    Ok { bytes: u64 },
    Cached,
    HttpError { code: u16 },
    NetworkError { message: String },
    WriteError { message: String },
}

impl FetchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchStatus::Ok { .. } | FetchStatus::Cached)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetOutcome {
    pub index: usize,
    pub name: String,
    pub url: String,
    pub dest: String,
    #[serde(flatten)]
    pub status: FetchStatus,
}

/// Outcomes for a batch, in input order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct FetchReport {
    pub outcomes: Vec<AssetOutcome>,
}

impl FetchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn ok_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssetOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn cache_stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for outcome in &self.outcomes {
            match outcome.status {
                FetchStatus::Cached => stats.hits += 1,
                FetchStatus::Ok { .. } => stats.downloads += 1,
                _ => {}
            }
        }
        stats
    }
}

/// Progress event sent as each asset completes.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Finished { total: usize, outcome: AssetOutcome },
}

// ============================================================================
// Fetching
// ============================================================================

/// Download every asset in `list`.
///
/// With `use_cache`, assets whose destination is still an unchanged copy of
/// the same URL are reported [`FetchStatus::Cached`] without a request.
/// Without it every asset is requested. Either way the manifest in
/// `dest_dir` is updated with this run's downloads and pruned to the listed
/// destinations; entries of failed assets are kept.
/// Per-asset failures are reported, never returned; `Err` is reserved for
/// failing to start the batch at all.
pub fn fetch_all(
    source: &impl AssetSource,
    list: &AssetList,
    config: &FetchConfig,
    use_cache: bool,
    events: Option<Sender<FetchEvent>>,
) -> Result<FetchReport, FetchError> {
    let mut manifest = FetchManifest::load(&list.dest_dir);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(effective_threads(config))
        .build()?;
    let total = list.assets.len();

    let results: Vec<(AssetOutcome, Option<String>)> = pool.install(|| {
        list.assets
            .par_iter()
            .enumerate()
            .map(|(index, asset)| {
                let (status, content_hash) =
                    fetch_one(source, asset, &list.dest_dir, &manifest, use_cache);
                let outcome = AssetOutcome {
                    index,
                    name: asset.name.clone(),
                    url: asset.url.clone(),
                    dest: asset.dest.clone(),
                    status,
                };
                if let Some(tx) = &events {
                    tx.send(FetchEvent::Finished {
                        total,
                        outcome: outcome.clone(),
                    })
                    .ok();
                }
                (outcome, content_hash)
            })
            .collect()
    });

    let mut outcomes = Vec::with_capacity(results.len());
    let mut downloaded = false;
    for (outcome, content_hash) in results {
        if let Some(hash) = content_hash {
            manifest.insert(outcome.dest.clone(), &outcome.url, hash);
            downloaded = true;
        }
        outcomes.push(outcome);
    }

    let pruned = manifest.retain_paths(list.assets.iter().map(|a| a.dest.as_str()));
    if pruned > 0 {
        tracing::debug!(dir = %list.dest_dir.display(), pruned, "dropped unlisted manifest entries");
    }

    if (downloaded || pruned > 0) && let Err(err) = manifest.save(&list.dest_dir) {
        tracing::warn!(dir = %list.dest_dir.display(), %err, "could not save fetch manifest");
    }

    Ok(FetchReport { outcomes })
}

/// Fetch one asset. Returns the status and, for a fresh download, the
/// content hash to record in the manifest.
fn fetch_one(
    source: &impl AssetSource,
    asset: &AssetRef,
    dest_dir: &Path,
    manifest: &FetchManifest,
    use_cache: bool,
) -> (FetchStatus, Option<String>) {
    if use_cache && manifest.is_fresh(&asset.dest, &asset.url, dest_dir) {
        tracing::debug!(asset = %asset.name, "cache hit");
        return (FetchStatus::Cached, None);
    }

    let bytes = match source.get(&asset.url) {
        Ok(bytes) => bytes,
        Err(SourceError::Http(code)) => {
            tracing::warn!(asset = %asset.name, url = %asset.url, code, "download failed");
            return (FetchStatus::HttpError { code }, None);
        }
        Err(SourceError::Network(message)) => {
            tracing::warn!(asset = %asset.name, url = %asset.url, %message, "download failed");
            return (FetchStatus::NetworkError { message }, None);
        }
    };

    let path = dest_dir.join(&asset.dest);
    match write_atomic(&path, &bytes) {
        Ok(()) => {
            tracing::debug!(asset = %asset.name, path = %path.display(), bytes = bytes.len(), "saved");
            (
                FetchStatus::Ok {
                    bytes: bytes.len() as u64,
                },
                Some(cache::hash_bytes(&bytes)),
            )
        }
        Err(err) => {
            tracing::warn!(asset = %asset.name, path = %path.display(), %err, "write failed");
            (
                FetchStatus::WriteError {
                    message: err.to_string(),
                },
                None,
            )
        }
    }
}
