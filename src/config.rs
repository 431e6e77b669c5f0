//! Tool configuration module.
//!
//! Handles loading, validating, and merging `pagesmith.toml`. Stock defaults
//! are serialized to a TOML table and the user file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! By default `pagesmith.toml` is read from the working directory if it
//! exists. `--config PATH` points at a specific file, which must exist.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [assemble]
//! slot_open = "{{"            # Opening slot delimiter in the skeleton
//! slot_close = "}}"           # Closing slot delimiter
//! emit_slot_markers = false   # Wrap filled slots in <!-- slot:NAME --> markers
//!
//! [fetch]
//! timeout_secs = 30           # Per-request timeout
//! max_parallel = 4            # Max parallel downloads (omit for auto = CPU cores)
//! user_agent = "pagesmith"
//!
//! [skeleton]
//! lang = "en"
//! title = "Untitled"
//! stylesheets = []
//! scripts = []
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "pagesmith.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `pagesmith.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Slot syntax and marker emission for the assembler.
    pub assemble: AssembleConfig,
    /// Asset download settings.
    pub fetch: FetchConfig,
    /// Boilerplate used by `init` when scaffolding a skeleton.
    pub skeleton: SkeletonConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assemble.slot_open.is_empty() || self.assemble.slot_close.is_empty() {
            return Err(ConfigError::Validation(
                "assemble.slot_open and assemble.slot_close must not be empty".into(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.fetch.max_parallel == Some(0) {
            return Err(ConfigError::Validation(
                "fetch.max_parallel must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Slot syntax used by the template assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssembleConfig {
    /// Opening delimiter of a slot reference, e.g. `{{` in `{{HERO}}`.
    pub slot_open: String,
    /// Closing delimiter of a slot reference.
    pub slot_close: String,
    /// Wrap every filled slot in `<!-- slot:NAME -->` / `<!-- /slot:NAME -->`
    /// so later edits can target the slot instead of surrounding prose.
    pub emit_slot_markers: bool,
}

impl Default for AssembleConfig {
    fn default() -> Self {
        Self {
            slot_open: "{{".to_string(),
            slot_close: "}}".to_string(),
            emit_slot_markers: false,
        }
    }
}

/// Asset download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum number of parallel downloads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_parallel: Option<usize>,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_parallel: None,
            user_agent: concat!("pagesmith/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Resolve the effective download thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &FetchConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_parallel.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Head boilerplate for scaffolded skeletons.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkeletonConfig {
    /// `lang` attribute of the `<html>` element.
    pub lang: String,
    /// Document `<title>`.
    pub title: String,
    /// Stylesheet hrefs, emitted as `<link rel="stylesheet">` in order.
    pub stylesheets: Vec<String>,
    /// Script srcs, emitted at the end of `<body>` in order.
    pub scripts: Vec<String>,
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            title: "Untitled".to_string(),
            stylesheets: Vec::new(),
            scripts: Vec::new(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration.
///
/// With an explicit path the file must exist. Without one,
/// `pagesmith.toml` in `dir` is used if present, stock defaults otherwise.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<Config, ConfigError> {
    let overlay = match explicit {
        Some(path) => Some(load_raw_config(path)?),
        None => {
            let path = dir.join(CONFIG_FILENAME);
            if path.exists() {
                Some(load_raw_config(&path)?)
            } else {
                None
            }
        }
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `pagesmith.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pagesmith configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Assembly
# ---------------------------------------------------------------------------
[assemble]
# Slot delimiters in the skeleton: {{HERO}} is filled with the HERO fragment.
slot_open = "{{"
slot_close = "}}"

# Wrap each filled slot in <!-- slot:NAME --> ... <!-- /slot:NAME --> so
# edits can target `slot = "NAME"` instead of fragile literal anchors.
emit_slot_markers = false

# ---------------------------------------------------------------------------
# Asset fetching
# ---------------------------------------------------------------------------
[fetch]
# Per-request timeout in seconds.
timeout_secs = 30

# Maximum parallel downloads.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_parallel = 4

# User-Agent header sent with each request.
# user_agent = "pagesmith/<version>"

# ---------------------------------------------------------------------------
# Skeleton scaffolding (`pagesmith init`)
# ---------------------------------------------------------------------------
[skeleton]
lang = "en"
title = "Untitled"
# stylesheets = ["styles/main.css"]
# scripts = ["scripts/main.js"]
"##
}
