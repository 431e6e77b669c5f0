//! Fragment registry.
//!
//! A fragment is a named block of content (hero, feature cards, stats block,
//! footer, ...) that the assembler substitutes into skeleton slots and that
//! edits can reference by name. The registry is loaded once and never
//! mutated afterwards.
//!
//! ## Directory Layout
//!
//! ```text
//! fragments/
//! ├── fragments.toml        # Optional per-fragment metadata (anchors)
//! ├── 010-HERO.html         # Fragment "HERO", order 10
//! ├── 020-FEATURES.md       # Markdown, rendered to HTML on load
//! └── FOOTER.html           # Fragment "FOOTER", unordered
//! ```
//!
//! `fragments.toml` declares where a fragment may be inserted into an
//! existing document. Edits that name a fragment without an explicit anchor
//! try these anchors in order:
//!
//! ```toml
//! [FULL_WIDTH_IMAGES]
//! anchors = ["        <!-- About Section -->"]
//! ```

use crate::naming::{is_valid_slot_name, parse_fragment_filename};
use pulldown_cmark::{Parser, html as md_html};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Metadata file read from the fragments directory.
pub const MANIFEST_FILENAME: &str = "fragments.toml";

#[derive(Error, Debug)]
pub enum FragmentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("TOML parse error in {MANIFEST_FILENAME}: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Fragment not found: {0}")]
    NotFound(String),
    #[error("Duplicate fragment name {name}: {first} and {second}")]
    Duplicate {
        name: String,
        first: String,
        second: String,
    },
    #[error("Invalid fragment name: {0:?}")]
    InvalidName(String),
    #[error("{MANIFEST_FILENAME} describes unknown fragment: {0}")]
    UnknownManifestEntry(String),
}

/// A named, immutable block of content.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub name: String,
    pub content: String,
    /// Literal anchors this fragment may be placed at, in preference order.
    pub anchors: Vec<String>,
    /// Order key from the `NNN-` filename prefix.
    pub order: Option<u32>,
    /// File the fragment was loaded from (None for in-memory fragments).
    pub source: Option<PathBuf>,
}

impl Fragment {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            anchors: Vec::new(),
            order: None,
            source: None,
        }
    }

    pub fn with_anchors(mut self, anchors: Vec<String>) -> Self {
        self.anchors = anchors;
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    fn source_label(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FragmentMeta {
    anchors: Vec<String>,
}

/// Catalog of fragments keyed by name.
#[derive(Debug, Clone, Default)]
pub struct FragmentRegistry {
    fragments: BTreeMap<String, Fragment>,
}

impl FragmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from in-memory fragments. Names must be unique.
    pub fn from_fragments(
        fragments: impl IntoIterator<Item = Fragment>,
    ) -> Result<Self, FragmentError> {
        let mut registry = Self::new();
        for fragment in fragments {
            registry.insert(fragment)?;
        }
        Ok(registry)
    }

    fn insert(&mut self, fragment: Fragment) -> Result<(), FragmentError> {
        if !is_valid_slot_name(&fragment.name) {
            return Err(FragmentError::InvalidName(fragment.name));
        }
        if let Some(existing) = self.fragments.get(&fragment.name) {
            return Err(FragmentError::Duplicate {
                name: fragment.name.clone(),
                first: existing.source_label(),
                second: fragment.source_label(),
            });
        }
        self.fragments.insert(fragment.name.clone(), fragment);
        Ok(())
    }

    /// Load every fragment file in `dir` (non-recursive).
    ///
    /// Files whose names do not follow `[NNN-]NAME.ext` are skipped.
    /// `.md` files are rendered to HTML.
    pub fn load(dir: &Path) -> Result<Self, FragmentError> {
        let mut registry = Self::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if file_name == MANIFEST_FILENAME {
                continue;
            }
            let Some(parsed) = parse_fragment_filename(&file_name) else {
                tracing::debug!(file = %file_name, "skipping non-fragment file");
                continue;
            };

            let raw = fs::read_to_string(entry.path())?;
            let content = if parsed.extension == "md" {
                render_markdown(&raw)
            } else {
                raw
            };

            registry.insert(Fragment {
                name: parsed.name,
                content,
                anchors: Vec::new(),
                order: parsed.order,
                source: Some(entry.path().to_path_buf()),
            })?;
        }

        let manifest_path = dir.join(MANIFEST_FILENAME);
        if manifest_path.exists() {
            let content = fs::read_to_string(&manifest_path)?;
            let meta: BTreeMap<String, FragmentMeta> = toml::from_str(&content)?;
            for (name, meta) in meta {
                let fragment = registry
                    .fragments
                    .get_mut(&name)
                    .ok_or(FragmentError::UnknownManifestEntry(name))?;
                fragment.anchors = meta.anchors;
            }
        }

        tracing::debug!(count = registry.len(), dir = %dir.display(), "loaded fragments");
        Ok(registry)
    }

    /// Look up a fragment by name.
    pub fn get(&self, name: &str) -> Result<&Fragment, FragmentError> {
        self.fragments
            .get(name)
            .ok_or_else(|| FragmentError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    /// Fragments in authoring order: numbered first by number, then
    /// unnumbered by name.
    pub fn ordered(&self) -> Vec<&Fragment> {
        let mut list: Vec<&Fragment> = self.fragments.values().collect();
        list.sort_by(|a, b| match (a.order, b.order) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        });
        list
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

fn render_markdown(markdown: &str) -> String {
    let parser = Parser::new(markdown);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}
