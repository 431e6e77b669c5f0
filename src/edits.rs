//! Edits file loading.
//!
//! Edits are authored as an ordered TOML array of tables:
//!
//! ```toml
//! [[edit]]
//! label = "swap stylesheet"
//! anchor = 'href="styles/premium-main.css"'
//! mode = "replace"
//! content = 'href="styles/professional.css"'
//!
//! [[edit]]
//! label = "full-width images before About"
//! fragment = "FULL_WIDTH_IMAGES"   # content and anchors from the registry
//! mode = "insert-before"
//!
//! [[edit]]
//! slot = "HERO"                    # requires emit_slot_markers at assembly
//! mode = "replace"
//! content_file = "hero-v2.html"    # relative to this file
//! optional = true
//! ```
//!
//! ## Target rules
//!
//! At most one of `anchor` and `slot`. With neither, `fragment` is required
//! and the fragment's declared anchors are tried in order.
//!
//! ## Content rules
//!
//! `delete` takes no content (`fragment` may still name the target).
//! Every other mode takes exactly one of `content`, `fragment` and
//! `content_file`.
//!
//! Invalid entries are rejected at load time with their position, so a
//! malformed batch never reaches the document.

use crate::fragment::{FragmentError, FragmentRegistry};
use crate::patch::{Edit, EditMode, Target};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid edit #{index}{}: {reason}", .label.as_deref().map(|l| format!(" ({l})")).unwrap_or_default())]
    Invalid {
        index: usize,
        label: Option<String>,
        reason: String,
    },
    #[error("Edit #{index}: {source}")]
    Fragment {
        index: usize,
        #[source]
        source: FragmentError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EditsFile {
    #[serde(default, rename = "edit")]
    edits: Vec<RawEdit>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEdit {
    label: Option<String>,
    anchor: Option<String>,
    slot: Option<String>,
    mode: EditMode,
    content: Option<String>,
    fragment: Option<String>,
    content_file: Option<PathBuf>,
    #[serde(default)]
    optional: bool,
}

/// Load and validate an edits file.
///
/// `content_file` paths resolve against the edits file's directory.
/// `registry` is required only if an edit names a `fragment`.
pub fn load_edits(
    path: &Path,
    registry: Option<&FragmentRegistry>,
) -> Result<Vec<Edit>, EditError> {
    let content = fs::read_to_string(path).map_err(|source| EditError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or(Path::new("."));
    parse_edits(&content, base_dir, registry)
}

/// Parse edits from TOML text. See [`load_edits`].
pub fn parse_edits(
    toml_text: &str,
    base_dir: &Path,
    registry: Option<&FragmentRegistry>,
) -> Result<Vec<Edit>, EditError> {
    let file: EditsFile = toml::from_str(toml_text)?;
    file.edits
        .into_iter()
        .enumerate()
        .map(|(index, raw)| resolve_edit(index, raw, base_dir, registry))
        .collect()
}

fn resolve_edit(
    index: usize,
    raw: RawEdit,
    base_dir: &Path,
    registry: Option<&FragmentRegistry>,
) -> Result<Edit, EditError> {
    let invalid = |reason: &str| EditError::Invalid {
        index,
        label: raw.label.clone(),
        reason: reason.to_string(),
    };

    let fragment = match &raw.fragment {
        Some(name) => {
            let registry = registry
                .ok_or_else(|| invalid("`fragment` requires a fragments directory"))?;
            Some(
                registry
                    .get(name)
                    .map_err(|source| EditError::Fragment { index, source })?,
            )
        }
        None => None,
    };

    let target = match (&raw.anchor, &raw.slot) {
        (Some(_), Some(_)) => return Err(invalid("`anchor` and `slot` are mutually exclusive")),
        (Some(anchor), None) if anchor.is_empty() => {
            return Err(invalid("`anchor` must not be empty"));
        }
        (Some(anchor), None) => Target::Anchor(anchor.clone()),
        (None, Some(slot)) => Target::Slot(slot.clone()),
        (None, None) => match fragment {
            Some(f) if !f.anchors.is_empty() => Target::FirstOf(f.anchors.clone()),
            Some(f) => {
                return Err(invalid(&format!(
                    "fragment {} declares no anchors; give `anchor` or `slot`",
                    f.name
                )));
            }
            None => return Err(invalid("one of `anchor`, `slot` or `fragment` is required")),
        },
    };

    let content = if raw.mode == EditMode::Delete {
        // A fragment may name the target of a delete, never its content.
        let fragment_as_content =
            fragment.is_some() && (raw.anchor.is_some() || raw.slot.is_some());
        if raw.content.is_some() || raw.content_file.is_some() || fragment_as_content {
            return Err(invalid("`delete` takes no content"));
        }
        String::new()
    } else {
        let sources = usize::from(raw.content.is_some())
            + usize::from(raw.content_file.is_some())
            + usize::from(fragment.is_some());
        if sources != 1 {
            return Err(invalid(
                "exactly one of `content`, `fragment` or `content_file` is required",
            ));
        }
        if let Some(content) = &raw.content {
            content.clone()
        } else if let Some(rel) = &raw.content_file {
            let path = base_dir.join(rel);
            fs::read_to_string(&path).map_err(|source| EditError::Io {
                path: path.display().to_string(),
                source,
            })?
        } else {
            fragment.map(|f| f.content.clone()).unwrap_or_default()
        }
    };

    Ok(Edit {
        label: raw.label,
        target,
        mode: raw.mode,
        content,
        optional: raw.optional,
    })
}
