//! Template assembly.
//!
//! Fills the named slots of a skeleton document with fragment content.
//! A slot is a name between the configured delimiters, `{{HERO}}` by
//! default; spaces inside the delimiters are ignored (`{{ HERO }}`).
//! Delimiter pairs that do not enclose a valid slot name (see
//! [`is_valid_slot_name`](crate::naming::is_valid_slot_name)) are copied
//! through as literal text, so inline scripts using braces survive.
//!
//! Assembly is all-or-nothing: if any slot has no fragment the whole call
//! fails with [`AssembleError::MissingSlot`] listing every missing name, and
//! the caller writes nothing.
//!
//! ## Slot markers
//!
//! With `emit_slot_markers` enabled every filled slot is wrapped:
//!
//! ```text
//! <!-- slot:HERO --><h1>X</h1><!-- /slot:HERO -->
//! ```
//!
//! The markers give later edits a stable target that does not depend on
//! the surrounding prose (see [`crate::patch::Target::Slot`]).

use crate::config::AssembleConfig;
use crate::document::Document;
use crate::fragment::Fragment;
use crate::naming::is_valid_slot_name;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AssembleError {
    #[error("Skeleton references slots with no fragment: {}", .0.join(", "))]
    MissingSlot(Vec<String>),
}

/// Result of a successful assembly.
#[derive(Debug, Clone, Serialize)]
pub struct Assembly {
    #[serde(skip)]
    pub document: Document,
    /// Distinct slot names filled, in order of first appearance.
    pub filled: Vec<String>,
    /// Fragments that no slot referenced, in the order they were given.
    pub unused: Vec<String>,
}

/// A piece of a parsed skeleton.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    Text(&'a str),
    Slot(&'a str),
}

/// Opening marker emitted before a filled slot.
pub fn slot_open_marker(name: &str) -> String {
    format!("<!-- slot:{name} -->")
}

/// Closing marker emitted after a filled slot.
pub fn slot_close_marker(name: &str) -> String {
    format!("<!-- /slot:{name} -->")
}

/// Split a skeleton into literal text and slot references.
pub fn parse_skeleton<'a>(skeleton: &'a str, config: &AssembleConfig) -> Vec<Segment<'a>> {
    let open = config.slot_open.as_str();
    let close = config.slot_close.as_str();
    let mut segments = Vec::new();
    // Start of pending literal text, and position to resume searching from.
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some(rel) = skeleton[cursor..].find(open) {
        let open_pos = cursor + rel;
        let name_start = open_pos + open.len();
        let Some(close_rel) = skeleton[name_start..].find(close) else {
            break;
        };
        let close_pos = name_start + close_rel;
        let name = skeleton[name_start..close_pos].trim();

        if is_valid_slot_name(name) {
            if open_pos > text_start {
                segments.push(Segment::Text(&skeleton[text_start..open_pos]));
            }
            segments.push(Segment::Slot(name));
            cursor = close_pos + close.len();
            text_start = cursor;
        } else {
            cursor = name_start;
        }
    }

    if text_start < skeleton.len() {
        segments.push(Segment::Text(&skeleton[text_start..]));
    }
    segments
}

/// Distinct slot names referenced by a skeleton, in order of first appearance.
pub fn slot_names(skeleton: &str, config: &AssembleConfig) -> Vec<String> {
    let mut seen = BTreeSet::new();
    parse_skeleton(skeleton, config)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Slot(name) if seen.insert(name) => Some(name.to_string()),
            _ => None,
        })
        .collect()
}

/// Compose a document from a skeleton and an ordered list of fragments.
///
/// Output depends only on the inputs: identical inputs produce
/// byte-identical documents. When the same fragment name appears twice in
/// `fragments`, the first one wins.
pub fn assemble(
    skeleton: &str,
    fragments: &[&Fragment],
    config: &AssembleConfig,
) -> Result<Assembly, AssembleError> {
    let mut by_name: HashMap<&str, &Fragment> = HashMap::new();
    for &fragment in fragments {
        by_name.entry(fragment.name.as_str()).or_insert(fragment);
    }

    let segments = parse_skeleton(skeleton, config);

    let mut missing = Vec::new();
    for segment in &segments {
        if let Segment::Slot(name) = segment
            && !by_name.contains_key(name)
            && !missing.iter().any(|m| m == name)
        {
            missing.push(name.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(AssembleError::MissingSlot(missing));
    }

    let mut out = String::with_capacity(skeleton.len());
    let mut filled: Vec<String> = Vec::new();
    for segment in &segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Slot(name) => {
                let fragment = by_name[*name];
                if config.emit_slot_markers {
                    out.push_str(&slot_open_marker(name));
                    out.push_str(&fragment.content);
                    out.push_str(&slot_close_marker(name));
                } else {
                    out.push_str(&fragment.content);
                }
                if !filled.iter().any(|f| f == name) {
                    filled.push(name.to_string());
                }
            }
        }
    }

    let unused = fragments
        .iter()
        .map(|f| f.name.as_str())
        .filter(|name| !filled.iter().any(|f| f == name))
        .fold(Vec::<String>::new(), |mut acc, name| {
            if !acc.iter().any(|a| a == name) {
                acc.push(name.to_string());
            }
            acc
        });

    for name in &unused {
        tracing::warn!(fragment = %name, "fragment not referenced by any slot");
    }

    Ok(Assembly {
        document: Document::new(out),
        filled,
        unused,
    })
}
