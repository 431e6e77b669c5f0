//! # Pagesmith
//!
//! Builds and patches a single static HTML page from named fragments.
//! A skeleton file declares slots, a directory of fragments fills them, an
//! ordered list of edits adjusts the result, and a list of assets is
//! downloaded next to the page. Every edit and every download is reported;
//! nothing fails silently.
//!
//! # Architecture: One Document, Four Stages
//!
//! ```text
//! 1. Load      fragments/  →  FragmentRegistry    (files → named fragments)
//! 2. Assemble  skeleton    →  Document            (slot substitution)
//! 3. Patch     Document    →  Document + report   (ordered anchor edits)
//! 4. Fetch     assets.toml →  images/ + report    (parallel downloads)
//! ```
//!
//! The [`Document`](document::Document) is a plain value passed through
//! stages 2 and 3. The filesystem is touched once at the end, with an atomic
//! write, and only if the run allows it: a missing slot aborts before any
//! output, and failed required edits withhold the output unless the caller
//! opts into a partial write.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`fragment`] | Fragment registry: loads `[NNN-]NAME.ext` files and `fragments.toml` anchors |
//! | [`assemble`] | Fills `{{NAME}}` slots in a skeleton, optionally wrapping them in markers |
//! | [`patch`] | Applies ordered edits against literal anchors or slot markers, with a per-edit report |
//! | [`edits`] | Loads and validates the edits TOML file |
//! | [`fetch`] | Parallel asset downloads behind the [`fetch::AssetSource`] trait |
//! | [`cache`] | Content-addressed fetch manifest so unchanged assets are skipped |
//! | [`document`] | The document value and atomic file writes |
//! | [`skeleton`] | Starter skeleton rendering for `pagesmith init`, using Maud |
//! | [`config`] | `pagesmith.toml` loading, merging, and validation |
//! | [`naming`] | `NNN-NAME.ext` filename convention parser |
//! | [`output`] | CLI output formatting and the JSON run report |
//!
//! # Design Decisions
//!
//! ## Report Every Edit
//!
//! An edit whose anchor is missing leaves the document unchanged and is
//! reported as `anchor_not_found`. An anchor found more than once is applied
//! to the first occurrence and reported as `ambiguous_anchor`, so the author
//! can tighten it. Either outcome fails the run unless the edit is marked
//! `optional`.
//!
//! ## Slots Over Prose Anchors
//!
//! Literal anchors break as soon as an earlier edit rewrites the text they
//! match. With `emit_slot_markers` the assembler brackets every slot in
//! `<!-- slot:NAME -->` comments, and an edit can target `slot = "NAME"`
//! instead. The markers survive every edit, so a `replace` on a slot can be
//! applied any number of times with the same result.
//!
//! ## NNN-Prefix Ordering
//!
//! Fragment files use a numeric prefix (`010-HERO.html`) for explicit order,
//! the same convention `init` uses to lay out a starter skeleton. The prefix
//! is parsed by [`naming::parse_fragment_filename`]; unprefixed fragments
//! sort after numbered ones, by name.

pub mod assemble;
pub mod cache;
pub mod config;
pub mod document;
pub mod edits;
pub mod fetch;
pub mod fragment;
pub mod naming;
pub mod output;
pub mod patch;
pub mod skeleton;

#[cfg(test)]
pub(crate) mod test_helpers;
