//! CLI output formatting for every pipeline stage.
//!
//! # Report-First Display
//!
//! A run never ends silently. Every fragment, edit, and asset gets a line,
//! and every edit or asset that did not succeed says why. The final line is
//! a one-sentence verdict that matches the exit code.
//!
//! # Output Format
//!
//! ## Fragments
//!
//! ```text
//! Fragments
//! 001 HERO
//!     Source: 010-HERO.html
//! 002 FEATURES
//!     Source: 020-FEATURES.md
//!     Anchors: 1
//! ```
//!
//! ## Assembly
//!
//! ```text
//! Assembly
//!     Filled: HERO, FEATURES, FOOTER
//!     Unused: STATS
//! ```
//!
//! ## Edits
//!
//! ```text
//! Edits
//! 001 swap stylesheet
//!     replace at anchor "href=\"styles/main.css\"": applied
//! 002 insert stats
//!     insert-after at anchor "<!-- STATS -->": anchor_not_found
//! 1 of 2 edits applied, 1 failed
//! ```
//!
//! ## Assets
//!
//! ```text
//! [1/3] logo1.png → logos/logo1.png: ok (2048 bytes)
//! [2/3] logo2.png → logos/logo2.png: http_error 404
//! Assets: 2 ok, 1 failed (1 cached, 1 downloaded (2 total))
//! ```
//!
//! # Architecture
//!
//! Each section has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects. [`RunReport`] is the
//! machine-readable counterpart written by `--report`.

use crate::assemble::Assembly;
use crate::document::write_atomic;
use crate::fetch::{AssetOutcome, FetchEvent, FetchReport, FetchStatus};
use crate::fragment::FragmentRegistry;
use crate::patch::{EditOutcome, EditStatus, PatchReport};
use serde::Serialize;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Fragments
// ============================================================================

/// Format the loaded fragments in assembly order.
pub fn format_fragments(registry: &FragmentRegistry) -> Vec<String> {
    let mut lines = vec!["Fragments".to_string()];
    for (i, fragment) in registry.ordered().iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), fragment.name));
        if let Some(source) = &fragment.source
            && let Some(file) = source.file_name()
        {
            lines.push(format!("    Source: {}", file.to_string_lossy()));
        }
        if !fragment.anchors.is_empty() {
            lines.push(format!("    Anchors: {}", fragment.anchors.len()));
        }
    }
    if registry.is_empty() {
        lines.push("    (none)".to_string());
    }
    lines
}

pub fn print_fragments(registry: &FragmentRegistry) {
    for line in format_fragments(registry) {
        println!("{}", line);
    }
}

// ============================================================================
// Assembly
// ============================================================================

pub fn format_assembly(assembly: &Assembly) -> Vec<String> {
    let mut lines = vec!["Assembly".to_string()];
    if assembly.filled.is_empty() {
        lines.push("    Filled: (no slots)".to_string());
    } else {
        lines.push(format!("    Filled: {}", assembly.filled.join(", ")));
    }
    if !assembly.unused.is_empty() {
        lines.push(format!("    Unused: {}", assembly.unused.join(", ")));
    }
    lines
}

pub fn print_assembly(assembly: &Assembly) {
    for line in format_assembly(assembly) {
        println!("{}", line);
    }
}

// ============================================================================
// Edits
// ============================================================================

fn status_label(status: &EditStatus) -> String {
    match status {
        EditStatus::Applied => "applied".to_string(),
        EditStatus::AnchorNotFound => "anchor_not_found".to_string(),
        EditStatus::AmbiguousAnchor { occurrences } => {
            format!("ambiguous_anchor ({occurrences} matches, first used)")
        }
    }
}

fn edit_lines(outcome: &EditOutcome) -> Vec<String> {
    let title = outcome.label.as_deref().unwrap_or("(unlabeled)");
    let mut status = status_label(&outcome.status);
    if outcome.optional && !outcome.status.is_applied() {
        status.push_str(" [optional]");
    }
    vec![
        format!("{} {}", format_index(outcome.index + 1), title),
        format!("    {} at {}: {}", outcome.mode, outcome.target, status),
    ]
}

/// Format the per-edit report followed by a one-line tally.
pub fn format_patch_report(report: &PatchReport) -> Vec<String> {
    let mut lines = vec!["Edits".to_string()];
    for outcome in &report.outcomes {
        lines.extend(edit_lines(outcome));
    }
    let failed = report.failures().count();
    let mut tally = format!(
        "{} of {} applied",
        report.applied(),
        plural(report.len(), "edit")
    );
    if failed > 0 {
        tally.push_str(&format!(", {failed} failed"));
    }
    let skipped = report.not_applied().count() - failed;
    if skipped > 0 {
        tally.push_str(&format!(", {skipped} optional skipped"));
    }
    lines.push(tally);
    lines
}

pub fn print_patch_report(report: &PatchReport) {
    for line in format_patch_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Assets
// ============================================================================

fn fetch_status_label(status: &FetchStatus) -> String {
    match status {
        FetchStatus::Ok { bytes } => format!("ok ({bytes} bytes)"),
        FetchStatus::Cached => "cached".to_string(),
        FetchStatus::HttpError { code } => format!("http_error {code}"),
        FetchStatus::NetworkError { message } => format!("network_error: {message}"),
        FetchStatus::WriteError { message } => format!("write_error: {message}"),
    }
}

fn asset_line(outcome: &AssetOutcome, total: usize) -> String {
    format!(
        "[{}/{}] {} \u{2192} {}: {}",
        outcome.index + 1,
        total,
        outcome.name,
        outcome.dest,
        fetch_status_label(&outcome.status)
    )
}

/// Format a progress event from the fetcher.
pub fn format_fetch_event(event: &FetchEvent) -> Vec<String> {
    match event {
        FetchEvent::Finished { total, outcome } => vec![asset_line(outcome, *total)],
    }
}

/// Format the end-of-batch tally, listing failures again so they are not
/// lost among progress lines.
pub fn format_fetch_summary(report: &FetchReport) -> Vec<String> {
    let mut lines = Vec::new();
    let failed: Vec<_> = report.failures().collect();
    if !failed.is_empty() {
        lines.push("Failed assets".to_string());
        for outcome in &failed {
            lines.push(format!("    {}", asset_line(outcome, report.len())));
        }
    }
    lines.push(format!(
        "Assets: {} ok, {} failed ({})",
        report.ok_count(),
        failed.len(),
        report.cache_stats()
    ));
    lines
}

pub fn print_fetch_summary(report: &FetchReport) {
    for line in format_fetch_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Run report
// ============================================================================

/// Machine-readable summary of one run, written by `--report`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly: Option<Assembly>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edits: Option<PatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<FetchReport>,
    /// Whether the output document was written.
    pub written: bool,
    pub success: bool,
}

impl RunReport {
    pub fn new(
        assembly: Option<Assembly>,
        edits: Option<PatchReport>,
        assets: Option<FetchReport>,
    ) -> Self {
        let success = edits.as_ref().is_none_or(PatchReport::is_success)
            && assets.as_ref().is_none_or(FetchReport::is_success);
        Self {
            assembly,
            edits,
            assets,
            written: false,
            success,
        }
    }

    /// Edits that failed the run.
    pub fn failed_edits(&self) -> usize {
        self.edits.as_ref().map_or(0, |r| r.failures().count())
    }

    /// Assets that failed to fetch.
    pub fn failed_assets(&self) -> usize {
        self.assets.as_ref().map_or(0, FetchReport::failed_count)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }
}

/// Final verdict line(s), consistent with the process exit code.
pub fn format_run_summary(report: &RunReport, out: Option<&Path>) -> Vec<String> {
    let mut lines = Vec::new();
    match (report.written, out) {
        (true, Some(path)) => lines.push(format!("==> Wrote {}", path.display())),
        (false, Some(path)) => lines.push(format!(
            "==> Not written: {} (required edits failed; use --allow-partial to write anyway)",
            path.display()
        )),
        _ => {}
    }
    if report.success {
        lines.push("==> Success".to_string());
    } else {
        let mut parts = Vec::new();
        if report.failed_edits() > 0 {
            parts.push(format!("{} failed", plural(report.failed_edits(), "edit")));
        }
        if report.failed_assets() > 0 {
            parts.push(format!("{} failed", plural(report.failed_assets(), "asset")));
        }
        lines.push(format!("==> Failed: {}", parts.join(", ")));
    }
    lines
}

pub fn print_run_summary(report: &RunReport, out: Option<&Path>) {
    for line in format_run_summary(report, out) {
        println!("{}", line);
    }
}
