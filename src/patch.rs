//! Anchor-based patch engine.
//!
//! Applies an ordered batch of [`Edit`]s to a [`Document`] and reports the
//! outcome of every one. Edits run in the order given and each sees the
//! document as already changed by the edits before it.
//!
//! ## Locating the target
//!
//! | Target | Match span |
//! |--------|------------|
//! | [`Target::Anchor`] | the exact, case-sensitive anchor text |
//! | [`Target::Slot`] | the content between `<!-- slot:NAME -->` and `<!-- /slot:NAME -->` |
//! | [`Target::FirstOf`] | the first candidate anchor present in the document |
//!
//! Occurrences are counted with overlaps (`"aa"` occurs twice in `"aaa"`).
//!
//! - **0 occurrences** → [`EditStatus::AnchorNotFound`], document unchanged.
//! - **1 occurrence** → applied, [`EditStatus::Applied`].
//! - **2+ occurrences** → applied to the first occurrence in document order,
//!   [`EditStatus::AmbiguousAnchor`] so the caller can tighten the anchor.
//!
//! ## Modes
//!
//! `insert-before` and `insert-after` place the content at the start or end
//! of the match span, `replace` swaps the span for the content, `delete`
//! removes the span. On a slot target the markers themselves are never
//! touched, so the slot stays addressable after any edit.
//!
//! ## Idempotence
//!
//! Re-running the same batch is not automatically a no-op:
//!
//! - An insert whose anchor still occurs after the insertion matches again
//!   and inserts a second copy. Inserts are idempotent only when the
//!   inserted content destroys the anchor context.
//! - A `replace` on a [`Target::Slot`] is idempotent: the markers reappear
//!   unchanged and the same content is written between them.
//!
//! Callers that re-run a batch should express repeatable edits as slot
//! replacements.

use crate::assemble::{slot_close_marker, slot_open_marker};
use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an edit changes its match span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditMode {
    InsertBefore,
    InsertAfter,
    Replace,
    Delete,
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EditMode::InsertBefore => "insert-before",
            EditMode::InsertAfter => "insert-after",
            EditMode::Replace => "replace",
            EditMode::Delete => "delete",
        })
    }
}

/// Where an edit applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Literal text in the document.
    Anchor(String),
    /// Content of a marked slot emitted by the assembler.
    Slot(String),
    /// Candidate anchors tried in order; the first present one is used.
    FirstOf(Vec<String>),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Anchor(anchor) => write!(f, "anchor {}", preview(anchor)),
            Target::Slot(name) => write!(f, "slot {name}"),
            Target::FirstOf(anchors) => {
                let previews: Vec<String> = anchors.iter().map(|a| preview(a)).collect();
                write!(f, "first of [{}]", previews.join(", "))
            }
        }
    }
}

/// One requested mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub label: Option<String>,
    pub target: Target,
    pub mode: EditMode,
    /// Content to insert or replace with. Ignored by `delete`.
    pub content: String,
    /// A miss on an optional edit is reported but does not fail the run.
    pub optional: bool,
}

impl Edit {
    pub fn new(target: Target, mode: EditMode, content: impl Into<String>) -> Self {
        Self {
            label: None,
            target,
            mode,
            content: content.into(),
            optional: false,
        }
    }

    pub fn replace(anchor: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Target::Anchor(anchor.into()), EditMode::Replace, content)
    }

    pub fn insert_before(anchor: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Target::Anchor(anchor.into()), EditMode::InsertBefore, content)
    }

    pub fn insert_after(anchor: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Target::Anchor(anchor.into()), EditMode::InsertAfter, content)
    }

    pub fn delete(anchor: impl Into<String>) -> Self {
        Self::new(Target::Anchor(anchor.into()), EditMode::Delete, "")
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Outcome of a single edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EditStatus {
    Applied,
    AnchorNotFound,
    AmbiguousAnchor { occurrences: usize },
}

impl EditStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditStatus::Applied)
    }
}

impl fmt::Display for EditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditStatus::Applied => f.write_str("applied"),
            EditStatus::AnchorNotFound => f.write_str("anchor_not_found"),
            EditStatus::AmbiguousAnchor { occurrences } => {
                write!(f, "ambiguous_anchor ({occurrences} occurrences, first used)")
            }
        }
    }
}

/// Report entry for one submitted edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    /// Position of the edit in the submitted batch (0-based).
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub mode: EditMode,
    /// Human-readable description of the target.
    pub target: String,
    pub optional: bool,
    #[serde(flatten)]
    pub status: EditStatus,
}

impl EditOutcome {
    /// Whether this outcome should fail the run.
    pub fn is_failure(&self) -> bool {
        !self.status.is_applied() && !self.optional
    }
}

/// Per-edit report for a batch. One entry per submitted edit, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PatchReport {
    pub outcomes: Vec<EditOutcome>,
}

impl PatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_applied()).count()
    }

    /// Outcomes that did not reach `applied`, optional or not.
    pub fn not_applied(&self) -> impl Iterator<Item = &EditOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_applied())
    }

    /// Outcomes that fail the run.
    pub fn failures(&self) -> impl Iterator<Item = &EditOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    /// True iff every non-optional edit was applied.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Byte offsets of every occurrence of `needle` in `haystack`, overlaps included.
///
/// An empty needle has no occurrences.
pub fn find_occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    let Some(first) = needle.chars().next() else {
        return Vec::new();
    };
    let step = first.len_utf8();
    let mut positions = Vec::new();
    let mut from = 0;
    while let Some(rel) = haystack[from..].find(needle) {
        let pos = from + rel;
        positions.push(pos);
        from = pos + step;
    }
    positions
}

/// Match span of a target: the chosen span and how many candidates exist.
struct Located {
    start: usize,
    end: usize,
    occurrences: usize,
}

fn locate_anchor(text: &str, anchor: &str) -> Option<Located> {
    let positions = find_occurrences(text, anchor);
    let start = *positions.first()?;
    Some(Located {
        start,
        end: start + anchor.len(),
        occurrences: positions.len(),
    })
}

fn locate_slot(text: &str, name: &str) -> Option<Located> {
    let open = slot_open_marker(name);
    let close = slot_close_marker(name);
    let opens = find_occurrences(text, &open);
    let start = opens.first()? + open.len();
    let end = start + text[start..].find(&close)?;
    Some(Located {
        start,
        end,
        occurrences: opens.len(),
    })
}

fn locate(text: &str, target: &Target) -> Option<Located> {
    match target {
        Target::Anchor(anchor) => locate_anchor(text, anchor),
        Target::Slot(name) => locate_slot(text, name),
        Target::FirstOf(anchors) => anchors.iter().find_map(|a| locate_anchor(text, a)),
    }
}

/// Apply one edit to `text` in place and return its status.
pub fn apply_edit(text: &mut String, edit: &Edit) -> EditStatus {
    let Some(span) = locate(text, &edit.target) else {
        return EditStatus::AnchorNotFound;
    };

    match edit.mode {
        EditMode::InsertBefore => text.insert_str(span.start, &edit.content),
        EditMode::InsertAfter => text.insert_str(span.end, &edit.content),
        EditMode::Replace => text.replace_range(span.start..span.end, &edit.content),
        EditMode::Delete => text.replace_range(span.start..span.end, ""),
    }

    if span.occurrences > 1 {
        EditStatus::AmbiguousAnchor {
            occurrences: span.occurrences,
        }
    } else {
        EditStatus::Applied
    }
}

/// Apply `edits` in order and report the outcome of each.
///
/// The report always has exactly one entry per edit. See the
/// [module docs](self) for matching rules and the idempotence contract.
pub fn apply_edits(document: Document, edits: &[Edit]) -> (Document, PatchReport) {
    let mut text = document.into_string();
    let mut report = PatchReport::default();

    for (index, edit) in edits.iter().enumerate() {
        let status = apply_edit(&mut text, edit);
        let target = edit.target.to_string();
        match status {
            EditStatus::Applied => {
                tracing::debug!(index, mode = %edit.mode, %target, "edit applied");
            }
            EditStatus::AnchorNotFound => {
                tracing::warn!(index, mode = %edit.mode, %target, optional = edit.optional, "anchor not found");
            }
            EditStatus::AmbiguousAnchor { occurrences } => {
                tracing::warn!(index, mode = %edit.mode, %target, occurrences, "ambiguous anchor, first occurrence used");
            }
        }
        report.outcomes.push(EditOutcome {
            index,
            label: edit.label.clone(),
            mode: edit.mode,
            target,
            optional: edit.optional,
            status,
        });
    }

    (Document::new(text), report)
}

/// Single-line preview of an anchor for reports, truncated to 48 chars.
fn preview(text: &str) -> String {
    let flat: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if flat.chars().count() <= 48 {
        format!("{flat:?}")
    } else {
        let head: String = flat.chars().take(45).collect();
        format!("{:?}", format!("{head}..."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str, edits: &[Edit]) -> (String, PatchReport) {
        let (doc, report) = apply_edits(Document::new(text), edits);
        (doc.into_string(), report)
    }

    // =========================================================================
    // Occurrence counting
    // =========================================================================

    #[test]
    fn occurrences_count_overlaps() {
        assert_eq!(find_occurrences("aaa", "aa"), vec![0, 1]);
    }

    #[test]
    fn occurrences_empty_needle() {
        assert!(find_occurrences("abc", "").is_empty());
    }

    #[test]
    fn occurrences_multibyte() {
        assert_eq!(find_occurrences("⚡a⚡a", "⚡"), vec![0, 4]);
    }

    #[test]
    fn occurrences_are_case_sensitive() {
        assert!(find_occurrences("<DIV>", "<div>").is_empty());
    }

    // =========================================================================
    // Modes on literal anchors
    // =========================================================================

    #[test]
    fn replace_single_match() {
        let (out, report) = run(
            r#"<link href="styles/premium-main.css">"#,
            &[Edit::replace(
                r#"href="styles/premium-main.css""#,
                r#"href="styles/professional.css""#,
            )],
        );
        assert_eq!(out, r#"<link href="styles/professional.css">"#);
        assert_eq!(report.outcomes[0].status, EditStatus::Applied);
        assert!(report.is_success());
    }

    #[test]
    fn insert_before_and_after() {
        let (out, _) = run(
            "<main><!-- About Section --></main>",
            &[
                Edit::insert_before("<!-- About Section -->", "<section>imgs</section>"),
                Edit::insert_after("<!-- About Section -->", "<section>about</section>"),
            ],
        );
        assert_eq!(
            out,
            "<main><section>imgs</section><!-- About Section --><section>about</section></main>"
        );
    }

    #[test]
    fn delete_removes_span() {
        let (out, report) = run("<p>keep</p><p>drop</p>", &[Edit::delete("<p>drop</p>")]);
        assert_eq!(out, "<p>keep</p>");
        assert!(report.is_success());
    }

    #[test]
    fn anchor_not_found_leaves_document_unchanged() {
        let input = "<div class=\"tech-icon\">chart</div>";
        let (out, report) = run(input, &[Edit::replace("<div class=\"value-icon\">", "x")]);
        assert_eq!(out, input);
        assert_eq!(report.outcomes[0].status, EditStatus::AnchorNotFound);
        assert!(!report.is_success());
    }

    #[test]
    fn empty_anchor_never_matches() {
        let (out, report) = run("abc", &[Edit::insert_before("", "x")]);
        assert_eq!(out, "abc");
        assert_eq!(report.outcomes[0].status, EditStatus::AnchorNotFound);
    }

    #[test]
    fn ambiguous_anchor_example() {
        let (out, report) = run(
            "<a>old</a><a>old</a>",
            &[Edit::replace("<a>old</a>", "<a>new</a>")],
        );
        assert_eq!(out, "<a>new</a><a>old</a>");
        assert_eq!(
            report.outcomes[0].status,
            EditStatus::AmbiguousAnchor { occurrences: 2 }
        );
        assert!(!report.is_success());
    }

    #[test]
    fn first_match_tie_break_leaves_later_text_intact() {
        let input = "head [X] middle [X] tail";
        let (out, _) = run(input, &[Edit::replace("[X]", "[Y]")]);
        let second = input.rfind("[X]").unwrap();
        // Everything from the second occurrence on is byte-identical.
        assert!(out.ends_with(&input[second..]));
        assert!(out.starts_with("head [Y] middle "));
    }

    #[test]
    fn later_edits_see_earlier_mutations() {
        let (out, report) = run(
            "<h1>Old</h1>",
            &[
                Edit::replace("Old", "New"),
                Edit::replace("<h1>New</h1>", "<h2>New</h2>"),
                Edit::replace("Old", "Again"),
            ],
        );
        assert_eq!(out, "<h2>New</h2>");
        assert!(report.outcomes[0].status.is_applied());
        assert!(report.outcomes[1].status.is_applied());
        assert_eq!(report.outcomes[2].status, EditStatus::AnchorNotFound);
    }

    #[test]
    fn report_has_one_entry_per_edit() {
        let edits = vec![
            Edit::replace("a", "b").labeled("first"),
            Edit::replace("zzz", "y"),
            Edit::delete("c").optional(),
            Edit::insert_after("b", "!"),
        ];
        let (_, report) = run("ac", &edits);
        assert_eq!(report.len(), edits.len());
        let indices: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(report.outcomes[0].label.as_deref(), Some("first"));
        let missed: Vec<usize> = report.not_applied().map(|o| o.index).collect();
        assert_eq!(missed, vec![1]);
    }

    #[test]
    fn optional_miss_does_not_fail() {
        let (_, report) = run("abc", &[Edit::replace("zzz", "y").optional()]);
        assert_eq!(report.outcomes[0].status, EditStatus::AnchorNotFound);
        assert!(report.is_success());
        assert_eq!(report.not_applied().count(), 1);
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn replace_roundtrip_restores_document() {
        let fragment = "<section class=\"stats\">42%</section>";
        let original = format!("<main>{fragment}<footer></footer></main>");
        let replacement = "<section class=\"stats\">99%</section>";
        let (patched, _) = run(&original, &[Edit::replace(fragment, replacement)]);
        assert_ne!(patched, original);
        let (restored, report) = run(&patched, &[Edit::replace(replacement, fragment)]);
        assert_eq!(restored, original);
        assert!(report.is_success());
    }

    #[test]
    fn insert_reapplied_matches_again() {
        let edit = Edit::insert_after("<!-- end -->", "<p>x</p>");
        let (once, _) = run("<!-- end -->", std::slice::from_ref(&edit));
        let (twice, report) = run(&once, &[edit]);
        assert_eq!(twice, "<!-- end --><p>x</p><p>x</p>");
        assert!(report.is_success());
    }

    // =========================================================================
    // Slot targets
    // =========================================================================

    fn marked(name: &str, inner: &str) -> String {
        format!("{}{}{}", slot_open_marker(name), inner, slot_close_marker(name))
    }

    #[test]
    fn slot_replace_is_idempotent() {
        let doc = format!("<body>{}</body>", marked("HERO", "<h1>X</h1>"));
        let edit = Edit::new(Target::Slot("HERO".into()), EditMode::Replace, "<h1>Y</h1>");
        let (once, r1) = run(&doc, std::slice::from_ref(&edit));
        let (twice, r2) = run(&once, &[edit]);
        assert_eq!(once, format!("<body>{}</body>", marked("HERO", "<h1>Y</h1>")));
        assert_eq!(once, twice);
        assert!(r1.is_success() && r2.is_success());
    }

    #[test]
    fn slot_insert_and_delete_keep_markers() {
        let doc = marked("STATS", "<b>1</b>");
        let (out, report) = run(
            &doc,
            &[
                Edit::new(Target::Slot("STATS".into()), EditMode::InsertBefore, "<i>0</i>"),
                Edit::new(Target::Slot("STATS".into()), EditMode::InsertAfter, "<i>2</i>"),
            ],
        );
        assert_eq!(out, marked("STATS", "<i>0</i><b>1</b><i>2</i>"));
        assert!(report.is_success());

        let (cleared, _) = run(
            &out,
            &[Edit::new(Target::Slot("STATS".into()), EditMode::Delete, "")],
        );
        assert_eq!(cleared, marked("STATS", ""));
    }

    #[test]
    fn missing_slot_not_found() {
        let (_, report) = run(
            "<body></body>",
            &[Edit::new(Target::Slot("HERO".into()), EditMode::Replace, "x")],
        );
        assert_eq!(report.outcomes[0].status, EditStatus::AnchorNotFound);
    }

    #[test]
    fn unclosed_slot_not_found() {
        let (_, report) = run(
            &slot_open_marker("HERO"),
            &[Edit::new(Target::Slot("HERO".into()), EditMode::Replace, "x")],
        );
        assert_eq!(report.outcomes[0].status, EditStatus::AnchorNotFound);
    }

    #[test]
    fn repeated_slot_is_ambiguous() {
        let doc = format!("{}{}", marked("SEP", "a"), marked("SEP", "b"));
        let (out, report) = run(
            &doc,
            &[Edit::new(Target::Slot("SEP".into()), EditMode::Replace, "z")],
        );
        assert_eq!(out, format!("{}{}", marked("SEP", "z"), marked("SEP", "b")));
        assert_eq!(
            report.outcomes[0].status,
            EditStatus::AmbiguousAnchor { occurrences: 2 }
        );
    }

    // =========================================================================
    // Candidate anchors
    // =========================================================================

    #[test]
    fn first_of_uses_first_present_candidate() {
        let (out, report) = run(
            "<!-- Contact --><!-- About -->",
            &[Edit::new(
                Target::FirstOf(vec!["<!-- Missing -->".into(), "<!-- About -->".into()]),
                EditMode::InsertBefore,
                "<hr>",
            )],
        );
        assert_eq!(out, "<!-- Contact --><hr><!-- About -->");
        assert!(report.is_success());
    }

    #[test]
    fn first_of_with_no_candidates_present() {
        let (_, report) = run(
            "x",
            &[Edit::new(
                Target::FirstOf(vec!["a".into(), "b".into()]),
                EditMode::Replace,
                "y",
            )],
        );
        assert_eq!(report.outcomes[0].status, EditStatus::AnchorNotFound);
    }

    // =========================================================================
    // Display / serialization
    // =========================================================================

    #[test]
    fn status_serializes_machine_readable() {
        let outcome = EditOutcome {
            index: 3,
            label: None,
            mode: EditMode::InsertAfter,
            target: "slot HERO".into(),
            optional: false,
            status: EditStatus::AmbiguousAnchor { occurrences: 2 },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "ambiguous_anchor");
        assert_eq!(json["occurrences"], 2);
        assert_eq!(json["mode"], "insert-after");
        assert!(json.get("label").is_none());
    }

    #[test]
    fn target_preview_is_single_line_and_truncated() {
        let long = format!("<div>\n    {}\n</div>", "x".repeat(80));
        let shown = Target::Anchor(long).to_string();
        assert!(!shown.contains('\n'));
        assert!(shown.ends_with("...\""));
    }
}
