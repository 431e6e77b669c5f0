//! Shared test utilities for the pagesmith test suite.
//!
//! Provides fixture setup and report lookups so tests can assert on edits
//! by label instead of by position.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let registry = FragmentRegistry::load(&tmp.path().join("fragments")).unwrap();
//! // ... assemble, load edits, apply ...
//! assert_applied(&report, "swap stylesheet");
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::patch::{EditOutcome, EditStatus, PatchReport};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Report lookups
// =========================================================================

/// Find an edit outcome by label. Panics with the available labels if missing.
pub fn find_outcome<'a>(report: &'a PatchReport, label: &str) -> &'a EditOutcome {
    report
        .outcomes
        .iter()
        .find(|o| o.label.as_deref() == Some(label))
        .unwrap_or_else(|| {
            let labels: Vec<_> = report.outcomes.iter().map(|o| o.label.clone()).collect();
            panic!("no edit labeled '{}'. Available: {:?}", label, labels)
        })
}

/// Assert the labeled edit was applied.
pub fn assert_applied(report: &PatchReport, label: &str) {
    let outcome = find_outcome(report, label);
    assert_eq!(
        outcome.status,
        EditStatus::Applied,
        "edit '{}' was not applied",
        label
    );
}

/// Assert the labeled edit missed its anchor.
pub fn assert_not_found(report: &PatchReport, label: &str) {
    let outcome = find_outcome(report, label);
    assert_eq!(
        outcome.status,
        EditStatus::AnchorNotFound,
        "edit '{}' unexpectedly matched",
        label
    );
}
