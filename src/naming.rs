//! Fragment filename convention and slot name rules.
//!
//! Fragment files follow an optional numeric prefix (`NNN-`) followed by the
//! fragment name and an extension. The prefix orders fragments within a
//! directory; the name is what skeleton slots refer to:
//!
//! - `010-HERO.html` → order 10, name `HERO`
//! - `020-feature-cards.md` → order 20, name `feature-cards`
//! - `FOOTER.html` → no order, name `FOOTER`
//!
//! Names are kept verbatim (dashes are not converted) because they must match
//! slot markers in the skeleton exactly.

/// Result of parsing a fragment filename like `010-HERO.html`.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentFileName {
    /// Number prefix if present (e.g., `10` from `010-HERO.html`)
    pub order: Option<u32>,
    /// Fragment name: the stem with the number prefix stripped.
    pub name: String,
    /// Lowercased extension without the dot. Empty if none.
    pub extension: String,
}

/// Whether `name` is usable as a slot/fragment name.
///
/// Allowed characters: ASCII alphanumerics, `_`, `-` and `.`. Must be non-empty.
pub fn is_valid_slot_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Parse a fragment filename following the `[NNN-]NAME.ext` convention.
///
/// Returns `None` for files that cannot be fragments:
/// - hidden files (`.gitkeep`)
/// - number-only stems (`010.html`, `010-.html`)
/// - names with characters outside [`is_valid_slot_name`]
pub fn parse_fragment_filename(file_name: &str) -> Option<FragmentFileName> {
    if file_name.starts_with('.') {
        return None;
    }
    let (stem, extension) = match file_name.rfind('.') {
        Some(dot) => (&file_name[..dot], file_name[dot + 1..].to_ascii_lowercase()),
        None => (file_name, String::new()),
    };

    let (order, name) = match stem.find('-') {
        Some(dash) => match stem[..dash].parse::<u32>() {
            Ok(num) => (Some(num), &stem[dash + 1..]),
            Err(_) => (None, stem),
        },
        None => match stem.parse::<u32>() {
            Ok(_) => return None,
            Err(_) => (None, stem),
        },
    };

    if !is_valid_slot_name(name) {
        return None;
    }
    Some(FragmentFileName {
        order,
        name: name.to_string(),
        extension,
    })
}
