//! Identifier sanitization
//!
//! Turns free text (category names, drug labels, NDC code lists, page titles)
//! into path segments that are safe on common filesystems and bounded in
//! length. Sanitization is pure and deterministic but not injective; the
//! [`crate::store::NameRegistry`] handles collisions.

use regex::Regex;
use std::sync::LazyLock;

/// Common filesystem limit for a single path segment, in bytes
pub const DEFAULT_BUDGET: usize = 255;

/// Smallest usable budget: room for a short stem, a collision suffix and the extension
pub const MIN_BUDGET: usize = 16;

/// Extension given to every output unit
pub const TEXT_EXTENSION: &str = "txt";

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static HYPHEN_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").unwrap());
static UNDERSCORE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{2,}").unwrap());

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Sanitize `text` into a segment of at most `budget` bytes.
///
/// Characters other than alphanumerics, `_`, `-` and whitespace are removed,
/// whitespace runs become a single `_`, and the result is cut at `budget`
/// bytes without regard for word boundaries.
pub fn sanitize(text: &str, budget: usize) -> String {
    let kept: String = text
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();
    let collapsed = WHITESPACE_RUN.replace_all(&kept, "_");
    truncate(&collapsed, budget).to_string()
}

/// Sanitize a composite key built by joining several source fields.
///
/// Whitespace is dropped entirely, other non-word characters are removed and
/// each run of a repeated separator collapses to a single one.
pub fn sanitize_key(key: &str) -> String {
    let kept: String = key.chars().filter(|c| is_word_char(*c)).collect();
    let kept = HYPHEN_RUN.replace_all(&kept, "-");
    UNDERSCORE_RUN.replace_all(&kept, "_").into_owned()
}

/// Longest prefix of `s` that fits in `budget` bytes and ends on a char boundary
pub fn truncate(s: &str, budget: usize) -> &str {
    if s.len() <= budget {
        return s;
    }
    let mut end = budget;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// `<stem>.<ext>` bounded to `budget` bytes; the stem is shortened, never the extension
pub fn with_extension(stem: &str, ext: &str, budget: usize) -> String {
    let room = budget.saturating_sub(ext.len() + 1);
    format!("{}.{}", truncate(stem, room), ext)
}

/// Filename for a listing item: `<label>_<key>.txt`, or `<label>.txt` when
/// the key sanitizes to nothing.
///
/// Returns `None` when the label sanitizes to nothing.
pub fn item_filename(label: &str, secondary_key: &str, budget: usize) -> Option<String> {
    let label = sanitize(label, budget);
    if label.is_empty() {
        return None;
    }
    let key = sanitize_key(secondary_key);
    let stem = if key.is_empty() {
        label
    } else {
        format!("{}_{}", label, key)
    };
    Some(with_extension(&stem, TEXT_EXTENSION, budget))
}

/// Filename for a page identified by its title, `None` if the title sanitizes to nothing
pub fn title_filename(title: &str, budget: usize) -> Option<String> {
    let stem = sanitize(title, budget);
    (!stem.is_empty()).then(|| with_extension(&stem, TEXT_EXTENSION, budget))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(sanitize("a   b\tc", 255), "a_b_c");
    }

    #[test]
    fn test_character_stripping_preserves_order() {
        let out = sanitize("Vitamin D/C3 (5mg)!", 255);
        assert_eq!(out, "Vitamin_DC3_5mg");
        assert!(out
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_sanitize_is_deterministic_and_bounded() {
        let long = "x".repeat(600);
        let wide = "é".repeat(300);
        let inputs: [&str; 6] = [
            "",
            "Cardio Drugs",
            "  leading and trailing  ",
            "Ünïcödé – dashes — and  spaces",
            &long,
            &wide,
        ];
        for input in inputs {
            for budget in [0, 1, 7, 64, 255] {
                let first = sanitize(input, budget);
                assert_eq!(first, sanitize(input, budget));
                assert!(first.len() <= budget, "{:?} exceeded {}", first, budget);
            }
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // each 'é' is two bytes
        assert_eq!(truncate("éé", 3), "é");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_sanitize_key_collapses_separators() {
        assert_eq!(sanitize_key("0001-02 -- 03__04"), "0001-02-03_04");
        assert_eq!(sanitize_key("NDC 123 / 456"), "NDC123456");
        assert_eq!(sanitize_key(""), "");
    }

    #[test]
    fn test_item_filename() {
        assert_eq!(
            item_filename("Aspirin", "NDC123", 255).as_deref(),
            Some("Aspirin_NDC123.txt")
        );
        assert_eq!(
            item_filename("Aspirin 81 mg", "", 255).as_deref(),
            Some("Aspirin_81_mg.txt")
        );
    }

    #[test]
    fn test_item_filename_keeps_extension_within_budget() {
        let name = item_filename(&"a".repeat(300), "key", 255).unwrap();
        assert_eq!(name.len(), 255);
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn test_stripped_label_yields_no_filename() {
        assert_eq!(item_filename("®™", "", 255), None);
        assert_eq!(item_filename("???", "NDC123", 255), None);
        assert_eq!(title_filename("???", 255), None);
    }

    #[test]
    fn test_title_filename() {
        assert_eq!(
            title_filename("Acute Pain: Overview", 255).as_deref(),
            Some("Acute_Pain_Overview.txt")
        );
    }
}
