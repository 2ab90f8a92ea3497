//! Title normalization for cross-source matching.
//!
//! Providers disagree on punctuation and capitalization of the same title
//! ("Attention Is All You Need" vs "Attention is all you need."), so titles are
//! matched on a canonical key: punctuation removed, case folded. Whitespace is
//! left untouched.
//!
//! Besides Unicode punctuation, only the ASCII symbols `$+<=>^|~` and the
//! backtick are removed. Other symbols carry meaning in titles
//! ("x ≤ y", "Cu²⁺") and stay part of the key.

use crate::error::{MergeError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Unicode punctuation plus the ASCII symbols outside that class
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{P}$+<=>^`|~]").expect("punctuation pattern is valid"));

/// Canonical matching key for a title.
///
/// Idempotent: `normalize(&normalize(t)) == normalize(t)`.
pub fn normalize(title: &str) -> String {
    PUNCTUATION.replace_all(title, "").to_lowercase()
}

/// Matching key of a record title, failing when the title is absent.
///
/// Callers are expected to run [`crate::index::drop_untitled`] first; reaching
/// this error means that step was skipped.
pub fn title_key(title: Option<&str>, source_index: usize, position: usize) -> Result<String> {
    title
        .map(normalize)
        .ok_or(MergeError::MissingTitle {
            source_index,
            position,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("Foo"), "foo");
        assert_eq!(normalize("foo!"), "foo");
        assert_eq!(
            normalize("Attention Is All You Need."),
            "attention is all you need"
        );
        assert_eq!(normalize("COVID-19: a (brief) review"), "covid19 a brief review");
        assert_eq!(normalize("Cost $5 + tax"), "cost 5  tax");
    }

    #[test]
    fn test_normalize_keeps_whitespace() {
        assert_eq!(normalize("  Two  Spaces "), "  two  spaces ");
    }

    #[test]
    fn test_normalize_unicode() {
        assert_eq!(normalize("Über «Graphen» – Teil 1"), "über graphen  teil 1");
    }

    #[test]
    fn test_normalize_keeps_meaningful_symbols() {
        assert_eq!(normalize("Bounds for x ≤ y"), "bounds for x ≤ y");
        assert_ne!(normalize("Bounds for x ≤ y"), normalize("Bounds for x ≥ y"));
        assert_ne!(normalize("Cu²⁺ binding sites"), normalize("Cu²⁻ binding sites"));
        assert_eq!(normalize("a|b ~c^d `e` <f>=g"), "ab cd e fg");
        assert_eq!(normalize("foo!"), normalize("Foo"));
    }

    #[test]
    fn test_normalize_idempotent() {
        for title in ["Foo", "foo!", "A/B testing: Why?", "ÄÖÜ—x", "", "...", "Mixed CASE, too."] {
            let once = normalize(title);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_title_key_requires_title() {
        let err = title_key(None, 2, 7).err();
        assert!(matches!(
            err,
            Some(MergeError::MissingTitle {
                source_index: 2,
                position: 7
            })
        ));

        assert_eq!(title_key(Some("Hello, World"), 0, 0).ok().as_deref(), Some("hello world"));
    }
}
