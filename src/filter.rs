//! Record filter: decides whether a raw record is a real catalog entry.
//!
//! Administrative and meta pages (categories, templates, user pages,
//! redirects, stubs, ...) are rejected by case-insensitive substring match
//! on the title, as are degenerate titles shorter than
//! [`MIN_TITLE_CHARS`]. The check is a pure, total function.

use crate::models::RawRecord;

/// Titles shorter than this (in characters, after trimming) are rejected.
pub const MIN_TITLE_CHARS: usize = 3;

/// Lowercased substrings marking administrative or namespace pages.
pub const ADMIN_MARKERS: &[&str] = &[
    "category:",
    "template:",
    "help:",
    "user:",
    "file:",
    "mediawiki:",
    "wikibooks:",
    "disambiguation",
    "redirect",
    "stub",
    "book:",
    "module:",
];

/// Outcome of filtering a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Title contains the given administrative marker.
    RejectMarker(&'static str),
    /// Title is shorter than [`MIN_TITLE_CHARS`].
    RejectTooShort,
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Classify a title as a catalog entry or not.
pub fn check_title(title: &str) -> Verdict {
    let lowered = title.to_lowercase();

    if let Some(marker) = ADMIN_MARKERS.iter().find(|m| lowered.contains(*m)) {
        return Verdict::RejectMarker(marker);
    }

    if lowered.trim().chars().count() < MIN_TITLE_CHARS {
        return Verdict::RejectTooShort;
    }

    Verdict::Accept
}

/// Convenience wrapper over [`check_title`] for raw records.
pub fn accept(record: &RawRecord) -> bool {
    check_title(record.title_or_empty()).is_accept()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    #[test]
    fn rejects_admin_namespaces() {
        assert_eq!(
            check_title("Category:Programming"),
            Verdict::RejectMarker("category:")
        );
        assert!(!check_title("Template:Stub").is_accept());
        assert!(!check_title("User:Example/Sandbox").is_accept());
        assert!(!check_title("Help:Contents").is_accept());
        assert!(!check_title("Wikibooks:Reading room").is_accept());
        assert!(!check_title("Mercury (disambiguation)").is_accept());
        assert!(!check_title("Book:Cookbook").is_accept());
        assert!(!check_title("Module:Arguments").is_accept());
    }

    #[test]
    fn markers_are_case_insensitive() {
        assert!(!check_title("CATEGORY:Physics").is_accept());
        assert!(!check_title("Some Redirect Page").is_accept());
    }

    #[test]
    fn rejects_short_titles() {
        assert_eq!(check_title(""), Verdict::RejectTooShort);
        assert_eq!(check_title("Go"), Verdict::RejectTooShort);
        assert_eq!(check_title("  C  "), Verdict::RejectTooShort);
        assert!(check_title("Ada").is_accept());
    }

    #[test]
    fn accepts_real_books() {
        assert!(check_title("Python Programming").is_accept());
        assert!(check_title("Pride and Prejudice").is_accept());
        assert!(check_title("Ελληνικά για αρχάριους").is_accept());
    }

    #[test]
    fn verdict_is_deterministic() {
        let titles = ["Category:X", "ab", "Python Programming", "", "Ünïcödé Title"];
        for t in titles {
            assert_eq!(check_title(t), check_title(t));
        }
    }

    #[test]
    fn record_without_title_is_rejected() {
        let raw = RawRecord::new(Source::Wikibooks, "x");
        assert!(!accept(&raw));
    }
}
