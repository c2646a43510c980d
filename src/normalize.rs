//! Raw record → [`BookRecord`] normalization.
//!
//! Applies field defaults (`"Untitled"`, `"Unknown"`, `"en"`) and bounds the
//! description length, appending [`ELLIPSIS`] when text is cut.

use crate::identity::BookIdentity;
use crate::models::{BookRecord, ClassificationCode, RawRecord};

pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_AUTHOR: &str = "Unknown";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const ELLIPSIS: &str = "...";

/// Build the store-ready record for a resolved raw record.
pub fn build_record(
    raw: &RawRecord,
    identity: &BookIdentity,
    classification: ClassificationCode,
    curator_id: Option<i64>,
    description_max_chars: usize,
) -> BookRecord {
    let description = raw
        .description
        .as_deref()
        .or(raw.subject.as_deref())
        .map(|d| truncate_chars(d.trim(), description_max_chars))
        .unwrap_or_default();

    BookRecord {
        uri: identity.uri.clone(),
        source: identity.source,
        source_id: identity.source_id.clone(),
        legacy_id: identity.legacy_id,
        title: non_empty(raw.title.as_deref()).unwrap_or(DEFAULT_TITLE).to_string(),
        author: non_empty(raw.author.as_deref())
            .unwrap_or(DEFAULT_AUTHOR)
            .to_string(),
        classification,
        language: non_empty(raw.language.as_deref())
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string(),
        subject: non_empty(raw.subject.as_deref()).map(str::to_string),
        publisher: non_empty(raw.publisher.as_deref()).map(str::to_string),
        publication_date: non_empty(raw.issued.as_deref()).map(str::to_string),
        description,
        cover_uri: non_empty(raw.cover_url.as_deref()).map(str::to_string),
        curator_id,
    }
}

/// Cut `text` to at most `max_chars` characters, ellipsis included.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars < ELLIPSIS.len() {
        return text.chars().take(max_chars).collect();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str(ELLIPSIS);
    out
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
