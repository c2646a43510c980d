//! Identity resolution: raw record → `source://identifier`.
//!
//! The same raw record always resolves to the same URI. For the
//! numeric-key source (Gutenberg) the identifier is the decimal form of the
//! ebook number and the legacy numeric id is kept alongside it. For
//! title-keyed sources the identifier is the title with spaces replaced by
//! underscores and then percent-encoded, so `"Python Programming"` becomes
//! `wikibooks://Python_Programming`.

use crate::error::IngestError;
use crate::models::{RawRecord, Source};

pub const URI_SEPARATOR: &str = "://";

/// Resolved identity of a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookIdentity {
    pub uri: String,
    pub source: Source,
    pub source_id: String,
    pub legacy_id: Option<i64>,
}

impl BookIdentity {
    /// Natural key used in logs and error messages.
    pub fn natural_key(&self) -> &str {
        &self.uri
    }
}

/// Compute the identity of a raw record.
///
/// # Errors
///
/// Returns [`IngestError::InvalidRecord`] when the record's key is empty,
/// or not a non-negative integer for the numeric-key source.
pub fn resolve(raw: &RawRecord) -> Result<BookIdentity, IngestError> {
    let key = raw.key.trim();
    if key.is_empty() {
        return Err(IngestError::InvalidRecord(format!(
            "{} record has an empty key",
            raw.source
        )));
    }

    let (source_id, legacy_id) = if raw.source.has_numeric_key() {
        let n: u32 = key.parse().map_err(|_| {
            IngestError::InvalidRecord(format!(
                "{} key '{}' is not a numeric id",
                raw.source, key
            ))
        })?;
        (n.to_string(), Some(i64::from(n)))
    } else {
        (encode_title_key(key), None)
    };

    Ok(BookIdentity {
        uri: build_uri(raw.source, &source_id),
        source: raw.source,
        source_id,
        legacy_id,
    })
}

/// Encode a title-derived key into a URI-safe identifier segment.
pub fn encode_title_key(title: &str) -> String {
    let underscored = title.split_whitespace().collect::<Vec<_>>().join("_");
    urlencoding::encode(&underscored).into_owned()
}

pub fn build_uri(source: Source, source_id: &str) -> String {
    format!("{}{}{}", source.as_str(), URI_SEPARATOR, source_id)
}

/// Split a URI on its first `://` into `(source, source_id)`.
pub fn split_uri(uri: &str) -> Option<(&str, &str)> {
    uri.split_once(URI_SEPARATOR)
        .filter(|(source, id)| !source.is_empty() && !id.is_empty())
}
