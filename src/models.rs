//! Core data models used throughout the ingestion pipeline.
//!
//! Raw records come out of a catalog source, are filtered and resolved to a
//! [`BookRecord`], and end up in the store. [`Curator`] rows are read-only
//! from the pipeline's point of view.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External catalog a record originates from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Gutenberg,
    Wikibooks,
    #[default]
    Custom,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Gutenberg => "gutenberg",
            Source::Wikibooks => "wikibooks",
            Source::Custom => "custom",
        }
    }

    /// Whether this source's historical identity was a bare integer.
    pub fn has_numeric_key(&self) -> bool {
        matches!(self, Source::Gutenberg)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gutenberg" => Ok(Source::Gutenberg),
            "wikibooks" => Ok(Source::Wikibooks),
            "custom" => Ok(Source::Custom),
            other => Err(format!(
                "Unknown source: '{}'. Available: gutenberg, wikibooks, custom",
                other
            )),
        }
    }
}

/// A 3-digit taxonomy code (Dewey-Decimal-like), always in `000..=999`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassificationCode(String);

impl ClassificationCode {
    /// Parse a code, accepting exactly three ASCII digits.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(code.to_string()))
        } else {
            None
        }
    }

    /// `000`, the general-works class.
    pub fn general_works() -> Self {
        Self("000".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ClassificationCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ClassificationCode::parse(&value)
            .ok_or_else(|| format!("invalid classification code: '{}'", value))
    }
}

impl From<ClassificationCode> for String {
    fn from(code: ClassificationCode) -> Self {
        code.0
    }
}

/// Raw item produced by a catalog source before filtering and normalization.
///
/// `key` is the source's natural key: the decimal ebook number for
/// Gutenberg, the page title for Wikibooks.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub source: Source,
    pub key: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub issued: Option<String>,
    pub cover_url: Option<String>,
}

impl RawRecord {
    pub fn new(source: Source, key: impl Into<String>) -> Self {
        Self {
            source,
            key: key.into(),
            ..Default::default()
        }
    }

    /// Title as seen by the record filter (empty when the source omitted it).
    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }
}

/// Normalized catalog entry, as written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub uri: String,
    pub source: Source,
    pub source_id: String,
    pub legacy_id: Option<i64>,
    pub title: String,
    pub author: String,
    pub classification: ClassificationCode,
    pub language: String,
    pub subject: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub description: String,
    pub cover_uri: Option<String>,
    pub curator_id: Option<i64>,
}

/// A domain expert who may sponsor books in their field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curator {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub department: Option<String>,
}

impl Curator {
    pub fn department_or_empty(&self) -> &str {
        self.department.as_deref().unwrap_or("")
    }
}
