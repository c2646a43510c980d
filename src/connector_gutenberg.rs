//! Project Gutenberg connector: bulk catalog dump.
//!
//! Downloads the whole catalog (`pg_catalog.csv`) in one request and parses
//! it with the `csv` crate. The delimiter is detected from the header line
//! (tab when it has more tabs than commas, comma otherwise). Quoted fields
//! may contain the delimiter or literal newlines.
//!
//! Column mapping (header names are matched case-insensitively):
//!
//! | Column | Record field |
//! |--------|--------------|
//! | `Text#` / `id` / `etext` / `ebook_id` | key (rows without one are dropped) |
//! | `Type` | rows other than `Text` are dropped |
//! | `Title` | title |
//! | `Authors` | author |
//! | `Language` | language |
//! | `Issued` | publication date |
//! | `Subjects` + `Bookshelves` | subject |

use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord};

use crate::config::GutenbergConfig;
use crate::error::IngestError;
use crate::http::PoliteClient;
use crate::models::{RawRecord, Source};
use crate::traits::{CatalogSource, Page};

pub const GUTENBERG_PUBLISHER: &str = "Project Gutenberg";

const ID_COLUMNS: &[&str] = &["text#", "text #", "id", "etext", "ebook_id"];

pub struct GutenbergSource {
    config: GutenbergConfig,
    client: PoliteClient,
}

impl GutenbergSource {
    pub fn new(config: GutenbergConfig, client: PoliteClient) -> Self {
        Self { config, client }
    }

    /// Download and parse the full catalog.
    pub async fn fetch_all(&self) -> Result<Vec<RawRecord>, IngestError> {
        let body = self.client.get_text(&self.config.catalog_url, &[]).await?;
        let records = parse_catalog(&body)?;
        tracing::info!(rows = records.len(), "parsed Gutenberg catalog");
        Ok(records)
    }
}

#[async_trait]
impl CatalogSource for GutenbergSource {
    fn source(&self) -> Source {
        Source::Gutenberg
    }

    fn description(&self) -> &str {
        "Project Gutenberg public-domain ebooks (bulk CSV catalog)"
    }

    async fn fetch_page(&self, _cursor: Option<&str>) -> Result<Page, IngestError> {
        Ok(Page::last(self.fetch_all().await?))
    }
}

/// Cover image URL for a Gutenberg ebook number.
pub fn cover_url(id: &str) -> String {
    format!(
        "https://www.gutenberg.org/cache/epub/{id}/pg{id}.cover.medium.jpg",
        id = id
    )
}

/// Pick the field delimiter from the header line.
pub fn detect_delimiter(body: &str) -> u8 {
    let header = body.lines().next().unwrap_or("");
    let tabs = header.matches('\t').count();
    let commas = header.matches(',').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

struct Columns {
    id: usize,
    kind: Option<usize>,
    title: Option<usize>,
    authors: Option<usize>,
    language: Option<usize>,
    issued: Option<usize>,
    subjects: Option<usize>,
    bookshelves: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Option<Self> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
        };
        Some(Self {
            id: find(ID_COLUMNS)?,
            kind: find(&["type"]),
            title: find(&["title"]),
            authors: find(&["authors", "author"]),
            language: find(&["language"]),
            issued: find(&["issued"]),
            subjects: find(&["subjects", "subject"]),
            bookshelves: find(&["bookshelves"]),
        })
    }
}

/// Parse a catalog dump into raw records.
///
/// A header without any identifier column is an [`IngestError::Api`]; rows
/// with an empty or non-numeric identifier are dropped.
pub fn parse_catalog(body: &str) -> Result<Vec<RawRecord>, IngestError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(detect_delimiter(body))
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers().map_err(catalog_error)?.clone();
    let columns = Columns::from_headers(&headers).ok_or_else(|| IngestError::Api {
        code: "malformed".to_string(),
        info: "catalog header has no identifier column".to_string(),
    })?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable catalog row");
                continue;
            }
        };
        if let Some(record) = row_record(&row, &columns) {
            records.push(record);
        }
    }
    Ok(records)
}

fn row_record(row: &StringRecord, columns: &Columns) -> Option<RawRecord> {
    let field = |idx: Option<usize>| {
        idx.and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let id = field(Some(columns.id))?;
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(kind) = field(columns.kind) {
        if !kind.eq_ignore_ascii_case("text") {
            return None;
        }
    }

    let subject = match (field(columns.subjects), field(columns.bookshelves)) {
        (Some(s), Some(b)) => Some(format!("{}; {}", s, b)),
        (s, b) => s.or(b),
    };

    let mut record = RawRecord::new(Source::Gutenberg, id.clone());
    record.title = field(columns.title);
    record.author = field(columns.authors);
    record.language = field(columns.language);
    record.issued = field(columns.issued);
    record.subject = subject;
    record.publisher = Some(GUTENBERG_PUBLISHER.to_string());
    record.cover_url = Some(cover_url(&id));
    Some(record)
}

fn catalog_error(e: csv::Error) -> IngestError {
    IngestError::Api {
        code: "malformed".to_string(),
        info: format!("unreadable catalog: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "Text#,Type,Issued,Title,Language,Authors,Subjects,LoCC,Bookshelves\n\
1342,Text,1998-06-01,Pride and Prejudice,en,\"Austen, Jane, 1775-1817\",\"Fiction; Courtship -- Fiction\",PR,Best Books Ever Listings\n\
9999,Sound,2003-01-01,Some Audio,en,Anon,,,\n\
,Text,2000-01-01,No Id,en,Anon,,,\n";

    #[test]
    fn parses_csv_with_quoted_delimiters() {
        let records = parse_catalog(CSV).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.key, "1342");
        assert_eq!(r.author.as_deref(), Some("Austen, Jane, 1775-1817"));
        assert_eq!(
            r.subject.as_deref(),
            Some("Fiction; Courtship -- Fiction; Best Books Ever Listings")
        );
        assert_eq!(r.publisher.as_deref(), Some(GUTENBERG_PUBLISHER));
        assert_eq!(
            r.cover_url.as_deref(),
            Some("https://www.gutenberg.org/cache/epub/1342/pg1342.cover.medium.jpg")
        );
    }

    #[test]
    fn detects_tab_delimiter() {
        let tsv = "Text#\tTitle\tAuthors\n11\tAlice's Adventures in Wonderland\tCarroll, Lewis\n";
        assert_eq!(detect_delimiter(tsv), b'\t');
        let records = parse_catalog(tsv).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].author.as_deref(), Some("Carroll, Lewis"));
    }

    #[test]
    fn quoted_newlines_stay_in_field() {
        let csv = "id,title\n84,\"Frankenstein;\nOr, The Modern Prometheus\"\n";
        let records = parse_catalog(csv).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].title.as_deref().unwrap().contains('\n'));
    }

    #[test]
    fn missing_id_column_is_an_error() {
        assert!(parse_catalog("title,author\nA,B\n").is_err());
    }

    #[test]
    fn non_numeric_ids_are_dropped() {
        let csv = "Text#,Title\nabc,Bad\n12,Good\n";
        let records = parse_catalog(csv).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "12");
    }
}
