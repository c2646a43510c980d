//! Wikibooks connector: cursor-paginated MediaWiki API.
//!
//! Lists main-namespace pages with `list=allpages`, following the
//! `continue.apcontinue` token between pages. Per-item detail (the plain-text
//! intro extract) is fetched lazily by [`CatalogSource::enrich`] once a title
//! has passed the record filter, so rejected administrative pages cost no
//! extra request.
//!
//! # Configuration
//!
//! ```toml
//! [sources.wikibooks]
//! api_url = "https://en.wikibooks.org/w/api.php"
//! page_size = 50
//! default_classification = "000"
//! batch_size = 5
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::config::WikibooksConfig;
use crate::error::IngestError;
use crate::http::PoliteClient;
use crate::models::{RawRecord, Source};
use crate::traits::{CatalogSource, Page};

/// Collective attribution used for every Wikibooks record.
pub const WIKIBOOKS_AUTHOR: &str = "Wikibooks contributors";
pub const WIKIBOOKS_PUBLISHER: &str = "Wikibooks";

pub struct WikibooksSource {
    config: WikibooksConfig,
    client: PoliteClient,
}

impl WikibooksSource {
    pub fn new(config: WikibooksConfig, client: PoliteClient) -> Self {
        Self { config, client }
    }

    fn listing_query(&self, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("action", "query".to_string()),
            ("list", "allpages".to_string()),
            ("apnamespace", "0".to_string()),
            ("aplimit", self.config.page_size.to_string()),
            ("format", "json".to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("apcontinue", cursor.to_string()));
        }
        query
    }
}

#[async_trait]
impl CatalogSource for WikibooksSource {
    fn source(&self) -> Source {
        Source::Wikibooks
    }

    fn description(&self) -> &str {
        "Wikibooks open textbooks (MediaWiki allpages API)"
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, IngestError> {
        let query = self.listing_query(cursor);
        let json = self.client.get_json(&self.config.api_url, &query).await?;
        parse_listing(&json)
    }

    async fn enrich(&self, mut record: RawRecord) -> Result<RawRecord, IngestError> {
        let title = record.title_or_empty().to_string();
        let query = [
            ("action", "query".to_string()),
            ("prop", "extracts".to_string()),
            ("exintro", "1".to_string()),
            ("explaintext", "1".to_string()),
            ("redirects", "1".to_string()),
            ("titles", title),
            ("format", "json".to_string()),
        ];
        let json = self.client.get_json(&self.config.api_url, &query).await?;
        if let Some(extract) = parse_extract(&json)? {
            record.description = Some(extract);
        }
        Ok(record)
    }
}

/// Fail with [`IngestError::Api`] when the payload carries an `error` object.
pub fn check_api_error(json: &Value) -> Result<(), IngestError> {
    match json.get("error") {
        Some(err) => Err(IngestError::Api {
            code: err
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            info: err
                .get("info")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
        }),
        None => Ok(()),
    }
}

/// Parse an `allpages` listing response into a [`Page`].
pub fn parse_listing(json: &Value) -> Result<Page, IngestError> {
    check_api_error(json)?;

    let pages = json
        .pointer("/query/allpages")
        .and_then(Value::as_array)
        .ok_or_else(|| IngestError::Api {
            code: "malformed".to_string(),
            info: "response has no query.allpages array".to_string(),
        })?;

    let items = pages
        .iter()
        .filter_map(|p| p.get("title").and_then(Value::as_str))
        .map(page_record)
        .collect();

    let next_cursor = json
        .pointer("/continue/apcontinue")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(Page { items, next_cursor })
}

/// Pull the first non-empty `extract` out of a `prop=extracts` response.
pub fn parse_extract(json: &Value) -> Result<Option<String>, IngestError> {
    check_api_error(json)?;
    let extract = json
        .pointer("/query/pages")
        .and_then(Value::as_object)
        .and_then(|pages| {
            pages
                .values()
                .filter_map(|p| p.get("extract").and_then(Value::as_str))
                .map(str::trim)
                .find(|e| !e.is_empty())
        })
        .map(str::to_string);
    Ok(extract)
}

fn page_record(title: &str) -> RawRecord {
    let mut record = RawRecord::new(Source::Wikibooks, title);
    record.title = Some(title.to_string());
    record.author = Some(WIKIBOOKS_AUTHOR.to_string());
    record.publisher = Some(WIKIBOOKS_PUBLISHER.to_string());
    record.language = Some("en".to_string());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_with_continuation() {
        let payload = json!({
            "batchcomplete": "",
            "continue": {"apcontinue": "Haskell", "continue": "-||"},
            "query": {"allpages": [
                {"pageid": 1, "ns": 0, "title": "Ada Programming"},
                {"pageid": 2, "ns": 0, "title": "C Programming"}
            ]}
        });
        let page = parse_listing(&payload).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].key, "Ada Programming");
        assert_eq!(page.items[0].author.as_deref(), Some(WIKIBOOKS_AUTHOR));
        assert_eq!(page.next_cursor.as_deref(), Some("Haskell"));
    }

    #[test]
    fn last_listing_has_no_cursor() {
        let payload = json!({"query": {"allpages": [{"title": "Zebra"}]}});
        let page = parse_listing(&payload).unwrap();
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn error_payload_is_api_error() {
        let payload = json!({"error": {"code": "badvalue", "info": "Unrecognized value"}});
        match parse_listing(&payload).unwrap_err() {
            IngestError::Api { code, info } => {
                assert_eq!(code, "badvalue");
                assert!(info.contains("Unrecognized"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extract_is_trimmed() {
        let payload = json!({"query": {"pages": {"42": {"title": "Haskell", "extract": "  A book.\n"}}}});
        assert_eq!(parse_extract(&payload).unwrap().as_deref(), Some("A book."));

        let missing = json!({"query": {"pages": {"-1": {"title": "Nope", "missing": ""}}}});
        assert_eq!(parse_extract(&missing).unwrap(), None);
    }
}
