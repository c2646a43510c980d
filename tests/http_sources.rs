//! HTTP-facing components against a local mock server.

use mockito::{Matcher, Server};
use serde_json::json;

use bibliotech_ingest::classify::{Classifier, KeywordClassifier};
use bibliotech_ingest::classify_llm::LlmClassifier;
use bibliotech_ingest::config::{ClassifierConfig, Config, HttpConfig};
use bibliotech_ingest::connector_gutenberg::GutenbergSource;
use bibliotech_ingest::connector_wikibooks::{WikibooksSource, WIKIBOOKS_AUTHOR};
use bibliotech_ingest::error::IngestError;
use bibliotech_ingest::http::PoliteClient;
use bibliotech_ingest::ingest::{IngestOptions, Pipeline};
use bibliotech_ingest::models::{BookRecord, ClassificationCode, Source};
use bibliotech_ingest::progress::NoProgress;
use bibliotech_ingest::store::memory::InMemoryStore;
use bibliotech_ingest::store::rest::RestStore;
use bibliotech_ingest::store::{BookRow, BookStore, StoreError};
use bibliotech_ingest::traits::CatalogSource;

const FIRST_PAGE_QUERY: &str =
    r"^action=query&list=allpages&apnamespace=0&aplimit=2&format=json$";

fn http_config() -> HttpConfig {
    let mut http = Config::default().http;
    http.request_delay_ms = 0;
    http.batch_delay_ms = 0;
    http
}

fn client() -> PoliteClient {
    PoliteClient::new(&http_config()).unwrap()
}

fn wikibooks(server: &Server) -> WikibooksSource {
    let mut config = Config::default().sources.wikibooks;
    config.api_url = format!("{}/w/api.php", server.url());
    config.page_size = 2;
    WikibooksSource::new(config, client())
}

fn listing(titles: &[&str], next: Option<&str>) -> String {
    let pages: Vec<_> = titles
        .iter()
        .enumerate()
        .map(|(i, t)| json!({"pageid": i + 1, "ns": 0, "title": t}))
        .collect();
    let mut body = json!({"batchcomplete": "", "query": {"allpages": pages}});
    if let Some(next) = next {
        body["continue"] = json!({"apcontinue": next, "continue": "-||"});
    }
    body.to_string()
}

// ============ Wikibooks ============

#[tokio::test]
async fn wikibooks_follows_continuation() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/w/api.php")
        .match_query(Matcher::Regex(FIRST_PAGE_QUERY.into()))
        .match_header("api-user-agent", Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(listing(&["Haskell", "Prolog"], Some("Scheme")))
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/w/api.php")
        .match_query(Matcher::UrlEncoded("apcontinue".into(), "Scheme".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(listing(&["Scheme"], None))
        .expect(1)
        .create_async()
        .await;

    let source = wikibooks(&server);
    let page = source.fetch_page(None).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].title.as_deref(), Some("Haskell"));
    assert_eq!(page.items[0].author.as_deref(), Some(WIKIBOOKS_AUTHOR));
    assert_eq!(page.next_cursor.as_deref(), Some("Scheme"));

    let last = source.fetch_page(page.next_cursor.as_deref()).await.unwrap();
    assert_eq!(last.items.len(), 1);
    assert!(last.next_cursor.is_none());

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn wikibooks_error_payload_is_api_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/w/api.php")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"error": {"code": "badvalue", "info": "Unrecognized value"}}).to_string())
        .create_async()
        .await;

    let err = wikibooks(&server).fetch_page(None).await.unwrap_err();
    match err {
        IngestError::Api { code, info } => {
            assert_eq!(code, "badvalue");
            assert!(info.contains("Unrecognized"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn html_error_page_is_transient() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/w/api.php")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<!DOCTYPE html><html><body>Wikimedia Error</body></html>")
        .create_async()
        .await;

    let err = wikibooks(&server).fetch_page(None).await.unwrap_err();
    assert!(matches!(err, IngestError::TransientFetch { .. }), "{:?}", err);
}

#[tokio::test]
async fn server_error_is_transient() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/w/api.php")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let err = wikibooks(&server).fetch_page(None).await.unwrap_err();
    assert!(err.to_string().contains("503"));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn wikibooks_enrich_fetches_intro_extract() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/w/api.php")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("prop".into(), "extracts".into()),
            Matcher::UrlEncoded("titles".into(), "Haskell".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({"query": {"pages": {"42": {
                "title": "Haskell",
                "extract": "  Haskell is a purely functional programming language.  "
            }}}})
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let source = wikibooks(&server);
    let page_item = bibliotech_ingest::connector_wikibooks::parse_listing(&json!({
        "query": {"allpages": [{"title": "Haskell"}]}
    }))
    .unwrap()
    .items
    .remove(0);
    let enriched = source.enrich(page_item).await.unwrap();
    assert_eq!(
        enriched.description.as_deref(),
        Some("Haskell is a purely functional programming language.")
    );
}

#[tokio::test]
async fn wikibooks_run_skips_enrichment_for_rejected_pages() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/w/api.php")
        .match_query(Matcher::Regex(FIRST_PAGE_QUERY.into()))
        .with_status(200)
        .with_body(listing(&["Category:Programming", "Python Programming"], None))
        .create_async()
        .await;
    let rejected = server
        .mock("GET", "/w/api.php")
        .match_query(Matcher::UrlEncoded("titles".into(), "Category:Programming".into()))
        .expect(0)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", "/w/api.php")
        .match_query(Matcher::UrlEncoded("titles".into(), "Python Programming".into()))
        .with_status(200)
        .with_body(
            json!({"query": {"pages": {"7": {"extract": "Learn programming with Python."}}}})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let mut config = Config::default();
    config.http = http_config();
    let source = wikibooks(&server);
    let store = InMemoryStore::new();
    let classifier = KeywordClassifier::new(config.default_classification(Source::Wikibooks));

    let summary = Pipeline {
        config: &config,
        source: &source,
        classifier: &classifier,
        store: &store,
        progress: &NoProgress,
    }
    .run(IngestOptions::default())
    .await
    .unwrap();

    assert_eq!(summary.filtered, 1);
    assert_eq!(summary.inserted, 1);
    let book = store
        .find_by_uri("wikibooks://Python_Programming")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(book.classification.as_deref(), Some("005"));
    assert_eq!(book.author.as_deref(), Some(WIKIBOOKS_AUTHOR));

    rejected.assert_async().await;
    accepted.assert_async().await;
}

// ============ Gutenberg ============

#[tokio::test]
async fn gutenberg_downloads_whole_catalog() {
    let mut server = Server::new_async().await;
    let catalog = server
        .mock("GET", "/cache/epub/feeds/pg_catalog.csv")
        .with_status(200)
        .with_header("content-type", "text/csv")
        .with_body(
            "Text#,Type,Issued,Title,Language,Authors,Subjects,LoCC,Bookshelves\n\
             84,Text,1993-10-01,Frankenstein,en,\"Shelley, Mary\",Science fiction,PR,Gothic Fiction\n\
             10,Sound,2003-01-01,Some Audio,en,Anon,,,\n\
             11,Text,2008-06-27,Alice's Adventures in Wonderland,en,\"Carroll, Lewis\",Fantasy fiction,PR,\n",
        )
        .expect(1)
        .create_async()
        .await;

    let mut config = Config::default().sources.gutenberg;
    config.catalog_url = format!("{}/cache/epub/feeds/pg_catalog.csv", server.url());
    let source = GutenbergSource::new(config, client());

    let page = source.fetch_page(None).await.unwrap();
    assert!(page.next_cursor.is_none());
    assert_eq!(page.items.len(), 2);
    let frankenstein = &page.items[0];
    assert_eq!(frankenstein.key, "84");
    assert_eq!(frankenstein.author.as_deref(), Some("Shelley, Mary"));
    assert_eq!(
        frankenstein.subject.as_deref(),
        Some("Science fiction; Gothic Fiction")
    );
    assert!(frankenstein
        .cover_url
        .as_deref()
        .is_some_and(|u| u.ends_with("pg84.cover.medium.jpg")));
    catalog.assert_async().await;
}

// ============ Remote classifier ============

fn classifier_config(server: &Server) -> ClassifierConfig {
    let mut config = Config::default().classifier;
    config.provider = "llm".into();
    config.endpoint = Some(format!("{}/v1/chat/completions", server.url()));
    config.model = Some("librarian-small".into());
    config.api_key = Some("test-key".into());
    config.request_delay_ms = 0;
    config.max_retries = 1;
    config
}

fn completion(content: &str) -> String {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]}).to_string()
}

#[tokio::test]
async fn llm_classifier_extracts_code_from_reply() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({"model": "librarian-small"})))
        .with_status(200)
        .with_body(completion("The best class is 005."))
        .expect(1)
        .create_async()
        .await;

    let classifier = LlmClassifier::new(&classifier_config(&server)).unwrap();
    let code = classifier
        .classify("Rust Programming", "Systems programming")
        .await
        .unwrap();
    assert_eq!(code, ClassificationCode::parse("005").unwrap());
    mock.assert_async().await;
}

#[tokio::test]
async fn llm_client_error_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(400)
        .with_body(json!({"error": {"message": "bad request"}}).to_string())
        .expect(1)
        .create_async()
        .await;

    let classifier = LlmClassifier::new(&classifier_config(&server)).unwrap();
    let err = classifier.classify("Dune", "").await.unwrap_err();
    assert!(matches!(err, IngestError::Classification(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn llm_server_error_is_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    let classifier = LlmClassifier::new(&classifier_config(&server)).unwrap();
    let err = classifier.classify("Dune", "").await.unwrap_err();
    assert!(err.to_string().contains("503"));
    mock.assert_async().await;
}

#[tokio::test]
async fn llm_reply_without_code_is_classification_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(completion("I cannot classify this book."))
        .create_async()
        .await;

    let classifier = LlmClassifier::new(&classifier_config(&server)).unwrap();
    let err = classifier.classify("Untitled", "").await.unwrap_err();
    assert!(matches!(err, IngestError::Classification(_)));
}

// ============ REST store ============

fn rest_store(server: &Server) -> RestStore {
    let mut config = Config::default().store;
    config.backend = "rest".into();
    config.url = Some(server.url());
    config.api_key = Some("service-key".into());
    RestStore::new(&config).unwrap()
}

fn row() -> BookRow {
    BookRow::from_record(&BookRecord {
        uri: "gutenberg://84".into(),
        source: Source::Gutenberg,
        source_id: "84".into(),
        legacy_id: Some(84),
        title: "Frankenstein".into(),
        author: "Shelley, Mary".into(),
        classification: ClassificationCode::parse("800").unwrap(),
        language: "en".into(),
        subject: None,
        publisher: None,
        publication_date: None,
        description: "Science fiction".into(),
        cover_uri: None,
        curator_id: None,
    })
}

#[tokio::test]
async fn rest_lookup_sends_credentials_and_filters() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/rest/v1/books")
        .match_header("apikey", "service-key")
        .match_header("authorization", "Bearer service-key")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("uri".into(), "eq.gutenberg://84".into()),
            Matcher::UrlEncoded("limit".into(), "1".into()),
        ]))
        .with_status(200)
        .with_body(
            json!([{
                "uri": "gutenberg://84",
                "source": "gutenberg",
                "source_id": "84",
                "title": "Frankenstein",
                "classification": "800",
                "curator_id": 2
            }])
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let found = rest_store(&server)
        .find_by_uri("gutenberg://84")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.curator_id, Some(2));
    assert_eq!(found.source_id, "84");
    mock.assert_async().await;
}

#[tokio::test]
async fn rest_conflict_is_unique_violation() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/rest/v1/books")
        .match_header("prefer", "return=minimal")
        .with_status(409)
        .with_body(
            json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"books_uri_key\""
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = rest_store(&server).insert_book(&row()).await.unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation(_)));
}

#[tokio::test]
async fn rest_schema_cache_miss_is_missing_column() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/rest/v1/books")
        .with_status(400)
        .with_body(
            json!({
                "code": "PGRST204",
                "message": "Could not find the 'uri' column of 'books' in the schema cache"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = rest_store(&server).insert_book(&row()).await.unwrap_err();
    assert_eq!(err, StoreError::MissingColumn("uri".into()));
}

#[tokio::test]
async fn rest_has_field_probes_column() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/rest/v1/books")
        .match_query(Matcher::UrlEncoded("select".into(), "title".into()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    server
        .mock("GET", "/rest/v1/books")
        .match_query(Matcher::UrlEncoded("select".into(), "uri".into()))
        .with_status(400)
        .with_body(
            json!({"code": "42703", "message": "column books.uri does not exist"}).to_string(),
        )
        .create_async()
        .await;

    let store = rest_store(&server);
    assert!(store.has_field("title").await.unwrap());
    assert!(!store.has_field("uri").await.unwrap());
}
