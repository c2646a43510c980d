//! Backfill curator links for stored books that have none.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::curator::{match_curator, BookText, MatchWeights};
use crate::error::IngestError;
use crate::store::{open_store, BookPatch, BookQuery, BookStore};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub examined: u64,
    pub linked: Vec<(String, i64)>,
    pub unmatched: u64,
    pub errors: u64,
}

/// Match every unlinked book (up to `limit`) and set its curator.
///
/// Only rows with no curator are selected, so a set value is never
/// overwritten.
pub async fn link_curators(
    store: &dyn BookStore,
    weights: &MatchWeights,
    limit: Option<usize>,
    dry_run: bool,
) -> Result<LinkReport, IngestError> {
    let curators = store
        .list_curators()
        .await
        .map_err(|e| IngestError::persistence("curators", e))?;
    let books = store
        .query_books(&BookQuery {
            missing_curator: true,
            limit,
            ..BookQuery::default()
        })
        .await
        .map_err(|e| IngestError::persistence("unlinked books", e))?;

    let mut report = LinkReport::default();
    for book in &books {
        report.examined += 1;
        let text = BookText::new(
            &book.title,
            book.description.as_deref().unwrap_or(""),
            book.subject.as_deref(),
        );
        let Some(curator_id) = match_curator(&text, &curators, weights) else {
            report.unmatched += 1;
            continue;
        };

        if !dry_run {
            let patch = BookPatch {
                curator_id: Some(curator_id),
                ..BookPatch::default()
            };
            if let Err(e) = store.update_book(&book.key(), &patch).await {
                tracing::warn!(uri = %book.display_uri(), error = %e, "curator link failed");
                report.errors += 1;
                continue;
            }
        }
        report.linked.push((book.display_uri(), curator_id));
    }
    Ok(report)
}

/// `biblio link-curators [count|all]`.
pub async fn run_link_curators(config: &Config, limit: Option<usize>, dry_run: bool) -> Result<()> {
    config.require_store_credentials()?;
    let store = open_store(config).await?;

    let report = link_curators(store.as_ref(), &config.curator_match, limit, dry_run)
        .await
        .context("curator linking failed")?;

    if dry_run {
        println!("link-curators (dry-run)");
    } else {
        println!("link-curators");
    }
    for (uri, id) in &report.linked {
        println!("  {} -> curator {}", uri, id);
    }
    println!("  examined: {}", report.examined);
    println!("  linked: {}", report.linked.len());
    println!("  unmatched: {}", report.unmatched);
    println!("  errors: {}", report.errors);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookRecord, ClassificationCode, Curator, Source};
    use crate::store::memory::InMemoryStore;
    use crate::store::BookRow;

    fn row(id: &str, title: &str, description: &str, curator: Option<i64>) -> BookRow {
        BookRow::from_record(&BookRecord {
            uri: format!("gutenberg://{}", id),
            source: Source::Gutenberg,
            source_id: id.into(),
            legacy_id: id.parse().ok(),
            title: title.into(),
            author: "Unknown".into(),
            classification: ClassificationCode::parse("004").unwrap(),
            language: "en".into(),
            subject: None,
            publisher: None,
            publication_date: None,
            description: description.into(),
            cover_uri: None,
            curator_id: curator,
        })
    }

    fn store() -> InMemoryStore {
        InMemoryStore::new().with_curators(vec![Curator {
            id: 7,
            name: "Grace Hopper".into(),
            department: Some("Computer Science".into()),
        }])
    }

    #[tokio::test]
    async fn links_only_unlinked_books() {
        let store = store();
        store
            .insert_book(&row("1", "Intro to Computer Science", "programming basics", None))
            .await
            .unwrap();
        store
            .insert_book(&row("2", "Computer Science Today", "", Some(3)))
            .await
            .unwrap();
        store.insert_book(&row("3", "Moby Dick", "", None)).await.unwrap();

        let report = link_curators(&store, &MatchWeights::default(), None, false)
            .await
            .unwrap();
        assert_eq!(report.examined, 2);
        assert_eq!(report.linked, vec![("gutenberg://1".to_string(), 7)]);
        assert_eq!(report.unmatched, 1);

        let kept = store.find_by_uri("gutenberg://2").await.unwrap().unwrap();
        assert_eq!(kept.curator_id, Some(3));
    }

    #[tokio::test]
    async fn dry_run_leaves_rows_alone() {
        let store = store();
        store
            .insert_book(&row("1", "Intro to Computer Science", "", None))
            .await
            .unwrap();
        let report = link_curators(&store, &MatchWeights::default(), Some(10), true)
            .await
            .unwrap();
        assert_eq!(report.linked.len(), 1);
        let book = store.find_by_uri("gutenberg://1").await.unwrap().unwrap();
        assert_eq!(book.curator_id, None);
    }
}
