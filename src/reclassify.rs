//! Re-run classification over stored books.
//!
//! Selects books by classification prefix and/or source, classifies them
//! again in batches with the configured classifier, and reports every
//! changed code as `uri: old -> new`. Each book falls back to the default
//! code of the source it was stored from. Nothing is written with `--dry-run`.
//! A failed classification leaves the stored code untouched.

use std::time::Duration;

use anyhow::Result;

use crate::classify::ClassifierSet;
use crate::config::Config;
use crate::error::IngestError;
use crate::models::{ClassificationCode, Source};
use crate::store::{open_store, BookPatch, BookQuery, BookStore};

#[derive(Debug, Clone, Default)]
pub struct ReclassifyOptions {
    pub prefix: Option<String>,
    pub source: Option<Source>,
    pub limit: Option<usize>,
    pub dry_run: bool,
}

/// One proposed or applied code change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChange {
    pub uri: String,
    pub old: Option<String>,
    pub new: ClassificationCode,
}

impl std::fmt::Display for CodeChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.uri,
            self.old.as_deref().unwrap_or("none"),
            self.new
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclassifyReport {
    pub examined: u64,
    pub unchanged: u64,
    pub errors: u64,
    pub changes: Vec<CodeChange>,
}

/// Reclassify the selected books.
///
/// `batch_size` books are classified between pauses of `batch_delay`.
pub async fn reclassify(
    store: &dyn BookStore,
    classifiers: &ClassifierSet,
    options: &ReclassifyOptions,
    batch_size: usize,
    batch_delay: Duration,
) -> Result<ReclassifyReport, IngestError> {
    let query = BookQuery {
        classification_prefix: options.prefix.clone(),
        source: options.source,
        missing_curator: false,
        limit: options.limit,
    };
    let books = store
        .query_books(&query)
        .await
        .map_err(|e| IngestError::persistence("reclassify query", e))?;

    let mut report = ReclassifyReport::default();
    for (n, chunk) in books.chunks(batch_size.max(1)).enumerate() {
        if n > 0 && !batch_delay.is_zero() {
            tokio::time::sleep(batch_delay).await;
        }

        for book in chunk {
            report.examined += 1;
            let uri = book.display_uri();
            let text = book
                .description
                .as_deref()
                .filter(|d| !d.is_empty())
                .or(book.subject.as_deref())
                .unwrap_or("");

            let source = book.source.parse::<Source>().unwrap_or_default();
            let classifier = classifiers.for_source(source);
            let code = match classifier.classify(&book.title, text).await {
                Ok(code) => code,
                Err(e) => {
                    tracing::warn!(uri = %uri, error = %e, "classification failed; keeping stored code");
                    report.errors += 1;
                    continue;
                }
            };

            if book.classification.as_deref() == Some(code.as_str()) {
                report.unchanged += 1;
                continue;
            }

            if !options.dry_run {
                let patch = BookPatch {
                    classification: Some(code.as_str().to_string()),
                    ..BookPatch::default()
                };
                if let Err(e) = store.update_book(&book.key(), &patch).await {
                    tracing::warn!(uri = %uri, error = %e, "classification update failed");
                    report.errors += 1;
                    continue;
                }
            }

            report.changes.push(CodeChange {
                uri,
                old: book.classification.clone(),
                new: code,
            });
        }
    }

    Ok(report)
}

/// `biblio reclassify`.
pub async fn run_reclassify(config: &Config, options: ReclassifyOptions) -> Result<()> {
    config.require_store_credentials()?;
    config.require_classifier_credentials()?;

    let store = open_store(config).await?;
    let classifiers = ClassifierSet::from_config(config)?;

    let report = reclassify(
        store.as_ref(),
        &classifiers,
        &options,
        config.classifier.batch_size,
        Duration::from_millis(config.http.batch_delay_ms),
    )
    .await?;

    if options.dry_run {
        println!("reclassify with {} (dry-run)", classifiers.name());
    } else {
        println!("reclassify with {}", classifiers.name());
    }
    for change in &report.changes {
        println!("  {}", change);
    }
    println!("  examined: {}", report.examined);
    println!("  changed: {}", report.changes.len());
    println!("  unchanged: {}", report.unchanged);
    println!("  errors: {}", report.errors);
    println!("ok");
    Ok(())
}
