use anyhow::Result;

use crate::config::Config;
use crate::http::PoliteClient;
use crate::models::Source;
use crate::traits::create_source;

/// One row of `biblio sources`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub name: Source,
    pub endpoint: String,
    pub default_classification: String,
    pub batch_size: usize,
    pub description: String,
}

pub fn get_sources(config: &Config) -> Result<Vec<SourceStatus>> {
    let client = PoliteClient::new(&config.http)?;
    let endpoints = [
        (Source::Gutenberg, config.sources.gutenberg.catalog_url.clone()),
        (Source::Wikibooks, config.sources.wikibooks.api_url.clone()),
    ];

    let mut statuses = Vec::new();
    for (source, endpoint) in endpoints {
        let catalog = create_source(config, source, client.clone())?;
        statuses.push(SourceStatus {
            name: source,
            endpoint,
            default_classification: config.default_classification(source).to_string(),
            batch_size: config.batch_size_for(source),
            description: catalog.description().to_string(),
        });
    }
    Ok(statuses)
}

pub fn list_sources(config: &Config) -> Result<()> {
    println!(
        "{:<12} {:<8} {:<6} {:<58} ENDPOINT",
        "SOURCE", "DEFAULT", "BATCH", "DESCRIPTION"
    );
    for s in get_sources(config)? {
        println!("{}", format_status(&s));
    }
    Ok(())
}

fn format_status(s: &SourceStatus) -> String {
    format!(
        "{:<12} {:<8} {:<6} {:<58} {}",
        s.name.as_str(),
        s.default_classification,
        s.batch_size,
        s.description,
        s.endpoint
    )
}
