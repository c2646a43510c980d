//! Subject classification into a small Dewey-like taxonomy.
//!
//! Defines the [`Classifier`] trait and the default
//! [`KeywordClassifier`]: lowercase the title and description, walk
//! [`KEYWORD_TABLE`] in order, and return the code of the first keyword
//! found as a substring. No ranking is done, so a general keyword earlier in
//! the table shadows a more specific one later in it when both occur in
//! the text. When nothing matches, the configured default code is returned.
//!
//! The remote scoring variant lives in [`crate::classify_llm`].

use std::collections::HashMap;

use async_trait::async_trait;

use crate::classify_llm::LlmClassifier;
use crate::config::Config;
use crate::error::IngestError;
use crate::models::{ClassificationCode, Source};

/// Ordered keyword → code table. Order is significant: first match wins.
pub const KEYWORD_TABLE: &[(&str, &str)] = &[
    ("computer", "004"),
    ("programming", "005"),
    ("software", "005"),
    ("algorithm", "005"),
    ("encyclopedia", "030"),
    ("journalism", "070"),
    ("philosophy", "100"),
    ("ethics", "170"),
    ("psychology", "150"),
    ("logic", "160"),
    ("religion", "200"),
    ("bible", "220"),
    ("christian", "230"),
    ("theology", "230"),
    ("mythology", "290"),
    ("sociology", "301"),
    ("statistics", "310"),
    ("politic", "320"),
    ("economics", "330"),
    ("law", "340"),
    ("military", "355"),
    ("education", "370"),
    ("folklore", "398"),
    ("language", "400"),
    ("linguistics", "410"),
    ("grammar", "415"),
    ("english", "420"),
    ("german", "430"),
    ("french", "440"),
    ("italian", "450"),
    ("spanish", "460"),
    ("latin", "470"),
    ("greek", "480"),
    ("science", "500"),
    ("mathematics", "510"),
    ("algebra", "512"),
    ("calculus", "515"),
    ("geometry", "516"),
    ("astronomy", "520"),
    ("physics", "530"),
    ("chemistry", "540"),
    ("geology", "550"),
    ("biology", "570"),
    ("botany", "580"),
    ("zoology", "590"),
    ("technology", "600"),
    ("medicine", "610"),
    ("health", "613"),
    ("engineering", "620"),
    ("electronics", "621"),
    ("agriculture", "630"),
    ("gardening", "635"),
    ("cooking", "641"),
    ("cookbook", "641"),
    ("business", "650"),
    ("accounting", "657"),
    ("architecture", "720"),
    ("sculpture", "730"),
    ("drawing", "740"),
    ("painting", "750"),
    ("photography", "770"),
    ("music", "780"),
    ("theatre", "792"),
    ("games", "793"),
    ("chess", "794"),
    ("sports", "796"),
    ("literature", "800"),
    ("fiction", "800"),
    ("novel", "800"),
    ("poetry", "811"),
    ("drama", "812"),
    ("essays", "814"),
    ("history", "900"),
    ("geography", "910"),
    ("travel", "910"),
    ("biography", "920"),
];

/// Maps free text to a 3-digit classification code.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short identifier for logs (e.g. `"keyword"`).
    fn name(&self) -> &str;

    /// Classify a book from its title and description or subject text.
    async fn classify(
        &self,
        title: &str,
        description: &str,
    ) -> Result<ClassificationCode, IngestError>;
}

/// Deterministic first-match keyword classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    default_code: ClassificationCode,
}

impl KeywordClassifier {
    pub fn new(default_code: ClassificationCode) -> Self {
        Self { default_code }
    }

    pub fn default_code(&self) -> &ClassificationCode {
        &self.default_code
    }

    /// Synchronous core of the keyword classifier.
    pub fn classify_text(&self, title: &str, description: &str) -> ClassificationCode {
        match first_keyword_match(title, description) {
            Some((_, code)) => ClassificationCode::parse(code)
                .unwrap_or_else(|| self.default_code.clone()),
            None => self.default_code.clone(),
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(
        &self,
        title: &str,
        description: &str,
    ) -> Result<ClassificationCode, IngestError> {
        Ok(self.classify_text(title, description))
    }
}

/// Return the first `(keyword, code)` entry whose keyword occurs in the text.
pub fn first_keyword_match(
    title: &str,
    description: &str,
) -> Option<(&'static str, &'static str)> {
    let text = format!("{} {}", title, description).to_lowercase();
    KEYWORD_TABLE
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .copied()
}

/// Build the classifier selected by `[classifier].provider`.
///
/// The keyword classifier falls back to `source`'s default code.
pub fn create_classifier(
    config: &Config,
    source: Source,
) -> Result<Box<dyn Classifier>, IngestError> {
    match config.classifier.provider.as_str() {
        "llm" => Ok(Box::new(LlmClassifier::new(&config.classifier)?)),
        "keyword" => Ok(Box::new(KeywordClassifier::new(
            config.default_classification(source),
        ))),
        other => Err(IngestError::Configuration(format!(
            "Unknown classifier provider: '{}'",
            other
        ))),
    }
}

/// Classifiers keyed by the source a stored book came from.
///
/// Books whose source has no dedicated entry use the fallback.
pub struct ClassifierSet {
    fallback: Box<dyn Classifier>,
    by_source: HashMap<Source, Box<dyn Classifier>>,
}

impl ClassifierSet {
    pub fn new(fallback: Box<dyn Classifier>) -> Self {
        Self {
            fallback,
            by_source: HashMap::new(),
        }
    }

    pub fn with(mut self, source: Source, classifier: Box<dyn Classifier>) -> Self {
        self.by_source.insert(source, classifier);
        self
    }

    /// One classifier per source, each with that source's default code.
    pub fn from_config(config: &Config) -> Result<Self, IngestError> {
        Ok(Self::new(create_classifier(config, Source::Custom)?)
            .with(Source::Gutenberg, create_classifier(config, Source::Gutenberg)?)
            .with(Source::Wikibooks, create_classifier(config, Source::Wikibooks)?))
    }

    pub fn name(&self) -> &str {
        self.fallback.name()
    }

    pub fn for_source(&self, source: Source) -> &dyn Classifier {
        let classifier = self.by_source.get(&source).unwrap_or(&self.fallback);
        &**classifier
    }
}
