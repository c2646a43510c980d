//! Best-effort matching of books to curators.
//!
//! Each curator is scored against the book's combined lowercased text
//! (title, description, subject):
//!
//! | Signal | Points (default) |
//! |--------|------------------|
//! | Whole department appears in the text | 10 |
//! | Each subject keyword present in both department and text | 5 |
//! | Each name token longer than 3 chars found in the text | 2 |
//! | Department's first word appears in the title | 3 |
//!
//! The highest-scoring curator wins if the score reaches the threshold
//! (default 5). Ties keep the curator enumerated first. The weights are
//! tuned constants, exposed through `[curator_match]` in the config.

use serde::Deserialize;

use crate::models::Curator;

/// Subject keywords used for department/text overlap scoring.
pub const SUBJECT_KEYWORDS: &[&str] = &[
    "computer",
    "programming",
    "software",
    "data",
    "mathematics",
    "statistics",
    "physics",
    "chemistry",
    "biology",
    "ecology",
    "geology",
    "astronomy",
    "medicine",
    "nursing",
    "engineering",
    "architecture",
    "agriculture",
    "environment",
    "economics",
    "business",
    "finance",
    "law",
    "political",
    "sociology",
    "anthropology",
    "archaeology",
    "psychology",
    "philosophy",
    "religion",
    "theology",
    "history",
    "geography",
    "education",
    "linguistics",
    "language",
    "literature",
    "poetry",
    "drama",
    "music",
    "art",
    "science",
    "technology",
];

/// Scoring weights and acceptance threshold.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MatchWeights {
    #[serde(default = "default_department_weight")]
    pub department_weight: u32,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: u32,
    #[serde(default = "default_name_token_weight")]
    pub name_token_weight: u32,
    #[serde(default = "default_title_department_weight")]
    pub title_department_weight: u32,
    #[serde(default = "default_threshold")]
    pub threshold: u32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            department_weight: default_department_weight(),
            keyword_weight: default_keyword_weight(),
            name_token_weight: default_name_token_weight(),
            title_department_weight: default_title_department_weight(),
            threshold: default_threshold(),
        }
    }
}

fn default_department_weight() -> u32 {
    10
}
fn default_keyword_weight() -> u32 {
    5
}
fn default_name_token_weight() -> u32 {
    2
}
fn default_title_department_weight() -> u32 {
    3
}
fn default_threshold() -> u32 {
    5
}

/// Text of a book used for matching.
#[derive(Debug, Clone, Copy)]
pub struct BookText<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub subject: Option<&'a str>,
}

impl<'a> BookText<'a> {
    pub fn new(title: &'a str, description: &'a str, subject: Option<&'a str>) -> Self {
        Self {
            title,
            description,
            subject,
        }
    }

    fn combined_lower(&self) -> String {
        let mut text = format!("{} {}", self.title, self.description);
        if let Some(subject) = self.subject {
            text.push(' ');
            text.push_str(subject);
        }
        text.to_lowercase()
    }
}

/// Score a single curator against pre-lowered text and title.
pub fn score_curator(
    curator: &Curator,
    text: &str,
    title_lower: &str,
    weights: &MatchWeights,
) -> u32 {
    let mut score = 0;
    let department = curator.department_or_empty().trim().to_lowercase();

    if !department.is_empty() && text.contains(&department) {
        score += weights.department_weight;
    }

    for keyword in SUBJECT_KEYWORDS {
        if department.contains(keyword) && text.contains(keyword) {
            score += weights.keyword_weight;
        }
    }

    for token in curator.name.split_whitespace() {
        if token.chars().count() > 3 && text.contains(&token.to_lowercase()) {
            score += weights.name_token_weight;
        }
    }

    if let Some(first) = department.split_whitespace().next() {
        if title_lower.contains(first) {
            score += weights.title_department_weight;
        }
    }

    score
}

/// Return the id of the best-matching curator, or `None` if no curator
/// reaches `weights.threshold`.
pub fn match_curator(
    book: &BookText<'_>,
    curators: &[Curator],
    weights: &MatchWeights,
) -> Option<i64> {
    let text = book.combined_lower();
    let title_lower = book.title.to_lowercase();

    let mut best: Option<(u32, i64)> = None;
    for curator in curators {
        let score = score_curator(curator, &text, &title_lower, weights);
        if best.map_or(true, |(best_score, _)| score > best_score) {
            best = Some((score, curator.id));
        }
    }

    best.filter(|(score, _)| *score >= weights.threshold)
        .map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curator(id: i64, name: &str, department: &str) -> Curator {
        Curator {
            id,
            name: name.to_string(),
            department: if department.is_empty() {
                None
            } else {
                Some(department.to_string())
            },
        }
    }

    fn score(c: &Curator, title: &str, description: &str) -> u32 {
        let book = BookText::new(title, description, None);
        score_curator(
            c,
            &book.combined_lower(),
            &title.to_lowercase(),
            &MatchWeights::default(),
        )
    }

    #[test]
    fn computer_science_scenario() {
        let cs = curator(7, "Grace Hopper", "Computer Science");
        // department substring 10, "computer" 5, "science" 5, title first word 3
        assert_eq!(score(&cs, "Intro to Computer Science", "programming basics"), 23);

        let book = BookText::new("Intro to Computer Science", "programming basics", None);
        assert_eq!(
            match_curator(&book, &[cs], &MatchWeights::default()),
            Some(7)
        );
    }

    #[test]
    fn name_tokens_need_more_than_three_chars() {
        let c = curator(1, "Ada Lovelace", "");
        assert_eq!(score(&c, "Notes by Ada Lovelace", ""), 2);
    }

    #[test]
    fn below_threshold_returns_none() {
        let c = curator(1, "Ada Lovelace", "");
        let book = BookText::new("Notes by Ada Lovelace", "", None);
        assert_eq!(match_curator(&book, &[c], &MatchWeights::default()), None);
    }

    #[test]
    fn empty_department_scores_nothing_from_department() {
        let c = curator(1, "Bob", "");
        assert_eq!(score(&c, "Computer Science", "anything"), 0);
    }

    #[test]
    fn keyword_overlap_counts_each_keyword_once() {
        let c = curator(1, "X", "Mathematics and Statistics");
        // dept substring absent; "mathematics" 5 + "statistics" 5; title first word "mathematics" 3
        assert_eq!(score(&c, "Mathematics for everyone", "with statistics"), 13);
    }

    #[test]
    fn tie_keeps_first_curator() {
        let a = curator(1, "Alpha", "Physics");
        let b = curator(2, "Beta", "Physics");
        let book = BookText::new("Physics", "", None);
        assert_eq!(
            match_curator(&book, &[a, b], &MatchWeights::default()),
            Some(1)
        );
    }

    #[test]
    fn highest_score_wins() {
        let weak = curator(1, "Someone", "History");
        let strong = curator(2, "Other", "Computer Science");
        let book = BookText::new("Computer Science history", "", None);
        assert_eq!(
            match_curator(&book, &[weak, strong], &MatchWeights::default()),
            Some(2)
        );
    }

    #[test]
    fn subject_text_participates() {
        let c = curator(3, "Marie Curie", "Chemistry");
        let book = BookText::new("Radioactive Substances", "", Some("Chemistry"));
        assert_eq!(
            match_curator(&book, &[c], &MatchWeights::default()),
            Some(3)
        );
    }

    #[test]
    fn threshold_is_adjustable() {
        let c = curator(1, "Ada Lovelace", "");
        let book = BookText::new("Notes by Ada Lovelace", "", None);
        let weights = MatchWeights {
            threshold: 2,
            ..MatchWeights::default()
        };
        assert_eq!(match_curator(&book, &[c], &weights), Some(1));
    }

    #[test]
    fn no_curators_no_match() {
        let book = BookText::new("Anything", "", None);
        assert_eq!(match_curator(&book, &[], &MatchWeights::default()), None);
    }
}
