//! Topic matching: which summarised papers are relevant to which subscriber.
//!
//! A paper's topics are not stored; they are resolved at read time from its
//! raw arXiv categories through `arxiv_category_mapping`.

use std::collections::{BTreeSet, HashMap};

use crate::models::paper::DigestPaper;

/// True when the paper shares at least one topic with the subscriber.
pub fn matches(paper_topics: &BTreeSet<i32>, user_topics: &[i32]) -> bool {
    user_topics.iter().any(|t| paper_topics.contains(t))
}

/// Keeps the papers relevant to `user_topics`, preserving input order.
pub fn filter_for_user<'a>(papers: &'a [DigestPaper], user_topics: &[i32]) -> Vec<&'a DigestPaper> {
    papers
        .iter()
        .filter(|p| matches(&p.topics, user_topics))
        .collect()
}

/// Reduces `cs.CV` to `cs`; archives without a subject class (`hep-th`) are kept whole.
pub fn top_level_category(raw: &str) -> &str {
    let raw = raw.trim().trim_matches(|c| c == '{' || c == '}' || c == '"').trim();
    raw.split('.').next().unwrap_or(raw)
}

/// In-memory copy of `arxiv_category_mapping`, keyed by top-level archive.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    by_archive: HashMap<String, Vec<i32>>,
}

impl CategoryMap {
    pub fn new(rows: impl IntoIterator<Item = (String, i32)>) -> Self {
        let mut by_archive: HashMap<String, Vec<i32>> = HashMap::new();
        for (category, topic_id) in rows {
            by_archive
                .entry(top_level_category(&category).to_string())
                .or_default()
                .push(topic_id);
        }
        Self { by_archive }
    }

    /// Union of the topics of every category the paper carries.
    pub fn resolve(&self, categories: &[String]) -> BTreeSet<i32> {
        categories
            .iter()
            .map(|c| top_level_category(c))
            .filter(|c| !c.is_empty())
            .filter_map(|c| self.by_archive.get(c))
            .flatten()
            .copied()
            .collect()
    }
}
