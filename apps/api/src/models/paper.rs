use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Importance assumed when the LLM omitted a score.
pub const DEFAULT_IMPORTANCE: f64 = 0.8;

/// Structured LLM analysis stored in `thesis.ai_summary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiSummary {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub evaluation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub category: String,
}

impl AiSummary {
    pub fn importance(&self) -> f64 {
        self.importance.unwrap_or(DEFAULT_IMPORTANCE)
    }
}

/// A `thesis` row as read for the digest.
#[derive(Debug, Clone, FromRow)]
pub struct PaperRow {
    pub id: i32,
    pub arxiv_id: String,
    pub title: String,
    pub author: String,
    pub ai_summary: Option<serde_json::Value>,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A summarised paper with its resolved topics, ready for composition.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestPaper {
    pub id: i32,
    pub arxiv_id: String,
    pub title: String,
    pub author: String,
    pub published: NaiveDate,
    pub link: String,
    pub topics: BTreeSet<i32>,
    pub ai: AiSummary,
}

/// Canonical abstract page for an arXiv id; `#` when the id is missing.
pub fn arxiv_link(arxiv_id: &str) -> String {
    if arxiv_id.trim().is_empty() {
        "#".to_string()
    } else {
        format!("https://arxiv.org/abs/{}", arxiv_id.trim())
    }
}

/// A paper still waiting for its AI summary.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PendingPaper {
    pub id: i32,
    pub arxiv_id: String,
    pub summary: String,
}

/// A crawled paper about to be inserted into `thesis`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPaper {
    pub arxiv_id: String,
    pub title: String,
    pub author: String,
    pub summary: String,
    pub categories: Vec<String>,
    pub publish_date: Option<NaiveDate>,
}
