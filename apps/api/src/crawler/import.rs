//! Weekly import of a merged crawl file (`.jsonl`) from the storage bucket.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::paper::NewPaper;
use crate::store::PaperStore;

/// Object key for the week that ends on the Monday on or before `today`.
pub fn weekly_key(today: NaiveDate) -> String {
    let this_monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let last_monday = this_monday - Duration::days(7);
    format!("crawl_data/arxiv_papers_{last_monday}_to_{this_monday}.jsonl")
}

/// One line of the merged crawl file.
#[derive(Debug, Deserialize)]
struct CrawledPaper {
    arxiv_id: String,
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: String,
    #[serde(default)]
    categories: Vec<String>,
}

impl CrawledPaper {
    fn into_new_paper(self) -> Option<NewPaper> {
        let arxiv_id = self.arxiv_id.trim().to_string();
        if arxiv_id.is_empty() {
            return None;
        }
        Some(NewPaper {
            arxiv_id,
            title: self.title.trim().to_string(),
            author: self.authors.join(", "),
            summary: self.summary.trim().to_string(),
            categories: self.categories,
            publish_date: self
                .published
                .get(..10)
                .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()),
        })
    }
}

/// Parses the file, returning the usable papers and the number of skipped lines.
pub fn parse_jsonl(content: &str) -> (Vec<NewPaper>, usize) {
    let mut papers = Vec::new();
    let mut skipped = 0;

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<CrawledPaper>(line) {
            Ok(paper) => match paper.into_new_paper() {
                Some(paper) => papers.push(paper),
                None => skipped += 1,
            },
            Err(e) => {
                warn!(line = idx + 1, error = %e, "skipping malformed crawl line");
                skipped += 1;
            }
        }
    }

    (papers, skipped)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub key: String,
    pub parsed: usize,
    pub skipped: usize,
    pub inserted: u64,
}

pub struct WeeklyImporter {
    s3: aws_sdk_s3::Client,
    bucket: String,
    store: Arc<dyn PaperStore>,
}

impl WeeklyImporter {
    pub fn new(s3: aws_sdk_s3::Client, bucket: String, store: Arc<dyn PaperStore>) -> Self {
        Self { s3, bucket, store }
    }

    pub async fn import_weekly(&self, today: NaiveDate) -> Result<ImportReport, AppError> {
        let key = weekly_key(today);
        let content = self.download(&key).await?;
        let (papers, skipped) = parse_jsonl(&content);
        let inserted = self.store.insert_papers(&papers).await?;

        info!(%key, parsed = papers.len(), skipped, inserted, "weekly crawl file imported");
        Ok(ImportReport {
            key,
            parsed: papers.len(),
            skipped,
            inserted,
        })
    }

    async fn download(&self, key: &str) -> Result<String, AppError> {
        let object = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let e = e.into_service_error();
                if e.is_no_such_key() {
                    AppError::NotFound(format!("Crawl file '{key}' does not exist"))
                } else {
                    AppError::Storage(format!("S3 download failed: {e}"))
                }
            })?;

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("S3 read failed: {e}")))?
            .into_bytes();

        String::from_utf8(bytes.to_vec())
            .map_err(|e| AppError::Storage(format!("crawl file is not UTF-8: {e}")))
    }
}
