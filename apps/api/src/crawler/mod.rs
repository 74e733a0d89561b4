//! Paper ingestion: the daily arXiv crawl and the weekly bucket import.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::paper::NewPaper;
use crate::store::PaperStore;

pub mod arxiv;
pub mod import;
pub mod keywords;

use arxiv::PaperSource;

const PAGE_SIZE: usize = 100;
const PAGE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub date: NaiveDate,
    pub requests: usize,
    pub found: usize,
    pub inserted: u64,
}

/// Collects every paper published on one day by walking the keyword lists.
pub struct Crawler {
    source: Arc<dyn PaperSource>,
    store: Arc<dyn PaperStore>,
    keywords: Vec<String>,
    page_size: usize,
    page_delay: Duration,
}

impl Crawler {
    pub fn new(source: Arc<dyn PaperSource>, store: Arc<dyn PaperStore>) -> Self {
        Self {
            source,
            store,
            keywords: keywords::all_keywords(),
            page_size: PAGE_SIZE,
            page_delay: PAGE_DELAY,
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_paging(mut self, page_size: usize, page_delay: Duration) -> Self {
        self.page_size = page_size.max(1);
        self.page_delay = page_delay;
        self
    }

    /// Results come newest first, so paging a keyword stops at the first
    /// entry older than `date`. A failed request ends that keyword only.
    pub async fn crawl_day(&self, date: NaiveDate) -> Result<CrawlReport, AppError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut papers: Vec<NewPaper> = Vec::new();
        let mut requests = 0;

        for keyword in &self.keywords {
            let mut start = 0;
            loop {
                if requests > 0 {
                    tokio::time::sleep(self.page_delay).await;
                }
                requests += 1;

                let entries = match self.source.search(keyword, start, self.page_size).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(keyword = %keyword, start, error = %e, "arXiv request failed");
                        break;
                    }
                };
                let page_len = entries.len();
                let mut reached_older = false;

                for entry in entries {
                    match entry.published_date() {
                        Some(published) if published == date => {
                            if seen.insert(entry.arxiv_id.clone()) {
                                papers.push(entry.into_new_paper());
                            }
                        }
                        Some(published) if published < date => reached_older = true,
                        _ => {}
                    }
                }

                if reached_older || page_len < self.page_size {
                    break;
                }
                start += self.page_size;
            }
        }

        let inserted = self.store.insert_papers(&papers).await?;
        info!(%date, requests, found = papers.len(), inserted, "arXiv crawl finished");

        Ok(CrawlReport {
            date,
            requests,
            found: papers.len(),
            inserted,
        })
    }
}
