//! arXiv export API client and Atom feed parser.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Reader;
use reqwest::Client;
use thiserror::Error;

use crate::models::paper::NewPaper;

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
const USER_AGENT: &str = "research-digest-crawler/1.0";

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("arXiv API returned status {0}")]
    Status(u16),

    #[error("invalid Atom feed: {0}")]
    Xml(String),
}

/// One `<entry>` of an arXiv Atom feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ArxivEntry {
    pub arxiv_id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
}

impl ArxivEntry {
    pub fn published_date(&self) -> Option<NaiveDate> {
        self.published.map(|p| p.date_naive())
    }

    pub fn into_new_paper(self) -> NewPaper {
        NewPaper {
            publish_date: self.published_date(),
            arxiv_id: self.arxiv_id,
            title: self.title,
            author: self.authors.join(", "),
            summary: self.summary,
            categories: self.categories,
        }
    }
}

/// Anything that can answer a keyword search with feed entries.
#[async_trait]
pub trait PaperSource: Send + Sync {
    async fn search(
        &self,
        keyword: &str,
        start: usize,
        max_results: usize,
    ) -> Result<Vec<ArxivEntry>, CrawlError>;
}

pub struct ArxivClient {
    client: Client,
}

impl ArxivClient {
    pub fn new() -> Result<Self, CrawlError> {
        Ok(Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(std::time::Duration::from_secs(60))
                .build()?,
        })
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    /// Newest submissions first.
    async fn search(
        &self,
        keyword: &str,
        start: usize,
        max_results: usize,
    ) -> Result<Vec<ArxivEntry>, CrawlError> {
        let query = format!("all:{keyword}");
        let start = start.to_string();
        let max_results = max_results.to_string();

        let response = self
            .client
            .get(ARXIV_API_URL)
            .query(&[
                ("search_query", query.as_str()),
                ("start", start.as_str()),
                ("max_results", max_results.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CrawlError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_atom_feed(&body)
    }
}

/// `http://arxiv.org/abs/2406.01234v2` → `2406.01234`.
pub fn extract_arxiv_id(raw: &str) -> String {
    let id = raw.trim();
    let id = id.split_once("/abs/").map_or(id, |(_, rest)| rest);
    strip_version(id).to_string()
}

fn strip_version(id: &str) -> &str {
    match id.rfind('v') {
        Some(pos) if pos > 0 => {
            let version = &id[pos + 1..];
            if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) {
                &id[..pos]
            } else {
                id
            }
        }
        _ => id,
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Default)]
struct EntryAccum {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    categories: Vec<String>,
}

impl EntryAccum {
    fn into_entry(self) -> Option<ArxivEntry> {
        if self.id.trim().is_empty() || self.title.trim().is_empty() {
            return None;
        }
        Some(ArxivEntry {
            arxiv_id: extract_arxiv_id(&self.id),
            title: normalize_whitespace(&self.title),
            summary: normalize_whitespace(&self.summary),
            authors: self
                .authors
                .iter()
                .map(|a| normalize_whitespace(a))
                .filter(|a| !a.is_empty())
                .collect(),
            published: DateTime::parse_from_rfc3339(self.published.trim())
                .ok()
                .map(|p| p.with_timezone(&Utc)),
            categories: self.categories,
        })
    }
}

#[derive(Default)]
struct AtomParser {
    entries: Vec<ArxivEntry>,
    accum: EntryAccum,
    current_tag: String,
    in_entry: bool,
    in_author: bool,
}

impl AtomParser {
    fn handle_start(&mut self, e: &BytesStart<'_>) {
        let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
        match tag.as_str() {
            "entry" => {
                self.in_entry = true;
                self.accum = EntryAccum::default();
            }
            "author" if self.in_entry => {
                self.in_author = true;
                self.accum.authors.push(String::new());
            }
            "category" if self.in_entry => self.push_category(e),
            _ if self.in_entry => self.current_tag = tag,
            _ => {}
        }
    }

    fn handle_empty(&mut self, e: &BytesStart<'_>) {
        if self.in_entry && e.name().as_ref() == b"category" {
            self.push_category(e);
        }
    }

    fn push_category(&mut self, e: &BytesStart<'_>) {
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == b"term" {
                let term = String::from_utf8_lossy(&attr.value).trim().to_string();
                if !term.is_empty() && !self.accum.categories.contains(&term) {
                    self.accum.categories.push(term);
                }
            }
        }
    }

    fn handle_text(&mut self, e: &BytesText<'_>) {
        if !self.in_entry {
            return;
        }
        let text = e.unescape().unwrap_or_default();
        let accum = &mut self.accum;
        match self.current_tag.as_str() {
            "id" => accum.id.push_str(&text),
            "title" => accum.title.push_str(&text),
            "summary" => accum.summary.push_str(&text),
            "published" => accum.published.push_str(&text),
            "name" if self.in_author => {
                if let Some(author) = accum.authors.last_mut() {
                    author.push_str(&text);
                }
            }
            _ => {}
        }
    }

    fn handle_end(&mut self, e: &BytesEnd<'_>) {
        match e.name().as_ref() {
            b"entry" => {
                let finished = std::mem::take(&mut self.accum);
                if let Some(entry) = finished.into_entry() {
                    self.entries.push(entry);
                }
                self.in_entry = false;
                self.current_tag.clear();
            }
            b"author" => self.in_author = false,
            _ => self.current_tag.clear(),
        }
    }
}

pub fn parse_atom_feed(xml: &str) -> Result<Vec<ArxivEntry>, CrawlError> {
    let mut reader = Reader::from_str(xml);
    let mut parser = AtomParser::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => parser.handle_start(e),
            Ok(Event::Empty(ref e)) => parser.handle_empty(e),
            Ok(Event::Text(ref e)) => parser.handle_text(e),
            Ok(Event::End(ref e)) => parser.handle_end(e),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(CrawlError::Xml(format!(
                    "at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(parser.entries)
}
