//! In-memory store for unit tests. Mirrors the transactional behaviour of
//! `PgStore`: validation happens before any write, so a rejected call leaves
//! the state untouched.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{
    distinct_topics, invalid_topics_error, unknown_topics, DigestStore, PaperStore,
    SubscriptionStore, SummaryStore, TokenStore,
};
use crate::digest::matcher::CategoryMap;
use crate::digest::window::DigestWindow;
use crate::errors::AppError;
use crate::models::kakao::KakaoToken;
use crate::models::paper::{AiSummary, DigestPaper, NewPaper, PaperRow, PendingPaper};
use crate::models::topic::Topic;
use crate::models::user::{NewUser, Preferences, Subscriber, UserRow};

#[derive(Debug, Clone)]
pub struct StoredPaper {
    pub id: i32,
    pub arxiv_id: String,
    pub title: String,
    pub author: String,
    pub summary: Option<String>,
    pub ai_summary: Option<AiSummary>,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: Vec<UserRow>,
    topics: Vec<Topic>,
    user_topics: BTreeSet<(i32, i32)>,
    papers: Vec<StoredPaper>,
    category_mapping: Vec<(String, i32)>,
    tokens: HashMap<i32, KakaoToken>,
    token_refreshes: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn with_topics(labels: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut inner = store.inner.lock().unwrap();
            inner.topics = labels
                .iter()
                .enumerate()
                .map(|(i, label)| Topic {
                    id: i as i32 + 1,
                    label: label.to_string(),
                })
                .collect();
        }
        store
    }

    pub fn map_category(&self, category: &str, topic_id: i32) {
        self.inner
            .lock()
            .unwrap()
            .category_mapping
            .push((category.to_string(), topic_id));
    }

    /// Adds a paper and returns its id.
    pub fn add_paper(
        &self,
        arxiv_id: &str,
        summary: Option<&str>,
        ai_summary: Option<AiSummary>,
        categories: &[&str],
        created_at: DateTime<Utc>,
    ) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.papers.len() as i32 + 1;
        inner.papers.push(StoredPaper {
            id,
            arxiv_id: arxiv_id.to_string(),
            title: format!("Title of {arxiv_id}"),
            author: "A. Author".to_string(),
            summary: summary.map(str::to_string),
            ai_summary,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            created_at,
        });
        id
    }

    pub fn paper(&self, id: i32) -> Option<StoredPaper> {
        self.inner
            .lock()
            .unwrap()
            .papers
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn paper_count(&self) -> usize {
        self.inner.lock().unwrap().papers.len()
    }

    pub fn topic_ids_of(&self, user_id: i32) -> Vec<i32> {
        self.inner
            .lock()
            .unwrap()
            .user_topics
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn user_topic_rows(&self) -> usize {
        self.inner.lock().unwrap().user_topics.len()
    }

    pub fn set_active(&self, user_id: i32, active: bool) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.active = active;
        }
    }

    pub fn token(&self, user_id: i32) -> Option<KakaoToken> {
        self.inner.lock().unwrap().tokens.get(&user_id).cloned()
    }

    pub fn token_refreshes(&self) -> usize {
        self.inner.lock().unwrap().token_refreshes
    }

    fn check_topics(inner: &Inner, topics: &[i32]) -> Result<Vec<i32>, AppError> {
        let known: Vec<i32> = inner.topics.iter().map(|t| t.id).collect();
        let unknown = unknown_topics(topics, &known);
        if unknown.is_empty() {
            Ok(distinct_topics(topics))
        } else {
            Err(invalid_topics_error(&unknown))
        }
    }

    fn replace_topics(inner: &mut Inner, user_id: i32, topics: Vec<i32>) {
        inner.user_topics.retain(|(u, _)| *u != user_id);
        for topic in topics {
            inner.user_topics.insert((user_id, topic));
        }
    }

    fn subscriber_of(inner: &Inner, user: &UserRow) -> Option<Subscriber> {
        let topics: Vec<i32> = inner
            .user_topics
            .iter()
            .filter(|(u, _)| *u == user.id)
            .map(|(_, t)| *t)
            .collect();
        if topics.is_empty() {
            return None;
        }
        Some(Subscriber {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            language: user.language(),
            notification_method: user.notification_method(),
            topics,
        })
    }
}

fn user_row(id: i32, user: &NewUser, active: bool) -> UserRow {
    UserRow {
        id,
        email: user.email.clone(),
        name: user.name.clone(),
        password_hash: user.password_hash.clone(),
        language: user.language.as_str().to_string(),
        notification_method: user.notification_method.as_str().to_string(),
        active,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, user_id: i32) -> Result<Option<UserRow>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn create_user(&self, user: &NewUser, topics: &[i32]) -> Result<i32, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!(
                "Email '{}' is already registered",
                user.email
            )));
        }
        let topics = Self::check_topics(&inner, topics)?;
        let id = inner.users.len() as i32 + 1;
        inner.users.push(user_row(id, user, true));
        Self::replace_topics(&mut inner, id, topics);
        Ok(id)
    }

    async fn upsert_subscription(
        &self,
        user: &NewUser,
        topics: &[i32],
        active: bool,
    ) -> Result<i32, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let topics = Self::check_topics(&inner, topics)?;
        let id = match inner.users.iter().position(|u| u.email == user.email) {
            Some(idx) => {
                let id = inner.users[idx].id;
                inner.users[idx] = user_row(id, user, active);
                id
            }
            None => {
                let id = inner.users.len() as i32 + 1;
                inner.users.push(user_row(id, user, active));
                id
            }
        };
        Self::replace_topics(&mut inner, id, topics);
        Ok(id)
    }

    async fn update_preferences(&self, user_id: i32, prefs: &Preferences) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        let topics = Self::check_topics(&inner, &prefs.topics)?;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
        user.language = prefs.language.as_str().to_string();
        user.notification_method = prefs.notification_method.as_str().to_string();
        user.active = prefs.active;
        Self::replace_topics(&mut inner, user_id, topics);
        Ok(())
    }

    async fn list_topics(&self) -> Result<Vec<Topic>, AppError> {
        Ok(self.inner.lock().unwrap().topics.clone())
    }

    async fn user_topics(&self, user_id: i32) -> Result<Vec<Topic>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .topics
            .iter()
            .filter(|t| inner.user_topics.contains(&(user_id, t.id)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DigestStore for MemoryStore {
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .iter()
            .filter(|u| u.active)
            .filter_map(|u| Self::subscriber_of(&inner, u))
            .collect())
    }

    async fn subscriber(&self, user_id: i32) -> Result<Option<Subscriber>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .iter()
            .find(|u| u.id == user_id)
            .and_then(|u| Self::subscriber_of(&inner, u)))
    }

    async fn recent_papers(&self, window: DigestWindow) -> Result<Vec<DigestPaper>, AppError> {
        let inner = self.inner.lock().unwrap();
        let categories = CategoryMap::new(inner.category_mapping.clone());
        let (from, to) = window.bounds();
        Ok(inner
            .papers
            .iter()
            .filter(|p| p.created_at >= from && p.created_at < to)
            .filter_map(|p| {
                let row = PaperRow {
                    id: p.id,
                    arxiv_id: p.arxiv_id.clone(),
                    title: p.title.clone(),
                    author: p.author.clone(),
                    ai_summary: p
                        .ai_summary
                        .as_ref()
                        .and_then(|ai| serde_json::to_value(ai).ok()),
                    categories: p.categories.clone(),
                    created_at: p.created_at,
                };
                super::papers::to_digest_paper(row, &categories)
            })
            .collect())
    }
}

#[async_trait]
impl SummaryStore for MemoryStore {
    async fn papers_pending_summary(&self) -> Result<Vec<PendingPaper>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .papers
            .iter()
            .filter(|p| p.ai_summary.is_none())
            .filter_map(|p| {
                let summary = p.summary.clone().filter(|s| !s.is_empty())?;
                Some(PendingPaper {
                    id: p.id,
                    arxiv_id: p.arxiv_id.clone(),
                    summary,
                })
            })
            .collect())
    }

    async fn save_ai_summary(&self, paper_id: i32, summary: &AiSummary) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        let paper = inner
            .papers
            .iter_mut()
            .find(|p| p.id == paper_id)
            .ok_or_else(|| AppError::NotFound(format!("Paper {paper_id} not found")))?;
        paper.ai_summary = Some(summary.clone());
        Ok(())
    }
}

#[async_trait]
impl PaperStore for MemoryStore {
    async fn insert_papers(&self, papers: &[NewPaper]) -> Result<u64, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let mut inserted = 0;
        for paper in papers {
            if inner.papers.iter().any(|p| p.arxiv_id == paper.arxiv_id) {
                continue;
            }
            let id = inner.papers.len() as i32 + 1;
            inner.papers.push(StoredPaper {
                id,
                arxiv_id: paper.arxiv_id.clone(),
                title: paper.title.clone(),
                author: paper.author.clone(),
                summary: Some(paper.summary.clone()),
                ai_summary: None,
                categories: paper.categories.clone(),
                created_at: Utc::now(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn get_token(&self, user_id: i32) -> Result<Option<KakaoToken>, AppError> {
        Ok(self.inner.lock().unwrap().tokens.get(&user_id).cloned())
    }

    async fn upsert_token(&self, token: &KakaoToken) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        let refresh_token = token.refresh_token.clone().or_else(|| {
            inner
                .tokens
                .get(&token.user_id)
                .and_then(|t| t.refresh_token.clone())
        });
        inner.tokens.insert(
            token.user_id,
            KakaoToken {
                refresh_token,
                ..token.clone()
            },
        );
        Ok(())
    }

    async fn update_refreshed(
        &self,
        user_id: i32,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.token_refreshes += 1;
        if let Some(token) = inner.tokens.get_mut(&user_id) {
            token.access_token = access_token.to_string();
            if let Some(rotated) = refresh_token {
                token.refresh_token = Some(rotated.to_string());
            }
            token.expires_at = expires_at;
        }
        Ok(())
    }
}
