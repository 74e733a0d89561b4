//! Persistence seams.
//!
//! Each consumer depends on the narrow trait it needs; `PgStore` implements all
//! of them against Postgres. Unit tests swap in `memory::MemoryStore`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::digest::window::DigestWindow;
use crate::errors::AppError;
use crate::models::kakao::KakaoToken;
use crate::models::paper::{AiSummary, DigestPaper, NewPaper, PendingPaper};
use crate::models::topic::Topic;
use crate::models::user::{NewUser, Preferences, Subscriber, UserRow};

mod papers;
mod tokens;
mod users;

#[cfg(test)]
pub mod memory;

/// Accounts, topics and the user ↔ topic join.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, AppError>;

    async fn find_user(&self, user_id: i32) -> Result<Option<UserRow>, AppError>;

    /// Inserts a new account with its topics in one transaction.
    /// A taken email yields `AppError::Conflict`.
    async fn create_user(&self, user: &NewUser, topics: &[i32]) -> Result<i32, AppError>;

    /// Inserts or updates the account keyed by email, then replaces its topic
    /// set wholesale. Both happen in one transaction.
    async fn upsert_subscription(
        &self,
        user: &NewUser,
        topics: &[i32],
        active: bool,
    ) -> Result<i32, AppError>;

    async fn update_preferences(&self, user_id: i32, prefs: &Preferences) -> Result<(), AppError>;

    async fn list_topics(&self) -> Result<Vec<Topic>, AppError>;

    async fn user_topics(&self, user_id: i32) -> Result<Vec<Topic>, AppError>;
}

/// Read side of the weekly dispatch.
#[async_trait]
pub trait DigestStore: Send + Sync {
    /// Active users subscribed to at least one topic.
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, AppError>;

    /// A single user with their topics, regardless of the active flag.
    async fn subscriber(&self, user_id: i32) -> Result<Option<Subscriber>, AppError>;

    /// Summarised papers created inside the window, with topics resolved.
    async fn recent_papers(&self, window: DigestWindow) -> Result<Vec<DigestPaper>, AppError>;
}

/// Work queue of the AI summary job.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Papers with a raw abstract but no AI summary yet.
    async fn papers_pending_summary(&self) -> Result<Vec<PendingPaper>, AppError>;

    /// Persists one summary and bumps `updated_at`; committed on return.
    async fn save_ai_summary(&self, paper_id: i32, summary: &AiSummary) -> Result<(), AppError>;
}

/// Write side of the crawler and weekly import.
#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Inserts papers, skipping arxiv ids already stored. Returns rows inserted.
    async fn insert_papers(&self, papers: &[NewPaper]) -> Result<u64, AppError>;
}

/// Kakao OAuth credentials, one row per user.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_token(&self, user_id: i32) -> Result<Option<KakaoToken>, AppError>;

    /// Inserts the row, or overwrites it when the user already linked once.
    async fn upsert_token(&self, token: &KakaoToken) -> Result<(), AppError>;

    /// Stores a refreshed access token. `refresh_token` is only replaced when
    /// the provider rotated it.
    async fn update_refreshed(
        &self,
        user_id: i32,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> Result<(), AppError>;
}

/// Postgres implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Requested topic ids that do not exist, in ascending order.
pub fn unknown_topics(requested: &[i32], known: &[i32]) -> Vec<i32> {
    let requested: BTreeSet<i32> = requested.iter().copied().collect();
    requested
        .into_iter()
        .filter(|id| !known.contains(id))
        .collect()
}

/// Deduplicated topic ids, ascending.
pub fn distinct_topics(topics: &[i32]) -> Vec<i32> {
    topics
        .iter()
        .copied()
        .collect::<BTreeSet<i32>>()
        .into_iter()
        .collect()
}

fn invalid_topics_error(unknown: &[i32]) -> AppError {
    AppError::Validation(format!("Invalid topic ids: {unknown:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_topics() {
        assert_eq!(unknown_topics(&[1, 2, 9, 9], &[1, 2, 3]), vec![9]);
        assert!(unknown_topics(&[3, 1], &[1, 2, 3]).is_empty());
        assert!(unknown_topics(&[], &[1]).is_empty());
    }

    #[test]
    fn test_distinct_topics() {
        assert_eq!(distinct_topics(&[3, 1, 3, 2, 1]), vec![1, 2, 3]);
    }
}
