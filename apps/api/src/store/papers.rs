use async_trait::async_trait;
use sqlx::FromRow;
use tracing::{debug, warn};

use super::{DigestStore, PaperStore, PgStore, SummaryStore};
use crate::digest::matcher::CategoryMap;
use crate::digest::window::DigestWindow;
use crate::errors::AppError;
use crate::models::paper::{arxiv_link, AiSummary, DigestPaper, NewPaper, PaperRow, PendingPaper};
use crate::models::user::Subscriber;

#[derive(Debug, FromRow)]
struct SubscriberRow {
    id: i32,
    email: String,
    name: String,
    language: String,
    notification_method: String,
    topics: Vec<i32>,
}

impl From<SubscriberRow> for Subscriber {
    fn from(row: SubscriberRow) -> Self {
        Subscriber {
            id: row.id,
            email: row.email,
            name: row.name,
            language: row.language.parse().unwrap_or_default(),
            notification_method: row.notification_method.parse().unwrap_or_default(),
            topics: row.topics,
        }
    }
}

/// Turns a stored row into a digest paper. Rows whose `ai_summary` does not
/// deserialize are skipped.
pub(crate) fn to_digest_paper(row: PaperRow, categories: &CategoryMap) -> Option<DigestPaper> {
    let raw = row.ai_summary?;
    let ai: AiSummary = match serde_json::from_value(raw) {
        Ok(ai) => ai,
        Err(e) => {
            warn!(paper_id = row.id, error = %e, "stored ai_summary is unreadable, skipping");
            return None;
        }
    };

    Some(DigestPaper {
        id: row.id,
        link: arxiv_link(&row.arxiv_id),
        topics: categories.resolve(&row.categories),
        published: row.created_at.date_naive(),
        arxiv_id: row.arxiv_id,
        title: row.title,
        author: row.author,
        ai,
    })
}

const SUBSCRIBER_SELECT: &str = r#"
    SELECT u.id, u.email, u.name, u.language, u.notification_method,
           ARRAY_AGG(ut.topic_id ORDER BY ut.topic_id) AS topics
    FROM users u
    JOIN user_topics ut ON ut.user_id = u.id
"#;

#[async_trait]
impl DigestStore for PgStore {
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, AppError> {
        let rows = sqlx::query_as::<_, SubscriberRow>(&format!(
            "{SUBSCRIBER_SELECT} WHERE u.active GROUP BY u.id ORDER BY u.id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Subscriber::from).collect())
    }

    async fn subscriber(&self, user_id: i32) -> Result<Option<Subscriber>, AppError> {
        let row = sqlx::query_as::<_, SubscriberRow>(&format!(
            "{SUBSCRIBER_SELECT} WHERE u.id = $1 GROUP BY u.id"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Subscriber::from))
    }

    async fn recent_papers(&self, window: DigestWindow) -> Result<Vec<DigestPaper>, AppError> {
        let mapping: Vec<(String, i32)> =
            sqlx::query_as("SELECT arxiv_category, topic_id FROM arxiv_category_mapping")
                .fetch_all(&self.pool)
                .await?;
        let categories = CategoryMap::new(mapping);

        let (from, to) = window.bounds();
        let rows = sqlx::query_as::<_, PaperRow>(
            r#"
            SELECT id, arxiv_id, title, author, ai_summary, categories, created_at
            FROM thesis
            WHERE ai_summary IS NOT NULL
              AND created_at >= $1
              AND created_at < $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let papers: Vec<DigestPaper> = rows
            .into_iter()
            .filter_map(|row| to_digest_paper(row, &categories))
            .collect();

        debug!(
            start = %window.start,
            end = %window.end,
            papers = papers.len(),
            "loaded recent papers"
        );
        Ok(papers)
    }
}

#[async_trait]
impl SummaryStore for PgStore {
    async fn papers_pending_summary(&self) -> Result<Vec<PendingPaper>, AppError> {
        let papers = sqlx::query_as::<_, PendingPaper>(
            r#"
            SELECT id, arxiv_id, summary
            FROM thesis
            WHERE ai_summary IS NULL AND summary IS NOT NULL AND summary <> ''
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(papers)
    }

    async fn save_ai_summary(&self, paper_id: i32, summary: &AiSummary) -> Result<(), AppError> {
        let json = serde_json::to_value(summary).map_err(anyhow::Error::from)?;
        sqlx::query("UPDATE thesis SET ai_summary = $2, updated_at = now() WHERE id = $1")
            .bind(paper_id)
            .bind(json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PaperStore for PgStore {
    async fn insert_papers(&self, papers: &[NewPaper]) -> Result<u64, AppError> {
        let mut inserted = 0;
        for paper in papers {
            let result = sqlx::query(
                r#"
                INSERT INTO thesis (arxiv_id, title, author, summary, categories, publish_date)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (arxiv_id) DO NOTHING
                "#,
            )
            .bind(&paper.arxiv_id)
            .bind(&paper.title)
            .bind(&paper.author)
            .bind(&paper.summary)
            .bind(&paper.categories)
            .bind(paper.publish_date)
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(ai_summary: Option<serde_json::Value>) -> PaperRow {
        PaperRow {
            id: 11,
            arxiv_id: "2406.01234".into(),
            title: "Graph Transformers".into(),
            author: "A. Author".into(),
            ai_summary,
            categories: vec!["cs.LG".into(), "stat.ML".into()],
            created_at: Utc.with_ymd_and_hms(2024, 6, 5, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_to_digest_paper_resolves_topics_and_link() {
        let map = CategoryMap::new(vec![("cs".into(), 1), ("stat".into(), 8)]);
        let paper = to_digest_paper(
            row(Some(serde_json::json!({"summary": "s", "importance": 0.9}))),
            &map,
        )
        .unwrap();
        assert_eq!(paper.link, "https://arxiv.org/abs/2406.01234");
        assert_eq!(paper.topics.into_iter().collect::<Vec<_>>(), vec![1, 8]);
        assert_eq!(paper.published.to_string(), "2024-06-05");
        assert_eq!(paper.ai.importance, Some(0.9));
    }

    #[test]
    fn test_to_digest_paper_skips_missing_or_unreadable_summary() {
        let map = CategoryMap::default();
        assert!(to_digest_paper(row(None), &map).is_none());
        assert!(to_digest_paper(row(Some(serde_json::json!("not an object"))), &map).is_none());
    }
}
