use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::info;

use super::{distinct_topics, invalid_topics_error, unknown_topics, PgStore, SubscriptionStore};
use crate::errors::AppError;
use crate::models::topic::Topic;
use crate::models::user::{NewUser, Preferences, UserRow};

const USER_COLUMNS: &str =
    "id, email, name, password_hash, language, notification_method, active, created_at";

/// Validates then swaps the user's topic set inside the caller's transaction.
/// Readers never observe the intermediate empty set.
async fn replace_topics(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i32,
    topics: &[i32],
) -> Result<(), AppError> {
    let topics = distinct_topics(topics);

    let known: Vec<i32> = sqlx::query_scalar("SELECT id FROM topics WHERE id = ANY($1)")
        .bind(&topics)
        .fetch_all(&mut **tx)
        .await?;
    let unknown = unknown_topics(&topics, &known);
    if !unknown.is_empty() {
        return Err(invalid_topics_error(&unknown));
    }

    sqlx::query("DELETE FROM user_topics WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query(
        "INSERT INTO user_topics (user_id, topic_id) SELECT $1, UNNEST($2::int4[])",
    )
    .bind(user_id)
    .bind(&topics)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn map_unique_violation(e: sqlx::Error, email: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("Email '{email}' is already registered"))
        }
        _ => AppError::Database(e),
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, AppError> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, user_id: i32) -> Result<Option<UserRow>, AppError> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: &NewUser, topics: &[i32]) -> Result<i32, AppError> {
        let mut tx = self.pool.begin().await?;

        let user_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, name, password_hash, language, notification_method)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.language.as_str())
        .bind(user.notification_method.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, &user.email))?;

        replace_topics(&mut tx, user_id, topics).await?;
        tx.commit().await?;

        info!(user_id, "user registered");
        Ok(user_id)
    }

    async fn upsert_subscription(
        &self,
        user: &NewUser,
        topics: &[i32],
        active: bool,
    ) -> Result<i32, AppError> {
        let mut tx = self.pool.begin().await?;

        let user_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, name, password_hash, language, notification_method, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE SET
                name = EXCLUDED.name,
                password_hash = EXCLUDED.password_hash,
                language = EXCLUDED.language,
                notification_method = EXCLUDED.notification_method,
                active = EXCLUDED.active,
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.language.as_str())
        .bind(user.notification_method.as_str())
        .bind(active)
        .fetch_one(&mut *tx)
        .await?;

        replace_topics(&mut tx, user_id, topics).await?;
        tx.commit().await?;

        info!(user_id, topics = topics.len(), "subscription upserted");
        Ok(user_id)
    }

    async fn update_preferences(&self, user_id: i32, prefs: &Preferences) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET language = $2, notification_method = $3, active = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(prefs.language.as_str())
        .bind(prefs.notification_method.as_str())
        .bind(prefs.active)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {user_id} not found")));
        }

        replace_topics(&mut tx, user_id, &prefs.topics).await?;
        tx.commit().await?;

        info!(user_id, "preferences updated");
        Ok(())
    }

    async fn list_topics(&self) -> Result<Vec<Topic>, AppError> {
        let topics = sqlx::query_as::<_, Topic>("SELECT id, label FROM topics ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(topics)
    }

    async fn user_topics(&self, user_id: i32) -> Result<Vec<Topic>, AppError> {
        let topics = sqlx::query_as::<_, Topic>(
            r#"
            SELECT t.id, t.label
            FROM topics t
            JOIN user_topics ut ON ut.topic_id = t.id
            WHERE ut.user_id = $1
            ORDER BY t.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(topics)
    }
}
