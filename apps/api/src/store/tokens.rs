use async_trait::async_trait;

use super::{PgStore, TokenStore};
use crate::errors::AppError;
use crate::models::kakao::KakaoToken;

#[async_trait]
impl TokenStore for PgStore {
    async fn get_token(&self, user_id: i32) -> Result<Option<KakaoToken>, AppError> {
        let token = sqlx::query_as::<_, KakaoToken>(
            "SELECT user_id, access_token, refresh_token, expires_at FROM kakao_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn upsert_token(&self, token: &KakaoToken) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO kakao_tokens (user_id, access_token, refresh_token, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = COALESCE(EXCLUDED.refresh_token, kakao_tokens.refresh_token),
                expires_at = EXCLUDED.expires_at,
                updated_at = now()
            "#,
        )
        .bind(token.user_id)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_refreshed(
        &self,
        user_id: i32,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE kakao_tokens
            SET access_token = $2,
                refresh_token = COALESCE($3, refresh_token),
                expires_at = $4,
                updated_at = now()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
