use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored Kakao OAuth credentials; one row per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct KakaoToken {
    pub user_id: i32,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Epoch seconds.
    pub expires_at: i64,
}
