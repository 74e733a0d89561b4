use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Static reference topic a user can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Topic {
    pub id: i32,
    pub label: String,
}
