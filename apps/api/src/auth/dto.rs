use serde::{Deserialize, Serialize};

use crate::models::user::{Language, NotificationMethod, UserProfile};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub topics: Vec<i32>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub notification_method: Option<NotificationMethod>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i32,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
