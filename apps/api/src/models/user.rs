use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Digest language. Anything unrecognised in storage reads back as English.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ko,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ko => "ko",
        }
    }

    /// Name used when instructing the LLM to translate.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ko => "Korean",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "ko" => Ok(Language::Ko),
            other => Err(format!("unsupported language '{other}'")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which channels a subscriber receives the weekly digest on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMethod {
    #[default]
    Email,
    Kakao,
    Both,
}

impl NotificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationMethod::Email => "email",
            NotificationMethod::Kakao => "kakao",
            NotificationMethod::Both => "both",
        }
    }

    pub fn wants_email(&self) -> bool {
        matches!(self, NotificationMethod::Email | NotificationMethod::Both)
    }

    pub fn wants_chat(&self) -> bool {
        matches!(self, NotificationMethod::Kakao | NotificationMethod::Both)
    }
}

impl FromStr for NotificationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(NotificationMethod::Email),
            "kakao" => Ok(NotificationMethod::Kakao),
            "both" => Ok(NotificationMethod::Both),
            other => Err(format!("unsupported notification method '{other}'")),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub language: String,
    pub notification_method: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    pub fn language(&self) -> Language {
        self.language.parse().unwrap_or_default()
    }

    pub fn notification_method(&self) -> NotificationMethod {
        self.notification_method.parse().unwrap_or_default()
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            language: self.language(),
            notification_method: self.notification_method(),
            active: self.active,
        }
    }
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub language: Language,
    pub notification_method: NotificationMethod,
    pub active: bool,
}

/// Everything the digest pipeline needs to know about a recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub language: Language,
    pub notification_method: NotificationMethod,
    pub topics: Vec<i32>,
}

/// Input for creating a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub language: Language,
    pub notification_method: NotificationMethod,
}

/// Mutable subscription settings edited from the dashboard.
#[derive(Debug, Clone)]
pub struct Preferences {
    pub topics: Vec<i32>,
    pub language: Language,
    pub notification_method: NotificationMethod,
    pub active: bool,
}
