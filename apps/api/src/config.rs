use anyhow::{Context, Result};
use sqlx::postgres::PgConnectOptions;

const FALLBACK_SECRET_KEY: &str = "research-digest-dev-secret-key";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PgConnectOptions,
    pub secret_key: String,
    /// `SECRET_KEY` was unset and the development key is in use.
    pub secret_key_is_fallback: bool,
    pub openai_api_key: String,
    pub resend_api_key: String,
    pub email_from: String,
    pub kakao_client_id: String,
    pub kakao_redirect_uri: String,
    pub public_url: String,
    pub frontend_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: Option<String>,
    pub aws_region: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub ai_summary_cron: String,
    pub digest_cron: String,
    pub admin_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let public_url = optional_env("PUBLIC_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string());
        let kakao_redirect_uri = optional_env("KAKAO_REDIRECT_URI")
            .unwrap_or_else(|| format!("{public_url}/api/auth/kakao/callback"));

        let (secret_key, secret_key_is_fallback) = resolve_secret(optional_env("SECRET_KEY"));

        Ok(Config {
            database: database_from_env()?,
            secret_key,
            secret_key_is_fallback,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            resend_api_key: require_env("RESEND_API_KEY")?,
            email_from: optional_env("EMAIL_FROM")
                .unwrap_or_else(|| "Research Digest <onboarding@resend.dev>".to_string()),
            kakao_client_id: require_env("KAKAO_CLIENT_ID")?,
            kakao_redirect_uri,
            public_url,
            frontend_url: optional_env("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: optional_env("S3_ENDPOINT"),
            aws_region: optional_env("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_access_key_id: optional_env("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: optional_env("AWS_SECRET_ACCESS_KEY"),
            // Tuesday 07:00 and 08:00 Asia/Seoul, expressed in UTC.
            ai_summary_cron: optional_env("AI_SUMMARY_CRON")
                .unwrap_or_else(|| "0 0 22 * * Mon".to_string()),
            digest_cron: optional_env("DIGEST_CRON")
                .unwrap_or_else(|| "0 0 23 * * Mon".to_string()),
            admin_api_key: optional_env("ADMIN_API_KEY"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Link to the subscriber dashboard, used in digests and OAuth redirects.
    pub fn dashboard_url(&self) -> String {
        format!("{}/dashboard", self.frontend_url.trim_end_matches('/'))
    }

    pub fn unsubscribe_url(&self) -> String {
        format!("{}/dashboard?unsubscribe=1", self.frontend_url.trim_end_matches('/'))
    }
}

/// `DATABASE_URL` wins; otherwise the connection is assembled from the
/// individual `DB_*` settings with `localhost` as the default host.
fn database_from_env() -> Result<PgConnectOptions> {
    if let Some(url) = optional_env("DATABASE_URL") {
        return url
            .parse::<PgConnectOptions>()
            .context("DATABASE_URL is not a valid Postgres URL");
    }
    let host = optional_env("DB_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = optional_env("DB_PORT")
        .unwrap_or_else(|| "5432".to_string())
        .parse::<u16>()
        .context("DB_PORT must be a valid port number")?;
    let name = require_env("DB_NAME")?;
    let user = require_env("DB_USER")?;
    let password = require_env("DB_PASSWORD")?;
    Ok(connect_options(&host, port, &name, &user, &password))
}

/// Credentials go in as separate fields, so no character needs escaping.
fn connect_options(
    host: &str,
    port: u16,
    name: &str,
    user: &str,
    password: &str,
) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(host)
        .port(port)
        .database(name)
        .username(user)
        .password(password)
}

fn resolve_secret(configured: Option<String>) -> (String, bool) {
    match configured {
        Some(key) => (key, false),
        None => (FALLBACK_SECRET_KEY.to_string(), true),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
impl Config {
    /// Fully-populated config for unit tests; nothing here is dialled.
    pub fn for_tests() -> Self {
        Config {
            database: connect_options("localhost", 5432, "digest", "postgres", "postgres"),
            secret_key: "test-secret".to_string(),
            secret_key_is_fallback: false,
            openai_api_key: "sk-test".to_string(),
            resend_api_key: "re_test".to_string(),
            email_from: "Research Digest <digest@example.com>".to_string(),
            kakao_client_id: "kakao-client".to_string(),
            kakao_redirect_uri: "http://localhost:8080/api/auth/kakao/callback".to_string(),
            public_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            s3_bucket: "digest-test".to_string(),
            s3_endpoint: None,
            aws_region: "us-east-1".to_string(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            ai_summary_cron: "0 0 22 * * Mon".to_string(),
            digest_cron: "0 0 23 * * Mon".to_string(),
            admin_api_key: Some("admin-test".to_string()),
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}
