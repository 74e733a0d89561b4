//! KakaoTalk "memo to self" channel: OAuth linking, lazy token refresh and
//! message delivery.
//!
//! Every step fails closed. A digest that cannot be delivered is logged and
//! reported as `false`; nothing here asks the user to re-authorize.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::Notifier;
use crate::errors::AppError;
use crate::models::kakao::KakaoToken;
use crate::models::user::Subscriber;
use crate::store::TokenStore;

const AUTHORIZE_URL: &str = "https://kauth.kakao.com/oauth/authorize";
const TOKEN_URL: &str = "https://kauth.kakao.com/oauth/token";
const MEMO_URL: &str = "https://kapi.kakao.com/v2/api/talk/memo/default/send";

/// Access tokens this close to expiry are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// How long an authorization `state` stays acceptable after it was issued.
pub const STATE_MAX_AGE_SECS: i64 = 600;

/// Tolerated clock difference for a `state` stamped slightly in the future.
const STATE_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum KakaoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Kakao API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("token response is missing '{0}'")]
    MissingField(&'static str),

    #[error("malformed OAuth state '{0}'")]
    MalformedState(String),

    #[error("OAuth state issued at {issued_at} is no longer valid")]
    ExpiredState { issued_at: i64 },

    #[error("invalid URL: {0}")]
    Url(String),

    #[error("user {0} has not linked a Kakao account")]
    NotLinked(i32),

    #[error("no refresh token stored for user {0}")]
    NoRefreshToken(i32),

    #[error("memo rejected (status {status}, result_code {result_code:?})")]
    Rejected { status: u16, result_code: Option<i64> },

    #[error(transparent)]
    Store(#[from] AppError),
}

/// Raw body of the token endpoint. Fields are optional here and checked by
/// `into_linked` / `into_refreshed`, which know what each grant must carry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TokenResponse {
    /// Authorization-code grant: all three fields are required.
    pub fn into_linked(self) -> Result<IssuedToken, KakaoError> {
        Ok(IssuedToken {
            access_token: non_empty(self.access_token)
                .ok_or(KakaoError::MissingField("access_token"))?,
            refresh_token: Some(
                non_empty(self.refresh_token).ok_or(KakaoError::MissingField("refresh_token"))?,
            ),
            expires_in: self.expires_in.ok_or(KakaoError::MissingField("expires_in"))?,
        })
    }

    /// Refresh grant: the refresh token only comes back when Kakao rotates it.
    pub fn into_refreshed(self) -> Result<IssuedToken, KakaoError> {
        Ok(IssuedToken {
            access_token: non_empty(self.access_token)
                .ok_or(KakaoError::MissingField("access_token"))?,
            refresh_token: non_empty(self.refresh_token),
            expires_in: self.expires_in.ok_or(KakaoError::MissingField("expires_in"))?,
        })
    }
}

/// Outcome of a memo send as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoResult {
    pub status: u16,
    pub result_code: Option<i64>,
}

impl MemoResult {
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK.as_u16() && self.result_code == Some(0)
    }
}

/// Builds the OAuth `state` value: `"{user_id}|{timestamp}"`.
pub fn make_state(user_id: i32, timestamp: i64) -> String {
    format!("{user_id}|{timestamp}")
}

/// Splits an OAuth `state` value into the user id and its issue time.
pub fn parse_state(state: &str) -> Result<(i32, i64), KakaoError> {
    let malformed = || KakaoError::MalformedState(state.to_string());
    let (user_id, timestamp) = state.split_once('|').ok_or_else(malformed)?;
    let issued_at = timestamp.trim().parse::<i64>().map_err(|_| malformed())?;
    match user_id.trim().parse::<i32>() {
        Ok(id) if id > 0 => Ok((id, issued_at)),
        _ => Err(malformed()),
    }
}

/// The state is not signed, so it only binds a callback to a user for
/// `STATE_MAX_AGE_SECS` after the authorization URL was generated.
pub fn verify_state(state: &str, now: i64) -> Result<i32, KakaoError> {
    let (user_id, issued_at) = parse_state(state)?;
    let age = now - issued_at;
    if age > STATE_MAX_AGE_SECS || age < -STATE_CLOCK_SKEW_SECS {
        return Err(KakaoError::ExpiredState { issued_at });
    }
    Ok(user_id)
}

pub fn needs_refresh(expires_at: i64, now: i64) -> bool {
    now > expires_at - REFRESH_MARGIN_SECS
}

/// Wire calls to Kakao. Split out so the service logic can run against a fake.
#[async_trait]
pub trait KakaoApi: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, KakaoError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, KakaoError>;

    async fn send_memo(
        &self,
        access_token: &str,
        text: &str,
        link: &str,
    ) -> Result<MemoResult, KakaoError>;
}

pub struct KakaoHttp {
    client: Client,
    client_id: String,
    redirect_uri: String,
}

impl KakaoHttp {
    pub fn new(client_id: String, redirect_uri: String) -> Result<Self, KakaoError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            client_id,
            redirect_uri,
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, KakaoError> {
        let response = self.client.post(TOKEN_URL).form(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(KakaoError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<TokenResponse>().await?)
    }
}

#[async_trait]
impl KakaoApi for KakaoHttp {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, KakaoError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", &self.client_id),
            ("redirect_uri", &self.redirect_uri),
            ("code", code),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, KakaoError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", &self.client_id),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn send_memo(
        &self,
        access_token: &str,
        text: &str,
        link: &str,
    ) -> Result<MemoResult, KakaoError> {
        let template = json!({
            "object_type": "text",
            "text": text,
            "link": {
                "web_url": link,
                "mobile_web_url": link,
            },
        });

        let response = self
            .client
            .post(MEMO_URL)
            .bearer_auth(access_token)
            .form(&[("template_object", template.to_string())])
            .send()
            .await?;

        let status = response.status().as_u16();
        let result_code = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("result_code").and_then(Value::as_i64));

        Ok(MemoResult {
            status,
            result_code,
        })
    }
}

pub struct KakaoService {
    api: Arc<dyn KakaoApi>,
    tokens: Arc<dyn TokenStore>,
    client_id: String,
    redirect_uri: String,
    dashboard_url: String,
}

impl KakaoService {
    pub fn new(
        api: Arc<dyn KakaoApi>,
        tokens: Arc<dyn TokenStore>,
        client_id: String,
        redirect_uri: String,
        dashboard_url: String,
    ) -> Self {
        Self {
            api,
            tokens,
            client_id,
            redirect_uri,
            dashboard_url,
        }
    }

    /// Authorization URL the browser is sent to when linking an account.
    pub fn generate_auth_url(&self, user_id: i32) -> Result<String, KakaoError> {
        let state = make_state(user_id, Utc::now().timestamp());
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "talk_message"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| KakaoError::Url(e.to_string()))?;
        Ok(url.into())
    }

    /// Completes the OAuth flow. Returns `false` on any failure, including a
    /// malformed or stale `state` (checked before any network call).
    pub async fn handle_callback(&self, code: &str, state: &str) -> bool {
        match self.link_account(code, state).await {
            Ok(user_id) => {
                info!(user_id, "Kakao account linked");
                true
            }
            Err(e) => {
                warn!(error = %e, "Kakao callback failed");
                false
            }
        }
    }

    async fn link_account(&self, code: &str, state: &str) -> Result<i32, KakaoError> {
        let user_id = verify_state(state, Utc::now().timestamp())?;
        let issued = self.api.exchange_code(code).await?.into_linked()?;

        self.tokens
            .upsert_token(&KakaoToken {
                user_id,
                access_token: issued.access_token,
                refresh_token: issued.refresh_token,
                expires_at: Utc::now().timestamp() + issued.expires_in,
            })
            .await?;
        Ok(user_id)
    }

    pub async fn is_connected(&self, user_id: i32) -> Result<bool, AppError> {
        Ok(self.tokens.get_token(user_id).await?.is_some())
    }

    /// Returns a usable access token, refreshing it first when it is inside
    /// the expiry margin.
    async fn access_token(&self, user_id: i32) -> Result<String, KakaoError> {
        let token = self
            .tokens
            .get_token(user_id)
            .await?
            .ok_or(KakaoError::NotLinked(user_id))?;

        let now = Utc::now().timestamp();
        if !needs_refresh(token.expires_at, now) {
            return Ok(token.access_token);
        }

        let refresh_token = token
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(KakaoError::NoRefreshToken(user_id))?;
        let issued = self.api.refresh(refresh_token).await?.into_refreshed()?;

        self.tokens
            .update_refreshed(
                user_id,
                &issued.access_token,
                issued.refresh_token.as_deref(),
                now + issued.expires_in,
            )
            .await?;
        info!(user_id, rotated = issued.refresh_token.is_some(), "Kakao token refreshed");
        Ok(issued.access_token)
    }

    async fn send(&self, user: &Subscriber, content: &str) -> Result<(), KakaoError> {
        let access_token = self.access_token(user.id).await?;
        let result = self
            .api
            .send_memo(&access_token, content, &self.dashboard_url)
            .await?;
        if result.is_success() {
            Ok(())
        } else {
            Err(KakaoError::Rejected {
                status: result.status,
                result_code: result.result_code,
            })
        }
    }
}

#[async_trait]
impl Notifier for KakaoService {
    async fn send_research_digest(&self, user: &Subscriber, content: &str) -> bool {
        match self.send(user, content).await {
            Ok(()) => {
                info!(user_id = user.id, "digest sent via Kakao");
                true
            }
            Err(e) => {
                error!(user_id = user.id, error = %e, "Kakao digest failed");
                false
            }
        }
    }
}
