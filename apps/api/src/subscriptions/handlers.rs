use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use chrono::{NaiveDate, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::auth::dto::{MessageResponse, RegisterResponse};
use crate::auth::jwt::AuthUser;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::validation::{
    normalize_email, validate_email, validate_name, validate_password, validate_topics,
};
use crate::digest::window::{next_digest_date, service_date};
use crate::errors::AppError;
use crate::models::topic::Topic;
use crate::models::user::{Language, NewUser, NotificationMethod, Preferences, UserProfile};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
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

#[derive(Debug, Deserialize)]
pub struct PreferencesRequest {
    #[serde(default)]
    pub topics: Vec<i32>,
    pub language: Language,
    pub notification_method: NotificationMethod,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: UserProfile,
    pub user_topics: Vec<Topic>,
    pub all_topics: Vec<Topic>,
    pub next_digest_date: NaiveDate,
    pub kakao_connected: bool,
}

#[derive(Debug, Serialize)]
pub struct SendNowResponse {
    pub email: Option<bool>,
    pub kakao: Option<bool>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct KakaoAuthResponse {
    pub auth_url: String,
}

#[derive(Debug, Deserialize)]
pub struct KakaoCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /api/topics
pub async fn list_topics(State(state): State<AppState>) -> Result<Json<Vec<Topic>>, AppError> {
    Ok(Json(state.store.list_topics().await?))
}

/// POST /api/subscribe
/// Creates the subscription, or replaces it when the email already has one.
/// Replacing requires that account's password.
#[instrument(skip(state, req))]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let email = normalize_email(&req.email);
    validate_name(&req.name)?;
    validate_email(&email)?;
    validate_password(&req.password)?;
    validate_topics(&req.topics)?;

    let password_hash = match state.store.find_user_by_email(&email).await? {
        Some(existing) => {
            if !verify_password(&req.password, &existing.password_hash)? {
                warn!(user_id = existing.id, "subscribe with wrong password");
                return Err(AppError::Unauthorized("Invalid email or password".into()));
            }
            existing.password_hash
        }
        None => hash_password(&req.password)?,
    };

    let user = NewUser {
        email,
        name: req.name.trim().to_string(),
        password_hash,
        language: req.language.unwrap_or_default(),
        notification_method: req.notification_method.unwrap_or_default(),
    };
    let user_id = state
        .store
        .upsert_subscription(&user, &req.topics, true)
        .await?;
    let token = state.jwt.sign(user_id)?;

    info!(user_id, topics = req.topics.len(), "subscription saved");
    Ok(Json(RegisterResponse { user_id, token }))
}

/// GET /api/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

    Ok(Json(DashboardResponse {
        user: user.profile(),
        user_topics: state.store.user_topics(user_id).await?,
        all_topics: state.store.list_topics().await?,
        next_digest_date: next_digest_date(service_date(Utc::now())),
        kakao_connected: state.kakao.is_connected(user_id).await?,
    }))
}

/// POST /api/preferences
#[instrument(skip(state, req))]
pub async fn update_preferences(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<PreferencesRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_topics(&req.topics)?;
    let prefs = Preferences {
        topics: req.topics,
        language: req.language,
        notification_method: req.notification_method,
        active: req.active,
    };
    state.store.update_preferences(user_id, &prefs).await?;

    info!(user_id, active = prefs.active, "preferences updated");
    Ok(Json(MessageResponse {
        message: "Preferences saved".into(),
    }))
}

/// POST /api/send_digest_now
pub async fn send_digest_now(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SendNowResponse>, AppError> {
    let delivery = state.jobs.dispatcher().send_now(user_id).await?;
    Ok(Json(SendNowResponse {
        email: delivery.email,
        kakao: delivery.chat,
        message: delivery.message().to_string(),
    }))
}

/// GET /api/kakao_auth
pub async fn kakao_auth(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<KakaoAuthResponse>, AppError> {
    let auth_url = state
        .kakao
        .generate_auth_url(user_id)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(Json(KakaoAuthResponse { auth_url }))
}

/// GET /api/auth/kakao/callback
/// Always answers with a redirect back to the dashboard.
pub async fn kakao_callback(
    State(state): State<AppState>,
    Query(query): Query<KakaoCallbackQuery>,
) -> Redirect {
    let dashboard = state.config.dashboard_url();

    let outcome = match (query.error, query.code, query.state) {
        (Some(error), _, _) => {
            warn!(%error, "Kakao authorization denied");
            Err(error)
        }
        (None, Some(code), Some(oauth_state)) => {
            if state.kakao.handle_callback(&code, &oauth_state).await {
                Ok(())
            } else {
                Err("link_failed".to_string())
            }
        }
        _ => Err("missing_code".to_string()),
    };

    Redirect::to(&callback_redirect(&dashboard, outcome))
}

fn callback_redirect(dashboard: &str, outcome: Result<(), String>) -> String {
    let param = match &outcome {
        Ok(()) => ("kakao_success", "1"),
        Err(reason) => ("kakao_error", reason.as_str()),
    };
    Url::parse_with_params(dashboard, &[param])
        .map(String::from)
        .unwrap_or_else(|_| dashboard.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::SubscriptionStore;
    use std::sync::Arc;

    fn state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_topics(&["Computer Science", "Physics", "Math"]));
        (AppState::for_tests(store.clone()), store)
    }

    fn subscribe_req(password: &str, topics: Vec<i32>, lang: Language) -> SubscribeRequest {
        SubscribeRequest {
            name: "Reader".into(),
            email: "reader@example.com".into(),
            password: password.into(),
            topics,
            language: Some(lang),
            notification_method: None,
        }
    }

    #[test]
    fn test_callback_redirects() {
        let dashboard = "http://localhost:3000/dashboard";
        assert_eq!(
            callback_redirect(dashboard, Ok(())),
            "http://localhost:3000/dashboard?kakao_success=1"
        );
        assert_eq!(
            callback_redirect(dashboard, Err("access_denied".into())),
            "http://localhost:3000/dashboard?kakao_error=access_denied"
        );
        assert_eq!(
            callback_redirect(dashboard, Err("bad reason&x=1".into())),
            "http://localhost:3000/dashboard?kakao_error=bad+reason%26x%3D1"
        );
    }

    #[tokio::test]
    async fn test_subscribe_twice_replaces_topics() {
        let (state, store) = state();
        let Json(first) = subscribe(
            State(state.clone()),
            Json(subscribe_req("Abcdef12", vec![1, 2], Language::En)),
        )
        .await
        .unwrap();
        let Json(second) = subscribe(
            State(state.clone()),
            Json(subscribe_req("Abcdef12", vec![3], Language::Ko)),
        )
        .await
        .unwrap();

        assert_eq!(first.user_id, second.user_id);
        assert_eq!(store.topic_ids_of(first.user_id), vec![3]);
        let user = store.find_user(first.user_id).await.unwrap().unwrap();
        assert_eq!(user.language(), Language::Ko);
        assert!(user.active);
    }

    #[tokio::test]
    async fn test_subscribe_existing_email_needs_password() {
        let (state, store) = state();
        let Json(first) = subscribe(
            State(state.clone()),
            Json(subscribe_req("Abcdef12", vec![1], Language::En)),
        )
        .await
        .unwrap();
        let err = subscribe(
            State(state),
            Json(subscribe_req("Other123", vec![2], Language::En)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
        assert_eq!(store.topic_ids_of(first.user_id), vec![1]);
    }

    #[tokio::test]
    async fn test_preferences_update_and_reject_unknown_topic() {
        let (state, store) = state();
        let Json(sub) = subscribe(
            State(state.clone()),
            Json(subscribe_req("Abcdef12", vec![1], Language::En)),
        )
        .await
        .unwrap();

        update_preferences(
            State(state.clone()),
            AuthUser(sub.user_id),
            Json(PreferencesRequest {
                topics: vec![2, 3],
                language: Language::Ko,
                notification_method: NotificationMethod::Both,
                active: false,
            }),
        )
        .await
        .unwrap();
        assert_eq!(store.topic_ids_of(sub.user_id), vec![2, 3]);
        let user = store.find_user(sub.user_id).await.unwrap().unwrap();
        assert!(!user.active);
        assert_eq!(user.notification_method(), NotificationMethod::Both);

        let err = update_preferences(
            State(state),
            AuthUser(sub.user_id),
            Json(PreferencesRequest {
                topics: vec![1, 42],
                language: Language::En,
                notification_method: NotificationMethod::Email,
                active: true,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        // rejected update leaves the previous selection intact
        assert_eq!(store.topic_ids_of(sub.user_id), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_dashboard_and_send_now() {
        let (state, _) = state();
        let Json(sub) = subscribe(
            State(state.clone()),
            Json(subscribe_req("Abcdef12", vec![1], Language::En)),
        )
        .await
        .unwrap();

        let Json(dash) = dashboard(State(state.clone()), AuthUser(sub.user_id))
            .await
            .unwrap();
        assert_eq!(dash.user_topics.len(), 1);
        assert_eq!(dash.all_topics.len(), 3);
        assert!(!dash.kakao_connected);
        assert!(dash.next_digest_date > service_date(Utc::now()));

        let Json(sent) = send_digest_now(State(state.clone()), AuthUser(sub.user_id))
            .await
            .unwrap();
        assert_eq!(sent.email, Some(true));
        assert_eq!(sent.kakao, None);
        assert_eq!(sent.message, "Digest sent successfully");

        let err = dashboard(State(state), AuthUser(999)).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
