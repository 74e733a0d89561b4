use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, instrument, warn};

use super::dto::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse};
use super::password::{hash_password, verify_password};
use super::validation::{
    normalize_email, validate_email, validate_name, validate_password, validate_topics,
};
use crate::errors::AppError;
use crate::models::user::NewUser;
use crate::state::AppState;

/// POST /api/register
#[instrument(skip(state, req))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let email = normalize_email(&req.email);
    validate_name(&req.name)?;
    validate_email(&email)?;
    validate_password(&req.password)?;
    validate_topics(&req.topics)?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let user = NewUser {
        email,
        name: req.name.trim().to_string(),
        password_hash: hash_password(&req.password)?,
        language: req.language.unwrap_or_default(),
        notification_method: req.notification_method.unwrap_or_default(),
    };
    let user_id = state.store.create_user(&user, &req.topics).await?;
    let token = state.jwt.sign(user_id)?;

    info!(user_id, topics = req.topics.len(), "user registered");
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

/// POST /api/login
#[instrument(skip(state, req))]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = normalize_email(&req.email);
    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = user.id, "wrong password");
        return Err(invalid());
    }

    let token = state.jwt.sign(user.id)?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: user.profile(),
    }))
}

/// POST /api/logout
/// Sessions are stateless tokens; the client drops its copy.
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Logged out".into(),
    })
}
