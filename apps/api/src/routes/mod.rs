pub mod admin;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::state::AppState;
use crate::subscriptions::handlers as subscriptions;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/topics", get(subscriptions::list_topics))
        // Accounts
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        // Subscription management
        .route("/api/subscribe", post(subscriptions::subscribe))
        .route("/api/dashboard", get(subscriptions::dashboard))
        .route("/api/preferences", post(subscriptions::update_preferences))
        .route("/api/send_digest_now", post(subscriptions::send_digest_now))
        // Kakao account link
        .route("/api/kakao_auth", get(subscriptions::kakao_auth))
        .route(
            "/api/auth/kakao/callback",
            get(subscriptions::kakao_callback),
        )
        // Operator triggers
        .route("/api/admin/crawl", post(admin::crawl))
        .route("/api/admin/import", post(admin::import))
        .route("/api/admin/summaries", post(admin::summaries))
        .route("/api/admin/dispatch", post(admin::dispatch))
        .with_state(state)
}
