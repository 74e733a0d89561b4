//! Operator triggers for the background jobs, guarded by `x-admin-key`.

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::crawler::import::ImportReport;
use crate::crawler::CrawlReport;
use crate::digest::dispatch::DispatchReport;
use crate::errors::AppError;
use crate::state::AppState;
use crate::summary::SummaryReport;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Admin routes are closed entirely when `ADMIN_API_KEY` is unset.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.config.admin_api_key.as_deref() else {
        return Err(AppError::Forbidden);
    };
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented != expected {
        warn!("admin request with missing or wrong key");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn already_running(job: &str) -> AppError {
    AppError::Conflict(format!("{job} is already running"))
}

#[derive(Debug, Default, Deserialize)]
pub struct CrawlRequest {
    pub date: Option<NaiveDate>,
}

/// POST /api/admin/crawl
/// Crawls one publication day; yesterday (UTC) when no date is given.
pub async fn crawl(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CrawlRequest>>,
) -> Result<Json<CrawlReport>, AppError> {
    require_admin(&state, &headers)?;
    let date = body
        .and_then(|Json(req)| req.date)
        .unwrap_or_else(|| Utc::now().date_naive() - Duration::days(1));

    info!(%date, "manual crawl requested");
    Ok(Json(state.crawler.crawl_day(date).await?))
}

/// POST /api/admin/import
pub async fn import(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ImportReport>, AppError> {
    require_admin(&state, &headers)?;
    Ok(Json(
        state.importer.import_weekly(Utc::now().date_naive()).await?,
    ))
}

/// POST /api/admin/summaries
pub async fn summaries(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SummaryReport>, AppError> {
    require_admin(&state, &headers)?;
    state
        .jobs
        .run_summaries()
        .await
        .map(Json)
        .ok_or_else(|| already_running("AI summary job"))
}

/// POST /api/admin/dispatch
pub async fn dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DispatchReport>, AppError> {
    require_admin(&state, &headers)?;
    state
        .jobs
        .run_digest()
        .await
        .map(Json)
        .ok_or_else(|| already_running("Digest dispatch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use axum::http::{HeaderValue, StatusCode};
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::for_tests(Arc::new(MemoryStore::default()))
    }

    fn with_key(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_str(key).unwrap());
        headers
    }

    #[test]
    fn test_require_admin() {
        let mut state = state();
        assert!(require_admin(&state, &with_key("admin-test")).is_ok());
        assert!(require_admin(&state, &with_key("nope")).is_err());
        assert!(require_admin(&state, &HeaderMap::new()).is_err());

        state.config.admin_api_key = None;
        let err = require_admin(&state, &with_key("admin-test")).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_manual_dispatch_with_no_subscribers() {
        let Json(report) = dispatch(State(state()), with_key("admin-test"))
            .await
            .unwrap();
        assert_eq!(report, DispatchReport::default());
    }

    #[tokio::test]
    async fn test_manual_summaries_with_nothing_pending() {
        let Json(report) = summaries(State(state()), with_key("admin-test"))
            .await
            .unwrap();
        assert_eq!(report.total, 0);
    }
}
