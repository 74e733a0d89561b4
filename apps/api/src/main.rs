mod auth;
mod config;
mod crawler;
mod db;
mod digest;
mod errors;
mod llm_client;
mod models;
mod notify;
mod routes;
mod scheduler;
mod state;
mod store;
mod subscriptions;
mod summary;
#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::auth::jwt::JwtKeys;
use crate::config::Config;
use crate::crawler::arxiv::ArxivClient;
use crate::crawler::import::WeeklyImporter;
use crate::crawler::Crawler;
use crate::db::{create_pool, run_migrations};
use crate::digest::compose::ContentComposer;
use crate::digest::dispatch::DigestDispatcher;
use crate::digest::translate::Translator;
use crate::llm_client::LlmClient;
use crate::notify::email::EmailDispatcher;
use crate::notify::kakao::{KakaoHttp, KakaoService};
use crate::routes::build_router;
use crate::scheduler::{DigestScheduler, JobContext};
use crate::state::AppState;
use crate::store::PgStore;
use crate::summary::archive::{S3SummaryArchive, SummaryArchive};
use crate::summary::SummaryGenerator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; startup fails on missing required env vars.
    // Anything worth logging from it is reported once tracing is up.
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting digest API v{}", env!("CARGO_PKG_VERSION"));
    if config.secret_key_is_fallback {
        warn!("SECRET_KEY is not set, session tokens are signed with the development key");
    }

    // Initialize PostgreSQL and apply embedded migrations
    let db = create_pool(config.database.clone()).await?;
    run_migrations(&db).await?;
    let store = Arc::new(PgStore::new(db));

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!(bucket = %config.s3_bucket, "S3 client initialized");

    // Initialize LLM client
    let llm = Arc::new(LlmClient::new(config.openai_api_key.clone())?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Notification channels
    let email = EmailDispatcher::new(
        config.resend_api_key.clone(),
        config.email_from.clone(),
        config.unsubscribe_url(),
    )?;
    let kakao = Arc::new(KakaoService::new(
        Arc::new(KakaoHttp::new(
            config.kakao_client_id.clone(),
            config.kakao_redirect_uri.clone(),
        )?),
        store.clone(),
        config.kakao_client_id.clone(),
        config.kakao_redirect_uri.clone(),
        config.dashboard_url(),
    ));

    // Weekly jobs
    let composer = ContentComposer::new(Translator::new(llm.clone()), config.dashboard_url())?;
    let dispatcher = DigestDispatcher::new(store.clone(), composer, Arc::new(email), kakao.clone());
    let archive: Arc<dyn SummaryArchive> =
        Arc::new(S3SummaryArchive::new(s3.clone(), config.s3_bucket.clone()));
    let summaries = SummaryGenerator::new(store.clone(), llm, Some(archive));
    let jobs = JobContext::new(Arc::new(summaries), Arc::new(dispatcher));

    let scheduler =
        DigestScheduler::new(jobs.clone(), &config.ai_summary_cron, &config.digest_cron).await?;
    scheduler.start().await?;

    // Build app state
    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        jwt: JwtKeys::new(&config.secret_key),
        kakao,
        jobs,
        crawler: Arc::new(Crawler::new(Arc::new(ArxivClient::new()?), store.clone())),
        importer: Arc::new(WeeklyImporter::new(s3, config.s3_bucket.clone(), store)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
/// Without static keys the default AWS credential chain is used.
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()));

    if let (Some(key_id), Some(secret)) = (
        config.aws_access_key_id.as_deref(),
        config.aws_secret_access_key.as_deref(),
    ) {
        loader = loader.credentials_provider(Credentials::new(
            key_id,
            secret,
            None,
            None,
            "digest-static",
        ));
    }
    if let Some(endpoint) = config.s3_endpoint.as_deref() {
        loader = loader.endpoint_url(endpoint);
    }

    let shared = loader.load().await;
    let mut s3_config = aws_sdk_s3::config::Builder::from(&shared);
    if config.s3_endpoint.is_some() {
        // MinIO serves buckets by path, not by subdomain
        s3_config = s3_config.force_path_style(true);
    }
    aws_sdk_s3::Client::from_conf(s3_config.build())
}
