use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::jwt::JwtKeys;
use crate::config::Config;
use crate::crawler::import::WeeklyImporter;
use crate::crawler::Crawler;
use crate::notify::kakao::KakaoService;
use crate::scheduler::JobContext;
use crate::store::SubscriptionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SubscriptionStore>,
    pub jwt: JwtKeys,
    pub kakao: Arc<KakaoService>,
    /// Same context the scheduler runs, so manual triggers share its guards.
    pub jobs: JobContext,
    pub crawler: Arc<Crawler>,
    pub importer: Arc<WeeklyImporter>,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[cfg(test)]
impl AppState {
    /// State over an in-memory store. Outbound clients are real but never
    /// dialled by the tests that use this; notifiers always succeed.
    pub fn for_tests(store: Arc<crate::store::memory::MemoryStore>) -> Self {
        use crate::crawler::arxiv::ArxivClient;
        use crate::digest::compose::ContentComposer;
        use crate::digest::dispatch::DigestDispatcher;
        use crate::digest::translate::Translator;
        use crate::llm_client::LlmError;
        use crate::notify::kakao::KakaoHttp;
        use crate::summary::SummaryGenerator;
        use crate::testing::{FnModel, RecordingNotifier};
        use aws_sdk_s3::config::{BehaviorVersion, Region};

        let config = Config::for_tests();
        let model = Arc::new(FnModel::new(|_| Err(LlmError::EmptyContent)));
        let composer =
            ContentComposer::new(Translator::new(model.clone()), config.dashboard_url()).unwrap();
        let dispatcher = DigestDispatcher::new(
            store.clone(),
            composer,
            Arc::new(RecordingNotifier::new(true)),
            Arc::new(RecordingNotifier::new(true)),
        );
        let jobs = JobContext::new(
            Arc::new(SummaryGenerator::new(store.clone(), model, None)),
            Arc::new(dispatcher),
        );
        let kakao = KakaoService::new(
            Arc::new(
                KakaoHttp::new(config.kakao_client_id.clone(), config.kakao_redirect_uri.clone())
                    .unwrap(),
            ),
            store.clone(),
            config.kakao_client_id.clone(),
            config.kakao_redirect_uri.clone(),
            config.dashboard_url(),
        );
        let s3 = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new("us-east-1"))
                .build(),
        );

        AppState {
            jwt: JwtKeys::new(&config.secret_key),
            store: store.clone(),
            kakao: Arc::new(kakao),
            jobs,
            crawler: Arc::new(Crawler::new(Arc::new(ArxivClient::new().unwrap()), store.clone())),
            importer: Arc::new(WeeklyImporter::new(s3, config.s3_bucket.clone(), store)),
            config,
        }
    }
}
