use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::compose::{Channel, ContentComposer};
use super::window::{service_date, DigestWindow};
use crate::errors::AppError;
use crate::models::paper::DigestPaper;
use crate::models::user::Subscriber;
use crate::notify::Notifier;
use crate::store::DigestStore;

/// Per-channel outcome for one subscriber. `None` means the channel is not
/// enabled for that user.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub email: Option<bool>,
    pub chat: Option<bool>,
}

impl Delivery {
    fn outcomes(&self) -> impl Iterator<Item = bool> {
        self.email.into_iter().chain(self.chat)
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes().count() > 0 && self.outcomes().all(|ok| ok)
    }

    pub fn any_succeeded(&self) -> bool {
        self.outcomes().any(|ok| ok)
    }

    pub fn message(&self) -> &'static str {
        if self.all_succeeded() {
            "Digest sent successfully"
        } else if self.any_succeeded() {
            "Digest partially sent; check your notification settings"
        } else {
            "Failed to send digest"
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub papers: usize,
    pub users: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    pub chats_sent: usize,
    pub chats_failed: usize,
}

impl DispatchReport {
    fn record(&mut self, delivery: Delivery) {
        match delivery.email {
            Some(true) => self.emails_sent += 1,
            Some(false) => self.emails_failed += 1,
            None => {}
        }
        match delivery.chat {
            Some(true) => self.chats_sent += 1,
            Some(false) => self.chats_failed += 1,
            None => {}
        }
    }
}

pub struct DigestDispatcher {
    store: Arc<dyn DigestStore>,
    composer: ContentComposer,
    email: Arc<dyn Notifier>,
    chat: Arc<dyn Notifier>,
}

impl DigestDispatcher {
    pub fn new(
        store: Arc<dyn DigestStore>,
        composer: ContentComposer,
        email: Arc<dyn Notifier>,
        chat: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            composer,
            email,
            chat,
        }
    }

    /// Composes and sends on every channel the user enabled. The channels are
    /// independent: a failed email does not stop the chat attempt.
    pub async fn deliver(&self, user: &Subscriber, papers: &[DigestPaper]) -> Delivery {
        let mut channels = Vec::with_capacity(2);
        if user.notification_method.wants_email() {
            channels.push(Channel::Email);
        }
        if user.notification_method.wants_chat() {
            channels.push(Channel::Chat);
        }

        let contents = self.composer.compose_channels(papers, user, &channels).await;
        let mut delivery = Delivery::default();
        for (channel, content) in channels.into_iter().zip(contents) {
            match channel {
                Channel::Email => {
                    delivery.email = Some(self.email.send_research_digest(user, &content).await)
                }
                Channel::Chat => {
                    delivery.chat = Some(self.chat.send_research_digest(user, &content).await)
                }
            }
        }

        delivery
    }

    /// The scheduled job. Never fails; a load error ends the run with an empty report.
    pub async fn run_weekly(&self) -> DispatchReport {
        self.run_for(service_date(Utc::now())).await
    }

    pub async fn run_for(&self, today: NaiveDate) -> DispatchReport {
        let window = DigestWindow::for_dispatch_on(today);
        info!(start = %window.start, end = %window.end, "weekly digest dispatch started");

        let papers = match self.store.recent_papers(window).await {
            Ok(papers) => papers,
            Err(e) => {
                error!(error = %e, "could not load papers for digest");
                return DispatchReport::default();
            }
        };
        let users = match self.store.active_subscribers().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "could not load subscribers for digest");
                return DispatchReport::default();
            }
        };

        let mut report = DispatchReport {
            papers: papers.len(),
            users: users.len(),
            ..DispatchReport::default()
        };

        for user in &users {
            let delivery = self.deliver(user, &papers).await;
            if !delivery.all_succeeded() {
                warn!(user_id = user.id, ?delivery, "digest not fully delivered");
            }
            report.record(delivery);
        }

        info!(
            papers = report.papers,
            users = report.users,
            emails_sent = report.emails_sent,
            emails_failed = report.emails_failed,
            chats_sent = report.chats_sent,
            chats_failed = report.chats_failed,
            "weekly digest dispatch finished"
        );
        report
    }

    /// Manual trigger from the dashboard: this week's digest for one user,
    /// regardless of the active flag.
    pub async fn send_now(&self, user_id: i32) -> Result<Delivery, AppError> {
        let user = self.store.subscriber(user_id).await?.ok_or_else(|| {
            AppError::NotFound("No subscribed topics; choose at least one topic first".into())
        })?;

        let window = DigestWindow::for_dispatch_on(service_date(Utc::now()));
        let papers = self.store.recent_papers(window).await?;
        let delivery = self.deliver(&user, &papers).await;
        info!(user_id, ?delivery, "manual digest sent");
        Ok(delivery)
    }
}
