//! Email dispatcher: delivers digests through the Resend HTTP API.
//!
//! One request per digest, no retries. A send counts as delivered only when
//! Resend answers with a delivery `id`.

use async_trait::async_trait;
use minijinja::{context, Environment};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use super::Notifier;
use crate::digest::i18n;
use crate::models::user::{Language, Subscriber};

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const BASE_TEMPLATE: &str = "email_base.html";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("email API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("email API response carried no delivery id")]
    MissingId,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

/// Delivery id from a Resend response body, if it has a usable one.
fn delivery_id(body: &Value) -> Option<String> {
    serde_json::from_value::<SendEmailResponse>(body.clone())
        .ok()
        .and_then(|r| r.id)
        .filter(|id| !id.trim().is_empty())
}

fn template_env() -> Result<Environment<'static>, EmailError> {
    let mut env = Environment::new();
    env.add_function("t", |key: String, lang: String| -> String {
        let lang: Language = lang.parse().unwrap_or_default();
        i18n::t(&key, lang).to_string()
    });
    env.add_template(
        BASE_TEMPLATE,
        include_str!("../../templates/email_base.html"),
    )?;
    Ok(env)
}

pub struct EmailDispatcher {
    client: Client,
    api_key: String,
    from: String,
    unsubscribe_link: String,
    templates: Environment<'static>,
}

impl EmailDispatcher {
    pub fn new(api_key: String, from: String, unsubscribe_link: String) -> Result<Self, EmailError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            api_key,
            from,
            unsubscribe_link,
            templates: template_env()?,
        })
    }

    pub fn subject(lang: Language) -> &'static str {
        i18n::t("email_subject", lang)
    }

    /// Wraps the composed fragment in the base HTML document.
    pub fn render(&self, user: &Subscriber, content: &str) -> Result<String, EmailError> {
        let template = self.templates.get_template(BASE_TEMPLATE)?;
        let html = template.render(context! {
            content => content,
            user_name => &user.name,
            unsubscribe_link => &self.unsubscribe_link,
            lang => user.language.as_str(),
        })?;
        Ok(html)
    }

    async fn deliver(&self, user: &Subscriber, content: &str) -> Result<String, EmailError> {
        let html = self.render(user, content)?;
        let request = SendEmailRequest {
            from: &self.from,
            to: vec![&user.email],
            subject: Self::subject(user.language),
            html: &html,
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        delivery_id(&body).ok_or(EmailError::MissingId)
    }
}

#[async_trait]
impl Notifier for EmailDispatcher {
    async fn send_research_digest(&self, user: &Subscriber, content: &str) -> bool {
        match self.deliver(user, content).await {
            Ok(id) => {
                info!(user_id = user.id, delivery_id = %id, "digest email sent");
                true
            }
            Err(e) => {
                error!(user_id = user.id, error = %e, "digest email failed");
                false
            }
        }
    }
}
