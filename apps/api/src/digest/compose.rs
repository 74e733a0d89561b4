//! Content composer: turns a week's summarised papers into one subscriber's digest.
//!
//! Pipeline per call:
//! 1. keep papers whose topics intersect the subscriber's (`matcher`)
//! 2. stable sort by importance, highest first (missing score counts as 0.8)
//! 3. take the channel limit: 3 for email, 2 for chat
//! 4. label each paper from its importance
//! 5. translate free-text fields for Korean readers (best effort)
//! 6. render an HTML fragment (email) or plain text (chat)
//!
//! Composition never fails; a rendering error yields a localized error fragment.

use std::collections::BTreeMap;
use std::sync::Arc;

use minijinja::{context, Environment};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::digest::i18n::t;
use crate::digest::matcher::filter_for_user;
use crate::digest::translate::Translator;
use crate::models::paper::DigestPaper;
use crate::models::user::{Language, Subscriber};

const PAPER_BLOCKS: &str = "paper_blocks.html";

const PAPER_BLOCKS_TEMPLATE: &str = r#"{% for paper in papers %}
<div class="paper">
  <h3 class="paper-title">{{ paper.number }}. {{ paper.title }}</h3>
  <div class="paper-meta">
    <span class="paper-category">{{ labels.category }}: {{ paper.category }}</span>
    <span class="paper-importance">{{ paper.label }}</span>
  </div>
  <p class="paper-authors"><strong>{{ labels.authors }}:</strong> {{ paper.author }}</p>
  <p class="paper-date"><strong>{{ labels.published }}:</strong> {{ paper.published }}</p>
  <div class="paper-summary">
    <h4>{{ labels.summary }}</h4>
    <p>{{ paper.summary }}</p>
  </div>
  {% if paper.evaluation %}<div class="paper-evaluation">
    <h4>{{ labels.ai_evaluation }}</h4>
    <p>{{ paper.evaluation }}</p>
  </div>{% endif %}
  {% if paper.keywords %}<p class="paper-keywords"><strong>{{ labels.keywords }}:</strong> {{ paper.keywords|join(", ") }}</p>{% endif %}
  <a class="paper-link" href="{{ paper.link }}">{{ labels.view_full_paper }}</a>
</div>
{% endfor %}{% if remaining > 0 %}
<p class="more-papers">{{ remaining }} {{ labels.more_papers }} <a href="{{ dashboard_url }}">{{ labels.view_dashboard }}</a></p>
{% endif %}"#;

const CHAT_SUMMARY_CHARS: usize = 100;

/// Field labels every email paper block needs.
const EMAIL_LABEL_KEYS: [&str; 9] = [
    "category",
    "authors",
    "published",
    "summary",
    "ai_evaluation",
    "keywords",
    "view_full_paper",
    "more_papers",
    "view_dashboard",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Chat,
}

impl Channel {
    /// Maximum number of papers one digest on this channel lists.
    pub fn limit(&self) -> usize {
        match self {
            Channel::Email => 3,
            Channel::Chat => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportanceLabel {
    HighlyRecommended,
    Recommended,
    WorthReading,
}

impl ImportanceLabel {
    /// Strict thresholds: exactly 0.9 is `Recommended`, exactly 0.7 is `WorthReading`.
    pub fn from_importance(importance: f64) -> Self {
        if importance > 0.9 {
            ImportanceLabel::HighlyRecommended
        } else if importance > 0.7 {
            ImportanceLabel::Recommended
        } else {
            ImportanceLabel::WorthReading
        }
    }

    pub fn i18n_key(&self) -> &'static str {
        match self {
            ImportanceLabel::HighlyRecommended => "highly_recommended",
            ImportanceLabel::Recommended => "recommended",
            ImportanceLabel::WorthReading => "worth_reading",
        }
    }
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Filters to the subscriber's topics and orders by importance, highest first.
/// Ties keep their input order.
pub fn rank_for_user<'a>(papers: &'a [DigestPaper], user_topics: &[i32]) -> Vec<&'a DigestPaper> {
    let mut ranked = filter_for_user(papers, user_topics);
    ranked.sort_by(|a, b| b.ai.importance().total_cmp(&a.ai.importance()));
    ranked
}

/// One paper after labelling and localization, as handed to the renderers.
#[derive(Debug, Clone, Serialize)]
struct PaperView {
    number: usize,
    title: String,
    author: String,
    published: String,
    link: String,
    label: String,
    summary: String,
    evaluation: String,
    category: String,
    keywords: Vec<String>,
}

#[derive(Clone)]
pub struct ContentComposer {
    translator: Translator,
    templates: Arc<Environment<'static>>,
    dashboard_url: String,
}

impl ContentComposer {
    pub fn new(translator: Translator, dashboard_url: String) -> Result<Self, ComposeError> {
        Self::with_email_template(translator, dashboard_url, PAPER_BLOCKS_TEMPLATE)
    }

    pub fn with_email_template(
        translator: Translator,
        dashboard_url: String,
        template: &'static str,
    ) -> Result<Self, ComposeError> {
        let mut env = Environment::new();
        env.add_template(PAPER_BLOCKS, template)?;
        Ok(Self {
            translator,
            templates: Arc::new(env),
            dashboard_url,
        })
    }

    pub fn dashboard_url(&self) -> &str {
        &self.dashboard_url
    }

    /// Builds the digest body for one subscriber on one channel.
    pub async fn compose(
        &self,
        papers: &[DigestPaper],
        user: &Subscriber,
        channel: Channel,
    ) -> String {
        self.compose_channels(papers, user, &[channel])
            .await
            .pop()
            .unwrap_or_else(|| error_fragment(user.language, channel))
    }

    /// Builds one body per requested channel, in the order given. Papers are
    /// localized once and shared, so every channel shows the same translation.
    pub async fn compose_channels(
        &self,
        papers: &[DigestPaper],
        user: &Subscriber,
        channels: &[Channel],
    ) -> Vec<String> {
        let lang = user.language;
        let ranked = rank_for_user(papers, &user.topics);

        if ranked.is_empty() {
            return channels
                .iter()
                .map(|channel| no_papers_fragment(lang, *channel))
                .collect();
        }

        let take = channels.iter().map(Channel::limit).max().unwrap_or(0);
        let with_details = channels.contains(&Channel::Email);
        let mut views = Vec::with_capacity(take);
        for (idx, paper) in ranked.iter().take(take).enumerate() {
            views.push(self.localize(idx + 1, paper, lang, with_details).await);
        }

        channels
            .iter()
            .map(|&channel| {
                let shown = &views[..channel.limit().min(views.len())];
                let remaining = ranked.len().saturating_sub(channel.limit());
                let rendered = match channel {
                    Channel::Email => self.render_email(shown, remaining, lang),
                    Channel::Chat => Ok(self.render_chat(shown, lang)),
                };
                rendered.unwrap_or_else(|e| {
                    error!(user_id = user.id, ?channel, error = %e, "digest composition failed");
                    error_fragment(lang, channel)
                })
            })
            .collect()
    }

    /// `with_details` also translates evaluation and category, which only
    /// the email layout renders.
    async fn localize(
        &self,
        number: usize,
        paper: &DigestPaper,
        lang: Language,
        with_details: bool,
    ) -> PaperView {
        let label = ImportanceLabel::from_importance(paper.ai.importance());
        let mut view = PaperView {
            number,
            title: paper.title.clone(),
            author: paper.author.clone(),
            published: paper.published.format("%Y-%m-%d").to_string(),
            link: paper.link.clone(),
            label: t(label.i18n_key(), lang).to_string(),
            summary: paper.ai.summary.clone(),
            evaluation: paper.ai.evaluation.clone(),
            category: paper.ai.category.clone(),
            keywords: paper.ai.keywords.clone(),
        };

        if lang == Language::Ko {
            view.title = self.translator.translate(&view.title, lang).await;
            view.summary = self.translator.translate(&view.summary, lang).await;
            if with_details {
                view.evaluation = self.translator.translate(&view.evaluation, lang).await;
                view.category = self.translator.translate(&view.category, lang).await;
            }
        }

        view
    }

    fn render_email(
        &self,
        views: &[PaperView],
        remaining: usize,
        lang: Language,
    ) -> Result<String, ComposeError> {
        let labels: BTreeMap<&str, &str> = EMAIL_LABEL_KEYS
            .iter()
            .map(|key| (*key, t(key, lang)))
            .collect();

        let template = self.templates.get_template(PAPER_BLOCKS)?;
        let html = template.render(context! {
            papers => views,
            labels => labels,
            remaining => remaining,
            dashboard_url => &self.dashboard_url,
        })?;
        Ok(html)
    }

    fn render_chat(&self, views: &[PaperView], lang: Language) -> String {
        let mut text = format!("{}\n\n", t("chat_header", lang));
        for view in views {
            text.push_str(&format!(
                "{}. {}\n- {}\n- {}: {}\n\n",
                view.number,
                view.title,
                view.label,
                t("summary", lang),
                truncate_chars(&view.summary, CHAT_SUMMARY_CHARS)
            ));
        }
        text.push_str(&format!(
            "\n{} {}",
            t("chat_view_more", lang),
            self.dashboard_url
        ));
        text
    }
}

fn no_papers_fragment(lang: Language, channel: Channel) -> String {
    match channel {
        Channel::Email => format!(
            "<div class=\"no-papers\">\n  <p>{}</p>\n  <p>{}</p>\n</div>",
            t("email_no_papers", lang),
            t("email_check_back", lang)
        ),
        Channel::Chat => t("chat_no_papers", lang).to_string(),
    }
}

/// Generic localized fragment used whenever composition fails.
pub fn error_fragment(lang: Language, channel: Channel) -> String {
    match channel {
        Channel::Email => format!(
            "<div class=\"error-message\">\n  <h3>{}</h3>\n  <p>{}</p>\n</div>",
            t("content_error_title", lang),
            t("content_error_body", lang)
        ),
        Channel::Chat => format!(
            "⚠️ {}\n{}",
            t("content_error_title", lang),
            t("content_error_body", lang)
        ),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use crate::models::paper::AiSummary;
    use crate::models::user::NotificationMethod;
    use crate::testing::FnModel;
    use chrono::NaiveDate;

    fn paper(id: i32, topics: &[i32], importance: Option<f64>) -> DigestPaper {
        DigestPaper {
            id,
            arxiv_id: format!("2406.{id:05}"),
            title: format!("Paper number {id}"),
            author: "Ada Lovelace, Alan Turing".into(),
            published: NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
            link: format!("https://arxiv.org/abs/2406.{id:05}"),
            topics: topics.iter().copied().collect(),
            ai: AiSummary {
                summary: format!("Summary of paper {id}"),
                evaluation: format!("Evaluation of paper {id}"),
                importance,
                keywords: vec!["graphs".into(), "learning".into()],
                category: "Machine Learning".into(),
            },
        }
    }

    fn user(lang: Language, topics: &[i32]) -> Subscriber {
        Subscriber {
            id: 7,
            email: "reader@example.com".into(),
            name: "Reader".into(),
            language: lang,
            notification_method: NotificationMethod::Both,
            topics: topics.to_vec(),
        }
    }

    fn composer_with(model: FnModel) -> ContentComposer {
        ContentComposer::new(
            Translator::new(Arc::new(model)),
            "http://localhost:3000/dashboard".into(),
        )
        .unwrap()
    }

    fn composer() -> ContentComposer {
        composer_with(FnModel::new(|_| Err(LlmError::EmptyContent)))
    }

    #[test]
    fn test_label_thresholds_are_strict() {
        assert_eq!(
            ImportanceLabel::from_importance(0.95),
            ImportanceLabel::HighlyRecommended
        );
        assert_eq!(
            ImportanceLabel::from_importance(0.9),
            ImportanceLabel::Recommended
        );
        assert_eq!(
            ImportanceLabel::from_importance(0.71),
            ImportanceLabel::Recommended
        );
        assert_eq!(
            ImportanceLabel::from_importance(0.7),
            ImportanceLabel::WorthReading
        );
        assert_eq!(
            ImportanceLabel::from_importance(0.0),
            ImportanceLabel::WorthReading
        );
    }

    #[test]
    fn test_rank_sorts_descending_and_is_stable() {
        let papers = vec![
            paper(1, &[1], Some(0.6)),
            paper(2, &[1], None), // 0.8 by default
            paper(3, &[1], Some(0.95)),
            paper(4, &[1], Some(0.8)),
        ];
        let ids: Vec<i32> = rank_for_user(&papers, &[1]).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("short", 100), "short");
        let long = "가".repeat(120);
        let cut = truncate_chars(&long, 100);
        assert_eq!(cut.chars().count(), 103);
        assert!(cut.ends_with("..."));
    }

    #[tokio::test]
    async fn test_scenario_only_matching_paper_is_labelled() {
        let papers = vec![paper(1, &[2], None), paper(2, &[3], Some(0.95))];
        let html = composer()
            .compose(&papers, &user(Language::En, &[1, 3]), Channel::Email)
            .await;
        assert!(html.contains("Paper number 2"));
        assert!(!html.contains("Paper number 1"));
        assert!(html.contains("Highly Recommended"));
        assert_eq!(html.matches("class=\"paper\"").count(), 1);
    }

    #[tokio::test]
    async fn test_email_lists_at_most_three_papers() {
        let papers: Vec<DigestPaper> = (1..=8).map(|i| paper(i, &[1], Some(0.5))).collect();
        let html = composer()
            .compose(&papers, &user(Language::En, &[1]), Channel::Email)
            .await;
        assert_eq!(html.matches("class=\"paper\"").count(), 3);
        assert!(html.contains("5 more papers"));
    }

    #[tokio::test]
    async fn test_chat_lists_at_most_two_papers() {
        let papers: Vec<DigestPaper> = (1..=5).map(|i| paper(i, &[1], Some(0.5))).collect();
        let text = composer()
            .compose(&papers, &user(Language::En, &[1]), Channel::Chat)
            .await;
        assert!(text.starts_with("📚 This week's top research updates:"));
        assert!(text.contains("1. Paper number 1"));
        assert!(text.contains("2. Paper number 2"));
        assert!(!text.contains("3. Paper number 3"));
        assert!(text.ends_with("View more research: http://localhost:3000/dashboard"));
    }

    #[tokio::test]
    async fn test_higher_importance_listed_first() {
        let papers = vec![paper(1, &[1], Some(0.6)), paper(2, &[1], Some(0.95))];
        let html = composer()
            .compose(&papers, &user(Language::En, &[1]), Channel::Email)
            .await;
        let first = html.find("Paper number 2").unwrap();
        let second = html.find("Paper number 1").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn test_no_matching_papers_message() {
        let papers = vec![paper(1, &[2], Some(0.9))];
        let html = composer()
            .compose(&papers, &user(Language::En, &[1]), Channel::Email)
            .await;
        assert!(html.contains("There are no new papers in your topics this week."));
        let text = composer()
            .compose(&papers, &user(Language::Ko, &[1]), Channel::Chat)
            .await;
        assert_eq!(text, "📚 이번 주에는 새로운 연구 논문이 없습니다.");
    }

    #[tokio::test]
    async fn test_korean_fields_are_translated_and_labels_localized() {
        let composer = composer_with(FnModel::new(|prompt| {
            let text = prompt.rsplit("\n\n").next().unwrap_or_default();
            Ok(format!("KO[{text}]"))
        }));
        let papers = vec![paper(1, &[1], Some(0.95))];
        let html = composer
            .compose(&papers, &user(Language::Ko, &[1]), Channel::Email)
            .await;
        assert!(html.contains("KO[Paper number 1]"));
        assert!(html.contains("KO[Summary of paper 1]"));
        assert!(html.contains("KO[Evaluation of paper 1]"));
        assert!(html.contains("저자"));
        assert!(html.contains("강력 추천"));
    }

    #[tokio::test]
    async fn test_channels_share_one_translation_pass() {
        let model = Arc::new(FnModel::new(|prompt| {
            let text = prompt.rsplit("\n\n").next().unwrap_or_default();
            Ok(format!("KO[{text}]"))
        }));
        let composer = ContentComposer::new(
            Translator::new(model.clone()),
            "http://localhost:3000/dashboard".into(),
        )
        .unwrap();
        let papers = vec![paper(1, &[1], Some(0.95))];

        let contents = composer
            .compose_channels(
                &papers,
                &user(Language::Ko, &[1]),
                &[Channel::Email, Channel::Chat],
            )
            .await;

        // title, summary, evaluation and category, once each
        assert_eq!(model.calls(), 4);
        assert_eq!(contents.len(), 2);
        assert!(contents[0].contains("KO[Paper number 1]"));
        assert!(contents[0].contains("KO[Evaluation of paper 1]"));
        assert!(contents[1].contains("1. KO[Paper number 1]"));
        assert!(contents[1].starts_with("📚"));
    }

    #[tokio::test]
    async fn test_chat_only_skips_detail_translation() {
        let model = Arc::new(FnModel::new(|_| Ok("번역".to_string())));
        let composer = ContentComposer::new(
            Translator::new(model.clone()),
            "http://localhost:3000/dashboard".into(),
        )
        .unwrap();
        let papers = vec![paper(1, &[1], Some(0.95)), paper(2, &[1], Some(0.5))];
        composer
            .compose(&papers, &user(Language::Ko, &[1]), Channel::Chat)
            .await;
        // two papers, title and summary each
        assert_eq!(model.calls(), 4);
    }

    #[tokio::test]
    async fn test_translation_failure_keeps_original_text() {
        let papers = vec![paper(1, &[1], Some(0.8))];
        let html = composer()
            .compose(&papers, &user(Language::Ko, &[1]), Channel::Email)
            .await;
        assert!(html.contains("Paper number 1"));
        assert!(html.contains("Summary of paper 1"));
    }

    #[tokio::test]
    async fn test_titles_are_html_escaped() {
        let mut p = paper(1, &[1], Some(0.8));
        p.title = "<script>alert(1)</script>".into();
        let html = composer()
            .compose(&[p], &user(Language::En, &[1]), Channel::Email)
            .await;
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn test_render_error_becomes_error_fragment() {
        let composer = ContentComposer::with_email_template(
            Translator::new(Arc::new(FnModel::new(|_| Err(LlmError::EmptyContent)))),
            "http://localhost:3000/dashboard".into(),
            "{% for paper in papers %}{{ paper.missing.deeper }}{% endfor %}",
        )
        .unwrap();
        let papers = vec![paper(1, &[1], Some(0.8))];
        let html = composer
            .compose(&papers, &user(Language::En, &[1]), Channel::Email)
            .await;
        assert!(html.contains("Content Generation Error"));
    }
}
