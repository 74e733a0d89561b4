use std::sync::Arc;

use tracing::warn;

use crate::llm_client::prompts::{TRANSLATION_SYSTEM, TRANSLATION_TEMPERATURE};
use crate::llm_client::ChatModel;
use crate::models::user::Language;

/// Best-effort LLM translation. Never fails: on any error the original text is
/// returned and a warning is logged.
#[derive(Clone)]
pub struct Translator {
    model: Arc<dyn ChatModel>,
}

impl Translator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn translate(&self, text: &str, to: Language) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let prompt = format!(
            "Translate the following text into {}:\n\n{}",
            to.display_name(),
            text
        );

        match self
            .model
            .complete(TRANSLATION_SYSTEM, &prompt, TRANSLATION_TEMPERATURE)
            .await
        {
            Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
            Ok(_) => {
                warn!(target_lang = %to, "translation came back empty, keeping original text");
                text.to_string()
            }
            Err(e) => {
                warn!(target_lang = %to, error = %e, "translation failed, keeping original text");
                text.to_string()
            }
        }
    }
}
