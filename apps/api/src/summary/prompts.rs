/// Builds the analysis prompt for one paper abstract.
pub fn build_summary_prompt(abstract_text: &str) -> String {
    format!(
        r#"Please analyze the following research paper:

{abstract_text}

- Paper summary (one line):
- Key topics:
- Important keywords (3-5):
- Classification category (e.g., Computer Vision, NLP):
- AI evaluation (may include subjective interpretation):
- Importance score (0-1 floating point):

Organize the results in the following JSON format:

{{
  "summary": "...",
  "evaluation": "...",
  "importance": 0.xx,
  "keywords": ["...", "...", "..."],
  "category": "..."
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_abstract_and_schema() {
        let prompt = build_summary_prompt("We study graphs.");
        assert!(prompt.contains("We study graphs."));
        assert!(prompt.contains("\"importance\": 0.xx"));
        assert!(!prompt.contains("{{"));
    }
}
