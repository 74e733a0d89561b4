// Shared prompt constants.
// Services that need task-specific prompts define their own prompts.rs alongside them.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are an expert research paper summarizer. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// System prompt for field translation. The model must echo only the translation.
pub const TRANSLATION_SYSTEM: &str = "You are a professional translator for academic text. \
    Translate the user's text faithfully and keep technical terms accurate. \
    Respond with the translation only: no quotes, no notes, no explanations.";

/// Temperature for structured paper analysis.
pub const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Temperature for translation; kept low so repeated runs agree.
pub const TRANSLATION_TEMPERATURE: f32 = 0.1;
