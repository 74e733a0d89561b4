//! The one boundary where untrusted LLM text becomes an `AiSummary`.
//!
//! Callers get either a validated record or a `MalformedSummary`; no other
//! module repairs or inspects raw model output.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::llm_client::strip_json_fences;
use crate::models::paper::AiSummary;

#[derive(Debug, Error, PartialEq)]
pub enum MalformedSummary {
    #[error("LLM output is empty")]
    Empty,

    #[error("LLM output is not valid JSON: {0}")]
    Json(String),

    #[error("LLM output is not a JSON object")]
    NotAnObject,

    #[error("field '{0}' has the wrong type")]
    FieldType(&'static str),

    #[error("'summary' is missing or empty")]
    MissingSummary,

    #[error("importance '{0}' is not a finite number")]
    BadImportance(String),
}

/// Parses a model reply into a validated summary.
///
/// Steps: strip code fences, double stray backslashes, parse, then check
/// field types. `importance` may be a number or a numeric string and is
/// clamped to `[0, 1]`; `keywords` may be an array or a comma-separated string.
pub fn parse_ai_summary(text: &str) -> Result<AiSummary, MalformedSummary> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(MalformedSummary::Empty);
    }

    let repaired = repair_escapes(text);
    let value: Value =
        serde_json::from_str(&repaired).map_err(|e| MalformedSummary::Json(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(MalformedSummary::NotAnObject);
    };

    let summary = string_field(&fields, "summary")?.unwrap_or_default();
    if summary.is_empty() {
        return Err(MalformedSummary::MissingSummary);
    }

    Ok(AiSummary {
        summary,
        evaluation: string_field(&fields, "evaluation")?.unwrap_or_default(),
        importance: importance_field(&fields)?,
        keywords: keywords_field(&fields)?,
        category: string_field(&fields, "category")?.unwrap_or_default(),
    })
}

/// Doubles every backslash that does not begin a valid JSON escape
/// (`\" \\ \/ \b \f \n \r \t \uXXXX`). Valid escape pairs are consumed whole,
/// so an escaped backslash followed by a letter is left alone.
pub fn repair_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.peek().copied() {
            Some(next @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't')) => {
                chars.next();
                out.push('\\');
                out.push(next);
            }
            Some('u') if is_unicode_escape(chars.clone()) => out.push('\\'),
            _ => out.push_str("\\\\"),
        }
    }

    out
}

/// `chars` is positioned on the `u` of a candidate `\uXXXX`.
fn is_unicode_escape(chars: impl Iterator<Item = char>) -> bool {
    let hex: Vec<char> = chars.skip(1).take(4).collect();
    hex.len() == 4 && hex.iter().all(|c| c.is_ascii_hexdigit())
}

fn string_field(
    fields: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<String>, MalformedSummary> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(MalformedSummary::FieldType(name)),
    }
}

fn importance_field(fields: &Map<String, Value>) -> Result<Option<f64>, MalformedSummary> {
    let score = match fields.get("importance") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(other) => return Err(MalformedSummary::BadImportance(other.to_string())),
    };

    match score {
        Some(score) if score.is_finite() => Ok(Some(score.clamp(0.0, 1.0))),
        _ => Err(MalformedSummary::BadImportance(
            fields
                .get("importance")
                .map(Value::to_string)
                .unwrap_or_default(),
        )),
    }
}

fn keywords_field(fields: &Map<String, Value>) -> Result<Vec<String>, MalformedSummary> {
    match fields.get("keywords") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                _ => Err(MalformedSummary::FieldType("keywords")),
            })
            .collect(),
        Some(_) => Err(MalformedSummary::FieldType("keywords")),
    }
}
