//! Tolerant parsing of collaborator responses.
//!
//! Models tend to wrap their JSON in prose or code fences; the parsers here
//! extract the first JSON object from the raw text and fill optional fields
//! with defaults rather than failing.

use serde::Deserialize;

use crate::error::GenerationError;

/// A generated Socratic question.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub follow_up: Option<String>,
}

/// A generated context-aware hint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedHint {
    pub hint: String,
}

/// A generated end-of-concept summary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedSummary {
    pub summary: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

fn extract_json(text: &str) -> Result<&str, GenerationError> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Ok(trimmed);
    }
    let start = trimmed
        .find('{')
        .ok_or_else(|| GenerationError::Parse("no JSON object in response".into()))?;
    let end = trimmed
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| GenerationError::Parse("unterminated JSON object in response".into()))?;
    Ok(&trimmed[start..=end])
}

fn parse<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, GenerationError> {
    let json = extract_json(text)?;
    serde_json::from_str(json).map_err(|e| GenerationError::Parse(e.to_string()))
}

/// Parse a question payload.
///
/// # Errors
///
/// Returns `GenerationError::Parse` when no usable question is present.
pub fn parse_question(text: &str) -> Result<GeneratedQuestion, GenerationError> {
    let parsed: GeneratedQuestion = parse(text)?;
    if parsed.question.trim().is_empty() {
        return Err(GenerationError::Parse("empty question field".into()));
    }
    Ok(parsed)
}

/// Parse a hint payload.
///
/// # Errors
///
/// Returns `GenerationError::Parse` when no usable hint is present.
pub fn parse_hint(text: &str) -> Result<GeneratedHint, GenerationError> {
    let parsed: GeneratedHint = parse(text)?;
    if parsed.hint.trim().is_empty() {
        return Err(GenerationError::Parse("empty hint field".into()));
    }
    Ok(parsed)
}

/// Parse a summary payload.
///
/// # Errors
///
/// Returns `GenerationError::Parse` when no usable summary is present.
pub fn parse_summary(text: &str) -> Result<GeneratedSummary, GenerationError> {
    let parsed: GeneratedSummary = parse(text)?;
    if parsed.summary.trim().is_empty() {
        return Err(GenerationError::Parse("empty summary field".into()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let parsed = parse_question(r#"{"question": "Why is the sky blue?"}"#).unwrap();
        assert_eq!(parsed.question, "Why is the sky blue?");
        assert_eq!(parsed.hint, None);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let raw = "Sure! Here is the question:\n```json\n{\"question\": \"What drives the water cycle?\", \"hint\": \"Follow the energy.\"}\n```\nHope that helps.";
        let parsed = parse_question(raw).unwrap();
        assert_eq!(parsed.question, "What drives the water cycle?");
        assert_eq!(parsed.hint.as_deref(), Some("Follow the energy."));
    }

    #[test]
    fn rejects_missing_or_empty_question() {
        assert!(parse_question(r#"{"hint": "no question here"}"#).is_err());
        assert!(parse_question(r#"{"question": "   "}"#).is_err());
        assert!(parse_question("plain prose with no json").is_err());
    }

    #[test]
    fn parses_summary_with_default_focus_areas() {
        let parsed = parse_summary(r#"{"summary": "Good session."}"#).unwrap();
        assert_eq!(parsed.summary, "Good session.");
        assert!(parsed.focus_areas.is_empty());

        let with_areas = parse_summary(
            r#"{"summary": "Solid work.", "focus_areas": ["chlorophyll", "energy transfer"]}"#,
        )
        .unwrap();
        assert_eq!(with_areas.focus_areas.len(), 2);
    }

    #[test]
    fn parses_hint_payload() {
        let parsed = parse_hint(r#"{"hint": "Think smaller."}"#).unwrap();
        assert_eq!(parsed.hint, "Think smaller.");
        assert!(parse_hint(r#"{"hint": ""}"#).is_err());
    }
}
