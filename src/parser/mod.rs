//! Response parser: turns free-form model text into typed structures.
//!
//! Model output is treated as an untrusted wire format and parsed in layers,
//! each independently testable:
//!
//! 1. [`json`]: a JSON document anywhere in the reply (bare, fenced, or
//!    embedded in prose).
//! 2. [`markdown`]: headings, bullets, numbered items and `Label:` lines.
//! 3. Heuristic: every remaining content line is an item.
//!
//! The first layer that yields at least one item wins. Preambles such as
//! "Here are the points:" and sign-offs are dropped at every layer.

pub mod json;
pub mod lines;
pub mod markdown;

use crate::deck::SlideContent;
use crate::llm::{ModelResponse, Provider, ResponseStatus};
use crate::workflow::{BrainstormCandidate, Outline};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("{provider} returned no usable text (status {status:?})")]
    UnusableResponse {
        provider: Provider,
        status: ResponseStatus,
    },
    #[error("Response text was empty")]
    Empty,
    #[error("No {0} could be extracted from the response")]
    NoStructure(&'static str),
}

fn usable_text(response: &ModelResponse) -> Result<&str, ParseError> {
    if !response.is_ok() {
        return Err(ParseError::UnusableResponse {
            provider: response.provider,
            status: response.status,
        });
    }
    let text = response.raw_text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(text)
}

pub fn parse_brainstorm(response: &ModelResponse) -> Result<BrainstormCandidate, ParseError> {
    let points = parse_points_text(usable_text(response)?)?;
    debug!(provider = %response.provider, points = points.len(), "Parsed brainstorm");
    Ok(BrainstormCandidate {
        provider: response.provider,
        points,
    })
}

/// Ordered list of points from arbitrary text.
pub fn parse_points_text(text: &str) -> Result<Vec<String>, ParseError> {
    if let Some(value) = json::extract(text) {
        let points = json::points(&value);
        if !points.is_empty() {
            debug!(layer = "json", "Extracted {} points", points.len());
            return Ok(points);
        }
    }

    let lines = lines::classify(text);
    let points = markdown::points(&lines);
    if !points.is_empty() {
        debug!(layer = "markdown", "Extracted {} points", points.len());
        return Ok(points);
    }

    let points = markdown::heuristic_points(&lines);
    if !points.is_empty() {
        debug!(layer = "heuristic", "Extracted {} points", points.len());
        return Ok(points);
    }

    Err(ParseError::NoStructure("points"))
}

pub fn parse_outline(response: &ModelResponse) -> Result<Outline, ParseError> {
    parse_outline_text(usable_text(response)?, None)
}

/// Parse an outline, using `fallback_title` when the text names none.
pub fn parse_outline_text(text: &str, fallback_title: Option<&str>) -> Result<Outline, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(value) = json::extract(text)
        && let Some(outline) = json::outline(&value, fallback_title)
    {
        debug!(layer = "json", sections = outline.sections.len(), "Parsed outline");
        return Ok(outline);
    }

    let lines = lines::classify(text);
    if let Some(outline) = markdown::outline(&lines, fallback_title) {
        debug!(layer = "markdown", sections = outline.sections.len(), "Parsed outline");
        return Ok(outline);
    }

    if let Some(outline) = markdown::heuristic_outline(&lines, fallback_title) {
        debug!(layer = "heuristic", "Parsed outline");
        return Ok(outline);
    }

    Err(ParseError::NoStructure("outline"))
}

pub fn parse_slide_content(response: &ModelResponse) -> Result<Vec<SlideContent>, ParseError> {
    parse_slides_text(usable_text(response)?)
}

/// Slides from arbitrary text. Headings may be empty when the model gave none.
pub fn parse_slides_text(text: &str) -> Result<Vec<SlideContent>, ParseError> {
    if let Some(value) = json::extract(text) {
        let slides = json::slides(&value);
        if !slides.is_empty() {
            debug!(layer = "json", slides = slides.len(), "Parsed slide content");
            return Ok(slides);
        }
    }

    let lines = lines::classify(text);
    let slides = markdown::slides(&lines);
    if !slides.is_empty() {
        debug!(layer = "markdown", slides = slides.len(), "Parsed slide content");
        return Ok(slides);
    }

    let bullets = markdown::heuristic_points(&lines);
    if !bullets.is_empty() {
        debug!(layer = "heuristic", bullets = bullets.len(), "Parsed slide content");
        return Ok(vec![SlideContent::new(String::new(), bullets)]);
    }

    Err(ParseError::NoStructure("slide content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, ModelRequest, TokenUsage};
    use std::time::Duration;

    fn response(provider: Provider, text: &str) -> ModelResponse {
        let request = ModelRequest::text(provider, "prompt");
        ModelResponse::ok(
            &request,
            Completion {
                text: text.to_string(),
                model_used: "test".into(),
                token_usage: TokenUsage::default(),
            },
            Duration::from_millis(1),
            1,
        )
    }

    #[test]
    fn test_brainstorm_strips_preamble_and_markers() {
        let text = "Here are the points:\n1. Memory safety\n2) Zero-cost abstractions\n* Fearless concurrency\n\nLet me know if you want more!";
        let candidate = parse_brainstorm(&response(Provider::Claude37, text)).unwrap();
        assert_eq!(candidate.provider, Provider::Claude37);
        assert_eq!(
            candidate.points,
            vec!["Memory safety", "Zero-cost abstractions", "Fearless concurrency"]
        );
    }

    #[test]
    fn test_brainstorm_prose_falls_back_to_lines() {
        let text = "Sure!\nRust prevents data races at compile time\nCargo makes builds reproducible";
        let candidate = parse_brainstorm(&response(Provider::Gpt4, text)).unwrap();
        assert_eq!(candidate.points.len(), 2);
    }

    #[test]
    fn test_brainstorm_json_wins() {
        let text = "```json\n{\"ideas\": [\"Fast\", \"Safe\"]}\n```";
        let candidate = parse_brainstorm(&response(Provider::Gpt4, text)).unwrap();
        assert_eq!(candidate.points, vec!["Fast", "Safe"]);
    }

    #[test]
    fn test_failed_response_is_parse_error() {
        let request = ModelRequest::text(Provider::Gpt4, "prompt");
        let failed = ModelResponse::failed(
            &request,
            ResponseStatus::Timeout,
            "timed out",
            Duration::from_secs(1),
            3,
        );
        assert!(matches!(
            parse_brainstorm(&failed),
            Err(ParseError::UnusableResponse {
                status: ResponseStatus::Timeout,
                ..
            })
        ));
    }

    #[test]
    fn test_commentary_only_is_no_structure() {
        let text = "Sure! Let me know if you need anything else.";
        assert_eq!(
            parse_brainstorm(&response(Provider::Gpt4, text)),
            Err(ParseError::NoStructure("points"))
        );
        assert_eq!(
            parse_brainstorm(&response(Provider::Gpt4, "   ")),
            Err(ParseError::Empty)
        );
    }

    #[test]
    fn test_outline_from_markdown_response() {
        let text = "Certainly! Here's an outline:\n\n# Intro to Rust\n## Why Rust\n- Fast\n- Safe\n## Getting Started\n- rustup\n";
        let outline = parse_outline(&response(Provider::Claude37, text)).unwrap();
        assert_eq!(outline.title, "Intro to Rust");
        assert_eq!(outline.sections.len(), 2);
    }

    #[test]
    fn test_slide_content_heuristic() {
        let slides =
            parse_slide_content(&response(Provider::Claude37, "Rust is fast.\nRust is safe.")).unwrap();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].bullets, vec!["Rust is fast.", "Rust is safe."]);
    }
}
