//! Strict layer: structured JSON embedded anywhere in the reply.

use crate::deck::SlideContent;
use crate::parser::lines::clean_point;
use crate::workflow::{Outline, OutlineSection};
use serde_json::{Map, Value};

const POINT_KEYS: &[&str] = &["points", "ideas", "bullets", "items", "key_points"];
const HEADING_KEYS: &[&str] = &["heading", "title", "name", "section"];
const TEXT_KEYS: &[&str] = &["point", "text", "idea", "title", "content"];

/// Find a JSON document in `text`: the whole reply, a fenced block, or the
/// outermost `{...}` / `[...]` span.
pub fn extract(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return structured(value);
    }

    if let Some(fenced) = fenced_block(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(fenced)
    {
        return structured(value);
    }

    // Try the span that opens first, so an array of objects is not mistaken
    // for its first element.
    let mut spans: Vec<(usize, usize)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| Some((trimmed.find(open)?, trimmed.rfind(close)?)))
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort_unstable();

    spans.into_iter().find_map(|(start, end)| {
        serde_json::from_str::<Value>(&trimmed[start..=end])
            .ok()
            .and_then(structured)
    })
}

/// Bare strings and numbers are not structure.
fn structured(value: Value) -> Option<Value> {
    matches!(value, Value::Object(_) | Value::Array(_)).then_some(value)
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn first_key<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_key(object, keys)
        .and_then(Value::as_str)
        .map(clean_point)
        .filter(|s| !s.is_empty())
}

/// Strings, or objects carrying a text field, or `{"term": ..., "explanation": ...}`.
fn point_list(value: &Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(clean_point(s)),
            Value::Object(object) => {
                if let (Some(term), Some(explanation)) = (
                    string_field(object, &["term", "key_point", "key"]),
                    string_field(object, &["explanation", "description", "detail"]),
                ) {
                    Some(format!("{}: {}", term, explanation))
                } else {
                    string_field(object, TEXT_KEYS)
                }
            }
            _ => None,
        })
        .filter(|point| !point.is_empty())
        .collect()
}

pub fn points(value: &Value) -> Vec<String> {
    match value {
        Value::Array(_) => point_list(value),
        Value::Object(object) => first_key(object, POINT_KEYS)
            .map(point_list)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// `{"title", "sections": [...]}`, `{"title", "slides": [...]}` or a bare
/// array of sections whose first entry may be the title slide.
pub fn outline(value: &Value, fallback_title: Option<&str>) -> Option<Outline> {
    let (title, entries) = match value {
        Value::Object(object) => (
            string_field(object, &["title", "deck_title", "presentation_title"]),
            first_key(object, &["sections", "slides", "outline"])?.as_array()?,
        ),
        Value::Array(entries) => (None, entries),
        _ => return None,
    };

    let mut sections: Vec<OutlineSection> = entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let heading = string_field(entry, HEADING_KEYS)?;
            let points = first_key(entry, POINT_KEYS)
                .map(point_list)
                .unwrap_or_default();
            Some(OutlineSection::new(heading, points))
        })
        .collect();

    let title = match title {
        Some(title) => title,
        None if sections.len() > 1 && sections[0].points.is_empty() => sections.remove(0).heading,
        None => fallback_title.map(str::to_string)?,
    };

    let outline = Outline { title, sections };
    outline.validate().ok()?;
    Some(outline)
}

pub fn slides(value: &Value) -> Vec<SlideContent> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(object) => match first_key(object, &["slides", "sections"]).and_then(Value::as_array) {
            Some(entries) => entries,
            None => return single_slide(object).into_iter().collect(),
        },
        _ => return Vec::new(),
    };

    entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(single_slide)
        .collect()
}

fn single_slide(object: &Map<String, Value>) -> Option<SlideContent> {
    let heading = string_field(object, HEADING_KEYS).unwrap_or_default();
    let bullets = first_key(object, POINT_KEYS)
        .map(point_list)
        .unwrap_or_default();
    let notes = string_field(object, &["notes", "speaker_notes", "body", "content"]);
    let image_prompt = string_field(object, &["image_prompt", "image", "visual"]);

    if heading.is_empty() && bullets.is_empty() {
        return None;
    }
    Some(SlideContent {
        heading,
        bullets,
        notes,
        image_prompt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_fenced_block_with_preamble() {
        let text = "Here are the ideas:\n```json\n{\"points\": [\"Fast\", \"Safe\"]}\n```\nEnjoy!";
        let value = extract(text).unwrap();
        assert_eq!(points(&value), vec!["Fast", "Safe"]);
    }

    #[test]
    fn test_extract_embedded_array() {
        let value = extract("Sure: [\"Fast\", {\"text\": \"Safe\"}] hope it helps").unwrap();
        assert_eq!(points(&value), vec!["Fast", "Safe"]);
    }

    #[test]
    fn test_extract_rejects_scalars_and_prose() {
        assert!(extract("42").is_none());
        assert!(extract("- Fast\n- Safe").is_none());
    }

    #[test]
    fn test_term_explanation_objects() {
        let value: Value = serde_json::json!([
            {"term": "Ownership", "explanation": "Memory without GC."}
        ]);
        assert_eq!(points(&value), vec!["Ownership: Memory without GC."]);
    }

    #[test]
    fn test_outline_object() {
        let value = serde_json::json!({
            "title": "Intro to Rust",
            "sections": [
                {"heading": "Why Rust", "points": ["Fast", "Safe"]},
                {"title": "Tooling", "bullets": ["Cargo"]}
            ]
        });
        let outline = outline(&value, None).unwrap();
        assert_eq!(outline.title, "Intro to Rust");
        assert_eq!(outline.sections.len(), 2);
        assert_eq!(outline.sections[1].points, vec!["Cargo"]);
    }

    #[test]
    fn test_outline_array_uses_title_slide() {
        let value = serde_json::json!([
            {"title": "Intro to Rust"},
            {"title": "Why Rust", "points": ["Fast"]}
        ]);
        let outline = outline(&value, None).unwrap();
        assert_eq!(outline.title, "Intro to Rust");
        assert_eq!(outline.sections.len(), 1);
    }

    #[test]
    fn test_outline_without_title_needs_fallback() {
        let value = serde_json::json!([{"title": "Why Rust", "points": ["Fast"]}]);
        assert!(outline(&value, None).is_none());
        assert_eq!(outline(&value, Some("Rust")).unwrap().title, "Rust");
    }

    #[test]
    fn test_slides_with_notes_and_image() {
        let value = serde_json::json!({"slides": [{
            "title": "Why Rust",
            "points": ["Fast", "Safe"],
            "speaker_notes": "Pause here",
            "image_prompt": "a crab"
        }]});
        let slides = slides(&value);
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].notes.as_deref(), Some("Pause here"));
        assert_eq!(slides[0].image_prompt.as_deref(), Some("a crab"));
    }
}
