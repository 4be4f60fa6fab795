use crate::deck::types::{FormatOptions, SlideContent};
use regex::Regex;
use std::sync::LazyLock;

static KEY_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:*]{1,40}?)\s*:\s+(\S.*)$").expect("key term pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

const MAX_KEY_TERM_WORDS: usize = 5;

fn normalize(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Format one bullet. Pure and deterministic.
pub fn format_bullet(text: &str, options: &FormatOptions) -> String {
    let mut bullet = normalize(text);
    if bullet.is_empty() {
        return bullet;
    }

    if options.ensure_terminal_punctuation
        && !bullet.ends_with(['.', '!', '?', '…', ':', ';'])
    {
        bullet.push('.');
    }

    if options.bold_key_terms
        && !bullet.contains("**")
        && let Some(caps) = KEY_TERM.captures(&bullet)
    {
        let term = caps.get(1).map_or("", |m| m.as_str()).trim();
        let rest = caps.get(2).map_or("", |m| m.as_str());
        let words = term.split_whitespace().count();
        if words > 0 && words <= MAX_KEY_TERM_WORDS && !term.contains("//") {
            bullet = format!("**{}**: {}", term, rest);
        }
    }

    bullet
}

pub fn format_heading(text: &str) -> String {
    normalize(text)
        .trim_end_matches(['.', ':'])
        .trim()
        .to_string()
}

/// Apply the template's text rules to a whole slide.
pub fn format_content(content: &SlideContent, options: &FormatOptions) -> SlideContent {
    SlideContent {
        heading: format_heading(&content.heading),
        bullets: content
            .bullets
            .iter()
            .map(|bullet| format_bullet(bullet, options))
            .filter(|bullet| !bullet.is_empty())
            .collect(),
        notes: content
            .notes
            .as_deref()
            .map(normalize)
            .filter(|notes| !notes.is_empty()),
        image_prompt: content
            .image_prompt
            .as_deref()
            .map(normalize)
            .filter(|prompt| !prompt.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> FormatOptions {
        FormatOptions {
            bold_key_terms: false,
            ensure_terminal_punctuation: false,
            highlight_color: None,
        }
    }

    #[test]
    fn test_key_terms_are_bolded() {
        let options = FormatOptions::default();
        assert_eq!(
            format_bullet("Ownership: memory is freed deterministically", &options),
            "**Ownership**: memory is freed deterministically."
        );
        assert_eq!(
            format_bullet("Zero cost abstractions: you pay for what you use.", &options),
            "**Zero cost abstractions**: you pay for what you use."
        );
    }

    #[test]
    fn test_long_prefix_is_not_a_key_term() {
        let options = FormatOptions::default();
        let bullet = "The thing that most people forget about Rust is this: it is fun";
        assert!(!format_bullet(bullet, &options).starts_with("**"));
        assert!(!format_bullet("See https://rust-lang.org", &options).starts_with("**"));
    }

    #[test]
    fn test_terminal_punctuation() {
        let options = FormatOptions::default();
        assert_eq!(format_bullet("Fast", &options), "Fast.");
        assert_eq!(format_bullet("Fast!", &options), "Fast!");
        assert_eq!(format_bullet("Fast", &plain()), "Fast");
    }

    #[test]
    fn test_whitespace_and_heading_cleanup() {
        assert_eq!(format_bullet("  Fast   and  safe ", &plain()), "Fast and safe");
        assert_eq!(format_heading(" Why  Rust: "), "Why Rust");
    }

    #[test]
    fn test_format_content_drops_empty_bullets() {
        let content = SlideContent {
            heading: "Why Rust".into(),
            bullets: vec!["Fast".into(), "   ".into()],
            notes: Some("  ".into()),
            image_prompt: None,
        };
        let formatted = format_content(&content, &FormatOptions::default());
        assert_eq!(formatted.bullets, vec!["Fast."]);
        assert!(formatted.notes.is_none());
    }
}
