//! Line-level normalization shared by every parser layer.

use regex::Regex;
use std::sync::LazyLock;

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•+–—▪‣]|\d{1,3}[.)]|\(\d{1,3}\)|[a-zA-Z][.)])\s+(.*)$")
        .expect("bullet pattern is valid")
});

static NUMBERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{1,3}[.)]|\(\d{1,3}\))\s+").expect("numbered pattern is valid"));

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s*(.*?)\s*#*$").expect("heading pattern is valid"));

static BOLD_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\*\*([^*]+?)\*\*|__([^_]+?)__)\s*:?$").expect("bold pattern is valid")
});

static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(speaker\s+notes?|notes?|image\s+prompt|image|slide\s+title|title|body|content|key\s+points|points|bullets)\s*:\s*(.*)$",
    )
    .expect("label pattern is valid")
});

static SLIDE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^slide\s+\d+\s*(?:[:.\-–—]\s*(.*))?$").expect("slide pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Openers and sign-offs models wrap around the actual content.
const COMMENTARY_PREFIXES: &[&str] = &[
    "here are",
    "here is",
    "here's",
    "sure",
    "certainly",
    "of course",
    "absolutely",
    "great question",
    "below are",
    "below is",
    "the following",
    "let me know",
    "i hope this helps",
    "hope this helps",
    "feel free",
    "happy to help",
    "i'd be happy",
    "i would be happy",
    "i'm happy to",
];

/// What a single trimmed line looks like structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Heading { level: usize, text: String },
    /// `**Heading**` on a line of its own.
    BoldHeading(String),
    Bullet { numbered: bool, text: String },
    Label { label: Label, text: String },
    Text(String),
    /// Horizontal rules and other decoration.
    Rule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Notes,
    Image,
    Title,
    Body,
    Points,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub indent: usize,
    pub kind: LineKind,
}

/// Classify every non-blank line of `text`, dropping fenced code markers.
pub fn classify(text: &str) -> Vec<Line> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with("```"))
        .map(|line| {
            let indent = line
                .chars()
                .take_while(|c| c.is_whitespace())
                .map(|c| if c == '\t' { 4 } else { 1 })
                .sum();
            Line {
                indent,
                kind: classify_line(line.trim()),
            }
        })
        .collect()
}

fn classify_line(line: &str) -> LineKind {
    if line.chars().all(|c| matches!(c, '-' | '*' | '_' | '=' | ' ')) {
        return LineKind::Rule;
    }

    if let Some(caps) = HEADING.captures(line) {
        let level = caps.get(1).map_or(1, |m| m.as_str().len());
        let text = caps.get(2).map_or("", |m| m.as_str());
        return LineKind::Heading {
            level,
            text: clean_point(text),
        };
    }

    if let Some(caps) = BOLD_ONLY.captures(line) {
        let text = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        return LineKind::BoldHeading(clean_point(text));
    }

    if let Some(caps) = BULLET.captures(line) {
        let text = caps.get(1).map_or("", |m| m.as_str());
        return LineKind::Bullet {
            numbered: NUMBERED.is_match(line),
            text: clean_point(text),
        };
    }

    let unbolded = strip_emphasis(line);
    if let Some(caps) = SLIDE_NUMBER.captures(&unbolded) {
        let text = caps.get(1).map_or("", |m| m.as_str());
        return LineKind::Heading {
            level: 2,
            text: clean_point(text),
        };
    }

    if let Some(caps) = LABEL.captures(&unbolded) {
        let name = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
        let text = clean_point(caps.get(2).map_or("", |m| m.as_str()));
        let label = if name.starts_with("speaker") || name.starts_with("note") {
            Label::Notes
        } else if name.starts_with("image") {
            Label::Image
        } else if name.contains("title") {
            Label::Title
        } else if name == "body" || name == "content" {
            Label::Body
        } else {
            Label::Points
        };
        return LineKind::Label { label, text };
    }

    LineKind::Text(clean_point(line))
}

/// Remove emphasis markers, surrounding quotes and redundant whitespace.
pub fn clean_point(text: &str) -> String {
    let unbolded = strip_emphasis(text);
    let collapsed = WHITESPACE.replace_all(unbolded.trim(), " ");
    collapsed
        .trim_matches(|c: char| c == '"' || c == '“' || c == '”')
        .trim()
        .to_string()
}

fn strip_emphasis(text: &str) -> String {
    text.replace("**", "").replace("__", "")
}

/// Model chatter that is never content.
pub fn is_commentary(text: &str) -> bool {
    let lower = text
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    COMMENTARY_PREFIXES.iter().any(|prefix| {
        lower.starts_with(prefix)
            && lower[prefix.len()..]
                .chars()
                .next()
                .is_none_or(|c| !c.is_alphanumeric())
    })
}

/// A prose line that only introduces what follows ("Key ideas:").
pub fn is_lead_in(text: &str) -> bool {
    text.trim_end().ends_with(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(line: &str) -> LineKind {
        classify_line(line)
    }

    #[test]
    fn test_bullet_markers() {
        for line in ["- Fast", "* Fast", "• Fast", "+ Fast", "1. Fast", "2) Fast", "(3) Fast"] {
            match kind(line) {
                LineKind::Bullet { text, .. } => assert_eq!(text, "Fast", "line: {line}"),
                other => panic!("{line} classified as {other:?}"),
            }
        }
        assert!(matches!(kind("1. Fast"), LineKind::Bullet { numbered: true, .. }));
        assert!(matches!(kind("- Fast"), LineKind::Bullet { numbered: false, .. }));
    }

    #[test]
    fn test_bold_is_not_a_bullet() {
        assert_eq!(kind("**Performance**"), LineKind::BoldHeading("Performance".into()));
        assert_eq!(
            kind("**Speed** matters a lot"),
            LineKind::Text("Speed matters a lot".into())
        );
        assert_eq!(
            kind("- **Ownership**: no GC"),
            LineKind::Bullet {
                numbered: false,
                text: "Ownership: no GC".into()
            }
        );
    }

    #[test]
    fn test_headings_and_labels() {
        assert_eq!(
            kind("## Why Rust ##"),
            LineKind::Heading {
                level: 2,
                text: "Why Rust".into()
            }
        );
        assert_eq!(
            kind("Slide 3: Tooling"),
            LineKind::Heading {
                level: 2,
                text: "Tooling".into()
            }
        );
        assert_eq!(
            kind("**Speaker notes:** mention cargo"),
            LineKind::Label {
                label: Label::Notes,
                text: "mention cargo".into()
            }
        );
        assert_eq!(
            kind("Image prompt: a crab"),
            LineKind::Label {
                label: Label::Image,
                text: "a crab".into()
            }
        );
        assert!(matches!(kind("Title: Intro"), LineKind::Label { label: Label::Title, .. }));
        assert_eq!(kind("---"), LineKind::Rule);
    }

    #[test]
    fn test_commentary_detection() {
        assert!(is_commentary("Here are the points:"));
        assert!(is_commentary("Sure! Here you go"));
        assert!(is_commentary("Let me know if you need more."));
        assert!(is_commentary("I hope this helps!"));
        assert!(!is_commentary("Surely safe concurrency"));
        assert!(!is_commentary("Memory safety without GC"));
    }

    #[test]
    fn test_clean_point() {
        assert_eq!(clean_point("  \"Zero   cost\"  "), "Zero cost");
        assert_eq!(clean_point("__Fearless__ concurrency"), "Fearless concurrency");
    }

    #[test]
    fn test_classify_tracks_indent_and_skips_fences() {
        let lines = classify("```markdown\n1. Intro\n   - Why\n\n```");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].indent, 0);
        assert_eq!(lines[1].indent, 3);
    }
}
