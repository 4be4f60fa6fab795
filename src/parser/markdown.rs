//! Markdown layer (headings, bullets, labels) and the heuristic
//! line-splitting fallback.

use crate::deck::SlideContent;
use crate::parser::lines::{Label, Line, LineKind, is_commentary, is_lead_in};
use crate::workflow::{Outline, OutlineSection};

fn heading_text(text: &str) -> String {
    text.trim_end_matches(':').trim().to_string()
}

/// Bullet and numbered items, wherever they appear.
pub fn points(lines: &[Line]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| match &line.kind {
            LineKind::Bullet { text, .. } if !text.is_empty() && !is_commentary(text) => {
                Some(text.clone())
            }
            _ => None,
        })
        .collect()
}

/// Every content-bearing line is a point. Headings, chatter and lead-ins are not.
pub fn heuristic_points(lines: &[Line]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| match &line.kind {
            LineKind::Bullet { text, .. } => Some(text.clone()),
            LineKind::Text(text) if !is_lead_in(text) => Some(text.clone()),
            LineKind::Label {
                label: Label::Body | Label::Points,
                text,
            } => Some(text.clone()),
            _ => None,
        })
        .filter(|text| !text.is_empty() && !is_commentary(text))
        .collect()
}

/// `# Title` or `Title: ...` for the deck; `##` headings, bold-only lines,
/// further `Title:` labels, or top-level items with indented children open
/// sections.
pub fn outline(lines: &[Line], fallback_title: Option<&str>) -> Option<Outline> {
    let mut title: Option<String> = None;
    let mut leading_text: Option<String> = None;
    let mut sections: Vec<OutlineSection> = Vec::new();
    let mut loose: Vec<String> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let before_content = sections.is_empty() && loose.is_empty();
        match &line.kind {
            LineKind::Heading { level: 1, text } if title.is_none() && before_content => {
                title = Some(heading_text(text));
            }
            LineKind::Label {
                label: Label::Title,
                text,
            } if !text.is_empty() => {
                if title.is_none() && before_content {
                    title = Some(heading_text(text));
                } else {
                    sections.push(OutlineSection::new(heading_text(text), Vec::new()));
                }
            }
            LineKind::Heading { text, .. } | LineKind::BoldHeading(text) => {
                if !text.is_empty() && !is_commentary(text) {
                    sections.push(OutlineSection::new(heading_text(text), Vec::new()));
                }
            }
            LineKind::Bullet { text, .. } => {
                let has_children = lines.get(index + 1).is_some_and(|next| {
                    next.indent > line.indent && matches!(next.kind, LineKind::Bullet { .. })
                });
                if line.indent == 0 && has_children {
                    sections.push(OutlineSection::new(heading_text(text), Vec::new()));
                } else if let Some(section) = sections.last_mut() {
                    section.points.push(text.clone());
                } else {
                    loose.push(text.clone());
                }
            }
            LineKind::Text(text) => {
                if before_content
                    && title.is_none()
                    && leading_text.is_none()
                    && !is_commentary(text)
                    && !is_lead_in(text)
                {
                    leading_text = Some(text.clone());
                }
            }
            LineKind::Label { .. } | LineKind::Rule => {}
        }
    }

    let title = title
        .or(leading_text)
        .or_else(|| fallback_title.map(str::to_string))?;

    if !loose.is_empty() {
        sections.insert(0, OutlineSection::new(title.clone(), loose));
    }

    let outline = Outline { title, sections };
    outline.validate().ok()?;
    Some(outline)
}

/// Last resort: one section holding every content line.
pub fn heuristic_outline(lines: &[Line], fallback_title: Option<&str>) -> Option<Outline> {
    let mut items: Vec<String> = lines
        .iter()
        .filter_map(|line| match &line.kind {
            LineKind::Heading { text, .. }
            | LineKind::BoldHeading(text)
            | LineKind::Bullet { text, .. }
            | LineKind::Label { text, .. } => Some(text.clone()),
            LineKind::Text(text) if !is_lead_in(text) => Some(text.clone()),
            _ => None,
        })
        .filter(|text| !text.is_empty() && !is_commentary(text))
        .collect();

    let title = match fallback_title {
        Some(title) => title.to_string(),
        None if items.len() > 1 => items.remove(0),
        None => return None,
    };
    if items.is_empty() {
        return None;
    }

    Some(Outline {
        sections: vec![OutlineSection::new(title.clone(), items)],
        title,
    })
}

/// Headings start slides; bullets fill them; `Notes:`/`Image:` labels and
/// remaining prose become notes and image prompts.
pub fn slides(lines: &[Line]) -> Vec<SlideContent> {
    let mut slides: Vec<SlideContent> = Vec::new();
    let mut in_notes = false;

    fn current(slides: &mut Vec<SlideContent>) -> &mut SlideContent {
        if slides.is_empty() {
            slides.push(SlideContent::default());
        }
        let last = slides.len() - 1;
        &mut slides[last]
    }

    fn append_notes(slide: &mut SlideContent, text: &str) {
        if text.is_empty() {
            return;
        }
        match &mut slide.notes {
            Some(notes) => {
                notes.push(' ');
                notes.push_str(text);
            }
            None => slide.notes = Some(text.to_string()),
        }
    }

    for line in lines {
        match &line.kind {
            LineKind::Heading { text, .. }
            | LineKind::BoldHeading(text)
            | LineKind::Label {
                label: Label::Title,
                text,
            } => {
                if text.is_empty() || is_commentary(text) {
                    continue;
                }
                in_notes = false;
                slides.push(SlideContent::new(heading_text(text), Vec::new()));
            }
            LineKind::Bullet { text, .. } => {
                if text.is_empty() || is_commentary(text) {
                    continue;
                }
                let slide = current(&mut slides);
                if in_notes {
                    append_notes(slide, text);
                } else {
                    slide.bullets.push(text.clone());
                }
            }
            LineKind::Label {
                label: Label::Notes,
                text,
            } => {
                in_notes = true;
                append_notes(current(&mut slides), text);
            }
            LineKind::Label {
                label: Label::Image,
                text,
            } => {
                if !text.is_empty() {
                    current(&mut slides).image_prompt = Some(text.clone());
                }
            }
            LineKind::Label {
                label: Label::Points,
                text,
            } => {
                in_notes = false;
                if !text.is_empty() {
                    current(&mut slides).bullets.push(text.clone());
                }
            }
            LineKind::Label {
                label: Label::Body,
                text,
            } => append_notes(current(&mut slides), text),
            LineKind::Text(text) => {
                if is_commentary(text) || is_lead_in(text) {
                    continue;
                }
                append_notes(current(&mut slides), text);
            }
            LineKind::Rule => {}
        }
    }

    slides.retain(|slide| !slide.heading.is_empty() || !slide.bullets.is_empty());
    slides
}
