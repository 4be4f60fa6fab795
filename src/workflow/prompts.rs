//! Prompt builders for each stage. Replies are parsed by [`crate::parser`],
//! so every prompt asks for plain markdown lists the parser's markdown layer
//! reads directly.

use crate::deck::Template;
use crate::workflow::types::{Idea, Outline, OutlineSection};
use std::fmt::Write;

pub const BRAINSTORM_SYSTEM: &str =
    "You are a concise thought partner for brainstorming presentation content. Keep replies focused.";

pub const OUTLINE_SYSTEM: &str =
    "You structure raw ideas into clear presentation outlines.";

pub const SLIDES_SYSTEM: &str =
    "You write slide content: short headings, crisp bullets, optional speaker notes.";

/// Number of points shown to the image model.
const THUMBNAIL_POINTS: usize = 5;
const BULLET_WORDS: usize = 12;

fn idea_block(idea: &Idea) -> String {
    let mut block = format!("Topic: {}\n", idea.topic.trim());
    if let Some(audience) = &idea.audience {
        let _ = writeln!(block, "Audience: {}", audience.trim());
    }
    if let Some(constraints) = &idea.constraints {
        let _ = writeln!(block, "Constraints: {}", constraints.trim());
    }
    block
}

pub fn brainstorm(idea: &Idea) -> String {
    let mut prompt = idea_block(idea);
    prompt.push_str(
        "\nBrainstorm the key points a presentation on this topic should cover.\n\
         Reply with a markdown bullet list, one point per line, no preamble.",
    );
    prompt
}

pub fn outline(idea: &Idea, merged_points: &[String]) -> String {
    let mut prompt = idea_block(idea);
    prompt.push_str("\nBrainstormed points:\n");
    for point in merged_points {
        let _ = writeln!(prompt, "- {}", point);
    }
    prompt.push_str(
        "\nOrganize these points into a presentation outline:\n\
         - the first line is `# <presentation title>`\n\
         - each section is a `## <heading>` line followed by 2-4 bullets\n\
         - keep every original point somewhere in the outline",
    );
    prompt
}

pub fn section(outline: &Outline, section: &OutlineSection, template: &Template) -> String {
    let mut prompt = format!(
        "Presentation: {}\nSection: {}\n",
        outline.title.trim(),
        section.heading.trim()
    );
    if !section.points.is_empty() {
        prompt.push_str("Points to cover:\n");
        for point in &section.points {
            let _ = writeln!(prompt, "- {}", point);
        }
    }
    if let Some(guide) = &template.style_guide {
        let _ = write!(prompt, "\nStyle guide:\n{}\n", guide.trim());
    }
    let _ = write!(
        prompt,
        "\nWrite the slide content for this section.\n\
         Start with `## <slide heading>`, then up to {} bullets of at most {} words each.\n\
         Optionally add a `Notes:` line with speaker notes and an `Image:` line describing a visual.",
        template.max_bullets_per_slide.max(1),
        BULLET_WORDS
    );
    prompt
}

/// Shorter follow-up for a section whose first reply had no bullets.
pub fn section_retry(section: &OutlineSection) -> String {
    format!(
        "Your previous reply for the slide \"{}\" contained no bullet points.\n\
         Reply with `## {}` followed by 3-5 markdown bullets and nothing else.",
        section.heading.trim(),
        section.heading.trim()
    )
}

pub fn thumbnail(title: &str, key_points: &[String]) -> String {
    let points: Vec<&str> = key_points
        .iter()
        .take(THUMBNAIL_POINTS)
        .map(String::as_str)
        .collect();
    format!(
        "Widescreen digital art for a presentation titled \"{}\". \
         Visually represent: {}. Modern, clean and professional with vibrant colors. \
         Do not include any text or lettering in the image.",
        title.trim(),
        points.join(", ")
    )
}
