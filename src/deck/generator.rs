use crate::deck::formatting::{format_content, format_heading};
use crate::deck::types::{
    Slide, SlideContent, SlideDeck, SlideLayout, Template, ValidationError,
};
use crate::workflow::Outline;
use tracing::debug;

/// Build a deck from an approved outline and generated slide content.
///
/// The title slide comes from `outline.title`; every content entry becomes
/// one or more body slides in order. Entries with more bullets than the
/// template allows are split into continuation slides that repeat the
/// heading with the template's continuation marker. Notes and image prompts
/// stay on the first slide of a split. Identical inputs always yield an
/// identical deck.
pub fn generate(
    outline: &Outline,
    contents: &[SlideContent],
    template: &Template,
) -> Result<SlideDeck, ValidationError> {
    let max = template.max_bullets_per_slide;
    if max == 0 {
        return Err(ValidationError::InvalidBulletLimit(template.name.clone()));
    }

    let title = format_heading(&outline.title);
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }

    let mut slides = vec![Slide {
        layout: SlideLayout::Title(template.title_slide_style),
        content: SlideContent::new(title.clone(), Vec::new()),
        continuation: 0,
    }];

    for content in contents {
        let formatted = format_content(content, &template.format);
        slides.extend(split(formatted, template));
    }

    let deck = SlideDeck {
        title,
        slides,
        template: template.clone(),
        thumbnail_image_ref: None,
    };
    validate(&deck)?;

    debug!(
        title = %deck.title,
        slides = deck.slide_count(),
        template = %template.name,
        "Generated deck"
    );
    Ok(deck)
}

fn split(content: SlideContent, template: &Template) -> Vec<Slide> {
    let layout = SlideLayout::Body(template.body_slide_style);
    let max = template.max_bullets_per_slide.max(1);

    if content.bullets.len() <= max {
        return vec![Slide {
            layout,
            content,
            continuation: 0,
        }];
    }

    let SlideContent {
        heading,
        bullets,
        notes,
        image_prompt,
    } = content;
    let continued = format!("{} {}", heading, template.continuation_marker)
        .trim()
        .to_string();
    let mut notes = notes;
    let mut image_prompt = image_prompt;

    bullets
        .chunks(max)
        .enumerate()
        .map(|(index, chunk)| Slide {
            layout,
            content: SlideContent {
                heading: if index == 0 {
                    heading.clone()
                } else {
                    continued.clone()
                },
                bullets: chunk.to_vec(),
                notes: notes.take(),
                image_prompt: image_prompt.take(),
            },
            continuation: index as u32,
        })
        .collect()
}

/// Check a deck against its template's constraints.
pub fn validate(deck: &SlideDeck) -> Result<(), ValidationError> {
    let max = deck.template.max_bullets_per_slide;
    if max == 0 {
        return Err(ValidationError::InvalidBulletLimit(deck.template.name.clone()));
    }
    if deck.title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if deck.body_slides().next().is_none() {
        return Err(ValidationError::NoBodySlides);
    }

    for (index, slide) in deck.slides.iter().enumerate() {
        if slide.content.heading.trim().is_empty() {
            return Err(ValidationError::EmptyHeading { index });
        }
        if slide.content.bullets.len() > max {
            return Err(ValidationError::TooManyBullets {
                index,
                count: slide.content.bullets.len(),
                max,
            });
        }
    }
    Ok(())
}
