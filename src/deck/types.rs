use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Layout of the synthesized title slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TitleSlideStyle {
    #[default]
    Centered,
    LeftAligned,
    Banner,
    Minimal,
}

/// Layout applied to every body slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BodySlideStyle {
    #[default]
    Bullets,
    TwoColumn,
    ImageRight,
    Compact,
}

/// Fonts and colors handed through to the exporter untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub title_font: String,
    pub body_font: String,
    pub title_size_pt: u32,
    pub body_size_pt: u32,
    pub title_color: String,
    pub body_color: String,
    pub accent_color: String,
    pub background_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            title_font: "Arial".to_string(),
            body_font: "Arial".to_string(),
            title_size_pt: 40,
            body_size_pt: 20,
            title_color: "#333333".to_string(),
            body_color: "#555555".to_string(),
            accent_color: "#3366FF".to_string(),
            background_color: "#FFFFFF".to_string(),
        }
    }
}

/// Text clean-up applied during the formatting pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Render `Key Term: explanation` bullets as `**Key Term**: explanation`.
    pub bold_key_terms: bool,
    pub ensure_terminal_punctuation: bool,
    pub highlight_color: Option<String>,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            bold_key_terms: true,
            ensure_terminal_punctuation: true,
            highlight_color: None,
        }
    }
}

/// Read-only formatting configuration consumed by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Template {
    pub name: String,
    pub description: String,
    pub max_bullets_per_slide: usize,
    pub title_slide_style: TitleSlideStyle,
    pub body_slide_style: BodySlideStyle,
    pub theme: Theme,
    /// Appended to the heading of overflow slides.
    pub continuation_marker: String,
    pub format: FormatOptions,
    /// Writing guidance passed to the model when generating slide content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_guide: Option<String>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: "Clean white background with dark text".to_string(),
            max_bullets_per_slide: 5,
            title_slide_style: TitleSlideStyle::Centered,
            body_slide_style: BodySlideStyle::Bullets,
            theme: Theme::default(),
            continuation_marker: "(cont.)".to_string(),
            format: FormatOptions::default(),
            style_guide: None,
        }
    }
}

/// Content for one slide as produced by a model (or synthesized).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SlideContent {
    pub heading: String,
    pub bullets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

impl SlideContent {
    pub fn new(heading: impl Into<String>, bullets: Vec<String>) -> Self {
        Self {
            heading: heading.into(),
            bullets,
            notes: None,
            image_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "style")]
pub enum SlideLayout {
    Title(TitleSlideStyle),
    Body(BodySlideStyle),
}

/// A materialized slide in a deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub layout: SlideLayout,
    #[serde(flatten)]
    pub content: SlideContent,
    /// 0 for the first slide of a section, n for its n-th overflow slide.
    #[serde(default)]
    pub continuation: u32,
}

impl Slide {
    pub fn is_title(&self) -> bool {
        matches!(self.layout, SlideLayout::Title(_))
    }

    pub fn is_continuation(&self) -> bool {
        self.continuation > 0
    }
}

/// The terminal artifact of a run, handed to the export collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideDeck {
    pub title: String,
    pub slides: Vec<Slide>,
    pub template: Template,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_image_ref: Option<String>,
}

impl SlideDeck {
    pub fn body_slides(&self) -> impl Iterator<Item = &Slide> {
        self.slides.iter().filter(|slide| !slide.is_title())
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }
}

/// Target document format for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportFormat {
    GoogleSlides,
    PowerPoint,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::GoogleSlides => "google-slides",
            ExportFormat::PowerPoint => "power-point",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "google-slides" | "gslides" | "google" => Ok(ExportFormat::GoogleSlides),
            "power-point" | "powerpoint" | "pptx" => Ok(ExportFormat::PowerPoint),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// What an exporter hands back on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReceipt {
    pub format: ExportFormat,
    /// Job id, document URL or file path, depending on the exporter.
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub exported_at: chrono::DateTime<chrono::Utc>,
}

/// A deck that breaks template constraints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Template '{0}' must allow at least one bullet per slide")]
    InvalidBulletLimit(String),
    #[error("Deck title is empty")]
    EmptyTitle,
    #[error("Deck has no body slides")]
    NoBodySlides,
    #[error("Slide {index} has an empty heading")]
    EmptyHeading { index: usize },
    #[error("Slide {index} has {count} bullets, template allows {max}")]
    TooManyBullets { index: usize, count: usize, max: usize },
}

/// Failure reported by the export collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("Export IO error: {0}")]
    Io(String),
    #[error("Exporter rejected deck: {0}")]
    Rejected(String),
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Io(err.to_string())
    }
}
