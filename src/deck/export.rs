use crate::deck::types::{ExportError, ExportFormat, ExportReceipt, SlideDeck};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// The export collaborator. Implementations turn a finished deck into a
/// Google Slides presentation, a PowerPoint file, or a hand-off for either.
#[async_trait]
pub trait DeckExporter: Send + Sync {
    async fn export(
        &self,
        deck: &SlideDeck,
        format: ExportFormat,
    ) -> Result<ExportReceipt, ExportError>;

    fn name(&self) -> &str;
}

/// Writes the deck as a JSON document for an external uploader.
pub struct JsonHandoffExporter {
    out_dir: PathBuf,
}

#[derive(Serialize)]
struct Handoff<'a> {
    format: ExportFormat,
    generated_at: chrono::DateTime<Utc>,
    generator: &'static str,
    deck: &'a SlideDeck,
}

impl JsonHandoffExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn file_name(deck: &SlideDeck, format: ExportFormat) -> String {
        format!("{}.{}.json", slug(&deck.title), format.as_str())
    }
}

/// Lowercase, ASCII-alphanumeric words joined by `-`.
pub fn slug(title: &str) -> String {
    let slug = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "deck".to_string()
    } else {
        slug
    }
}

#[async_trait]
impl DeckExporter for JsonHandoffExporter {
    async fn export(
        &self,
        deck: &SlideDeck,
        format: ExportFormat,
    ) -> Result<ExportReceipt, ExportError> {
        fs::create_dir_all(&self.out_dir).await?;

        let exported_at = Utc::now();
        let document = Handoff {
            format,
            generated_at: exported_at,
            generator: concat!("slidesmith/", env!("CARGO_PKG_VERSION")),
            deck,
        };
        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| ExportError::Rejected(format!("Deck could not be serialized: {}", e)))?;

        let path = self.out_dir.join(Self::file_name(deck, format));
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json).await?;
        fs::rename(&temp_path, &path).await?;

        info!(path = %path.display(), %format, "Wrote export hand-off");
        Ok(ExportReceipt {
            format,
            handle: path.display().to_string(),
            path: Some(path),
            exported_at,
        })
    }

    fn name(&self) -> &str {
        "json-handoff"
    }
}
