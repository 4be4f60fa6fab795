//! Slide deck generator: the canonical deck model, templates, the
//! formatting pass and the export collaborator interface.

pub mod export;
pub mod formatting;
pub mod generator;
pub mod templates;
pub mod types;

pub use export::{DeckExporter, JsonHandoffExporter};
pub use generator::{generate, validate};
pub use templates::{DEFAULT_TEMPLATE, TemplateRegistry};
pub use types::*;
