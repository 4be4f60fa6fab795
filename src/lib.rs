//! # Slidesmith
//!
//! Turns a short topic idea into a formatted, exportable slide deck by
//! orchestrating several LLM providers and assembling their output into a
//! structured presentation.
//!
//! ## Architecture Overview
//!
//! - **[`llm`]**: One normalized request/response contract over the Claude
//!   and GPT-4 backends, with retries, rate limiting, timeouts and fan-out
//! - **[`parser`]**: Layered parsing of free-form model text into points,
//!   outlines and slide content
//! - **[`workflow`]**: The run state machine, candidate merging and the
//!   engine that drives runs from idea to export
//! - **[`deck`]**: The canonical deck model, templates, formatting and the
//!   export collaborator interface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slidesmith::config::AppConfig;
//! use slidesmith::llm::{Provider, ProviderAdapter};
//! use slidesmith::workflow::{Idea, WorkflowEngine};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::default();
//!     let workspace = Path::new(".");
//!     let adapter = Arc::new(ProviderAdapter::from_config(&config, workspace).await?);
//!     let engine = WorkflowEngine::from_config(&config, adapter, None)?;
//!
//!     let run_id = engine
//!         .submit_idea(Idea::new("Intro to Rust"), &[Provider::Claude37, Provider::Gpt4])
//!         .await?;
//!     engine.approve_draft(run_id).await?;
//!
//!     let run = engine.get(run_id).await?;
//!     println!("{} slides", run.deck.map_or(0, |deck| deck.slide_count()));
//!     Ok(())
//! }
//! ```

/// Provider-agnostic LLM interface.
///
/// Normalized request/response types, the Anthropic and OpenAI backends, and
/// the adapter that adds timeouts, retries, rate limiting and fan-out.
pub mod llm;

/// Response parsing from untrusted model text into typed structures.
pub mod parser;

/// The workflow engine and the run model it drives.
pub mod workflow;

/// Slide deck model, templates, formatting and export.
pub mod deck;

/// Configuration model and discovery.
pub mod config;

/// Environment constants and path utilities.
///
/// Centralizes the on-disk layout under `.slidesmith/`.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use config::{AppConfig, ConfigDiscovery, ConfigError};
pub use deck::{DeckExporter, ExportFormat, JsonHandoffExporter, SlideDeck, Template};
pub use llm::{ModelRequest, ModelResponse, Provider, ProviderAdapter};
pub use workflow::{Idea, Outline, RunId, RunStore, WorkflowEngine, WorkflowRun, WorkflowState};
