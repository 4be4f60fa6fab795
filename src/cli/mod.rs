//! CLI-specific functionality: argument parsing, the interactive review
//! prompts and terminal rendering of runs, outlines and decks.

pub mod args;
pub mod render;
pub mod review;

pub use args::{Args, Commands, ExecutionMode, GenerateConfig};
