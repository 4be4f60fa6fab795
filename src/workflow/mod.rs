//! Workflow engine: the run model, its state machine, candidate merging,
//! stage prompts, the engine that drives runs, and run snapshots.

pub mod engine;
pub mod merge;
pub mod prompts;
pub mod state;
pub mod store;
pub mod types;

pub use engine::WorkflowEngine;
pub use merge::{draft_outline, merge_candidates};
pub use state::{can_transition, regeneration_target};
pub use store::RunStore;
pub use types::*;
