//! The run state machine. Every state change goes through [`transition`].

use crate::workflow::types::{Stage, WorkflowError, WorkflowState};

/// Whether `from -> to` is a legal edge.
pub fn can_transition(from: WorkflowState, to: WorkflowState) -> bool {
    use WorkflowState::*;

    match (from, to) {
        (Exported | Abandoned, _) => false,
        // Abandonment is allowed from anything still alive, including Failed.
        (_, Abandoned) => true,
        (Created, Brainstorming) => true,
        (Brainstorming, AwaitingReview) => true,
        (AwaitingReview, Generating) => true,
        (Generating, Formatting) => true,
        (Formatting, ExportReady) => true,
        (ExportReady, Exported) => true,
        // Any in-flight stage may fail; formatting failures are attributed to the stage.
        (Brainstorming, Failed(Stage::Brainstorming)) => true,
        (Generating, Failed(Stage::Generating)) => true,
        (Formatting, Failed(Stage::Formatting)) => true,
        (from, Brainstorming) | (from, Generating) => regeneration_target(from) == Some(to),
        _ => false,
    }
}

/// Where a regeneration request from `state` lands, if it is allowed.
pub fn regeneration_target(state: WorkflowState) -> Option<WorkflowState> {
    use WorkflowState::*;

    match state {
        AwaitingReview | Failed(Stage::Brainstorming) => Some(Brainstorming),
        Formatting | ExportReady | Failed(Stage::Generating) | Failed(Stage::Formatting) => {
            Some(Generating)
        }
        _ => None,
    }
}

/// The stage a regeneration from `state` re-runs.
pub fn regeneration_stage(state: WorkflowState) -> Option<Stage> {
    match regeneration_target(state)? {
        WorkflowState::Brainstorming => Some(Stage::Brainstorming),
        _ => Some(Stage::Generating),
    }
}

/// Validate and apply a transition.
pub fn transition(state: &mut WorkflowState, to: WorkflowState) -> Result<(), WorkflowError> {
    if !can_transition(*state, to) {
        return Err(WorkflowError::InvalidTransition { from: *state, to });
    }
    *state = to;
    Ok(())
}

/// The last stable state before an in-flight one, used when restoring snapshots.
pub fn stable_state(state: WorkflowState) -> WorkflowState {
    match state {
        WorkflowState::Brainstorming => WorkflowState::Created,
        WorkflowState::Generating | WorkflowState::Formatting => WorkflowState::AwaitingReview,
        other => other,
    }
}
