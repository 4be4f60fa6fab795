//! Helpers for the interactive review loops.

use crate::workflow::{RunId, WorkflowError, WorkflowState};
use anyhow::Context;
use std::io::{self, Write};
use tokio::sync::watch;
use tracing::info;

/// Fold a stage result into the review loop. Validation failures leave the
/// run regenerable and a cancelled stage means the run was abandoned; the
/// loops pick both up from the run's state. Anything else is fatal.
pub fn settle(run_id: RunId, result: Result<WorkflowState, WorkflowError>) -> Result<(), WorkflowError> {
    match result {
        Ok(_) => Ok(()),
        Err(WorkflowError::Validation(e)) => {
            println!("❌ Deck failed validation: {}", e);
            Ok(())
        }
        Err(WorkflowError::Cancelled(_))
        | Err(WorkflowError::InvalidTransition {
            from: WorkflowState::Abandoned,
            ..
        }) => {
            info!("Run {} was abandoned mid-stage", run_id);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Ask a question on stdin. `None` when `interrupted` flips before an
/// answer arrives.
pub async fn prompt(
    question: &str,
    interrupted: &mut watch::Receiver<bool>,
) -> anyhow::Result<Option<String>> {
    if *interrupted.borrow() {
        return Ok(None);
    }
    print!("\n> {}: ", question);
    io::stdout().flush()?;

    // Blocking read off the runtime thread so the Ctrl-C task keeps running.
    let read = tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        io::stdin().read_line(&mut input).map(|_| input)
    });
    tokio::select! {
        biased;
        Ok(_) = interrupted.wait_for(|interrupted| *interrupted) => Ok(None),
        line = read => {
            let line = line.context("stdin reader panicked")??;
            Ok(Some(line.trim().to_string()))
        }
    }
}
