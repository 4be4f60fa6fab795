use crate::deck::{DEFAULT_TEMPLATE, ExportError, ExportReceipt, SlideContent, SlideDeck, ValidationError};
use crate::llm::Provider;
use crate::parser::ParseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

pub type RunId = Uuid;

/// The user's topic submission. Immutable once a run is created from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idea {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl Idea {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            constraints: None,
            audience: None,
        }
    }

    pub fn with_constraints(mut self, constraints: impl Into<String>) -> Self {
        self.constraints = Some(constraints.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

/// One provider's brainstorm output, pre-merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrainstormCandidate {
    pub provider: Provider,
    pub points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub heading: String,
    pub points: Vec<String>,
}

impl OutlineSection {
    pub fn new(heading: impl Into<String>, points: Vec<String>) -> Self {
        Self {
            heading: heading.into(),
            points,
        }
    }
}

/// The reviewed structure that seeds slide generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub title: String,
    pub sections: Vec<OutlineSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutlineError {
    #[error("Outline title is empty")]
    EmptyTitle,
    #[error("Outline has no sections")]
    NoSections,
    #[error("Outline section {0} has an empty heading")]
    EmptyHeading(usize),
}

impl Outline {
    pub fn new(title: impl Into<String>, sections: Vec<OutlineSection>) -> Result<Self, OutlineError> {
        let outline = Self {
            title: title.into(),
            sections,
        };
        outline.validate()?;
        Ok(outline)
    }

    pub fn validate(&self) -> Result<(), OutlineError> {
        if self.title.trim().is_empty() {
            return Err(OutlineError::EmptyTitle);
        }
        if self.sections.is_empty() {
            return Err(OutlineError::NoSections);
        }
        if let Some(index) = self
            .sections
            .iter()
            .position(|section| section.heading.trim().is_empty())
        {
            return Err(OutlineError::EmptyHeading(index));
        }
        Ok(())
    }

    pub fn point_count(&self) -> usize {
        self.sections.iter().map(|s| s.points.len()).sum()
    }
}

/// A pipeline phase with its own fan-out/parse/merge cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Brainstorming,
    Outlining,
    Generating,
    Formatting,
    Thumbnail,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Brainstorming => "brainstorming",
            Stage::Outlining => "outlining",
            Stage::Generating => "generating",
            Stage::Formatting => "formatting",
            Stage::Thumbnail => "thumbnail",
            Stage::Export => "export",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Created,
    Brainstorming,
    AwaitingReview,
    Generating,
    Formatting,
    ExportReady,
    Exported,
    Failed(Stage),
    Abandoned,
}

impl WorkflowState {
    /// No further transitions except regeneration out of `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Exported | WorkflowState::Abandoned | WorkflowState::Failed(_)
        )
    }

    /// A stage is executing; snapshots taken here are rolled back on restore.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            WorkflowState::Brainstorming | WorkflowState::Generating | WorkflowState::Formatting
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Created => f.write_str("created"),
            WorkflowState::Brainstorming => f.write_str("brainstorming"),
            WorkflowState::AwaitingReview => f.write_str("awaiting review"),
            WorkflowState::Generating => f.write_str("generating"),
            WorkflowState::Formatting => f.write_str("formatting"),
            WorkflowState::ExportReady => f.write_str("export ready"),
            WorkflowState::Exported => f.write_str("exported"),
            WorkflowState::Failed(stage) => write!(f, "failed ({})", stage),
            WorkflowState::Abandoned => f.write_str("abandoned"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Provider,
    Parse,
    Validation,
    Export,
}

/// A recorded, attributed failure. Most are recovered locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    pub kind: ErrorKind,
    pub message: String,
    pub fatal: bool,
    pub at: DateTime<Utc>,
}

impl StageError {
    pub fn new(stage: Stage, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            provider: None,
            kind,
            message: message.into(),
            fatal: false,
            at: Utc::now(),
        }
    }

    pub fn for_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.stage)?;
        if let Some(provider) = self.provider {
            write!(f, " {}", provider)?;
        }
        write!(f, " {:?}: {}", self.kind, self.message)?;
        if self.fatal {
            f.write_str(" (fatal)")?;
        }
        Ok(())
    }
}

/// Everything one session owns. Never shared between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunId,
    pub idea: Idea,
    pub state: WorkflowState,
    /// Selected providers in priority order.
    pub providers: Vec<Provider>,
    #[serde(default = "default_template_name")]
    pub template: String,
    pub candidates: BTreeMap<Provider, BrainstormCandidate>,
    pub merged_points: Vec<String>,
    pub draft_outline: Option<Outline>,
    pub outline: Option<Outline>,
    pub contents: Vec<SlideContent>,
    pub deck: Option<SlideDeck>,
    /// Decks superseded by regeneration, oldest first.
    pub previous_decks: Vec<SlideDeck>,
    pub export: Option<ExportReceipt>,
    pub errors: Vec<StageError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_template_name() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl WorkflowRun {
    pub fn new(idea: Idea, providers: Vec<Provider>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            idea,
            state: WorkflowState::Created,
            providers,
            template: DEFAULT_TEMPLATE.to_string(),
            candidates: BTreeMap::new(),
            merged_points: Vec::new(),
            draft_outline: None,
            outline: None,
            contents: Vec::new(),
            deck: None,
            previous_decks: Vec::new(),
            export: None,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_error(&mut self, error: StageError) {
        tracing::warn!(run_id = %self.id, "{}", error);
        self.errors.push(error);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn errors_for(&self, stage: Stage) -> impl Iterator<Item = &StageError> {
        self.errors.iter().filter(move |e| e.stage == stage)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    #[error("Unknown run: {0}")]
    UnknownRun(RunId),
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
    },
    #[error("Cannot regenerate {stage} from {state}")]
    InvalidRegeneration { stage: Stage, state: WorkflowState },
    #[error("Stage {stage} failed: {reason}")]
    StageFailed { stage: Stage, reason: String },
    #[error("Run {0} was abandoned")]
    Cancelled(RunId),
    #[error("Invalid idea: {0}")]
    InvalidIdea(String),
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
    #[error("Run {0} has no {1} to work from")]
    MissingInput(RunId, &'static str),
    #[error("Run store error: {0}")]
    Persistence(String),
    #[error("Invalid outline: {0}")]
    InvalidOutline(#[from] OutlineError),
    #[error("Outline could not be parsed: {0}")]
    Parse(#[from] ParseError),
    #[error("Deck failed validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}
