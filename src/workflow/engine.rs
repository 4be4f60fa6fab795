use crate::config::{AppConfig, ConfigError, ProvidersConfig, WorkflowSettings};
use crate::deck::{self, DeckExporter, ExportFormat, ExportReceipt, SlideContent, Template, TemplateRegistry};
use crate::llm::{
    FanOut, FanOutControl, JoinPolicy, ModelRequest, ModelResponse, Provider, ProviderAdapter,
};
use crate::parser::{self, ParseError};
use crate::workflow::merge::{draft_outline, merge_candidates};
use crate::workflow::prompts;
use crate::workflow::state::{regeneration_stage, transition};
use crate::workflow::store::RunStore;
use crate::workflow::types::{
    ErrorKind, Idea, Outline, OutlineSection, RunId, Stage, StageError, WorkflowError,
    WorkflowRun, WorkflowState,
};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Per-run bookkeeping. The run itself is locked only for short, await-free
/// critical sections (plus snapshot writes); `stage_lock` is held for the
/// whole of a stage so a run is never in two stages at once.
struct RunSlot {
    run: Mutex<WorkflowRun>,
    stage_lock: Mutex<()>,
    cancel: watch::Sender<bool>,
}

impl RunSlot {
    fn new(run: WorkflowRun) -> Arc<Self> {
        let (cancel, _) = watch::channel(run.state == WorkflowState::Abandoned);
        Arc::new(Self {
            run: Mutex::new(run),
            stage_lock: Mutex::new(()),
            cancel,
        })
    }
}

struct EngineInner {
    adapter: Arc<ProviderAdapter>,
    templates: TemplateRegistry,
    settings: WorkflowSettings,
    providers: ProvidersConfig,
    default_template: String,
    store: Option<RunStore>,
    runs: DashMap<RunId, Arc<RunSlot>>,
}

/// Drives runs through the pipeline.
///
/// Cheap to clone; clones share the adapter, the templates and the run table.
/// Different runs proceed independently; within one run, stages are
/// serialized and `abandon` can interrupt whichever stage is in flight.
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

/// How one section fared in the generation fan-out. A failed section still
/// gets a slide built from its outline points.
enum SectionResult {
    Content(Vec<SlideContent>),
    Failed(StageError),
}

impl WorkflowEngine {
    pub fn new(
        adapter: Arc<ProviderAdapter>,
        templates: TemplateRegistry,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                adapter,
                templates,
                settings,
                providers: ProvidersConfig::default(),
                default_template: deck::DEFAULT_TEMPLATE.to_string(),
                store: None,
                runs: DashMap::new(),
            }),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        adapter: Arc<ProviderAdapter>,
        store: Option<RunStore>,
    ) -> Result<Self, ConfigError> {
        let templates = config.template_registry()?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                adapter,
                templates,
                settings: config.workflow.clone(),
                providers: config.providers.clone(),
                default_template: config.default_template.clone(),
                store,
                runs: DashMap::new(),
            }),
        })
    }

    /// Only valid before the engine is shared.
    pub fn with_store(mut self, store: RunStore) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.store = Some(store);
        } else {
            warn!("Engine already shared, run store not attached");
        }
        self
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.inner.templates
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.inner.settings
    }

    fn slot(&self, id: RunId) -> Result<Arc<RunSlot>, WorkflowError> {
        self.inner
            .runs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(WorkflowError::UnknownRun(id))
    }

    /// Selected providers, de-duplicated and ordered by the priority list.
    fn order_providers(&self, selected: &[Provider]) -> Vec<Provider> {
        let selected = if selected.is_empty() {
            self.inner.settings.default_providers.as_slice()
        } else {
            selected
        };

        let mut ordered: Vec<Provider> = self
            .inner
            .settings
            .provider_priority
            .iter()
            .copied()
            .filter(|provider| selected.contains(provider))
            .collect();
        for provider in selected {
            if !ordered.contains(provider) {
                ordered.push(*provider);
            }
        }
        ordered
    }

    fn text_request(&self, provider: Provider, prompt: String, system: &str) -> ModelRequest {
        let params = self.inner.providers.get(provider);
        ModelRequest::text(provider, prompt)
            .with_system_prompt(system)
            .with_max_tokens(params.max_tokens)
            .with_temperature(params.temperature)
    }

    /// Every fan-out inside one stage shares this deadline.
    fn stage_deadline(&self) -> Instant {
        Instant::now() + self.inner.settings.stage_timeout()
    }

    fn control(&self, slot: &RunSlot, policy: JoinPolicy, deadline: Instant) -> FanOutControl {
        FanOutControl {
            deadline: Some(deadline),
            policy,
            cancel: Some(slot.cancel.subscribe()),
        }
    }

    async fn persist(&self, run: &WorkflowRun) {
        if let Some(store) = &self.inner.store
            && let Err(e) = store.save(run).await
        {
            warn!(run_id = %run.id, "Failed to persist run snapshot: {:#}", e);
        }
    }

    /// Lock the run for a post-await update, refusing if it left `expected`
    /// in the meantime (i.e. it was abandoned).
    async fn relock<'a>(
        &self,
        slot: &'a RunSlot,
        id: RunId,
        expected: WorkflowState,
    ) -> Result<tokio::sync::MutexGuard<'a, WorkflowRun>, WorkflowError> {
        let run = slot.run.lock().await;
        if run.state != expected {
            debug!(run_id = %id, state = %run.state, "Discarding late stage results");
            return Err(WorkflowError::Cancelled(id));
        }
        Ok(run)
    }

    /// Register a new run in `Created`. Nothing is sent to providers yet.
    pub async fn create_run(
        &self,
        idea: Idea,
        providers: &[Provider],
        template: Option<&str>,
    ) -> Result<RunId, WorkflowError> {
        if idea.topic.trim().is_empty() {
            return Err(WorkflowError::InvalidIdea("topic is required".to_string()));
        }
        let providers = self.order_providers(providers);
        if providers.is_empty() {
            return Err(WorkflowError::InvalidIdea(
                "no providers selected".to_string(),
            ));
        }

        let template = template.unwrap_or(&self.inner.default_template);
        if self.inner.templates.get(template).is_none() {
            return Err(WorkflowError::UnknownTemplate(template.to_string()));
        }

        let mut run = WorkflowRun::new(idea, providers);
        run.template = template.to_string();
        let id = run.id;
        info!(
            run_id = %id,
            topic = %run.idea.topic,
            providers = ?run.providers,
            template = %run.template,
            "Created run"
        );

        self.persist(&run).await;
        self.inner.runs.insert(id, RunSlot::new(run));
        Ok(id)
    }

    /// Create a run and brainstorm it. Returns the run id even when the
    /// brainstorm failed or was abandoned; inspect the run for its state.
    pub async fn submit_idea(
        &self,
        idea: Idea,
        providers: &[Provider],
    ) -> Result<RunId, WorkflowError> {
        let id = self.create_run(idea, providers, None).await?;
        match self.run_brainstorming(id).await {
            Ok(_) | Err(WorkflowError::Cancelled(_)) => Ok(id),
            Err(e) => Err(e),
        }
    }

    /// `Created -> Brainstorming -> AwaitingReview | Failed(Brainstorming)`.
    pub async fn run_brainstorming(&self, id: RunId) -> Result<WorkflowState, WorkflowError> {
        let slot = self.slot(id)?;
        let _stage = slot.stage_lock.lock().await;
        {
            let mut run = slot.run.lock().await;
            // Re-brainstorming a reviewed run goes through `regenerate`.
            if run.state != WorkflowState::Created {
                return Err(WorkflowError::InvalidTransition {
                    from: run.state,
                    to: WorkflowState::Brainstorming,
                });
            }
            transition(&mut run.state, WorkflowState::Brainstorming)?;
            run.touch();
            self.persist(&run).await;
        }
        self.brainstorm(&slot, id, self.stage_deadline()).await
    }

    async fn brainstorm(
        &self,
        slot: &RunSlot,
        id: RunId,
        deadline: Instant,
    ) -> Result<WorkflowState, WorkflowError> {
        let (idea, providers) = {
            let run = slot.run.lock().await;
            (run.idea.clone(), run.providers.clone())
        };
        info!(run_id = %id, providers = providers.len(), "Brainstorming");

        let prompt = prompts::brainstorm(&idea);
        let requests: Vec<ModelRequest> = providers
            .iter()
            .map(|provider| self.text_request(*provider, prompt.clone(), prompts::BRAINSTORM_SYSTEM))
            .collect();

        let control = self.control(slot, self.inner.settings.join_policy, deadline);
        let responses = match self.inner.adapter.invoke_many_controlled(requests, control).await {
            FanOut::Completed(responses) => responses,
            FanOut::Cancelled => return Err(WorkflowError::Cancelled(id)),
        };

        let mut run = self.relock(slot, id, WorkflowState::Brainstorming).await?;
        for (provider, response) in providers.iter().zip(&responses) {
            let Some(response) = response else {
                debug!(run_id = %id, %provider, "Not awaited, join policy already satisfied");
                continue;
            };
            match parser::parse_brainstorm(response) {
                Ok(candidate) => {
                    debug!(run_id = %id, provider = %candidate.provider, points = candidate.points.len(), "Candidate accepted");
                    run.candidates.insert(candidate.provider, candidate);
                }
                Err(e) => run.record_error(response_error(Stage::Brainstorming, response, &e)),
            }
        }

        if run.candidates.is_empty() {
            return Ok(self
                .fail_stage(&mut run, Stage::Brainstorming, "no provider returned usable points")
                .await);
        }

        run.merged_points = merge_candidates(&run.candidates, &self.inner.settings.provider_priority);
        info!(
            run_id = %id,
            candidates = run.candidates.len(),
            merged_points = run.merged_points.len(),
            "Brainstorm merged"
        );
        let merged_points = run.merged_points.clone();
        drop(run);

        let draft = match self.inner.settings.outline_provider {
            Some(provider) => {
                self.draft_with_provider(slot, id, provider, &idea, &merged_points, deadline)
                    .await?
            }
            None => Ok(draft_outline(&idea.topic, &merged_points)),
        };

        let mut run = self.relock(slot, id, WorkflowState::Brainstorming).await?;
        let draft = match draft {
            Ok(outline) => outline,
            Err(error) => {
                run.record_error(error);
                draft_outline(&idea.topic, &merged_points)
            }
        };
        run.draft_outline = Some(draft);
        transition(&mut run.state, WorkflowState::AwaitingReview)?;
        run.touch();
        self.persist(&run).await;
        info!(run_id = %id, "Awaiting outline review");
        Ok(run.state)
    }

    /// Ask `provider` to structure the merged points. The inner `Err` is a
    /// recoverable failure; the caller falls back to the deterministic draft.
    async fn draft_with_provider(
        &self,
        slot: &RunSlot,
        id: RunId,
        provider: Provider,
        idea: &Idea,
        merged_points: &[String],
        deadline: Instant,
    ) -> Result<Result<Outline, StageError>, WorkflowError> {
        let request = self.text_request(
            provider,
            prompts::outline(idea, merged_points),
            prompts::OUTLINE_SYSTEM,
        );
        let control = self.control(slot, JoinPolicy::All, deadline);
        let response = match self.inner.adapter.invoke_many_controlled(vec![request], control).await {
            FanOut::Completed(mut responses) => responses.pop().flatten(),
            FanOut::Cancelled => return Err(WorkflowError::Cancelled(id)),
        };
        let Some(response) = response else {
            return Ok(Err(StageError::new(Stage::Outlining, ErrorKind::Provider, "no response")
                .for_provider(provider)));
        };

        let parsed = parser::parse_outline(&response).and_then(|mut outline| {
            if outline.title.trim().is_empty() {
                outline.title = idea.topic.trim().to_string();
            }
            outline.validate().map_err(|_| ParseError::NoStructure("outline"))?;
            Ok(outline)
        });
        Ok(parsed.map_err(|e| response_error(Stage::Outlining, &response, &e)))
    }

    /// Approve the draft produced by the brainstorm as-is.
    pub async fn approve_draft(&self, id: RunId) -> Result<WorkflowState, WorkflowError> {
        let draft = {
            let slot = self.slot(id)?;
            let run = slot.run.lock().await;
            run.draft_outline.clone()
        };
        let outline = draft.ok_or(WorkflowError::MissingInput(id, "draft outline"))?;
        self.approve_outline(id, outline).await
    }

    /// Approve a hand-written outline given as markdown text.
    pub async fn approve_outline_text(
        &self,
        id: RunId,
        text: &str,
    ) -> Result<WorkflowState, WorkflowError> {
        let topic = {
            let slot = self.slot(id)?;
            let run = slot.run.lock().await;
            run.idea.topic.clone()
        };
        let outline = parser::parse_outline_text(text, Some(topic.trim()))?;
        self.approve_outline(id, outline).await
    }

    /// `AwaitingReview -> Generating -> Formatting -> ExportReady`.
    ///
    /// Generation and formatting run to completion before this returns and
    /// share one stage deadline. A section whose call fails is rendered from
    /// its outline points. A deck that fails validation leaves the run in
    /// `Formatting` (so it can be regenerated) and the validation error is
    /// returned.
    pub async fn approve_outline(
        &self,
        id: RunId,
        outline: Outline,
    ) -> Result<WorkflowState, WorkflowError> {
        outline.validate()?;
        let slot = self.slot(id)?;
        let _stage = slot.stage_lock.lock().await;
        {
            let mut run = slot.run.lock().await;
            transition(&mut run.state, WorkflowState::Generating)?;
            info!(run_id = %id, title = %outline.title, sections = outline.sections.len(), "Outline approved");
            run.outline = Some(outline);
            run.touch();
            self.persist(&run).await;
        }
        self.generate(&slot, id, self.stage_deadline()).await
    }

    fn template_for(&self, run: &WorkflowRun) -> Result<Template, WorkflowError> {
        self.inner
            .templates
            .get(&run.template)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownTemplate(run.template.clone()))
    }

    fn generation_provider(&self, run: &WorkflowRun) -> Provider {
        self.inner
            .settings
            .generation_provider
            .or_else(|| run.providers.first().copied())
            .unwrap_or(Provider::Claude37)
    }

    async fn generate(
        &self,
        slot: &RunSlot,
        id: RunId,
        deadline: Instant,
    ) -> Result<WorkflowState, WorkflowError> {
        let (outline, template, provider) = {
            let run = slot.run.lock().await;
            let outline = run
                .outline
                .clone()
                .ok_or(WorkflowError::MissingInput(id, "approved outline"))?;
            (outline, self.template_for(&run)?, self.generation_provider(&run))
        };

        let results = if self.inner.settings.ai_generation {
            info!(run_id = %id, %provider, sections = outline.sections.len(), "Generating slide content");
            self.generate_sections(slot, id, provider, &outline, &template, deadline)
                .await?
        } else {
            info!(run_id = %id, sections = outline.sections.len(), "Building slides from the outline");
            outline
                .sections
                .iter()
                .map(|section| SectionResult::Content(vec![outline_slide(section)]))
                .collect()
        };

        let mut run = self.relock(slot, id, WorkflowState::Generating).await?;
        let all_failed = results
            .iter()
            .all(|result| matches!(result, SectionResult::Failed(_)));
        let mut contents = Vec::new();
        for (section, result) in outline.sections.iter().zip(results) {
            match result {
                SectionResult::Content(slides) => contents.extend(slides),
                SectionResult::Failed(error) => {
                    run.record_error(error);
                    if !all_failed {
                        warn!(run_id = %id, section = %section.heading, "Using outline points for failed section");
                        contents.push(outline_slide(section));
                    }
                }
            }
        }

        if contents.is_empty() {
            return Ok(self
                .fail_stage(&mut run, Stage::Generating, "no section produced slide content")
                .await);
        }

        run.contents = contents;
        transition(&mut run.state, WorkflowState::Formatting)?;
        run.touch();
        self.persist(&run).await;
        drop(run);

        self.format(slot, id, &outline, &template, deadline).await
    }

    /// One call per section, then a single retry for sections that came back
    /// without bullets. Both rounds share `deadline`.
    async fn generate_sections(
        &self,
        slot: &RunSlot,
        id: RunId,
        provider: Provider,
        outline: &Outline,
        template: &Template,
        deadline: Instant,
    ) -> Result<Vec<SectionResult>, WorkflowError> {
        let requests: Vec<ModelRequest> = outline
            .sections
            .iter()
            .map(|section| {
                self.text_request(
                    provider,
                    prompts::section(outline, section, template),
                    prompts::SLIDES_SYSTEM,
                )
            })
            .collect();
        let control = self.control(slot, JoinPolicy::All, deadline);
        let responses = match self.inner.adapter.invoke_many_controlled(requests, control).await {
            FanOut::Completed(responses) => responses,
            FanOut::Cancelled => return Err(WorkflowError::Cancelled(id)),
        };

        let mut results: Vec<SectionResult> = outline
            .sections
            .iter()
            .zip(responses.iter())
            .map(|(section, response)| section_result(section, provider, response.as_ref()))
            .collect();

        let empty: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, result)| matches!(result, SectionResult::Content(slides) if bullet_count(slides) == 0))
            .map(|(index, _)| index)
            .collect();
        if empty.is_empty() {
            return Ok(results);
        }

        debug!(run_id = %id, sections = ?empty, "Retrying sections with no bullets");
        let retries: Vec<ModelRequest> = empty
            .iter()
            .map(|index| {
                self.text_request(
                    provider,
                    prompts::section_retry(&outline.sections[*index]),
                    prompts::SLIDES_SYSTEM,
                )
            })
            .collect();
        let control = self.control(slot, JoinPolicy::All, deadline);
        let retried = match self.inner.adapter.invoke_many_controlled(retries, control).await {
            FanOut::Completed(responses) => responses,
            FanOut::Cancelled => return Err(WorkflowError::Cancelled(id)),
        };
        for (index, response) in empty.into_iter().zip(retried.iter()) {
            if let SectionResult::Content(slides) =
                section_result(&outline.sections[index], provider, response.as_ref())
                && bullet_count(&slides) > 0
            {
                results[index] = SectionResult::Content(slides);
            }
        }
        Ok(results)
    }

    async fn format(
        &self,
        slot: &RunSlot,
        id: RunId,
        outline: &Outline,
        template: &Template,
        deadline: Instant,
    ) -> Result<WorkflowState, WorkflowError> {
        let mut run = self.relock(slot, id, WorkflowState::Formatting).await?;
        let mut deck = match deck::generate(outline, &run.contents, template) {
            Ok(deck) => deck,
            Err(e) => {
                error!(run_id = %id, "Deck failed validation: {}", e);
                run.record_error(
                    StageError::new(Stage::Formatting, ErrorKind::Validation, e.to_string()).fatal(),
                );
                self.persist(&run).await;
                return Err(WorkflowError::Validation(e));
            }
        };
        let key_points: Vec<String> = if run.merged_points.is_empty() {
            outline
                .sections
                .iter()
                .map(|section| section.heading.clone())
                .collect()
        } else {
            run.merged_points.clone()
        };
        drop(run);

        let thumbnail = self
            .thumbnail(slot, id, &deck.title, &key_points, deadline)
            .await?;

        let mut run = self.relock(slot, id, WorkflowState::Formatting).await?;
        match thumbnail {
            Some(Ok(image_ref)) => deck.thumbnail_image_ref = Some(image_ref),
            Some(Err(error)) => run.record_error(error),
            None => {}
        }
        info!(run_id = %id, slides = deck.slide_count(), template = %template.name, "Deck ready for export");
        run.deck = Some(deck);
        transition(&mut run.state, WorkflowState::ExportReady)?;
        run.touch();
        self.persist(&run).await;
        Ok(run.state)
    }

    /// `None` when thumbnails are disabled. A failure never invalidates the deck.
    async fn thumbnail(
        &self,
        slot: &RunSlot,
        id: RunId,
        title: &str,
        key_points: &[String],
        deadline: Instant,
    ) -> Result<Option<Result<String, StageError>>, WorkflowError> {
        let settings = &self.inner.settings.thumbnail;
        if !settings.enabled {
            return Ok(None);
        }
        let provider = settings.provider;
        if !self.inner.adapter.supports_images(provider) {
            return Ok(Some(Err(StageError::new(
                Stage::Thumbnail,
                ErrorKind::Provider,
                "provider cannot generate images",
            )
            .for_provider(provider))));
        }

        let request = ModelRequest::image(
            provider,
            prompts::thumbnail(title, key_points),
            &settings.size,
            &settings.quality,
        );
        let control = self.control(slot, JoinPolicy::All, deadline);
        let response = match self.inner.adapter.invoke_many_controlled(vec![request], control).await {
            FanOut::Completed(mut responses) => responses.pop().flatten(),
            FanOut::Cancelled => return Err(WorkflowError::Cancelled(id)),
        };

        Ok(Some(match response {
            Some(response) if response.is_ok() && !response.raw_text.trim().is_empty() => {
                debug!(run_id = %id, "Thumbnail generated");
                Ok(response.raw_text.trim().to_string())
            }
            Some(response) => Err(StageError::new(
                Stage::Thumbnail,
                ErrorKind::Provider,
                response.cause.unwrap_or_else(|| "empty image reference".to_string()),
            )
            .for_provider(provider)),
            None => Err(StageError::new(Stage::Thumbnail, ErrorKind::Provider, "no response")
                .for_provider(provider)),
        }))
    }

    async fn fail_stage(&self, run: &mut WorkflowRun, stage: Stage, reason: &str) -> WorkflowState {
        error!(run_id = %run.id, %stage, "{}", reason);
        run.record_error(StageError::new(stage, ErrorKind::Provider, reason).fatal());
        if let Err(e) = transition(&mut run.state, WorkflowState::Failed(stage)) {
            warn!(run_id = %run.id, "{}", e);
        }
        run.touch();
        self.persist(run).await;
        run.state
    }

    /// Re-run brainstorming (from `AwaitingReview`) or generation (from
    /// `Formatting`/`ExportReady`), or retry a failed stage. Stale data for
    /// that stage is discarded; superseded decks move to `previous_decks`.
    pub async fn regenerate(&self, id: RunId, stage: Stage) -> Result<WorkflowState, WorkflowError> {
        let slot = self.slot(id)?;
        let _stage = slot.stage_lock.lock().await;
        {
            let mut run = slot.run.lock().await;
            if regeneration_stage(run.state) != Some(stage) {
                return Err(WorkflowError::InvalidRegeneration {
                    stage,
                    state: run.state,
                });
            }
            info!(run_id = %id, %stage, from = %run.state, "Regenerating");

            match stage {
                Stage::Brainstorming => {
                    transition(&mut run.state, WorkflowState::Brainstorming)?;
                    run.candidates = BTreeMap::new();
                    run.merged_points.clear();
                    run.draft_outline = None;
                }
                _ => {
                    transition(&mut run.state, WorkflowState::Generating)?;
                    if let Some(previous) = run.deck.take() {
                        run.previous_decks.push(previous);
                    }
                    run.contents.clear();
                    run.export = None;
                }
            }
            run.touch();
            self.persist(&run).await;
        }

        let deadline = self.stage_deadline();
        match stage {
            Stage::Brainstorming => self.brainstorm(&slot, id, deadline).await,
            _ => self.generate(&slot, id, deadline).await,
        }
    }

    /// Cancel whatever the run is doing and mark it `Abandoned`. In-flight
    /// provider calls are dropped; late results are discarded.
    pub async fn abandon(&self, id: RunId) -> Result<(), WorkflowError> {
        let slot = self.slot(id)?;
        let mut run = slot.run.lock().await;
        transition(&mut run.state, WorkflowState::Abandoned)?;
        slot.cancel.send_replace(true);
        run.touch();
        info!(run_id = %id, "Run abandoned");
        self.persist(&run).await;
        Ok(())
    }

    /// Hand the deck to `exporter`. Success moves the run to `Exported`; a
    /// failure is recorded and the run stays `ExportReady` for a retry.
    pub async fn export_deck(
        &self,
        id: RunId,
        format: ExportFormat,
        exporter: &dyn DeckExporter,
    ) -> Result<ExportReceipt, WorkflowError> {
        let slot = self.slot(id)?;
        let _stage = slot.stage_lock.lock().await;
        let deck = {
            let run = slot.run.lock().await;
            if run.state != WorkflowState::ExportReady {
                return Err(WorkflowError::InvalidTransition {
                    from: run.state,
                    to: WorkflowState::Exported,
                });
            }
            run.deck.clone().ok_or(WorkflowError::MissingInput(id, "deck"))?
        };

        info!(run_id = %id, %format, exporter = exporter.name(), "Exporting deck");
        let result = exporter.export(&deck, format).await;

        let mut run = self.relock(&slot, id, WorkflowState::ExportReady).await?;
        match result {
            Ok(receipt) => {
                run.export = Some(receipt.clone());
                transition(&mut run.state, WorkflowState::Exported)?;
                run.touch();
                self.persist(&run).await;
                info!(run_id = %id, handle = %receipt.handle, "Deck exported");
                Ok(receipt)
            }
            Err(e) => {
                run.record_error(StageError::new(Stage::Export, ErrorKind::Export, e.to_string()));
                self.persist(&run).await;
                Err(WorkflowError::Export(e))
            }
        }
    }

    /// A copy of the run as it is right now.
    pub async fn get(&self, id: RunId) -> Result<WorkflowRun, WorkflowError> {
        let slot = self.slot(id)?;
        let run = slot.run.lock().await;
        Ok(run.clone())
    }

    pub async fn state(&self, id: RunId) -> Result<WorkflowState, WorkflowError> {
        let slot = self.slot(id)?;
        let run = slot.run.lock().await;
        Ok(run.state)
    }

    pub fn run_ids(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self.inner.runs.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Drop a finished run from memory. Its snapshot, if any, stays on disk.
    pub async fn archive(&self, id: RunId) -> Result<WorkflowRun, WorkflowError> {
        let run = self.get(id).await?;
        if !run.state.is_terminal() {
            return Err(WorkflowError::InvalidTransition {
                from: run.state,
                to: WorkflowState::Abandoned,
            });
        }
        self.inner.runs.remove(&id);
        Ok(run)
    }

    /// Write the run's snapshot now, regardless of `persist_runs`.
    pub async fn snapshot(&self, id: RunId, store: &RunStore) -> Result<std::path::PathBuf, WorkflowError> {
        let run = self.get(id).await?;
        store
            .save(&run)
            .await
            .map_err(|e| WorkflowError::Persistence(format!("{:#}", e)))
    }

    /// Load a snapshot back into the engine. Runs captured mid-stage come
    /// back in their last stable state.
    pub async fn restore(&self, id: RunId, store: &RunStore) -> Result<WorkflowState, WorkflowError> {
        let run = store
            .load(id)
            .await
            .map_err(|e| WorkflowError::Persistence(format!("{:#}", e)))?;
        let state = run.state;
        info!(run_id = %id, %state, "Restored run");
        self.inner.runs.insert(id, RunSlot::new(run));
        Ok(state)
    }
}

fn bullet_count(slides: &[SlideContent]) -> usize {
    slides.iter().map(|slide| slide.bullets.len()).sum()
}

/// The slide a section gets when no generated content is available.
fn outline_slide(section: &OutlineSection) -> SlideContent {
    SlideContent::new(section.heading.clone(), section.points.clone())
}

fn section_result(
    section: &OutlineSection,
    provider: Provider,
    response: Option<&ModelResponse>,
) -> SectionResult {
    let Some(response) = response else {
        return SectionResult::Failed(
            StageError::new(Stage::Generating, ErrorKind::Provider, "no response")
                .for_provider(provider),
        );
    };
    match parser::parse_slide_content(response) {
        Ok(mut slides) => {
            for slide in &mut slides {
                if slide.heading.trim().is_empty() {
                    slide.heading = section.heading.clone();
                }
            }
            SectionResult::Content(slides)
        }
        Err(e) => SectionResult::Failed(response_error(Stage::Generating, response, &e)),
    }
}

/// Attribute a failed or unparsable response. Non-`Ok` responses are
/// provider errors carrying the adapter's cause; the rest are parse errors.
fn response_error(stage: Stage, response: &ModelResponse, error: &ParseError) -> StageError {
    let (kind, message) = if response.is_ok() {
        (ErrorKind::Parse, error.to_string())
    } else {
        (
            ErrorKind::Provider,
            format!(
                "{:?}: {}",
                response.status,
                response.cause.as_deref().unwrap_or("no cause recorded")
            ),
        )
    };
    StageError::new(stage, kind, message).for_provider(response.provider)
}
