use anyhow::{Context, Result};
use slidesmith::cli::review::{prompt, settle};
use slidesmith::cli::{Args, ExecutionMode, GenerateConfig, render};
use slidesmith::config::{AppConfig, ConfigDiscovery};
use slidesmith::deck::JsonHandoffExporter;
use slidesmith::env;
use slidesmith::llm::ProviderAdapter;
use slidesmith::workflow::{
    RunId, RunStore, Stage, WorkflowEngine, WorkflowError, WorkflowState,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let verbose = matches!(&mode, ExecutionMode::Generate(config) if config.verbose);
    init_logging(verbose);

    match mode {
        ExecutionMode::Generate(config) => run_generate(config).await,
        ExecutionMode::Show {
            run_id,
            workspace_override,
        } => show_run(run_id, workspace_override).await,
        ExecutionMode::List { workspace_override } => list_runs(workspace_override).await,
        ExecutionMode::Templates { config_override } => {
            let config = load_config(config_override.as_deref())?;
            let registry = config.template_registry()?;
            print!("{}", render::templates(registry.iter(), &config.default_template));
            Ok(())
        }
        ExecutionMode::ShowConfig => {
            print!("{}", render::discovery(&ConfigDiscovery::discovery_report()));
            Ok(())
        }
        ExecutionMode::InitConfig => {
            let path = ConfigDiscovery::create_default_user_config()?;
            println!("✅ Configuration written to {}", path.display());
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("slidesmith=debug")
        } else {
            EnvFilter::new(env::DEFAULT_LOG_FILTER)
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(config_override: Option<&Path>) -> Result<AppConfig> {
    match config_override {
        Some(path) => {
            info!("Loading configuration override from: {:?}", path);
            AppConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        }
        None => {
            let (config, _) = ConfigDiscovery::discover_config()?;
            Ok(config)
        }
    }
}

async fn run_generate(config: GenerateConfig) -> Result<()> {
    let app_config = load_config(config.config_override.as_deref())?;
    let workspace = app_config.resolve_workspace(config.workspace_override.clone());
    info!("Using workspace: {}", workspace.display());

    let adapter = ProviderAdapter::from_config(&app_config, &workspace)
        .await
        .context("Failed to initialize provider adapter")?;
    let configured = adapter.configured_providers();
    if configured.is_empty() {
        warn!("No provider has an API key; every call will fail");
    }

    let store = app_config
        .persist_runs
        .then(|| RunStore::new(workspace.clone()));
    let engine = WorkflowEngine::from_config(&app_config, Arc::new(adapter), store)?;

    let run_id = engine
        .create_run(
            config.idea.clone(),
            &config.providers,
            config.template.as_deref(),
        )
        .await?;
    println!("🚀 Run {} started", run_id);

    let (interrupt_tx, mut interrupted) = watch::channel(false);
    {
        let engine = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, abandoning run {}", run_id);
                if let Err(e) = engine.abandon(run_id).await {
                    error!("Failed to abandon run: {}", e);
                }
                interrupt_tx.send_replace(true);
            }
        });
    }

    settle(run_id, engine.run_brainstorming(run_id).await)?;

    // Outline review. The state is re-read every round; Ctrl-C may have
    // abandoned the run while we were waiting on the user.
    loop {
        let run = engine.get(run_id).await?;
        for error in &run.errors {
            println!("⚠️  {}", error);
        }

        match run.state {
            WorkflowState::AwaitingReview => {
                if let Some(draft) = &run.draft_outline {
                    println!("\n{}", render::outline(draft));
                }
                if config.assume_yes {
                    settle(run_id, engine.approve_draft(run_id).await)?;
                    break;
                }
                let Some(choice) =
                    prompt("[a]pprove, [e]dit from file, [r]egenerate, [q]uit", &mut interrupted).await?
                else {
                    exit_abandoned(run_id);
                };
                match choice.to_lowercase().as_str() {
                    "a" | "approve" => {
                        settle(run_id, engine.approve_draft(run_id).await)?;
                        break;
                    }
                    "e" | "edit" => {
                        let Some(path) = prompt("Path to outline markdown", &mut interrupted).await? else {
                            exit_abandoned(run_id);
                        };
                        let text = match std::fs::read_to_string(&path) {
                            Ok(text) => text,
                            Err(e) => {
                                println!("❌ Cannot read {}: {}", path, e);
                                continue;
                            }
                        };
                        match engine.approve_outline_text(run_id, &text).await {
                            Err(WorkflowError::Parse(e)) => println!("❌ {}", e),
                            Err(WorkflowError::InvalidOutline(e)) => println!("❌ {}", e),
                            result => {
                                settle(run_id, result)?;
                                break;
                            }
                        }
                    }
                    "r" | "regenerate" => {
                        settle(run_id, engine.regenerate(run_id, Stage::Brainstorming).await)?;
                    }
                    "q" | "quit" => {
                        if let Err(e) = engine.abandon(run_id).await {
                            warn!("{}", e);
                        }
                        return report_abandoned(run_id);
                    }
                    other => println!("Unknown choice: {}", other),
                }
            }
            WorkflowState::Failed(Stage::Brainstorming) => {
                println!("❌ Brainstorming failed for every provider");
                if config.assume_yes {
                    return Ok(());
                }
                match prompt("[r]etry or [q]uit", &mut interrupted).await? {
                    Some(choice) if choice.eq_ignore_ascii_case("r") => {
                        settle(run_id, engine.regenerate(run_id, Stage::Brainstorming).await)?;
                    }
                    Some(_) => return Ok(()),
                    None => exit_abandoned(run_id),
                }
            }
            WorkflowState::Abandoned => return report_abandoned(run_id),
            other => anyhow::bail!("Unexpected state after brainstorming: {}", other),
        }
    }

    // Deck review.
    loop {
        let run = engine.get(run_id).await?;
        match run.state {
            WorkflowState::ExportReady => {
                if let Some(deck) = &run.deck {
                    println!("\n{}", render::deck(deck));
                }
                if config.assume_yes {
                    break;
                }
                let Some(choice) = prompt("[a]ccept, [r]egenerate slides, [q]uit", &mut interrupted).await? else {
                    exit_abandoned(run_id);
                };
                match choice.to_lowercase().as_str() {
                    "a" | "accept" => break,
                    "r" | "regenerate" => regenerate_slides(&engine, run_id).await?,
                    "q" | "quit" => return Ok(()),
                    other => println!("Unknown choice: {}", other),
                }
            }
            WorkflowState::Formatting | WorkflowState::Failed(_) => {
                for error in run.errors.iter().filter(|e| e.fatal) {
                    println!("❌ {}", error);
                }
                if config.assume_yes {
                    return Ok(());
                }
                match prompt("[r]egenerate slides or [q]uit", &mut interrupted).await? {
                    Some(choice) if choice.eq_ignore_ascii_case("r") => {
                        regenerate_slides(&engine, run_id).await?
                    }
                    Some(_) => return Ok(()),
                    None => exit_abandoned(run_id),
                }
            }
            WorkflowState::Abandoned => return report_abandoned(run_id),
            other => anyhow::bail!("Unexpected state after generation: {}", other),
        }
    }

    if let Some(format) = config.export {
        let out_dir = config
            .out_dir
            .clone()
            .unwrap_or_else(|| env::exports_dir(&workspace));
        let exporter = JsonHandoffExporter::new(out_dir);
        match engine.export_deck(run_id, format, &exporter).await {
            Ok(receipt) => println!("✅ Exported {} hand-off: {}", receipt.format, receipt.handle),
            Err(e) => {
                println!("❌ {}", e);
                println!("   The deck is still export-ready; run again to retry.");
            }
        }
    }

    println!("📁 Run {} finished in state: {}", run_id, engine.state(run_id).await?);
    Ok(())
}

async fn regenerate_slides(engine: &WorkflowEngine, run_id: RunId) -> Result<()> {
    let result = engine.regenerate(run_id, Stage::Generating).await;
    Ok(settle(run_id, result)?)
}

fn report_abandoned(run_id: RunId) -> Result<()> {
    println!("🚫 Run {} abandoned", run_id);
    Ok(())
}

/// Interrupted at a prompt. The stdin reader is still blocked on its thread
/// and the runtime would wait for it on shutdown, so exit directly.
fn exit_abandoned(run_id: RunId) -> ! {
    println!();
    let _ = report_abandoned(run_id);
    std::process::exit(130);
}

async fn show_run(run_id: RunId, workspace_override: Option<PathBuf>) -> Result<()> {
    let workspace = workspace_or_config(workspace_override)?;
    let run = RunStore::new(workspace).load(run_id).await?;
    print!("{}", render::run_summary(&run));
    if let Some(deck) = &run.deck {
        println!("\n{}", render::deck(deck));
    } else if let Some(outline) = run.outline.as_ref().or(run.draft_outline.as_ref()) {
        println!("\n{}", render::outline(outline));
    }
    Ok(())
}

async fn list_runs(workspace_override: Option<PathBuf>) -> Result<()> {
    let store = RunStore::new(workspace_or_config(workspace_override)?);
    let ids = store.list().await?;
    if ids.is_empty() {
        println!("No saved runs in {}", store.runs_dir().display());
        return Ok(());
    }
    for id in ids {
        match store.load(id).await {
            Ok(run) => println!("{}", render::run_line(&run)),
            Err(e) => warn!("Skipping run {}: {:#}", id, e),
        }
    }
    Ok(())
}

fn workspace_or_config(workspace_override: Option<PathBuf>) -> Result<PathBuf> {
    let config = load_config(None)?;
    Ok(config.resolve_workspace(workspace_override))
}
