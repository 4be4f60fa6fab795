//! Command line argument parsing
//!
//! Subcommands:
//! - `generate`: Run the whole pipeline for one topic
//! - `show`: Show a saved run
//! - `list`: List saved runs
//! - `templates`: List available deck templates
//! - `show-config`: Show configuration discovery information
//! - `init-config`: Write a default user configuration file

use crate::deck::ExportFormat;
use crate::llm::Provider;
use crate::workflow::{Idea, RunId};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Generate(GenerateConfig),
    Show {
        run_id: RunId,
        workspace_override: Option<PathBuf>,
    },
    List {
        workspace_override: Option<PathBuf>,
    },
    Templates {
        config_override: Option<PathBuf>,
    },
    ShowConfig,
    InitConfig,
}

#[derive(Debug)]
pub struct GenerateConfig {
    pub idea: Idea,
    pub providers: Vec<Provider>,
    pub template: Option<String>,
    /// Approve the draft outline without prompting.
    pub assume_yes: bool,
    pub export: Option<ExportFormat>,
    pub out_dir: Option<PathBuf>,
    pub config_override: Option<PathBuf>,
    pub workspace_override: Option<PathBuf>,
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(name = "slidesmith")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Turn a topic into a formatted slide deck with multiple LLM providers")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Brainstorm, outline, generate and format a deck for a topic
    Generate {
        /// Presentation topic
        topic: String,
        /// Constraints the content must respect
        #[arg(long)]
        constraints: Option<String>,
        /// Intended audience
        #[arg(long)]
        audience: Option<String>,
        /// Provider to brainstorm with (repeatable: claude-v1, claude-37, gpt4)
        #[arg(short = 'p', long = "provider", value_name = "PROVIDER")]
        providers: Vec<Provider>,
        /// Deck template name
        #[arg(short = 't', long)]
        template: Option<String>,
        /// Approve the draft outline without asking
        #[arg(short = 'y', long = "yes")]
        yes: bool,
        /// Export the finished deck (google-slides or power-point)
        #[arg(short = 'e', long, value_name = "FORMAT")]
        export: Option<ExportFormat>,
        /// Directory for export hand-off files
        #[arg(short = 'o', long = "out", value_name = "DIR")]
        out: Option<PathBuf>,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Workspace directory
        #[arg(short = 'w', long = "workspace")]
        workspace: Option<PathBuf>,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Show a saved run
    Show {
        run_id: RunId,
        /// Workspace directory
        #[arg(short = 'w', long = "workspace")]
        workspace: Option<PathBuf>,
    },
    /// List saved runs
    List {
        /// Workspace directory
        #[arg(short = 'w', long = "workspace")]
        workspace: Option<PathBuf>,
    },
    /// List available deck templates
    Templates {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
    /// Show configuration discovery information
    ShowConfig,
    /// Write a default configuration to ~/.slidesmith/config.toml
    InitConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Generate {
                topic,
                constraints,
                audience,
                providers,
                template,
                yes,
                export,
                out,
                config,
                workspace,
                verbose,
            }) => {
                if topic.trim().is_empty() {
                    return Err("Topic must not be empty".to_string());
                }
                let mut idea = Idea::new(topic.trim());
                if let Some(constraints) = constraints {
                    idea = idea.with_constraints(constraints.clone());
                }
                if let Some(audience) = audience {
                    idea = idea.with_audience(audience.clone());
                }

                Ok(ExecutionMode::Generate(GenerateConfig {
                    idea,
                    providers: providers.clone(),
                    template: template.clone(),
                    assume_yes: *yes,
                    export: *export,
                    out_dir: out.clone(),
                    config_override: config.clone(),
                    workspace_override: workspace.clone(),
                    verbose: *verbose,
                }))
            }
            Some(Commands::Show { run_id, workspace }) => Ok(ExecutionMode::Show {
                run_id: *run_id,
                workspace_override: workspace.clone(),
            }),
            Some(Commands::List { workspace }) => Ok(ExecutionMode::List {
                workspace_override: workspace.clone(),
            }),
            Some(Commands::Templates { config }) => Ok(ExecutionMode::Templates {
                config_override: config.clone(),
            }),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            Some(Commands::InitConfig) => Ok(ExecutionMode::InitConfig),
            None => Err(
                "No command specified. Use 'slidesmith --help' to see available commands."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_generate_command() {
        let args = parse(&[
            "slidesmith",
            "generate",
            "Intro to Rust",
            "--audience",
            "C++ developers",
            "-p",
            "claude-37",
            "-p",
            "gpt4",
            "--export",
            "power-point",
            "-y",
        ]);
        let mode = args.mode().unwrap();

        if let ExecutionMode::Generate(config) = mode {
            assert_eq!(config.idea.topic, "Intro to Rust");
            assert_eq!(config.idea.audience.as_deref(), Some("C++ developers"));
            assert_eq!(config.providers, vec![Provider::Claude37, Provider::Gpt4]);
            assert_eq!(config.export, Some(ExportFormat::PowerPoint));
            assert!(config.assume_yes);
            assert!(config.template.is_none());
        } else {
            panic!("Expected Generate mode");
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(Args::try_parse_from(["slidesmith", "generate", "Rust", "-p", "llama"]).is_err());
    }

    #[test]
    fn test_blank_topic_rejected() {
        let args = parse(&["slidesmith", "generate", "   "]);
        assert!(args.mode().is_err());
    }

    #[test]
    fn test_show_requires_uuid() {
        assert!(Args::try_parse_from(["slidesmith", "show", "not-a-uuid"]).is_err());

        let id = uuid::Uuid::new_v4().to_string();
        let args = parse(&["slidesmith", "show", &id, "-w", "/tmp/ws"]);
        assert!(matches!(
            args.mode().unwrap(),
            ExecutionMode::Show { workspace_override: Some(_), .. }
        ));
    }

    #[test]
    fn test_simple_commands() {
        assert!(matches!(
            parse(&["slidesmith", "show-config"]).mode().unwrap(),
            ExecutionMode::ShowConfig
        ));
        assert!(matches!(
            parse(&["slidesmith", "init-config"]).mode().unwrap(),
            ExecutionMode::InitConfig
        ));
        assert!(matches!(
            parse(&["slidesmith", "list"]).mode().unwrap(),
            ExecutionMode::List { workspace_override: None }
        ));
    }

    #[test]
    fn test_no_command_error() {
        let args = Args { command: None };
        assert!(args.mode().is_err());
    }
}
