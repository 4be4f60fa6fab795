//! Configuration model, validation and discovery.
//!
//! Discovery hierarchy, first match wins:
//! 1. Current directory: `./slidesmith.toml` or `./.slidesmith/config.toml`
//! 2. User config: `~/.slidesmith/config.toml`
//! 3. System config: `/etc/slidesmith/config.toml`
//! 4. Built-in defaults
//!
//! API keys are never read from these files; each provider names the
//! environment variable its key comes from.

use crate::deck::{DEFAULT_TEMPLATE, Template, TemplateRegistry};
use crate::env;
use crate::llm::{InteractionLogConfig, JoinPolicy, Provider, ProviderConfig, RateLimitConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid TOML in {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Per-provider settings, one table per provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub claude_v1: ProviderConfig,
    pub claude_37: ProviderConfig,
    pub gpt4: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            claude_v1: ProviderConfig::for_provider(Provider::ClaudeV1),
            claude_37: ProviderConfig::for_provider(Provider::Claude37),
            gpt4: ProviderConfig::for_provider(Provider::Gpt4),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, provider: Provider) -> &ProviderConfig {
        match provider {
            Provider::ClaudeV1 => &self.claude_v1,
            Provider::Claude37 => &self.claude_37,
            Provider::Gpt4 => &self.gpt4,
        }
    }

    pub fn get_mut(&mut self, provider: Provider) -> &mut ProviderConfig {
        match provider {
            Provider::ClaudeV1 => &mut self.claude_v1,
            Provider::Claude37 => &mut self.claude_37,
            Provider::Gpt4 => &mut self.gpt4,
        }
    }

    fn fill_defaults(&mut self) {
        for provider in Provider::ALL {
            self.get_mut(provider).fill_defaults(provider);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailSettings {
    pub enabled: bool,
    /// Must be an image-capable provider.
    pub provider: Provider,
    pub size: String,
    pub quality: String,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: Provider::Gpt4,
            size: "1792x1024".to_string(),
            quality: "hd".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Merge order for candidates; also orders the selected providers.
    pub provider_priority: Vec<Provider>,
    /// Providers used when a run does not name any.
    pub default_providers: Vec<Provider>,
    /// Bound on a whole stage (every fan-out in it), independent of per-call timeouts.
    pub stage_timeout_secs: u64,
    pub join_policy: JoinPolicy,
    /// Expands outline sections into slides; defaults to the first selected provider.
    pub generation_provider: Option<Provider>,
    /// Structures merged points into a draft outline; unset means the deterministic draft.
    pub outline_provider: Option<Provider>,
    /// When off, slides are built straight from the approved outline.
    pub ai_generation: bool,
    pub thumbnail: ThumbnailSettings,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            provider_priority: Provider::ALL.to_vec(),
            default_providers: vec![Provider::Claude37, Provider::Gpt4],
            stage_timeout_secs: 120,
            join_policy: JoinPolicy::All,
            generation_provider: None,
            outline_provider: None,
            ai_generation: true,
            thumbnail: ThumbnailSettings::default(),
        }
    }
}

impl WorkflowSettings {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub workspace_path: Option<PathBuf>,
    pub default_template: String,
    /// Snapshot runs to `.slidesmith/runs/` after every transition.
    pub persist_runs: bool,
    pub providers: ProvidersConfig,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimitConfig,
    pub workflow: WorkflowSettings,
    pub logging: InteractionLogConfig,
    /// Extra templates; a name matching a built-in replaces it.
    pub templates: Vec<Template>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace_path: None,
            default_template: DEFAULT_TEMPLATE.to_string(),
            persist_runs: true,
            providers: ProvidersConfig::default(),
            retry: RetryPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            workflow: WorkflowSettings::default(),
            logging: InteractionLogConfig::default(),
            templates: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        config.providers.fill_defaults();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workflow.provider_priority.is_empty() {
            return Err(ConfigError::Invalid(
                "workflow.provider_priority must name at least one provider".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.workflow.stage_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "workflow.stage_timeout_secs must be positive".to_string(),
            ));
        }
        if let JoinPolicy::FirstSuccesses(0) = self.workflow.join_policy {
            return Err(ConfigError::Invalid(
                "workflow.join_policy first_successes must be at least 1".to_string(),
            ));
        }

        let registry = self.template_registry()?;
        if registry.get(&self.default_template).is_none() {
            return Err(ConfigError::Invalid(format!(
                "default_template '{}' is not defined",
                self.default_template
            )));
        }
        Ok(())
    }

    pub fn template_registry(&self) -> Result<TemplateRegistry, ConfigError> {
        TemplateRegistry::with_templates(&self.templates)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Workspace override, then the configured path, then the current directory.
    pub fn resolve_workspace(&self, workspace_override: Option<PathBuf>) -> PathBuf {
        workspace_override
            .or_else(|| self.workspace_path.clone())
            .unwrap_or_else(|| std_env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load the first config file in the hierarchy, or defaults.
    pub fn discover_config() -> Result<(AppConfig, Option<PathBuf>), ConfigError> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            let config = AppConfig::from_toml_file(&config_path)?;
            return Ok((config, Some(config_path)));
        }

        info!("No configuration file found, using defaults");
        Ok((AppConfig::default(), None))
    }

    pub fn find_config_file() -> Option<PathBuf> {
        Self::config_candidates().into_iter().find(|candidate| {
            debug!("Checking for config file: {:?}", candidate);
            candidate.is_file()
        })
    }

    /// Candidate paths in priority order.
    pub fn config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(env::project_config_file_path(&current_dir));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_PATH));

        candidates
    }

    fn home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Write a default config to `~/.slidesmith/config.toml` unless one exists.
    pub fn create_default_user_config() -> Result<PathBuf, ConfigError> {
        let home_dir = Self::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Self::create_default_config_at(&env::user_config_file_path(&home_dir))
    }

    pub fn create_default_config_at(config_path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(config_dir) = config_path.parent()
            && !config_dir.exists()
        {
            fs::create_dir_all(config_dir).map_err(|source| ConfigError::Io {
                path: config_dir.to_path_buf(),
                source,
            })?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if config_path.exists() {
            warn!("Configuration file already exists: {:?}", config_path);
        } else {
            AppConfig::default().to_toml_file(config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        }

        Ok(config_path.to_path_buf())
    }

    /// Each candidate with whether it exists, for `show-config`.
    pub fn discovery_report() -> Vec<(PathBuf, bool)> {
        Self::config_candidates()
            .into_iter()
            .map(|candidate| {
                let exists = candidate.is_file();
                (candidate, exists)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.rate_limit.min_interval_ms, 500);
        assert_eq!(config.providers.get(Provider::ClaudeV1).model, "claude-3-opus-20240229");
        assert_eq!(config.workflow.provider_priority[0], Provider::Claude37);
    }

    #[test]
    fn test_partial_provider_table_keeps_provider_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [providers.gpt4]
            timeout_secs = 10
            "#,
            Path::new("inline"),
        )
        .unwrap();
        assert_eq!(config.providers.gpt4.model, "gpt-4-turbo");
        assert_eq!(config.providers.gpt4.timeout_secs, 10);
        assert_eq!(config.providers.claude_37.timeout_secs, 25);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_toml_str("[retry]\nmax_attempts = 0\n", Path::new("inline"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = AppConfig::from_toml_str("default_template = \"nope\"\n", Path::new("inline"))
            .unwrap_err();
        assert!(err.to_string().contains("nope"));

        let err = AppConfig::from_toml_str("[workflow]\nprovider_priority = []\n", Path::new("inline"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_toml_roundtrip_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.workflow.join_policy = JoinPolicy::FirstSuccesses(1);
        config.workflow.outline_provider = Some(Provider::Claude37);
        config.to_toml_file(&path).unwrap();

        let loaded = AppConfig::from_toml_file(&path).unwrap();
        assert_eq!(loaded.workflow.join_policy, JoinPolicy::FirstSuccesses(1));
        assert_eq!(loaded.workflow.outline_provider, Some(Provider::Claude37));
    }

    #[test]
    fn test_create_default_config_at_does_not_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        ConfigDiscovery::create_default_config_at(&path).unwrap();
        assert!(path.exists());

        fs::write(&path, "persist_runs = false\n").unwrap();
        ConfigDiscovery::create_default_config_at(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "persist_runs = false\n");
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = AppConfig::default();
        config.providers.gpt4.api_key = Some("sk-secret".to_string());
        assert!(!config.to_toml_string().unwrap().contains("sk-secret"));
    }
}
