//! Path constants and helpers for slidesmith's on-disk layout.
//!
//! ```text
//! <workspace>/
//!   slidesmith.toml                 project config (highest priority)
//!   .slidesmith/
//!     config.toml                   local config
//!     runs/<run-id>.json            run snapshots
//!     logs/<provider>-interactions.jsonl
//!     exports/                      export hand-offs
//! ```

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const APP_DIR_NAME: &str = ".slidesmith";

/// Configuration file name inside an application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Project-level configuration file at the workspace root
pub const PROJECT_CONFIG_FILE_NAME: &str = "slidesmith.toml";

/// System-wide configuration file
pub const SYSTEM_CONFIG_PATH: &str = "/etc/slidesmith/config.toml";

pub const RUNS_DIR_NAME: &str = "runs";
pub const LOGS_DIR_NAME: &str = "logs";
pub const EXPORTS_DIR_NAME: &str = "exports";

/// Default tracing filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "slidesmith=info";

pub fn app_dir_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(APP_DIR_NAME)
}

pub fn runs_dir(workspace_root: &Path) -> PathBuf {
    app_dir_path(workspace_root).join(RUNS_DIR_NAME)
}

pub fn run_snapshot_path(workspace_root: &Path, run_id: &str) -> PathBuf {
    runs_dir(workspace_root).join(format!("{}.json", run_id))
}

pub fn logs_dir(workspace_root: &Path) -> PathBuf {
    app_dir_path(workspace_root).join(LOGS_DIR_NAME)
}

pub fn exports_dir(workspace_root: &Path) -> PathBuf {
    app_dir_path(workspace_root).join(EXPORTS_DIR_NAME)
}

pub fn project_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(PROJECT_CONFIG_FILE_NAME)
}

pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    app_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    home_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME)
}
