//! Configuration system for Clausewise.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/clausewise/config.toml` and/or
//! `.clausewise/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::DisplayTab;

/// Plain environment variable that overrides `backend.base_url`.
pub const API_URL_ENV: &str = "CLAUSEWISE_API_URL";

/// Default analysis backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8501";

/// Top-level configuration for the Clausewise client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

/// Where the analysis backend lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub analyze_path: String,
    pub health_path: String,
    /// Overall request timeout. No timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            analyze_path: "/api/analyze".to_string(),
            health_path: "/health".to_string(),
            timeout_secs: None,
        }
    }
}

impl BackendConfig {
    pub fn analyze_url(&self) -> String {
        join_url(&self.base_url, &self.analyze_path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.base_url, &self.health_path)
    }

    /// Non-fatal problems with the backend settings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let base = self.base_url.trim();
        if base.is_empty() {
            warnings.push("backend.base_url is empty; requests will fail".to_string());
        } else if !(base.starts_with("http://") || base.starts_with("https://")) {
            warnings.push(format!(
                "backend.base_url '{base}' does not start with http:// or https://"
            ));
        }
        if self.timeout_secs == Some(0) {
            warnings.push(
                "backend.timeout_secs is 0; every request will time out immediately".to_string(),
            );
        }
        warnings
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Which storage medium backs persisted state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One JSON file per key on disk.
    #[default]
    File,
    /// Process-local only; nothing survives exit.
    Memory,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::File => write!(f, "file"),
            StorageKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,
    /// Directory for the file store. Defaults to the per-user data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.dir.clone().or_else(default_store_dir)
    }
}

/// Per-user directory holding persisted dashboard state.
pub fn default_store_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "clausewise", "clausewise")
        .map(|d| d.data_dir().join("store"))
}

/// Terminal display preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Tab shown when nothing has been persisted yet.
    pub default_tab: DisplayTab,
    /// Print the low/medium/high band next to the risk score.
    pub show_risk_level: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            default_tab: DisplayTab::Analysis,
            show_risk_level: true,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        self.backend.validate()
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `CLAUSEWISE_`, `__` separated)
/// 3. `CLAUSEWISE_API_URL` for the backend base URL
/// 4. Workspace-local config (`.clausewise/config.toml`)
/// 5. User config (`~/.config/clausewise/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ClientConfig>,
) -> Result<ClientConfig, Box<figment::Error>> {
    let mut figment = layered(workspace, None);
    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }
    figment.extract().map_err(Box::new)
}

/// Load configuration with an explicit file layered above the workspace and
/// user files. Environment variables still win over the file.
pub fn load_config_file(
    path: &Path,
    workspace: Option<&Path>,
) -> Result<ClientConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    layered(workspace, Some(path))
        .extract()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

fn layered(workspace: Option<&Path>, explicit_file: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(ClientConfig::default()));

    // User-level config
    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit_file {
        figment = figment.merge(Toml::file(path));
    }

    // CLAUSEWISE_API_URL=https://...
    if let Ok(url) = std::env::var(API_URL_ENV)
        && !url.trim().is_empty()
    {
        figment = figment.merge(Serialized::default("backend.base_url", url.trim()));
    }

    // CLAUSEWISE_BACKEND__BASE_URL, CLAUSEWISE_STORAGE__BACKEND, ...
    figment.merge(
        Env::prefixed("CLAUSEWISE_")
            .ignore(&["API_URL"])
            .split("__"),
    )
}

/// `~/.config/clausewise/config.toml` (platform equivalent).
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "clausewise", "clausewise")
        .map(|d| d.config_dir().join("config.toml"))
}

/// `<workspace>/.clausewise/config.toml`.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".clausewise").join("config.toml")
}

/// Check whether any Clausewise configuration file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}
