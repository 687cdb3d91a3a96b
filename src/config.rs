//! Configuration for the MetriTask client.
//!
//! Settings are layered file → environment → CLI. The file is
//! `metritask.toml`, looked up in the working directory first and then in
//! the platform config directory (`~/.config/metritask/metritask.toml`).
//! A `.env` file is honoured by the binary through `dotenvy`.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api]
//! base_url = "https://metritask.example.com/api"
//! timeout_secs = 30
//!
//! [view]
//! page_size = 10
//! sort = "newest"
//!
//! [session]
//! path = "/home/me/.config/metritask/session.json"
//! ```
//!
//! | Setting           | Environment           | CLI           |
//! |-------------------|-----------------------|---------------|
//! | `api.base_url`    | `METRITASK_API_URL`   | `--api-url`   |
//! | `view.page_size`  | `METRITASK_PAGE_SIZE` | `--page-size` |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::projection::{DEFAULT_PAGE_SIZE, SortKey};
use crate::session::FileSession;

pub const CONFIG_FILE_NAME: &str = "metritask.toml";
pub const API_URL_ENV: &str = "METRITASK_API_URL";
pub const PAGE_SIZE_ENV: &str = "METRITASK_PAGE_SIZE";
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Backend connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Per-request timeout. Unset means requests are never cut short.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// List rendering defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSection {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub sort: SortKey,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for ViewSection {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            sort: SortKey::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSection {
    /// Session file location; defaults to the platform config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// The complete metritask.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetritaskToml {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub view: ViewSection,
    #[serde(default)]
    pub session: SessionSection,
}

impl MetritaskToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse metritask.toml")
    }

    /// Load `metritask.toml` from `dir`, or defaults if there is none.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize metritask.toml")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(url) = &self.api.base_url
            && !is_valid_base_url(url)
        {
            warnings.push(format!(
                "Invalid api.base_url '{}': should start with http:// or https://",
                url
            ));
        }

        if self.api.timeout_secs == Some(0) {
            warnings.push("api.timeout_secs = 0 disables every request; remove it instead".into());
        }

        if self.view.page_size == 0 {
            warnings.push("view.page_size must be at least 1; using 1".into());
        }

        warnings
    }
}

fn is_valid_base_url(url: &str) -> bool {
    let url = url.trim();
    ["http://", "https://"]
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}

/// Default locations searched for metritask.toml, in order.
pub fn candidate_paths(working_dir: &Path) -> Vec<PathBuf> {
    let mut paths = vec![working_dir.join(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("metritask").join(CONFIG_FILE_NAME));
    }
    paths
}

/// Resolved configuration.
///
/// Merges settings from:
/// 1. metritask.toml
/// 2. Environment variables
/// 3. CLI arguments
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// File the settings were read from, if any.
    pub path: Option<PathBuf>,
    pub toml: MetritaskToml,
    /// CLI override for the backend base URL.
    pub cli_api_url: Option<String>,
    /// CLI override for the page size.
    pub cli_page_size: Option<usize>,
}

impl Config {
    /// Load from an explicit file, or the first existing default location.
    pub fn load(explicit: Option<&Path>, working_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self {
                path: Some(path.to_path_buf()),
                toml: MetritaskToml::load(path)?,
                ..Default::default()
            });
        }
        for path in candidate_paths(working_dir) {
            if path.exists() {
                let toml = MetritaskToml::load(&path)?;
                return Ok(Self {
                    path: Some(path),
                    toml,
                    ..Default::default()
                });
            }
        }
        Ok(Self::default())
    }

    pub fn with_cli_args(mut self, api_url: Option<String>, page_size: Option<usize>) -> Self {
        self.cli_api_url = api_url;
        self.cli_page_size = page_size;
        self
    }

    /// Backend base URL (CLI → env → file → default).
    pub fn api_url(&self) -> String {
        self.cli_api_url
            .clone()
            .or_else(|| non_empty_env(API_URL_ENV))
            .or_else(|| self.toml.api.base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Page size (CLI → env → file), never below 1.
    pub fn page_size(&self) -> usize {
        self.cli_page_size
            .or_else(|| non_empty_env(PAGE_SIZE_ENV).and_then(|v| v.trim().parse().ok()))
            .unwrap_or(self.toml.view.page_size)
            .max(1)
    }

    pub fn sort(&self) -> SortKey {
        self.toml.view.sort
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.toml
            .api
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn session_path(&self) -> Result<PathBuf> {
        match &self.toml.session.path {
            Some(path) => Ok(path.clone()),
            None => FileSession::default_path().context("Failed to locate the session file"),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        if let Some(raw) = non_empty_env(PAGE_SIZE_ENV)
            && raw.trim().parse::<usize>().is_err()
        {
            warnings.push(format!("Ignoring {}='{}': not a number", PAGE_SIZE_ENV, raw));
        }
        warnings
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
