//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.palmtrack.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".palmtrack.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Dashboard aggregation settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Session / inactivity settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Printable report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Backend (PostgREST) connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the project, without `/rest/v1`.
    #[serde(default)]
    pub url: String,

    /// API key sent as `apikey` and bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Try the `dashboard_summary` procedure before computing totals locally.
    #[serde(default = "default_true")]
    pub use_summary_rpc: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_seconds: default_timeout(),
            use_summary_rpc: true,
        }
    }
}

fn default_timeout() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

/// Named date-range presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RangePreset {
    #[default]
    ThisMonth,
    #[serde(rename = "last-30-days")]
    #[value(name = "last-30-days")]
    Last30Days,
    AllTime,
}

/// Dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// How many agents the outstanding table keeps.
    #[serde(default = "default_top_agents")]
    pub top_agents: usize,

    /// Window for the "advance with no collection" alert.
    #[serde(default = "default_no_collection_window")]
    pub no_collection_window_days: i64,

    /// Inactivity after which an agent with advances is flagged.
    #[serde(default = "default_stale_after")]
    pub stale_after_days: i64,

    /// Range used when no range flag is given.
    #[serde(default)]
    pub default_range: RangePreset,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            top_agents: default_top_agents(),
            no_collection_window_days: default_no_collection_window(),
            stale_after_days: default_stale_after(),
            default_range: RangePreset::default(),
        }
    }
}

fn default_top_agents() -> usize {
    10
}

fn default_no_collection_window() -> i64 {
    7
}

fn default_stale_after() -> i64 {
    14
}

/// Inactivity sign-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Minutes without activity before a privileged session is signed out.
    #[serde(default = "default_idle_minutes")]
    pub idle_timeout_minutes: u64,

    /// Roles the idle timer applies to.
    #[serde(default = "default_privileged_roles")]
    pub privileged_roles: Vec<String>,

    /// Routes where the idle timer is never armed.
    #[serde(default = "default_excluded_routes")]
    pub excluded_routes: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: default_idle_minutes(),
            privileged_roles: default_privileged_roles(),
            excluded_routes: default_excluded_routes(),
        }
    }
}

fn default_idle_minutes() -> u64 {
    30
}

fn default_privileged_roles() -> Vec<String> {
    vec!["admin".to_string()]
}

fn default_excluded_routes() -> Vec<String> {
    vec!["/login", "/print"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Name printed in statement headers.
    #[serde(default = "default_business_name")]
    pub business_name: String,

    /// Currency symbol used for money formatting.
    #[serde(default = "default_currency")]
    pub currency_symbol: String,

    /// Directory statements are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            business_name: default_business_name(),
            currency_symbol: default_currency(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_business_name() -> String {
    "Palm Fruit Trading".to_string()
}

fn default_currency() -> String {
    "GH₵".to_string()
}

fn default_output_dir() -> String {
    ".".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.palmtrack.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and their env vars) take precedence over the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.backend_url {
            self.backend.url = url.clone();
        }
        if let Some(ref key) = args.api_key {
            self.backend.api_key = key.clone();
        }
        if let Some(timeout) = args.timeout {
            self.backend.timeout_seconds = timeout;
        }
        if args.no_summary_rpc {
            self.backend.use_summary_rpc = false;
        }
        if let Some(minutes) = args.idle_timeout {
            self.session.idle_timeout_minutes = minutes;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
