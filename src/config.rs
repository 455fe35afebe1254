use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Rest,
    Memory,
}

#[derive(Debug, Deserialize, Default)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// JSON rows to preload into the memory backend.
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub page_size: usize,
    pub poll_interval_secs: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            poll_interval_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".servicedesk")
}

pub fn load_config() -> Result<AppConfig> {
    let mut config = load_config_from(&config_path())?;
    apply_env(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}

fn apply_env(config: &mut AppConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var("SERVICEDESK_URL").filter(|v| !v.is_empty()) {
        config.backend.url = Some(url);
    }
    if let Some(key) = var("SERVICEDESK_API_KEY").filter(|v| !v.is_empty()) {
        config.backend.api_key = Some(key);
    }
}
