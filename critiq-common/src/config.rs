//! Configuration loading and default path resolution
//!
//! Bootstrap configuration lives in a TOML file. Every key can also be given on
//! the command line or through a `CRITIQ_*` environment variable; the bot's
//! argument parser covers those two tiers and falls back to the values loaded
//! here.
//!
//! Resolution priority per key:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name used under the platform config/data folders
pub const APP_DIR: &str = "critiq";

/// TOML file name inside the config folder
pub const CONFIG_FILE_NAME: &str = "critiq.toml";

/// SQLite file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "critiq.db";

/// A credential that must never be printed
///
/// `Debug` is redacted so a config dump or an error report cannot leak the
/// bot token or the API key.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value (only at the point of use)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Bootstrap configuration loaded from TOML file
///
/// Credentials are optional here because they may come from the command line
/// or the environment instead. Tunables carry their compiled defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Telegram bot token
    #[serde(default)]
    pub bot_token: Option<Secret>,

    /// OpenAI API key
    #[serde(default)]
    pub openai_api_key: Option<Secret>,

    /// OpenAI assistant identifier (`asst_...`)
    #[serde(default)]
    pub assistant_id: Option<String>,

    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Quiescence window for album collation in milliseconds
    #[serde(default = "default_album_latency_ms")]
    pub album_latency_ms: u64,

    /// Photo submissions allowed per quota window
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    /// Length of the rolling quota window in seconds
    #[serde(default = "default_quota_window_secs")]
    pub quota_window_secs: u64,

    /// Delay between a submission and its renewal reminder in seconds
    #[serde(default = "default_reminder_delay_secs")]
    pub reminder_delay_secs: u64,

    /// Character budget per outgoing message chunk
    #[serde(default = "default_message_chunk_chars")]
    pub message_chunk_chars: usize,

    /// Long-poll timeout for `getUpdates` in seconds
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Interval between assistant run status checks in milliseconds
    #[serde(default = "default_ai_poll_interval_ms")]
    pub ai_poll_interval_ms: u64,

    /// Give up on an assistant run after this many seconds
    #[serde(default = "default_ai_run_timeout_secs")]
    pub ai_run_timeout_secs: u64,

    /// Telegram Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    /// OpenAI API base URL
    #[serde(default = "default_openai_api_url")]
    pub openai_api_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            openai_api_key: None,
            assistant_id: None,
            database_path: None,
            logging: LoggingConfig::default(),
            album_latency_ms: default_album_latency_ms(),
            daily_limit: default_daily_limit(),
            quota_window_secs: default_quota_window_secs(),
            reminder_delay_secs: default_reminder_delay_secs(),
            message_chunk_chars: default_message_chunk_chars(),
            poll_timeout_secs: default_poll_timeout_secs(),
            ai_poll_interval_ms: default_ai_poll_interval_ms(),
            ai_run_timeout_secs: default_ai_run_timeout_secs(),
            telegram_api_url: default_telegram_api_url(),
            openai_api_url: default_openai_api_url(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_album_latency_ms() -> u64 {
    600
}

fn default_daily_limit() -> u32 {
    3
}

fn default_quota_window_secs() -> u64 {
    86_400
}

fn default_reminder_delay_secs() -> u64 {
    86_400
}

fn default_message_chunk_chars() -> usize {
    3500
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_ai_poll_interval_ms() -> u64 {
    1000
}

fn default_ai_run_timeout_secs() -> u64 {
    120
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_openai_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Default configuration file path for the platform
///
/// `~/.config/critiq/critiq.toml` on Linux, the platform config folder
/// elsewhere. `None` when the platform reports no config folder.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE_NAME))
}

/// Default database path for the platform
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./critiq_data"))
        .join(DATABASE_FILE_NAME)
}

/// Load TOML configuration
///
/// A missing file is not an error: the compiled defaults are used and a
/// warning is logged. A file that exists but does not parse is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {} (using defaults)",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config = parse_toml_config(&content)?;
    info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Parse TOML configuration text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Validate a credential or identifier (non-empty, non-whitespace)
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Resolve a required string setting
///
/// `override_value` is what the argument parser produced from the command
/// line or the environment (it already applies that priority between them).
/// Falls back to the TOML value. Blank values are treated as missing.
pub fn resolve_required(
    key: &str,
    env_var: &str,
    override_value: Option<&str>,
    toml_value: Option<&str>,
) -> Result<String> {
    if let Some(value) = override_value.filter(|v| is_valid_value(v)) {
        if toml_value.is_some_and(is_valid_value) {
            warn!(
                "{} found in both arguments/environment and TOML. Using arguments/environment.",
                key
            );
        }
        return Ok(value.trim().to_string());
    }

    if let Some(value) = toml_value.filter(|v| is_valid_value(v)) {
        info!("{} loaded from TOML config", key);
        return Ok(value.trim().to_string());
    }

    Err(Error::Config(format!(
        "{key} not configured. Please configure using one of:\n\
         1. Command line: --{flag} <value>\n\
         2. Environment: {env_var}=<value>\n\
         3. TOML config: {file} ({key} = \"<value>\")",
        key = key,
        flag = key.replace('_', "-"),
        env_var = env_var,
        file = default_config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| CONFIG_FILE_NAME.to_string()),
    )))
}

/// Resolve a required credential (see [`resolve_required`])
pub fn resolve_secret(
    key: &str,
    env_var: &str,
    override_value: Option<&str>,
    toml_value: Option<&Secret>,
) -> Result<Secret> {
    resolve_required(key, env_var, override_value, toml_value.map(Secret::expose)).map(Secret)
}
