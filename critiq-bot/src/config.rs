//! Bot configuration
//!
//! Per-key priority: command line, then `CRITIQ_*` environment variables
//! (both handled by clap), then the TOML file, then compiled defaults.

use clap::Parser;
use critiq_common::config::{
    default_config_path, default_database_path, resolve_required, resolve_secret, Secret,
    TomlConfig,
};
use critiq_common::{Error, QuotaPolicy, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::{Backoff, OpenAiSettings};
use crate::handlers::HandlerSettings;

/// Telegram's own message size limit
const TELEGRAM_MAX_CHARS: usize = 4096;

/// Command-line arguments for critiq-bot
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "critiq-bot")]
#[command(about = "Telegram bot that critiques photos with an AI assistant")]
#[command(version)]
pub struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "CRITIQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Telegram bot token
    #[arg(long, env = "CRITIQ_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "CRITIQ_OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// OpenAI assistant id (`asst_...`)
    #[arg(long, env = "CRITIQ_ASSISTANT_ID")]
    pub assistant_id: Option<String>,

    /// SQLite database file
    #[arg(long, env = "CRITIQ_DATABASE")]
    pub database: Option<PathBuf>,

    /// Log filter, e.g. `info` or `critiq_bot=debug`
    #[arg(long, env = "CRITIQ_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// How long to wait for more photos of an album
    #[arg(long, env = "CRITIQ_ALBUM_LATENCY_MS")]
    pub album_latency_ms: Option<u64>,

    /// Photos per user per quota window
    #[arg(long, env = "CRITIQ_DAILY_LIMIT")]
    pub daily_limit: Option<u32>,
}

impl Args {
    /// Config file to load: `--config` or the platform default
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(default_config_path)
    }
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: Secret,
    pub openai_api_key: Secret,
    pub assistant_id: String,
    pub database_path: PathBuf,
    pub log_level: String,
    pub album_latency: Duration,
    pub quota: QuotaPolicy,
    pub reminder_delay: Duration,
    pub chunk_chars: usize,
    pub poll_timeout_secs: u64,
    pub ai_poll_interval: Duration,
    pub ai_run_timeout: Duration,
    pub telegram_api_url: String,
    pub openai_api_url: String,
}

impl BotConfig {
    pub fn resolve(args: &Args, toml: &TomlConfig) -> Result<Self> {
        let bot_token = resolve_secret(
            "bot_token",
            "CRITIQ_BOT_TOKEN",
            args.bot_token.as_deref(),
            toml.bot_token.as_ref(),
        )?;
        let openai_api_key = resolve_secret(
            "openai_api_key",
            "CRITIQ_OPENAI_API_KEY",
            args.openai_api_key.as_deref(),
            toml.openai_api_key.as_ref(),
        )?;
        let assistant_id = resolve_required(
            "assistant_id",
            "CRITIQ_ASSISTANT_ID",
            args.assistant_id.as_deref(),
            toml.assistant_id.as_deref(),
        )?;

        let daily_limit = args.daily_limit.unwrap_or(toml.daily_limit);
        if daily_limit == 0 {
            return Err(Error::Config("daily_limit must be at least 1".to_string()));
        }

        if !(1..=TELEGRAM_MAX_CHARS).contains(&toml.message_chunk_chars) {
            return Err(Error::Config(format!(
                "message_chunk_chars must be between 1 and {}, got {}",
                TELEGRAM_MAX_CHARS, toml.message_chunk_chars
            )));
        }

        Ok(Self {
            bot_token,
            openai_api_key,
            assistant_id,
            database_path: args
                .database
                .clone()
                .or_else(|| toml.database_path.clone())
                .unwrap_or_else(default_database_path),
            log_level: args
                .log_level
                .clone()
                .unwrap_or_else(|| toml.logging.level.clone()),
            album_latency: Duration::from_millis(
                args.album_latency_ms.unwrap_or(toml.album_latency_ms),
            ),
            quota: QuotaPolicy::new(daily_limit, Duration::from_secs(toml.quota_window_secs)),
            reminder_delay: Duration::from_secs(toml.reminder_delay_secs),
            chunk_chars: toml.message_chunk_chars,
            poll_timeout_secs: toml.poll_timeout_secs,
            ai_poll_interval: Duration::from_millis(toml.ai_poll_interval_ms),
            ai_run_timeout: Duration::from_secs(toml.ai_run_timeout_secs),
            telegram_api_url: toml.telegram_api_url.clone(),
            openai_api_url: toml.openai_api_url.clone(),
        })
    }

    pub fn handler_settings(&self) -> HandlerSettings {
        HandlerSettings {
            quota: self.quota,
            reminder_delay: self.reminder_delay,
            chunk_chars: self.chunk_chars,
        }
    }

    pub fn openai_settings(&self) -> OpenAiSettings {
        OpenAiSettings {
            api_base: self.openai_api_url.clone(),
            api_key: self.openai_api_key.clone(),
            assistant_id: self.assistant_id.clone(),
            poll_interval: self.ai_poll_interval,
            run_timeout: self.ai_run_timeout,
            backoff: Backoff::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use critiq_common::config::parse_toml_config;
    use serial_test::serial;

    const ENV_VARS: &[&str] = &[
        "CRITIQ_CONFIG",
        "CRITIQ_BOT_TOKEN",
        "CRITIQ_OPENAI_API_KEY",
        "CRITIQ_ASSISTANT_ID",
        "CRITIQ_DATABASE",
        "CRITIQ_LOG_LEVEL",
        "CRITIQ_ALBUM_LATENCY_MS",
        "CRITIQ_DAILY_LIMIT",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn full_toml() -> TomlConfig {
        parse_toml_config(
            r#"
            bot_token = "toml-token"
            openai_api_key = "toml-key"
            assistant_id = "asst_toml"
            database_path = "/var/lib/critiq/critiq.db"
            daily_limit = 5

            [logging]
            level = "warn"
            "#,
        )
        .unwrap()
    }

    #[test]
    #[serial]
    fn test_toml_values_used_without_args() {
        clear_env();
        let args = Args::try_parse_from(["critiq-bot"]).unwrap();
        let config = BotConfig::resolve(&args, &full_toml()).unwrap();

        assert_eq!(config.bot_token.expose(), "toml-token");
        assert_eq!(config.assistant_id, "asst_toml");
        assert_eq!(config.database_path, PathBuf::from("/var/lib/critiq/critiq.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.quota.limit, 5);
        assert_eq!(config.album_latency, Duration::from_millis(600));
        assert_eq!(config.chunk_chars, 3500);
    }

    #[test]
    #[serial]
    fn test_cli_overrides_toml() {
        clear_env();
        let args = Args::try_parse_from([
            "critiq-bot",
            "--bot-token",
            "cli-token",
            "--daily-limit",
            "2",
            "--album-latency-ms",
            "900",
        ])
        .unwrap();
        let config = BotConfig::resolve(&args, &full_toml()).unwrap();

        assert_eq!(config.bot_token.expose(), "cli-token");
        assert_eq!(config.openai_api_key.expose(), "toml-key");
        assert_eq!(config.quota.limit, 2);
        assert_eq!(config.album_latency, Duration::from_millis(900));
    }

    #[test]
    #[serial]
    fn test_env_overrides_toml() {
        clear_env();
        std::env::set_var("CRITIQ_ASSISTANT_ID", "asst_env");
        let args = Args::try_parse_from(["critiq-bot"]).unwrap();
        clear_env();

        let config = BotConfig::resolve(&args, &full_toml()).unwrap();
        assert_eq!(config.assistant_id, "asst_env");
    }

    #[test]
    #[serial]
    fn test_missing_token_names_every_source() {
        clear_env();
        let args = Args::try_parse_from(["critiq-bot"]).unwrap();
        let result = BotConfig::resolve(&args, &TomlConfig::default());

        match result {
            Err(Error::Config(msg)) => {
                assert!(msg.contains("--bot-token"));
                assert!(msg.contains("CRITIQ_BOT_TOKEN"));
                assert!(msg.contains("bot_token = "));
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_zero_daily_limit_rejected() {
        clear_env();
        let args = Args::try_parse_from(["critiq-bot", "--daily-limit", "0"]).unwrap();
        assert!(matches!(
            BotConfig::resolve(&args, &full_toml()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    #[serial]
    fn test_oversized_chunks_rejected() {
        clear_env();
        let mut toml = full_toml();
        toml.message_chunk_chars = 5000;
        let args = Args::try_parse_from(["critiq-bot"]).unwrap();
        assert!(matches!(BotConfig::resolve(&args, &toml), Err(Error::Config(_))));
    }
}
