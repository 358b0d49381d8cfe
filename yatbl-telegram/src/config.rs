//! Bot configuration loaded from the environment.
//!
//! `BOT_TOKEN` is required; `TELEGRAM_API_URL`, `LOG_FILE`, `POLLING_INTERVAL_MS`,
//! `WEBHOOK_PORT` and `BLOCKING_HANDLERS` are optional.

use std::env;
use std::time::Duration;

use anyhow::{bail, Result};
use handler_chain::DispatchPolicy;

pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 200;
pub const DEFAULT_WEBHOOK_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    /// Bot API base URL; `None` means the public Telegram endpoint. Tests point this at a mock
    /// server.
    pub telegram_api_url: Option<String>,
    pub log_file: Option<String>,
    pub polling_interval: Duration,
    pub webhook_port: u16,
    pub blocking_handlers: bool,
}

impl BotConfig {
    /// Loads from environment variables. Fails when `BOT_TOKEN` is missing or empty.
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            bail!("BOT_TOKEN not set");
        }

        let telegram_api_url = env::var("TELEGRAM_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let log_file = env::var("LOG_FILE").ok().filter(|path| !path.is_empty());
        let polling_interval_ms = env::var("POLLING_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POLLING_INTERVAL_MS);
        let webhook_port = env::var("WEBHOOK_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_WEBHOOK_PORT);
        let blocking_handlers = env::var("BLOCKING_HANDLERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);

        Ok(Self {
            bot_token,
            telegram_api_url,
            log_file,
            polling_interval: Duration::from_millis(polling_interval_ms),
            webhook_port,
            blocking_handlers,
        })
    }

    /// Uses the given token; everything else takes its default.
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            telegram_api_url: None,
            log_file: None,
            polling_interval: Duration::from_millis(DEFAULT_POLLING_INTERVAL_MS),
            webhook_port: DEFAULT_WEBHOOK_PORT,
            blocking_handlers: false,
        }
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy::from_blocking(self.blocking_handlers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "BOT_TOKEN",
            "TELEGRAM_API_URL",
            "LOG_FILE",
            "POLLING_INTERVAL_MS",
            "WEBHOOK_PORT",
            "BLOCKING_HANDLERS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_with_token() {
        let config = BotConfig::with_token("test_token");
        assert_eq!(config.bot_token, "test_token");
        assert!(config.telegram_api_url.is_none());
        assert!(config.log_file.is_none());
        assert_eq!(config.polling_interval, Duration::from_millis(200));
        assert_eq!(config.dispatch_policy(), DispatchPolicy::Concurrent);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        env::set_var("BOT_TOKEN", "test_token");

        let config = BotConfig::from_env().unwrap();

        assert_eq!(config.bot_token, "test_token");
        assert!(config.telegram_api_url.is_none());
        assert_eq!(config.polling_interval, Duration::from_millis(200));
        assert_eq!(config.webhook_port, 3000);
        assert!(!config.blocking_handlers);
    }

    #[test]
    #[serial]
    fn test_from_env_custom_values() {
        clear_env();
        env::set_var("BOT_TOKEN", "custom_token");
        env::set_var("TELEGRAM_API_URL", "http://127.0.0.1:8081");
        env::set_var("LOG_FILE", "logs/yatbl.log");
        env::set_var("POLLING_INTERVAL_MS", "0");
        env::set_var("WEBHOOK_PORT", "8443");
        env::set_var("BLOCKING_HANDLERS", "true");

        let config = BotConfig::from_env().unwrap();

        assert_eq!(config.telegram_api_url.as_deref(), Some("http://127.0.0.1:8081"));
        assert_eq!(config.log_file.as_deref(), Some("logs/yatbl.log"));
        assert_eq!(config.polling_interval, Duration::ZERO);
        assert_eq!(config.webhook_port, 8443);
        assert_eq!(config.dispatch_policy(), DispatchPolicy::Blocking);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_missing_or_empty_token() {
        clear_env();
        assert!(BotConfig::from_env().is_err());

        env::set_var("BOT_TOKEN", "  ");
        assert!(BotConfig::from_env().is_err());
        clear_env();
    }
}
