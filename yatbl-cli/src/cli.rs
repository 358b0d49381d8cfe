//! CLI parser and config loading.

use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use yatbl_core::BotCommand;
use yatbl_telegram::BotConfig;

#[derive(Parser)]
#[command(name = "yatbl")]
#[command(about = "Telegram echo bot and bot command management", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Overrides BOT_TOKEN.
    #[arg(short, long, global = true)]
    pub token: Option<String>,

    /// Run every handler to completion before the next one (overrides BLOCKING_HANDLERS).
    #[arg(long, global = true)]
    pub blocking: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the echo bot with long polling.
    Poll {
        /// Milliseconds between getUpdates calls (overrides POLLING_INTERVAL_MS).
        #[arg(short, long)]
        interval: Option<u64>,
        /// Long-poll timeout in seconds.
        #[arg(long)]
        timeout: Option<u32>,
    },
    /// Run the echo bot behind a webhook.
    Webhook {
        /// Public HTTPS URL Telegram posts updates to; an empty path becomes the token.
        #[arg(short, long)]
        url: String,
        /// Local port of the built-in server (overrides WEBHOOK_PORT).
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(long)]
        secret_token: Option<String>,
        #[arg(long)]
        drop_pending_updates: bool,
    },
    /// Read or change the bot command list.
    Commands {
        #[command(subcommand)]
        action: CommandsAction,
    },
}

#[derive(Subcommand)]
pub enum CommandsAction {
    /// Print the registered commands.
    List,
    /// Register commands given as `name=description`.
    Set {
        #[arg(required = true, value_parser = parse_bot_command)]
        commands: Vec<BotCommand>,
        /// Replace the list instead of appending to it.
        #[arg(long)]
        replace: bool,
    },
    /// Remove every command.
    Clear,
}

/// Parses `name=description`; a leading `/` on the name is dropped.
pub fn parse_bot_command(raw: &str) -> Result<BotCommand> {
    let (name, description) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected name=description, got {:?}", raw))?;
    let name = name.trim().trim_start_matches('/');
    let description = description.trim();
    if name.is_empty() || description.is_empty() {
        return Err(anyhow!("command name and description must not be empty"));
    }
    Ok(BotCommand::new(name, description))
}

/// Loads [`BotConfig`] from the environment, then applies the global flags.
pub fn load_config(cli: &Cli) -> Result<BotConfig> {
    let mut config = match &cli.token {
        Some(token) => {
            let mut config = match BotConfig::from_env() {
                Ok(config) => config,
                Err(_) => BotConfig::with_token(token.clone()),
            };
            config.bot_token = token.clone();
            config
        }
        None => BotConfig::from_env()?,
    };
    if config.bot_token.trim().is_empty() {
        return Err(anyhow!("bot token must not be empty"));
    }
    if cli.blocking {
        config.blocking_handlers = true;
    }
    if let Commands::Poll {
        interval: Some(ms), ..
    } = cli.command
    {
        config.polling_interval = Duration::from_millis(ms);
    }
    if let Commands::Webhook { port: Some(port), .. } = cli.command {
        config.webhook_port = port;
    }
    Ok(config)
}
