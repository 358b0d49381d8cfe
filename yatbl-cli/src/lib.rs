//! # yatbl-cli
//!
//! The `yatbl` binary: an echo bot over polling or webhook, and bot command management.

pub mod cli;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use handler_chain::Context;
use serde_json::json;
use tracing::info;
use yatbl_core::{CommandArgs, Update, YatblError};
use yatbl_telegram::{
    get_commands, set_commands, Bot, BotBuilder, BotConfig, PollingOptions, WebhookConfig,
};

pub use cli::{load_config, Cli, CommandsAction, Commands};

const GREETING: &str = "Hi! Send me anything and I will send it back.";

/// Adds the echo behavior: `/start` greets (echoing any deep-link payload), plain text is
/// echoed as a reply.
pub fn echo_bot(builder: BotBuilder) -> BotBuilder {
    builder
        .on_command(
            "start",
            |ctx: Arc<Context>, args: Vec<CommandArgs>, _update: Arc<Update>| async move {
                let payload = args
                    .into_iter()
                    .flatten()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                let text = if payload.is_empty() {
                    GREETING.to_string()
                } else {
                    format!("{}\nstart payload: {}", GREETING, payload)
                };
                ctx.reply_message(&text, json!({})).await?;
                Ok::<(), YatblError>(())
            },
        )
        .on_message(|ctx: Arc<Context>, update: Arc<Update>| async move {
            let Some(message) = update.message.as_ref() else {
                return Ok(());
            };
            let Some(text) = message.text.as_deref() else {
                return Ok(());
            };
            ctx.reply_message(text, json!({ "reply_to_message_id": message.message_id }))
                .await?;
            Ok::<(), YatblError>(())
        })
}

pub fn build_echo_bot(config: &BotConfig, polling: PollingOptions) -> Result<Bot> {
    let builder = Bot::from_config(config)
        .context("Create bot (check BOT_TOKEN and TELEGRAM_API_URL)")?
        .polling_options(polling);
    Ok(echo_bot(builder).build())
}

/// Polls until Ctrl-C.
pub async fn run_polling(config: &BotConfig, timeout: Option<u32>) -> Result<()> {
    let bot = build_echo_bot(
        config,
        PollingOptions {
            timeout,
            ..Default::default()
        },
    )?;
    let polling = bot.spawn_polling(config.polling_interval);
    info!(
        interval_ms = config.polling_interval.as_millis() as u64,
        "Echo bot polling; Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    bot.stop_polling();
    polling.await?;
    Ok(())
}

/// Serves the webhook until Ctrl-C, then removes it.
pub async fn run_webhook(config: &BotConfig, url: &str, webhook: WebhookConfig) -> Result<()> {
    let bot = build_echo_bot(config, PollingOptions::default())?;
    let (url, addr) = bot
        .set_webhook_and_start_server(url, &webhook, config.webhook_port)
        .await
        .context("Start webhook server and register webhook")?;
    info!(url = %url, addr = %addr, "Echo bot serving webhook; Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    bot.stop_server_and_remove_webhook(false).await?;
    Ok(())
}

pub async fn run_commands(config: &BotConfig, action: CommandsAction) -> Result<()> {
    let bot = Bot::from_config(config)?.build();
    let api = bot.api().as_ref();

    match action {
        CommandsAction::List => {
            let commands = get_commands(api).await?;
            if commands.is_empty() {
                println!("No commands set.");
            }
            for command in commands {
                println!("/{:<20} {}", command.command, command.description);
            }
        }
        CommandsAction::Set { commands, replace } => {
            let count = commands.len();
            set_commands(api, commands, !replace).await?;
            println!("Registered {} command(s).", count);
        }
        CommandsAction::Clear => {
            set_commands(api, Vec::new(), false).await?;
            println!("Cleared all commands.");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use handler_chain::DispatchPolicy;
    use yatbl_core::{Message, MessageEntity, MockApi};

    #[tokio::test]
    async fn test_echo_bot_replies() {
        let api = Arc::new(MockApi::new());
        let builder = Bot::builder_with_api("123:abc", api.clone())
            .unwrap()
            .policy(DispatchPolicy::Blocking);
        let bot = echo_bot(builder).build();

        let start = Message::text(1, 7, "/start ref42")
            .with_entities(vec![MessageEntity::bot_command(0, 6)]);
        bot.dispatch(vec![
            Update::with_message(1, start),
            Update::with_message(2, Message::text(2, 7, "ping")),
        ])
        .await;

        let sent = api.calls_to("sendMessage");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["chat_id"], json!(7));
        assert!(sent[0]["text"].as_str().unwrap().contains("ref42"));
        assert_eq!(
            sent[1],
            json!({"chat_id": 7, "text": "ping", "reply_to_message_id": 2})
        );
    }
}
