//! yatbl CLI: run the echo bot (polling or webhook) and manage bot commands. Config from env and
//! optional CLI args.

use anyhow::Result;
use clap::Parser;
use yatbl_cli::{load_config, run_commands, run_polling, run_webhook, Cli, Commands};
use yatbl_telegram::WebhookConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    yatbl_core::init_tracing(config.log_file.as_deref())?;

    match cli.command {
        Commands::Poll { timeout, .. } => run_polling(&config, timeout).await,
        Commands::Webhook {
            url,
            secret_token,
            drop_pending_updates,
            ..
        } => {
            let webhook = WebhookConfig {
                secret_token,
                drop_pending_updates: drop_pending_updates.then_some(true),
                ..Default::default()
            };
            run_webhook(&config, &url, webhook).await
        }
        Commands::Commands { action } => run_commands(&config, action).await,
    }
}
