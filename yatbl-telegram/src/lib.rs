//! # yatbl-telegram
//!
//! Telegram transport for the handler chain: the HTTPS [`HttpApiClient`], the long-polling
//! [`PollingSource`], the axum webhook endpoint, bot command helpers and the [`Bot`] facade tying
//! them together. Handler logic lives in handler-chain; wire types in yatbl-core.

mod bot;
pub mod commands;
mod config;
mod http_client;
pub mod polling;
pub mod webhook;

pub use bot::{Bot, BotBuilder};
pub use commands::{get_commands, set_commands};
pub use config::{BotConfig, DEFAULT_POLLING_INTERVAL_MS, DEFAULT_WEBHOOK_PORT};
pub use http_client::{HttpApiClient, DEFAULT_API_URL};
pub use polling::{
    CycleOutcome, FixedInterval, PollingOptions, PollingSource, PollingState, RetryPolicy,
};
pub use webhook::{resolve_webhook_url, WebhookConfig, WebhookRoute, WebhookServer};
