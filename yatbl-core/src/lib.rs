//! # yatbl-core
//!
//! Core types and traits for the bot library: Bot API records ([`Update`], [`Message`],
//! [`MessageEntity`]), the remote API seam ([`TelegramApi`], [`ApiResponse`]), the command parser,
//! errors and tracing initialization. Transport-agnostic; used by handler-chain and yatbl-telegram.

pub mod api;
pub mod command;
pub mod error;
pub mod logger;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod types;

pub use api::{
    default_api_error_handler, response_or_failure, ApiErrorHandler, ApiResponse, TelegramApi,
};
pub use command::{command_names, has_no_commands, parse_command, CommandArgs};
pub use error::{HandlerError, Result, YatblError};
pub use logger::init_tracing;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockApi, RecordedCall};
pub use types::{
    BotCommand, Chat, Message, MessageEntity, PhotoSize, Sticker, Update, User, Video, BOT_COMMAND,
};
