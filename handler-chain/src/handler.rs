//! Handler trait, closure adapter and the command-aware wrappers.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use yatbl_core::{command_names, has_no_commands, parse_command, CommandArgs, Result, Update};

use crate::context::Context;

/// Callback invoked once per update, with the composed context passed explicitly.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: Arc<Context>, update: Arc<Update>) -> Result<()>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Adapts an async closure `(ctx, update)` into a [`Handler`].
pub struct FnHandler<F, Fut> {
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F, Fut>
where
    F: Fn(Arc<Context>, Arc<Update>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    FnHandler {
        f,
        _fut: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F, Fut>
where
    F: Fn(Arc<Context>, Arc<Update>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, ctx: Arc<Context>, update: Arc<Update>) -> Result<()> {
        (self.f)(ctx, update).await
    }
}

/// Runs the callback only when the message contains `/command`; the callback receives one
/// argument entry per occurrence.
pub struct CommandHandler<F, Fut> {
    command: String,
    callback: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> CommandHandler<F, Fut>
where
    F: Fn(Arc<Context>, Vec<CommandArgs>, Arc<Update>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    pub fn new(command: impl Into<String>, callback: F) -> Self {
        Self {
            command: command.into(),
            callback,
            _fut: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Handler for CommandHandler<F, Fut>
where
    F: Fn(Arc<Context>, Vec<CommandArgs>, Arc<Update>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, ctx: Arc<Context>, update: Arc<Update>) -> Result<()> {
        match parse_command(update.message.as_ref(), &self.command) {
            Some(args) => {
                debug!(
                    update_id = update.update_id,
                    command = %self.command,
                    occurrences = args.len(),
                    "Command matched"
                );
                (self.callback)(ctx, args, update).await
            }
            None => Ok(()),
        }
    }
}

/// Runs the callback for any update carrying at least one command; receives the command names.
pub struct AllCommandsHandler<F, Fut> {
    callback: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AllCommandsHandler<F, Fut>
where
    F: Fn(Arc<Context>, Vec<String>, Arc<Update>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _fut: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Handler for AllCommandsHandler<F, Fut>
where
    F: Fn(Arc<Context>, Vec<String>, Arc<Update>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, ctx: Arc<Context>, update: Arc<Update>) -> Result<()> {
        let names = command_names(update.message.as_ref());
        if names.is_empty() {
            return Ok(());
        }
        (self.callback)(ctx, names, update).await
    }
}

/// Runs the callback only for updates without any command.
pub struct MessageHandler<F, Fut> {
    callback: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> MessageHandler<F, Fut>
where
    F: Fn(Arc<Context>, Arc<Update>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _fut: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Handler for MessageHandler<F, Fut>
where
    F: Fn(Arc<Context>, Arc<Update>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, ctx: Arc<Context>, update: Arc<Update>) -> Result<()> {
        if !has_no_commands(update.message.as_ref()) {
            return Ok(());
        }
        (self.callback)(ctx, update).await
    }
}
