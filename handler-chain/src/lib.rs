//! # Handler chain
//!
//! Dispatches updates to registered handlers. For every update, in order, a fresh [`Context`] is
//! composed from the registered shorthands, then every handler runs in registration order with
//! that context. A failing handler is logged and skipped; it never stops its siblings or the
//! following updates.

mod context;
mod handler;
mod shorthand;
pub mod shorthands;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::Context as TaskContext;

use futures::future::{BoxFuture, FutureExt};
use futures::task::noop_waker_ref;
use tracing::{debug, error, info, instrument};
use yatbl_core::{CommandArgs, Result, TelegramApi, Update};

pub use context::Context;
pub use handler::{
    handler_fn, AllCommandsHandler, CommandHandler, FnHandler, Handler, MessageHandler,
};
pub use shorthand::{BoundShortHand, Registration, ShortHand, ShortHandRegistry};
pub use shorthands::default_shorthands;

/// How handler invocations are sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Each handler is started in order and then detached; completions may interleave across
    /// handlers and updates.
    #[default]
    Concurrent,
    /// Each handler settles before the next handler (or the next update) starts.
    Blocking,
}

impl DispatchPolicy {
    pub fn from_blocking(blocking: bool) -> Self {
        if blocking {
            Self::Blocking
        } else {
            Self::Concurrent
        }
    }
}

/// Counts from one `dispatch` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    pub updates: usize,
    pub invoked: usize,
    /// Handlers that returned an error or panicked. Only tracked under
    /// [`DispatchPolicy::Blocking`].
    pub failed: usize,
}

/// Ordered handlers plus the shorthand registry, bound to one API client.
#[derive(Clone)]
pub struct HandlerChain {
    api: Arc<dyn TelegramApi>,
    shorthands: ShortHandRegistry,
    handlers: Vec<Arc<dyn Handler>>,
    policy: DispatchPolicy,
}

impl HandlerChain {
    /// Creates an empty chain (no shorthands, no handlers, concurrent policy).
    pub fn new(api: Arc<dyn TelegramApi>) -> Self {
        Self {
            api,
            shorthands: ShortHandRegistry::new(),
            handlers: Vec::new(),
            policy: DispatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Appends a handler (runs after every handler added before it).
    pub fn add_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Registers a shorthand; fails on a malformed name.
    pub fn add_shorthand(mut self, shorthand: ShortHand) -> Result<Self> {
        self.shorthands.register(shorthand)?;
        Ok(self)
    }

    /// Registers several shorthands in order.
    pub fn add_shorthands<I>(mut self, shorthands: I) -> Result<Self>
    where
        I: IntoIterator<Item = ShortHand>,
    {
        self.shorthands.register_all(shorthands)?;
        Ok(self)
    }

    /// Adds a handler that runs `callback` when the message contains `/command`.
    pub fn on_command<F, Fut>(self, command: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Arc<Context>, Vec<CommandArgs>, Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add_handler(Arc::new(CommandHandler::new(command, callback)))
    }

    /// Adds a handler that runs `callback` for any update carrying commands.
    pub fn on_all_commands<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(Arc<Context>, Vec<String>, Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add_handler(Arc::new(AllCommandsHandler::new(callback)))
    }

    /// Adds a handler that runs `callback` only for updates without commands.
    pub fn on_message<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(Arc<Context>, Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add_handler(Arc::new(MessageHandler::new(callback)))
    }

    pub fn has_shorthand_conflict(&self, name: &str) -> bool {
        self.shorthands.has_conflict(name)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    pub fn api(&self) -> &Arc<dyn TelegramApi> {
        &self.api
    }

    /// Composes the context for one update.
    pub fn compose(&self, update: Arc<Update>) -> Context {
        self.shorthands.compose(update, Arc::clone(&self.api))
    }

    /// Dispatches `updates` in order. Handler failures are logged, never returned.
    #[instrument(skip(self, updates), fields(batch = updates.len(), policy = ?self.policy))]
    pub async fn dispatch(&self, updates: Vec<Update>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for update in updates {
            let update = Arc::new(update);
            let update_id = update.update_id;
            let ctx = Arc::new(self.compose(Arc::clone(&update)));

            debug!(
                update_id,
                shorthands = ctx.len(),
                handlers = self.handlers.len(),
                "step: context composed"
            );

            for handler in &self.handlers {
                report.invoked += 1;
                let handler_name = handler.name();
                let handler = Arc::clone(handler);
                let ctx = Arc::clone(&ctx);
                let update = Arc::clone(&update);

                match self.policy {
                    DispatchPolicy::Concurrent => {
                        start_detached(
                            async move {
                                let outcome = AssertUnwindSafe(handler.handle(ctx, update))
                                    .catch_unwind()
                                    .await;
                                match outcome {
                                    Ok(Ok(())) => {}
                                    Ok(Err(e)) => {
                                        error!(
                                            error = %e,
                                            update_id,
                                            handler = %handler_name,
                                            "Handler failed"
                                        );
                                    }
                                    Err(_) => {
                                        error!(
                                            update_id,
                                            handler = %handler_name,
                                            "Handler panicked"
                                        );
                                    }
                                }
                            }
                            .boxed(),
                        );
                    }
                    DispatchPolicy::Blocking => {
                        // Running inside its own task keeps a panicking handler from unwinding
                        // through the dispatch loop.
                        let outcome =
                            tokio::spawn(async move { handler.handle(ctx, update).await }).await;
                        match outcome {
                            Ok(Ok(())) => {
                                debug!(update_id, handler = %handler_name, "step: handler done");
                            }
                            Ok(Err(e)) => {
                                report.failed += 1;
                                error!(
                                    error = %e,
                                    update_id,
                                    handler = %handler_name,
                                    "Handler failed"
                                );
                            }
                            Err(join_error) => {
                                report.failed += 1;
                                error!(
                                    error = %join_error,
                                    update_id,
                                    handler = %handler_name,
                                    "Handler panicked"
                                );
                            }
                        }
                    }
                }
            }

            report.updates += 1;
        }

        info!(
            updates = report.updates,
            invoked = report.invoked,
            failed = report.failed,
            "step: dispatch finished"
        );
        report
    }
}

/// Polls `task` once on the dispatching task, so handlers start in dispatch order whatever the
/// scheduler does, then hands the rest of it to the runtime.
fn start_detached(mut task: BoxFuture<'static, ()>) {
    let mut cx = TaskContext::from_waker(noop_waker_ref());
    if task.as_mut().poll(&mut cx).is_pending() {
        tokio::spawn(task);
    }
}
