//! [`Bot`] facade: one handler chain fed by polling or by a webhook server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use handler_chain::{
    default_shorthands, AllCommandsHandler, CommandHandler, Context, DispatchPolicy,
    DispatchReport, Handler, HandlerChain, MessageHandler, ShortHand,
};
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tracing::{info, instrument};
use url::Url;
use yatbl_core::{
    default_api_error_handler, ApiErrorHandler, ApiResponse, CommandArgs, Result, TelegramApi,
    Update, YatblError,
};

use crate::config::BotConfig;
use crate::http_client::HttpApiClient;
use crate::polling::{PollingOptions, PollingSource, PollingState};
use crate::webhook::{self, resolve_webhook_url, WebhookConfig, WebhookRoute, WebhookServer};

/// Collects handlers and shorthands; [`build`](Self::build) freezes them into a [`Bot`].
///
/// The default shorthands (`reply_message`, `commands`, `message`) are registered first, so a
/// user shorthand with the same name overrides them.
pub struct BotBuilder {
    token: String,
    chain: HandlerChain,
    on_api_error: ApiErrorHandler,
    polling: PollingOptions,
}

impl BotBuilder {
    fn with_api(token: String, api: Arc<dyn TelegramApi>) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(YatblError::Config("bot token must not be empty".to_string()));
        }
        let chain = HandlerChain::new(api).add_shorthands(default_shorthands())?;
        Ok(Self {
            token,
            chain,
            on_api_error: default_api_error_handler(),
            polling: PollingOptions::default(),
        })
    }

    /// Replaces the API-error handler (default: log at error level).
    pub fn on_api_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ApiResponse) + Send + Sync + 'static,
    {
        self.on_api_error = Arc::new(handler);
        self
    }

    pub fn policy(mut self, policy: DispatchPolicy) -> Self {
        self.chain = self.chain.with_policy(policy);
        self
    }

    pub fn polling_options(mut self, options: PollingOptions) -> Self {
        self.polling = options;
        self
    }

    pub fn add_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.chain = self.chain.add_handler(handler);
        self
    }

    /// Fails on a malformed shorthand name.
    pub fn add_shorthand(mut self, shorthand: ShortHand) -> Result<Self> {
        self.chain = self.chain.add_shorthand(shorthand)?;
        Ok(self)
    }

    pub fn add_shorthands<I>(mut self, shorthands: I) -> Result<Self>
    where
        I: IntoIterator<Item = ShortHand>,
    {
        self.chain = self.chain.add_shorthands(shorthands)?;
        Ok(self)
    }

    pub fn check_shorthand_conflict(&self, name: &str) -> bool {
        self.chain.has_shorthand_conflict(name)
    }

    pub fn on_command<F, Fut>(self, command: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Arc<Context>, Vec<CommandArgs>, Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add_handler(Arc::new(CommandHandler::new(command, callback)))
    }

    pub fn on_all_commands<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(Arc<Context>, Vec<String>, Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add_handler(Arc::new(AllCommandsHandler::new(callback)))
    }

    pub fn on_message<F, Fut>(self, callback: F) -> Self
    where
        F: Fn(Arc<Context>, Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.add_handler(Arc::new(MessageHandler::new(callback)))
    }

    pub fn build(self) -> Bot {
        let polling = PollingSource::new(
            self.chain.clone(),
            Arc::clone(&self.on_api_error),
            self.polling,
        );
        let route = WebhookRoute::for_token(&self.token);
        info!(
            handlers = self.chain.handler_count(),
            policy = ?self.chain.policy(),
            "step: bot built"
        );
        Bot {
            token: self.token,
            chain: self.chain,
            on_api_error: self.on_api_error,
            polling,
            route: Mutex::new(route),
            server: tokio::sync::Mutex::new(None),
        }
    }
}

/// A configured bot. Handlers and shorthands are fixed at build time.
pub struct Bot {
    token: String,
    chain: HandlerChain,
    on_api_error: ApiErrorHandler,
    polling: PollingSource,
    route: Mutex<WebhookRoute>,
    server: tokio::sync::Mutex<Option<WebhookServer>>,
}

impl Bot {
    /// Builder talking to the public Bot API.
    pub fn builder(token: impl Into<String>) -> Result<BotBuilder> {
        let token = token.into();
        let api = HttpApiClient::new(&token)?;
        BotBuilder::with_api(token, Arc::new(api))
    }

    /// Builder using `api` for every remote call.
    pub fn builder_with_api(
        token: impl Into<String>,
        api: Arc<dyn TelegramApi>,
    ) -> Result<BotBuilder> {
        BotBuilder::with_api(token.into(), api)
    }

    /// Builder honoring the API URL and dispatch policy of `config`.
    pub fn from_config(config: &BotConfig) -> Result<BotBuilder> {
        let api = HttpApiClient::from_config(config)?;
        Ok(BotBuilder::with_api(config.bot_token.clone(), Arc::new(api))?
            .policy(config.dispatch_policy()))
    }

    pub fn api(&self) -> &Arc<dyn TelegramApi> {
        self.chain.api()
    }

    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    /// Feeds `updates` to the handlers, as the update sources do.
    pub async fn dispatch(&self, updates: Vec<Update>) -> DispatchReport {
        self.chain.dispatch(updates).await
    }

    pub fn polling(&self) -> &PollingSource {
        &self.polling
    }

    /// Polls until [`stop_polling`](Self::stop_polling) is called.
    pub async fn start_polling(&self, interval: Duration) {
        self.polling.start(interval).await
    }

    pub fn spawn_polling(&self, interval: Duration) -> JoinHandle<()> {
        self.polling.spawn(interval)
    }

    pub fn stop_polling(&self) {
        self.polling.stop()
    }

    pub fn change_polling_interval(&self, interval: Duration) -> JoinHandle<()> {
        self.polling.change_interval(interval)
    }

    pub fn polling_state(&self) -> PollingState {
        self.polling.state()
    }

    /// Route the webhook server serves: the bot token, or the path of the last webhook URL set.
    pub fn webhook_route(&self) -> WebhookRoute {
        self.route
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Webhook router, for serving updates from an existing axum application.
    pub fn webhook_router(&self) -> Router {
        webhook::router(
            self.chain.clone(),
            Arc::clone(&self.on_api_error),
            self.webhook_route(),
        )
    }

    /// Starts the built-in webhook server on `port` (0 picks a free port).
    #[instrument(skip(self))]
    pub async fn start_server(&self, port: u16) -> Result<SocketAddr> {
        let mut server = self.server.lock().await;
        if let Some(running) = server.as_ref() {
            return Err(YatblError::Config(format!(
                "webhook server already running on {}",
                running.local_addr()
            )));
        }
        let started = WebhookServer::start(self.webhook_router(), port).await?;
        let addr = started.local_addr();
        *server = Some(started);
        Ok(addr)
    }

    /// Stops the webhook server; `false` when none was running.
    pub async fn stop_server(&self) -> Result<bool> {
        match self.server.lock().await.take() {
            Some(server) => {
                server.stop().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Registers `url` with `setWebhook` and returns the effective URL.
    #[instrument(skip(self, config))]
    pub async fn set_webhook(&self, url: &str, config: &WebhookConfig) -> Result<Url> {
        let url = resolve_webhook_url(url, &self.token)?;
        self.register_webhook(url, config).await
    }

    async fn register_webhook(&self, url: Url, config: &WebhookConfig) -> Result<Url> {
        let mut payload = match serde_json::to_value(config)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        payload.insert("url".to_string(), json!(url.as_str()));

        let _: bool = self
            .api()
            .call("setWebhook", Value::Object(payload))
            .await?
            .into_result()?;

        self.record_route(&url, config);
        info!(url = %url, "Webhook successfully set");
        Ok(url)
    }

    fn record_route(&self, url: &Url, config: &WebhookConfig) {
        *self.route.lock().unwrap_or_else(PoisonError::into_inner) =
            WebhookRoute::from_url(url, config.secret_token.clone());
    }

    /// Calls `deleteWebhook`; succeeds whether or not a webhook was set.
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<bool> {
        let mut payload = Map::new();
        if drop_pending_updates {
            payload.insert("drop_pending_updates".to_string(), json!(true));
        }
        self.api()
            .call("deleteWebhook", Value::Object(payload))
            .await?
            .into_result()
    }

    /// Starts the server on the URL's path, then registers the webhook. If either step fails,
    /// the server is stopped again and the previous route is restored.
    pub async fn set_webhook_and_start_server(
        &self,
        url: &str,
        config: &WebhookConfig,
        port: u16,
    ) -> Result<(Url, SocketAddr)> {
        let url = resolve_webhook_url(url, &self.token)?;
        let previous = self.webhook_route();
        self.record_route(&url, config);

        let addr = match self.start_server(port).await {
            Ok(addr) => addr,
            Err(e) => {
                self.restore_route(previous);
                return Err(e);
            }
        };
        match self.register_webhook(url, config).await {
            Ok(url) => Ok((url, addr)),
            Err(e) => {
                self.restore_route(previous);
                self.stop_server().await?;
                Err(e)
            }
        }
    }

    fn restore_route(&self, route: WebhookRoute) {
        *self.route.lock().unwrap_or_else(PoisonError::into_inner) = route;
    }

    /// Deletes the webhook first so no new updates arrive, then stops the server.
    pub async fn stop_server_and_remove_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        self.delete_webhook(drop_pending_updates).await?;
        self.stop_server().await?;
        Ok(())
    }
}
