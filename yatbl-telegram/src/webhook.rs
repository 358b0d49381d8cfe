//! Webhook update source: an axum endpoint that accepts one update per `POST <path>`.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use handler_chain::{DispatchPolicy, HandlerChain};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use url::Url;
use yatbl_core::{ApiErrorHandler, ApiResponse, Result, Update, YatblError};

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// `setWebhook` parameters besides the URL. Unset fields are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebhookConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_pending_updates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Sent back by Telegram in the `X-Telegram-Bot-Api-Secret-Token` header; requests without
    /// it are rejected with `401`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
}

/// Where the server listens for updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRoute {
    /// Always starts with `/`.
    pub path: String,
    pub secret_token: Option<String>,
}

impl WebhookRoute {
    /// Default route: the bot token as path.
    pub fn for_token(token: &str) -> Self {
        Self {
            path: format!("/{}", token),
            secret_token: None,
        }
    }

    pub fn from_url(url: &Url, secret_token: Option<String>) -> Self {
        Self {
            path: url.path().to_string(),
            secret_token,
        }
    }
}

/// Validates a webhook URL. Only `https` is accepted; an empty or `/` path becomes the token.
pub fn resolve_webhook_url(url: &str, token: &str) -> Result<Url> {
    let mut parsed =
        Url::parse(url).map_err(|e| YatblError::Config(format!("invalid webhook URL: {}", e)))?;
    if parsed.scheme() != "https" {
        return Err(YatblError::InsecureWebhookUrl(url.to_string()));
    }
    if parsed.path().is_empty() || parsed.path() == "/" {
        parsed.set_path(token);
    }
    Ok(parsed)
}

#[derive(Clone)]
struct WebhookState {
    chain: HandlerChain,
    on_api_error: ApiErrorHandler,
    route: WebhookRoute,
}

/// Router answering only `POST` on the route path; any other request gets `404`.
pub fn router(chain: HandlerChain, on_api_error: ApiErrorHandler, route: WebhookRoute) -> Router {
    Router::new()
        .fallback(handle_update)
        .with_state(WebhookState {
            chain,
            on_api_error,
            route,
        })
}

#[instrument(name = "webhook.update", skip_all, fields(path = %uri.path()))]
async fn handle_update(
    State(state): State<WebhookState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if method != Method::POST || uri.path() != state.route.path {
        return StatusCode::NOT_FOUND;
    }

    if let Some(secret) = &state.route.secret_token {
        let presented = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(secret.as_str()) {
            warn!("Webhook request without a matching secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            let failure =
                ApiResponse::failure(format!("invalid update body: {}", e)).with_error_code(400);
            (state.on_api_error)(&failure);
            return StatusCode::BAD_REQUEST;
        }
    };

    let update_id = update.update_id;
    let report = state.chain.dispatch(vec![update]).await;

    if state.chain.policy() == DispatchPolicy::Blocking && report.failed > 0 {
        let failure = ApiResponse::failure(format!(
            "{} handler(s) failed for update {}",
            report.failed, update_id
        ))
        .with_error_code(500);
        (state.on_api_error)(&failure);
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    info!(update_id, "step: webhook update dispatched");
    StatusCode::OK
}

/// A running webhook server.
pub struct WebhookServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl WebhookServer {
    /// Binds `0.0.0.0:port` (0 picks a free port) and serves `router` on a new task.
    pub async fn start(router: Router, port: u16) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        info!(addr = %local_addr, "Webhook server listening");
        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for in-flight requests to finish.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        match self.task.await {
            Ok(result) => {
                result?;
                info!(addr = %self.local_addr, "Webhook server closed");
                Ok(())
            }
            Err(join_error) => {
                error!(error = %join_error, "Webhook server task failed");
                Err(YatblError::Io(std::io::Error::other(join_error.to_string())))
            }
        }
    }
}
