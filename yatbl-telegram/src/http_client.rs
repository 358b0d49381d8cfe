//! Remote API client over HTTPS: `POST {api_url}/bot{token}/{method}` with a JSON body.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};
use yatbl_core::{ApiResponse, Result, TelegramApi, YatblError};

use crate::config::BotConfig;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// [`TelegramApi`] backed by `reqwest`.
///
/// The response body is decoded as an [`ApiResponse`] whatever the HTTP status, so Bot API
/// failures (`401`, `409`, ...) come back as `ok: false`. Network and decoding failures are
/// `Err(YatblError::Http)`.
#[derive(Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApiClient {
    /// Client for the public Bot API endpoint.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_api_url(token, None)
    }

    /// Client for `api_url` (e.g. a local Bot API server or a mock); `None` uses
    /// [`DEFAULT_API_URL`].
    pub fn with_api_url(token: &str, api_url: Option<&str>) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(YatblError::Config("bot token must not be empty".to_string()));
        }
        let api_url = api_url.unwrap_or(DEFAULT_API_URL).trim_end_matches('/');
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| YatblError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}/", api_url, token),
        })
    }

    pub fn from_config(config: &BotConfig) -> Result<Self> {
        Self::with_api_url(&config.bot_token, config.telegram_api_url.as_deref())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}{}", self.base_url, method)
    }
}

#[async_trait]
impl TelegramApi for HttpApiClient {
    #[instrument(skip(self, payload))]
    async fn call(&self, method: &str, payload: Value) -> Result<ApiResponse> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&payload)
            .send()
            .await
            .map_err(|e| YatblError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| YatblError::Http(e.without_url().to_string()))?;
        debug!(status = %status, bytes = body.len(), "step: api response received");

        serde_json::from_slice::<ApiResponse>(&body).map_err(|e| {
            YatblError::Http(format!(
                "undecodable response from {} (status {}): {}",
                method, status, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOKEN: &str = "123:abc";

    #[test]
    fn test_empty_token_is_config_error() {
        assert!(matches!(
            HttpApiClient::new(""),
            Err(YatblError::Config(_))
        ));
    }

    #[test]
    fn test_method_url_layout() {
        let client = HttpApiClient::with_api_url(TOKEN, Some("http://localhost:8081/")).unwrap();
        assert_eq!(
            client.method_url("getUpdates"),
            "http://localhost:8081/bot123:abc/getUpdates"
        );
    }

    #[tokio::test]
    async fn test_call_posts_json_and_decodes_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bot123:abc/sendMessage")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(json!({"chat_id": 1, "text": "hi"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":{"message_id":7}}"#)
            .create_async()
            .await;

        let client = HttpApiClient::with_api_url(TOKEN, Some(&server.url())).unwrap();
        let response = client
            .call("sendMessage", json!({"chat_id": 1, "text": "hi"}))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(response.ok);
        assert_eq!(response.result, Some(json!({"message_id": 7})));
    }

    #[tokio::test]
    async fn test_call_decodes_failure_envelope_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:abc/getUpdates")
            .with_status(409)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"ok":false,"error_code":409,"description":"Conflict: webhook is active"}"#,
            )
            .create_async()
            .await;

        let client = HttpApiClient::with_api_url(TOKEN, Some(&server.url())).unwrap();
        let response = client.call("getUpdates", json!({"offset": 0})).await.unwrap();

        assert!(!response.ok);
        assert_eq!(response.error_code, Some(409));
    }

    #[tokio::test]
    async fn test_call_undecodable_body_is_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bot123:abc/getMe")
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let client = HttpApiClient::with_api_url(TOKEN, Some(&server.url())).unwrap();
        let err = client.call("getMe", json!({})).await.unwrap_err();

        assert!(matches!(err, YatblError::Http(ref msg) if msg.contains("502")));
    }
}
