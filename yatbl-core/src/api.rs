//! Remote Bot API abstraction.
//!
//! [`TelegramApi`] is transport-agnostic: every operation (`getUpdates`, `sendMessage`,
//! `setWebhook`, ...) goes through one `call(method, payload)` shape and yields the raw
//! [`ApiResponse`] envelope. The HTTP implementation lives in yatbl-telegram; tests substitute
//! [`crate::MockApi`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::error::{Result, YatblError};

/// Response envelope returned by every Bot API method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
}

impl ApiResponse {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            description: None,
            error_code: None,
        }
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            description: Some(description.into()),
            error_code: None,
        }
    }

    pub fn with_error_code(mut self, code: i64) -> Self {
        self.error_code = Some(code);
        self
    }

    /// Deserializes `result` into `T`, or fails with the API description when `ok` is false.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        if !self.ok {
            return Err(YatblError::Api(self.describe()));
        }
        let value = self.result.unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Human readable failure reason.
    pub fn describe(&self) -> String {
        match (&self.error_code, &self.description) {
            (Some(code), Some(desc)) => format!("{} ({})", desc, code),
            (None, Some(desc)) => desc.clone(),
            (Some(code), None) => format!("error code {}", code),
            (None, None) => "unknown error".to_string(),
        }
    }
}

/// Remote Bot API client. One method per remote call; implementations own the base address.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// Calls `method` with a JSON `payload`. `Err` is reserved for transport failures (network,
    /// undecodable body); API-level failures come back as `Ok` with `ok == false`.
    async fn call(&self, method: &str, payload: Value) -> Result<ApiResponse>;
}

/// Pluggable sink for failed API responses; receives the raw `{ ok: false, description }` value.
pub type ApiErrorHandler = Arc<dyn Fn(&ApiResponse) + Send + Sync>;

/// Default handler: logs the failed response at error level.
pub fn default_api_error_handler() -> ApiErrorHandler {
    Arc::new(|response: &ApiResponse| {
        error!(
            error_code = ?response.error_code,
            description = %response.describe(),
            "Telegram API call failed"
        );
    })
}

/// Converts a transport `Err` into the failure envelope the error handler expects.
pub fn response_or_failure(result: Result<ApiResponse>) -> ApiResponse {
    match result {
        Ok(response) => response,
        Err(e) => ApiResponse::failure(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_result_success() {
        let response = ApiResponse::success(json!([1, 2, 3]));
        let numbers: Vec<i32> = response.into_result().unwrap();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_into_result_failure_carries_description() {
        let response = ApiResponse::failure("Conflict: terminated by other getUpdates request")
            .with_error_code(409);
        let err = response.into_result::<Value>().unwrap_err();
        assert!(matches!(err, YatblError::Api(ref msg) if msg.contains("409")));
    }

    #[test]
    fn test_response_deserializes_failure_envelope() {
        let response: ApiResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)
                .unwrap();
        assert!(!response.ok);
        assert_eq!(response.describe(), "Unauthorized (401)");
    }

    #[test]
    fn test_response_or_failure_maps_transport_error() {
        let response = response_or_failure(Err(YatblError::Http("connection refused".into())));
        assert!(!response.ok);
        assert_eq!(
            response.description.as_deref(),
            Some("HTTP error: connection refused")
        );
    }
}
