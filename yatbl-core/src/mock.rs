//! In-memory [`TelegramApi`] for tests: records every call and replays scripted responses.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{ApiResponse, TelegramApi};
use crate::error::{Result, YatblError};

/// One recorded `call(method, payload)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub payload: Value,
}

enum Scripted {
    Response(ApiResponse),
    TransportError(String),
}

/// Scripted API double. Responses queued per method are returned in order; once a queue is
/// empty, `getUpdates` answers with an empty batch and every other method with `ok: true`.
#[derive(Default)]
pub struct MockApi {
    scripted: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next call of `method`.
    pub fn push_response(&self, method: &str, response: ApiResponse) -> &Self {
        self.push(method, Scripted::Response(response))
    }

    /// Queues a transport failure (`Err`) for the next call of `method`.
    pub fn push_transport_error(&self, method: &str, message: &str) -> &Self {
        self.push(method, Scripted::TransportError(message.to_string()))
    }

    /// All calls in the order they were made.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payloads of the calls made to `method`.
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .map(|call| call.payload)
            .collect()
    }

    fn push(&self, method: &str, scripted: Scripted) -> &Self {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method.to_string())
            .or_default()
            .push_back(scripted);
        self
    }
}

#[async_trait]
impl TelegramApi for MockApi {
    async fn call(&self, method: &str, payload: Value) -> Result<ApiResponse> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                method: method.to_string(),
                payload,
            });

        let next = self
            .scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(method)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::TransportError(message)) => Err(YatblError::Http(message)),
            None if method == "getUpdates" => Ok(ApiResponse::success(json!([]))),
            None => Ok(ApiResponse::success(Value::Bool(true))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replays_in_order_then_defaults() {
        let api = MockApi::new();
        api.push_response("getMe", ApiResponse::success(json!({"id": 1})))
            .push_response("getMe", ApiResponse::failure("second"));

        assert!(api.call("getMe", json!({})).await.unwrap().ok);
        assert!(!api.call("getMe", json!({})).await.unwrap().ok);
        assert_eq!(
            api.call("getMe", json!({})).await.unwrap().result,
            Some(Value::Bool(true))
        );
        assert_eq!(
            api.call("getUpdates", json!({"offset": 0})).await.unwrap().result,
            Some(json!([]))
        );
        assert_eq!(api.calls_to("getMe").len(), 3);
        assert_eq!(api.calls_to("getUpdates"), vec![json!({"offset": 0})]);
    }

    #[tokio::test]
    async fn test_mock_transport_error() {
        let api = MockApi::new();
        api.push_transport_error("sendMessage", "connection reset");
        let err = api.call("sendMessage", json!({})).await.unwrap_err();
        assert!(matches!(err, YatblError::Http(ref m) if m == "connection reset"));
    }
}
