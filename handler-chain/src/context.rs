//! Per-update context handed to every handler.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use yatbl_core::{ApiResponse, Result, TelegramApi, Update, YatblError};

use crate::shorthand::BoundShortHand;

/// Shorthands bound to one update, plus the update and API client they were bound to.
///
/// Created fresh by the dispatcher for every update and dropped once that update's handlers have
/// run. Never shared across updates.
pub struct Context {
    update: Arc<Update>,
    api: Arc<dyn TelegramApi>,
    shorthands: HashMap<String, BoundShortHand>,
}

impl Context {
    pub(crate) fn new(
        update: Arc<Update>,
        api: Arc<dyn TelegramApi>,
        shorthands: HashMap<String, BoundShortHand>,
    ) -> Self {
        Self {
            update,
            api,
            shorthands,
        }
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn api(&self) -> &Arc<dyn TelegramApi> {
        &self.api
    }

    pub fn get(&self, name: &str) -> Option<&BoundShortHand> {
        self.shorthands.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shorthands.contains_key(name)
    }

    /// Bound shorthand names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.shorthands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.shorthands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shorthands.is_empty()
    }

    /// Invokes the shorthand registered under `name`.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        match self.shorthands.get(name) {
            Some(shorthand) => shorthand.call(args).await,
            None => Err(YatblError::UnknownShortHand(name.to_string())),
        }
    }

    /// Typed wrapper over the `reply_message` shorthand. `extra` is merged into the
    /// `sendMessage` payload (e.g. `reply_to_message_id`, `parse_mode`).
    pub async fn reply_message(&self, text: &str, extra: Value) -> Result<ApiResponse> {
        let mut args = match extra {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        args.insert("text".to_string(), json!(text));
        let value = self.call("reply_message", Value::Object(args)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Typed wrapper over the `commands` shorthand.
    pub async fn commands(&self) -> Result<Vec<String>> {
        let value = self.call("commands", Value::Null).await?;
        Ok(serde_json::from_value(value)?)
    }
}
