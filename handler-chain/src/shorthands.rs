//! Built-in shorthands.
//!
//! [`default_shorthands`] registers `reply_message`, `commands` and `message`; `get_command` and
//! `no_commands` are opt-in.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;
use yatbl_core::{
    command_names, has_no_commands, parse_command, HandlerError, Result, TelegramApi, Update,
};

use crate::shorthand::{BoundShortHand, ShortHand};

/// `reply_message`, `commands` and `message`.
pub fn default_shorthands() -> Vec<ShortHand> {
    vec![reply_message(), commands(), message()]
}

/// `reply_message`: sends a message to the update's chat.
///
/// Arguments are either the text as a JSON string, or an object with `text` plus any extra
/// `sendMessage` parameters, which are merged into the payload. Returns the raw API response.
pub fn reply_message() -> ShortHand {
    ShortHand::new("reply_message", |update: &Arc<Update>, api: &Arc<dyn TelegramApi>| {
        let chat_id = update.chat_id();
        let api = Arc::clone(api);
        BoundShortHand::new(move |args| send_reply(Arc::clone(&api), chat_id, args))
    })
}

async fn send_reply(api: Arc<dyn TelegramApi>, chat_id: Option<i64>, args: Value) -> Result<Value> {
    let chat_id = chat_id.ok_or(HandlerError::NoMessage)?;
    let mut payload = match args {
        Value::String(text) => {
            let mut map = Map::new();
            map.insert("text".to_string(), Value::String(text));
            map
        }
        Value::Object(map) if map.contains_key("text") => map,
        other => {
            return Err(HandlerError::InvalidArguments(format!(
                "reply_message expects a text or an object with text, got {}",
                other
            ))
            .into())
        }
    };
    payload.insert("chat_id".to_string(), json!(chat_id));

    debug!(chat_id, "step: reply_message sendMessage");
    let response = api.call("sendMessage", Value::Object(payload)).await?;
    Ok(serde_json::to_value(response)?)
}

/// `commands`: names of every command in the message, in order (empty without a message).
pub fn commands() -> ShortHand {
    ShortHand::new("commands", |update: &Arc<Update>, _api: &Arc<dyn TelegramApi>| {
        BoundShortHand::value(json!(command_names(update.message.as_ref())))
    })
}

/// `message`: a `{ text, photo, video, sticker }` view of the message, or `null` without one.
pub fn message() -> ShortHand {
    ShortHand::new("message", |update: &Arc<Update>, _api: &Arc<dyn TelegramApi>| {
        let view = match &update.message {
            Some(message) => json!({
                "text": message.text,
                "photo": message.photo,
                "video": message.video,
                "sticker": message.sticker,
            }),
            None => Value::Null,
        };
        BoundShortHand::value(view)
    })
}

/// `get_command`: command parser bound to the update.
///
/// Takes the command name (string, or `{ "command": name }`) and returns the parsed argument
/// lists, or `null` when the command is absent.
pub fn get_command() -> ShortHand {
    ShortHand::new("get_command", |update: &Arc<Update>, _api: &Arc<dyn TelegramApi>| {
        let update = Arc::clone(update);
        BoundShortHand::new(move |args| {
            let parsed = parse_bound_command(&update, &args);
            async move { parsed }
        })
    })
}

fn parse_bound_command(update: &Update, args: &Value) -> Result<Value> {
    let command = match args {
        Value::String(command) => command.as_str(),
        Value::Object(map) => map
            .get("command")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::InvalidArguments("get_command needs a command".into()))?,
        other => {
            return Err(HandlerError::InvalidArguments(format!(
                "get_command expects a command name, got {}",
                other
            ))
            .into())
        }
    };
    Ok(json!(parse_command(update.message.as_ref(), command)))
}

/// `no_commands`: true when the message carries no command.
pub fn no_commands() -> ShortHand {
    ShortHand::new("no_commands", |update: &Arc<Update>, _api: &Arc<dyn TelegramApi>| {
        BoundShortHand::value(json!(has_no_commands(update.message.as_ref())))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shorthand::ShortHandRegistry;
    use yatbl_core::{ApiResponse, Message, MessageEntity, MockApi};

    fn registry() -> ShortHandRegistry {
        let mut registry = ShortHandRegistry::new();
        registry.register_all(default_shorthands()).unwrap();
        registry.register(get_command()).unwrap();
        registry.register(no_commands()).unwrap();
        registry
    }

    fn command_update() -> Arc<Update> {
        let message = Message::text(5, 77, "/start a b")
            .with_entities(vec![MessageEntity::bot_command(0, 6)]);
        Arc::new(Update::with_message(1, message))
    }

    #[tokio::test]
    async fn test_reply_message_sends_to_update_chat() {
        let api = Arc::new(MockApi::new());
        api.push_response("sendMessage", ApiResponse::success(json!({"message_id": 9})));

        let ctx = registry().compose(command_update(), api.clone());
        let response = ctx
            .reply_message("hi", json!({"reply_to_message_id": 5}))
            .await
            .unwrap();

        assert!(response.ok);
        assert_eq!(
            api.calls_to("sendMessage"),
            vec![json!({"chat_id": 77, "text": "hi", "reply_to_message_id": 5})]
        );
    }

    #[tokio::test]
    async fn test_reply_message_without_message_fails() {
        let api = Arc::new(MockApi::new());
        let ctx = registry().compose(Arc::new(Update::empty(3)), api.clone());
        let err = ctx.call("reply_message", json!("hi")).await.unwrap_err();
        assert!(matches!(
            err,
            yatbl_core::YatblError::Handler(HandlerError::NoMessage)
        ));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_getters() {
        let ctx = registry().compose(command_update(), Arc::new(MockApi::new()));

        assert_eq!(ctx.commands().await.unwrap(), vec!["start".to_string()]);
        assert_eq!(
            ctx.call("message", Value::Null).await.unwrap()["text"],
            json!("/start a b")
        );
        assert_eq!(
            ctx.call("get_command", json!("start")).await.unwrap(),
            json!([["a", "b"]])
        );
        assert_eq!(
            ctx.call("get_command", json!({"command": "help"})).await.unwrap(),
            Value::Null
        );
        assert_eq!(ctx.call("no_commands", Value::Null).await.unwrap(), json!(false));
    }

    #[tokio::test]
    async fn test_unknown_shorthand() {
        let ctx = ShortHandRegistry::new().compose(command_update(), Arc::new(MockApi::new()));
        let err = ctx.call("reply_message", json!("hi")).await.unwrap_err();
        assert!(matches!(
            err,
            yatbl_core::YatblError::UnknownShortHand(ref n) if n == "reply_message"
        ));
    }
}
