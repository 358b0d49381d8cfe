//! Bot command list helpers (`getMyCommands` / `setMyCommands`).

use serde_json::json;
use tracing::{debug, instrument};
use yatbl_core::{BotCommand, Result, TelegramApi};

/// Commands currently registered for the bot.
pub async fn get_commands(api: &dyn TelegramApi) -> Result<Vec<BotCommand>> {
    api.call("getMyCommands", json!({})).await?.into_result()
}

/// Registers `commands`.
///
/// With `merge` and a non-empty list, the existing commands are kept and the new ones appended;
/// an existing command with the same name is replaced. An empty list clears all commands.
#[instrument(skip(api, commands), fields(count = commands.len()))]
pub async fn set_commands(
    api: &dyn TelegramApi,
    commands: Vec<BotCommand>,
    merge: bool,
) -> Result<()> {
    let commands = if merge && !commands.is_empty() {
        let mut merged: Vec<BotCommand> = get_commands(api)
            .await?
            .into_iter()
            .filter(|existing| !commands.iter().any(|c| c.command == existing.command))
            .collect();
        merged.extend(commands);
        merged
    } else {
        commands
    };

    debug!(total = commands.len(), "step: setMyCommands");
    let _: bool = api
        .call("setMyCommands", json!({ "commands": commands }))
        .await?
        .into_result()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use yatbl_core::{ApiResponse, MockApi, YatblError};

    fn existing() -> ApiResponse {
        ApiResponse::success(json!([
            {"command": "test1", "description": "testing 1"},
            {"command": "test2", "description": "testing 2"}
        ]))
    }

    #[tokio::test]
    async fn test_merge_appends_to_existing() {
        let api = MockApi::new();
        api.push_response("getMyCommands", existing());

        set_commands(&api, vec![BotCommand::new("test3", "testing 3")], true)
            .await
            .unwrap();

        let sent = api.calls_to("setMyCommands");
        assert_eq!(
            sent,
            vec![json!({"commands": [
                {"command": "test1", "description": "testing 1"},
                {"command": "test2", "description": "testing 2"},
                {"command": "test3", "description": "testing 3"}
            ]})]
        );
    }

    #[tokio::test]
    async fn test_merge_replaces_same_name() {
        let api = MockApi::new();
        api.push_response("getMyCommands", existing());

        set_commands(&api, vec![BotCommand::new("test1", "renamed")], true)
            .await
            .unwrap();

        assert_eq!(
            api.calls_to("setMyCommands")[0]["commands"],
            json!([
                {"command": "test2", "description": "testing 2"},
                {"command": "test1", "description": "renamed"}
            ])
        );
    }

    #[tokio::test]
    async fn test_empty_list_clears_without_lookup() {
        let api = MockApi::new();
        set_commands(&api, Vec::new(), true).await.unwrap();

        assert!(api.calls_to("getMyCommands").is_empty());
        assert_eq!(api.calls_to("setMyCommands"), vec![json!({"commands": []})]);
    }

    #[tokio::test]
    async fn test_failed_lookup_aborts() {
        let api = MockApi::new();
        api.push_response("getMyCommands", ApiResponse::failure("Unauthorized"));

        let err = set_commands(&api, vec![BotCommand::new("a", "b")], true)
            .await
            .unwrap_err();

        assert!(matches!(err, YatblError::Api(_)));
        assert!(api.calls_to("setMyCommands").is_empty());
    }
}
