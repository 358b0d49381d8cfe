//! Command parsing from `bot_command` entities.
//!
//! Entity offsets are UTF-16 code unit indices, so all slicing goes through the UTF-16 encoding
//! of the text. Out-of-range spans are clamped instead of rejected.
//!
//! Known quirk: the argument blob of a matched command runs to the end of the text, even across
//! a later command entity. `"/start /start val1"` yields `[["/start", "val1"], ["val1"]]`.

use crate::types::Message;

/// Arguments of one matched command occurrence; `None` when nothing follows the command.
pub type CommandArgs = Option<Vec<String>>;

/// Finds every occurrence of `/command` in `message` and returns the arguments following each.
///
/// Returns `None` when the message is absent, has no entities, or no entity matches `command`
/// (compared case-sensitively, without the leading slash).
pub fn parse_command(message: Option<&Message>, command: &str) -> Option<Vec<CommandArgs>> {
    let message = message?;
    let entities = message.entities.as_deref().filter(|e| !e.is_empty())?;
    let text = utf16(message);

    let occurrences: Vec<CommandArgs> = entities
        .iter()
        .filter(|entity| entity.is_bot_command())
        .filter(|entity| {
            utf16_slice(&text, entity.offset.saturating_add(1), entity.end()) == command
        })
        .map(|entity| {
            // One unit past the span skips the separator after the command.
            let rest = utf16_slice(&text, entity.end().saturating_add(1), text.len());
            let args = rest.trim();
            if args.is_empty() {
                None
            } else {
                Some(args.split(' ').map(str::to_string).collect())
            }
        })
        .collect();

    if occurrences.is_empty() {
        None
    } else {
        Some(occurrences)
    }
}

/// Names (without slash) of every `bot_command` entity, in document order.
pub fn command_names(message: Option<&Message>) -> Vec<String> {
    let Some(message) = message else {
        return Vec::new();
    };
    let text = utf16(message);
    message
        .entities()
        .iter()
        .filter(|entity| entity.is_bot_command())
        .map(|entity| utf16_slice(&text, entity.offset.saturating_add(1), entity.end()))
        .filter(|name| !name.is_empty())
        .collect()
}

/// True when the message carries no `bot_command` entity (or there is no message at all).
pub fn has_no_commands(message: Option<&Message>) -> bool {
    message.map_or(true, |m| !m.entities().iter().any(|e| e.is_bot_command()))
}

fn utf16(message: &Message) -> Vec<u16> {
    message
        .text
        .as_deref()
        .unwrap_or_default()
        .encode_utf16()
        .collect()
}

fn utf16_slice(units: &[u16], start: usize, end: usize) -> String {
    let end = end.min(units.len());
    let start = start.min(end);
    String::from_utf16_lossy(&units[start..end])
}
