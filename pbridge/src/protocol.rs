//! Wire shapes for the stdin/stdout bridge.
//!
//! One JSON object per line in each direction. Commands arrive on stdin;
//! command outcomes and stream events leave on stdout. Logs go to stderr
//! so stdout stays parseable by the supervising process.

use serde::{Deserialize, Serialize};

use pprovider::Message;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BridgeCommand {
    Chat { message: String },
    StreamChat { message: String },
    Reset,
    History,
}

/// Terminal line for a `chat`, `reset`, or `history` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandOutcome {
    Reply { success: bool, response: String },
    Notice { success: bool, message: String },
    History { success: bool, history: Vec<HistoryEntry> },
    Failure { success: bool, error: String },
}

impl CommandOutcome {
    pub fn reply(response: impl Into<String>) -> Self {
        Self::Reply {
            success: true,
            response: response.into(),
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            success: true,
            message: message.into(),
        }
    }

    pub fn history(messages: &[Message]) -> Self {
        Self::History {
            success: true,
            history: messages.iter().map(HistoryEntry::from).collect(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

/// One line of a `stream_chat` response. Zero or more `Chunk` lines are
/// followed by exactly one `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Chunk { text: String },
    Done,
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pprovider::Role;

    #[test]
    fn commands_parse_from_tagged_json() {
        let chat: BridgeCommand =
            serde_json::from_str(r#"{"command":"chat","message":"hello"}"#).unwrap();
        assert_eq!(
            chat,
            BridgeCommand::Chat {
                message: "hello".to_string()
            }
        );

        let stream: BridgeCommand =
            serde_json::from_str(r#"{"command":"stream_chat","message":"hi"}"#).unwrap();
        assert_eq!(
            stream,
            BridgeCommand::StreamChat {
                message: "hi".to_string()
            }
        );

        assert_eq!(
            serde_json::from_str::<BridgeCommand>(r#"{"command":"reset"}"#).unwrap(),
            BridgeCommand::Reset
        );
        assert_eq!(
            serde_json::from_str::<BridgeCommand>(r#"{"command":"history"}"#).unwrap(),
            BridgeCommand::History
        );
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(serde_json::from_str::<BridgeCommand>(r#"{"command":"shutdown"}"#).is_err());
    }

    #[test]
    fn outcome_lines_match_the_documented_shapes() {
        assert_eq!(
            serde_json::to_string(&CommandOutcome::reply("hi")).unwrap(),
            r#"{"success":true,"response":"hi"}"#
        );
        assert_eq!(
            serde_json::to_string(&CommandOutcome::notice("history cleared")).unwrap(),
            r#"{"success":true,"message":"history cleared"}"#
        );
        assert_eq!(
            serde_json::to_string(&CommandOutcome::failure("boom")).unwrap(),
            r#"{"success":false,"error":"boom"}"#
        );

        let history = CommandOutcome::history(&[
            Message::new(Role::System, "be brief"),
            Message::new(Role::User, "hello"),
        ]);
        assert_eq!(
            serde_json::to_string(&history).unwrap(),
            r#"{"success":true,"history":[{"role":"system","content":"be brief"},{"role":"user","content":"hello"}]}"#
        );
    }

    #[test]
    fn stream_event_lines_match_the_documented_shapes() {
        assert_eq!(
            serde_json::to_string(&StreamEvent::Chunk {
                text: "frag".to_string()
            })
            .unwrap(),
            r#"{"type":"chunk","text":"frag"}"#
        );
        assert_eq!(
            serde_json::to_string(&StreamEvent::Done).unwrap(),
            r#"{"type":"done"}"#
        );
        assert_eq!(
            serde_json::to_string(&StreamEvent::Error {
                error: "boom".to_string()
            })
            .unwrap(),
            r#"{"type":"error","error":"boom"}"#
        );
    }
}
