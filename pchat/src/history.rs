//! Serializable history records for export and import.
//!
//! The on-disk shape is deliberately plain JSON so histories survive
//! crate version bumps and can be produced by other tooling:
//!
//! ```json
//! {"role": "user", "content": "hello", "metadata": {"source": "widget"}}
//! ```

use serde::{Deserialize, Serialize};

use pcommon::MetadataMap;
use pprovider::{Message, Role};

use crate::ChatError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataMap>,
}

impl From<&Message> for HistoryRecord {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
            metadata: message.metadata.clone(),
        }
    }
}

impl TryFrom<HistoryRecord> for Message {
    type Error = ChatError;

    fn try_from(record: HistoryRecord) -> Result<Self, Self::Error> {
        let role: Role = record.role.parse()?;
        let mut message = Message::new(role, record.content);
        if let Some(metadata) = record.metadata {
            message = message.with_metadata(metadata);
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatErrorKind;

    #[test]
    fn records_round_trip_through_json() {
        let mut metadata = MetadataMap::new();
        metadata.insert("source".to_string(), "widget".to_string());

        let messages = vec![
            Message::new(Role::System, "be brief"),
            Message::new(Role::User, "hello").with_metadata(metadata),
            Message::new(Role::Assistant, "hi"),
        ];

        let records: Vec<HistoryRecord> = messages.iter().map(HistoryRecord::from).collect();
        let json = serde_json::to_string(&records).expect("serialize");
        let parsed: Vec<HistoryRecord> = serde_json::from_str(&json).expect("deserialize");

        let restored: Vec<Message> = parsed
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<_, _>>()
            .expect("valid roles");
        assert_eq!(restored, messages);
    }

    #[test]
    fn metadata_is_omitted_from_json_when_absent() {
        let record = HistoryRecord::from(&Message::new(Role::User, "hello"));
        let json = serde_json::to_string(&record).expect("serialize");
        assert_eq!(json, r#"{"role":"user","content":"hello"}"#);
    }

    #[test]
    fn unrecognized_roles_are_rejected() {
        let record = HistoryRecord {
            role: "moderator".to_string(),
            content: "hello".to_string(),
            metadata: None,
        };

        let error = Message::try_from(record).expect_err("must fail");
        assert_eq!(error.kind, ChatErrorKind::InvalidRequest);
        assert!(error.message.contains("moderator"));
    }
}
