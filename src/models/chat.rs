//! Conversation and message records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation as listed for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Backend conversation id
    pub id: String,
    /// Display title
    pub title: String,
    /// Account ids of everyone in the conversation
    pub participants: Vec<String>,
    /// Time of the newest message, if any
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_deserialize_without_last_message() {
        let json = r#"{"id":"c1","title":"Order #42","participants":["u1","v9"]}"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap();

        assert_eq!(conversation.id, "c1");
        assert_eq!(conversation.participants.len(), 2);
        assert!(conversation.last_message_at.is_none());
    }

    #[test]
    fn test_message_serialize() {
        let message = Message {
            id: "m1".to_string(),
            conversation_id: "c1".to_string(),
            sender_id: "u1".to_string(),
            body: "Is this still available?".to_string(),
            sent_at: Utc::now(),
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"conversation_id\":\"c1\""));

        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }
}
