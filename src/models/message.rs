use crate::utils::to_rfc3339;
use mongodb::bson::{DateTime, oid::ObjectId};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub participants: Vec<ObjectId>,
    /// Unread counts keyed by participant id hex.
    #[serde(default)]
    pub unread: HashMap<String, i32>,
    pub created_at: DateTime,
}

impl Conversation {
    pub fn between(sender: ObjectId, recipient: ObjectId) -> Self {
        Conversation {
            id: None,
            participants: vec![sender, recipient],
            unread: HashMap::new(),
            created_at: DateTime::now(),
        }
    }

    pub fn is_participant(&self, user_id: &ObjectId) -> bool {
        self.participants.contains(user_id)
    }

    pub fn other_participant(&self, user_id: &ObjectId) -> Option<ObjectId> {
        self.participants.iter().find(|p| *p != user_id).copied()
    }

    pub fn unread_for(&self, user_id: &ObjectId) -> i32 {
        self.unread.get(&user_id.to_hex()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub conversation_id: ObjectId,
    pub sender_id: ObjectId,
    pub text: String,
    pub timestamp: DateTime,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    #[field(name = "conversationId")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageDto {
    pub recipient_id: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "Message text is required"))]
    pub text: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    pub timestamp: String,
}

impl From<&Message> for MessageResponse {
    fn from(m: &Message) -> Self {
        MessageResponse {
            id: m.id.map(|id| id.to_hex()).unwrap_or_default(),
            conversation_id: m.conversation_id.to_hex(),
            sender_id: m.sender_id.to_hex(),
            text: m.text.clone(),
            timestamp: to_rfc3339(m.timestamp),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ConversationPeer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub text: String,
    pub timestamp: String,
    pub sender_id: String,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub other_user: ConversationPeer,
    pub last_message: Option<LastMessage>,
    pub unread_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participants_and_unread_counts() {
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let mut convo = Conversation::between(a, b);
        convo.unread.insert(b.to_hex(), 3);

        assert!(convo.is_participant(&a));
        assert!(!convo.is_participant(&ObjectId::new()));
        assert_eq!(convo.other_participant(&a), Some(b));
        assert_eq!(convo.other_participant(&b), Some(a));
        assert_eq!(convo.unread_for(&b), 3);
        assert_eq!(convo.unread_for(&a), 0);
    }
}
