use crate::utils::to_rfc3339;
use mongodb::bson::{DateTime, Document, oid::ObjectId};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    /// e.g. session_request, session_confirmed, review_received, message, system
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: Document,
    pub action_url: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub read_at: Option<DateTime>,
    pub created_at: DateTime,
}

impl Notification {
    pub fn new(user_id: ObjectId, kind: &str, title: impl Into<String>, message: impl Into<String>) -> Self {
        Notification {
            id: None,
            user_id,
            kind: kind.to_string(),
            title: title.into(),
            message: message.into(),
            data: Document::new(),
            action_url: None,
            read: false,
            read_at: None,
            created_at: DateTime::now(),
        }
    }

    pub fn with_data(mut self, data: Document) -> Self {
        self.data = data;
        self
    }

    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[field(name = "unreadOnly")]
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationDto {
    pub user_id: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "userId, type, title, and message are required"))]
    pub kind: String,
    #[validate(length(min = 1, message = "userId, type, title, and message are required"))]
    pub title: String,
    #[validate(length(min = 1, message = "userId, type, title, and message are required"))]
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub action_url: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadDto {
    pub notification_ids: Option<Vec<String>>,
    #[serde(default)]
    pub mark_all_as_read: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub action_url: Option<String>,
    pub read: bool,
    pub read_at: Option<String>,
    pub created_at: String,
}

impl From<&Notification> for NotificationResponse {
    fn from(n: &Notification) -> Self {
        NotificationResponse {
            id: n.id.map(|id| id.to_hex()).unwrap_or_default(),
            kind: n.kind.clone(),
            title: n.title.clone(),
            message: n.message.clone(),
            data: serde_json::to_value(&n.data).unwrap_or(serde_json::Value::Null),
            action_url: n.action_url.clone(),
            read: n.read,
            read_at: n.read_at.map(to_rfc3339),
            created_at: to_rfc3339(n.created_at),
        }
    }
}
