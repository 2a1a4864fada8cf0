use crate::utils::to_rfc3339;
use mongodb::bson::{DateTime, oid::ObjectId};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeStatus {
    Open,
    Completed,
    Cancelled,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Open => "open",
            ExchangeStatus::Completed => "completed",
            ExchangeStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub creator_id: ObjectId,
    pub creator_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub looking_for: String,
    #[serde(default)]
    pub offering: String,
    #[serde(default)]
    pub time_needed: f64,
    #[serde(default)]
    pub time_offered: f64,
    #[serde(default)]
    pub description: String,
    pub status: ExchangeStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct ExchangeListQuery {
    /// "all", "mine" or "myskills"
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateExchangeDto {
    #[validate(length(min = 1, max = 120, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "lookingFor is required"))]
    pub looking_for: String,
    #[validate(length(min = 1, message = "offering is required"))]
    pub offering: String,
    #[validate(range(min = 0.0, message = "timeNeeded cannot be negative"))]
    #[serde(default)]
    pub time_needed: f64,
    #[validate(range(min = 0.0, message = "timeOffered cannot be negative"))]
    #[serde(default)]
    pub time_offered: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExchangeDto {
    pub id: Option<String>,
    pub title: Option<String>,
    pub looking_for: Option<String>,
    pub offering: Option<String>,
    #[validate(range(min = 0.0, message = "timeNeeded cannot be negative"))]
    pub time_needed: Option<f64>,
    #[validate(range(min = 0.0, message = "timeOffered cannot be negative"))]
    pub time_offered: Option<f64>,
    pub description: Option<String>,
    pub status: Option<ExchangeStatus>,
}

#[derive(Debug, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub creator_id: String,
    pub creator_name: String,
    pub title: String,
    pub looking_for: String,
    pub offering: String,
    pub time_needed: f64,
    pub time_offered: f64,
    pub description: String,
    pub status: ExchangeStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Exchange> for ExchangeResponse {
    fn from(exchange: &Exchange) -> Self {
        ExchangeResponse {
            id: exchange.id.map(|id| id.to_hex()).unwrap_or_default(),
            kind: "exchange",
            creator_id: exchange.creator_id.to_hex(),
            creator_name: exchange.creator_name.clone(),
            title: exchange.title.clone(),
            looking_for: exchange.looking_for.clone(),
            offering: exchange.offering.clone(),
            time_needed: exchange.time_needed,
            time_offered: exchange.time_offered,
            description: exchange.description.clone(),
            status: exchange.status,
            created_at: to_rfc3339(exchange.created_at),
            updated_at: to_rfc3339(exchange.updated_at),
        }
    }
}
