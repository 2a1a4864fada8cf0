use crate::utils::to_rfc3339;
use mongodb::bson::{DateTime, oid::ObjectId};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub hourly_rate: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkillListQuery {
    pub category: Option<String>,
    #[field(name = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveSkillDto {
    pub id: Option<String>,
    #[validate(length(min = 1, max = 120, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[validate(range(min = 0.0, max = 100.0, message = "Hourly rate must be between 0 and 100 hours"))]
    pub hourly_rate: f64,
}

#[derive(Debug, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SkillResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub hourly_rate: f64,
    pub rating: f64,
    pub review_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Skill> for SkillResponse {
    fn from(skill: &Skill) -> Self {
        SkillResponse {
            id: skill.id.map(|id| id.to_hex()).unwrap_or_default(),
            kind: "skill",
            user_id: skill.user_id.to_hex(),
            title: skill.title.clone(),
            description: skill.description.clone(),
            category: skill.category.clone(),
            hourly_rate: skill.hourly_rate,
            rating: skill.rating,
            review_count: skill.review_count,
            created_at: to_rfc3339(skill.created_at),
            updated_at: to_rfc3339(skill.updated_at),
        }
    }
}
