use crate::db;
use crate::utils::to_rfc3339;
use mongodb::bson::{DateTime, oid::ObjectId};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteType {
    Skill,
    User,
    Exchange,
}

impl FavoriteType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "skill" => Some(FavoriteType::Skill),
            "user" => Some(FavoriteType::User),
            "exchange" => Some(FavoriteType::Exchange),
            _ => None,
        }
    }

    /// List filters accept the plural forms as well.
    pub fn parse_filter(raw: &str) -> Option<Self> {
        Self::parse(raw.strip_suffix('s').unwrap_or(raw))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FavoriteType::Skill => "skill",
            FavoriteType::User => "user",
            FavoriteType::Exchange => "exchange",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            FavoriteType::Skill => db::SKILLS,
            FavoriteType::User => db::USERS,
            FavoriteType::Exchange => db::EXCHANGES,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub item_id: ObjectId,
    #[serde(rename = "type")]
    pub kind: FavoriteType,
    pub created_at: DateTime,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteListQuery {
    #[field(name = "type")]
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFavoriteQuery {
    #[field(name = "favoriteId")]
    pub favorite_id: Option<String>,
    #[field(name = "itemId")]
    pub item_id: Option<String>,
    #[field(name = "type")]
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddFavoriteDto {
    pub item_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FavoriteType,
    pub item_id: String,
    pub created_at: String,
    pub item: serde_json::Value,
}

impl FavoriteResponse {
    pub fn new(favorite: &Favorite, item: serde_json::Value) -> Self {
        FavoriteResponse {
            id: favorite.id.map(|id| id.to_hex()).unwrap_or_default(),
            kind: favorite.kind,
            item_id: favorite.item_id.to_hex(),
            created_at: to_rfc3339(favorite.created_at),
            item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_accept_plural_forms() {
        assert_eq!(FavoriteType::parse_filter("skills"), Some(FavoriteType::Skill));
        assert_eq!(FavoriteType::parse_filter("user"), Some(FavoriteType::User));
        assert_eq!(FavoriteType::parse_filter("exchanges"), Some(FavoriteType::Exchange));
        assert_eq!(FavoriteType::parse_filter("all"), None);
    }

    #[test]
    fn input_type_must_be_singular() {
        assert_eq!(FavoriteType::parse("skill"), Some(FavoriteType::Skill));
        assert_eq!(FavoriteType::parse("skills"), None);
        assert_eq!(FavoriteType::parse("session"), None);
    }

    #[test]
    fn each_type_maps_to_its_collection() {
        assert_eq!(FavoriteType::Skill.collection(), db::SKILLS);
        assert_eq!(FavoriteType::User.collection(), db::USERS);
        assert_eq!(FavoriteType::Exchange.collection(), db::EXCHANGES);
    }
}
