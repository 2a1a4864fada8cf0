use crate::utils::to_rfc3339;
use mongodb::bson::{DateTime, oid::ObjectId};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub hour_balance: f64,
    #[serde(default)]
    pub total_earned: f64,
    #[serde(default)]
    pub total_spent: f64,
    #[serde(default)]
    pub pending_earnings: f64,
    #[serde(default)]
    pub overall_rating: f64,
    #[serde(default)]
    pub total_reviews: i32,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub last_login_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(email: String, password_hash: String, display_name: String) -> Self {
        let now = DateTime::now();
        User {
            id: None,
            email,
            password_hash,
            display_name,
            bio: None,
            location: None,
            photo_url: None,
            skills: Vec::new(),
            interests: Vec::new(),
            hour_balance: 0.0,
            total_earned: 0.0,
            total_spent: 0.0,
            pending_earnings: 0.0,
            overall_rating: 0.0,
            total_reviews: 0,
            is_admin: false,
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Display name used when the account was registered without one.
    pub fn default_display_name(email: &str) -> String {
        email.split('@').next().unwrap_or(email).to_string()
    }
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AuthDto {
    pub action: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDto {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenDto {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, max = 80, message = "Display name must be 1-80 characters"))]
    pub display_name: Option<String>,
    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    pub bio: Option<String>,
    pub location: Option<String>,
    pub photo_url: Option<String>,
    pub skills: Option<Vec<String>>,
    pub interests: Option<Vec<String>>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub photo_url: Option<String>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub hour_balance: f64,
    pub total_earned: f64,
    pub total_spent: f64,
    pub overall_rating: f64,
    pub total_reviews: i32,
    pub is_admin: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            email: user.email,
            display_name: user.display_name,
            bio: user.bio,
            location: user.location,
            photo_url: user.photo_url,
            skills: user.skills,
            interests: user.interests,
            hour_balance: user.hour_balance,
            total_earned: user.total_earned,
            total_spent: user.total_spent,
            overall_rating: user.overall_rating,
            total_reviews: user.total_reviews,
            is_admin: user.is_admin,
            created_at: to_rfc3339(user.created_at),
        }
    }
}

/// Public view of a user: what search results and favorites may show.
#[derive(Debug, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub location: Option<String>,
    pub overall_rating: f64,
    pub total_reviews: i32,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        PublicUser {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            display_name: user.display_name.clone(),
            bio: user.bio.clone(),
            skills: user.skills.clone(),
            location: user.location.clone(),
            overall_rating: user.overall_rating,
            total_reviews: user.total_reviews,
            photo_url: user.photo_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_users_start_with_empty_wallet() {
        let user = User::new("ada@skillmint.io".into(), "hash".into(), "Ada".into());
        assert_eq!(user.hour_balance, 0.0);
        assert_eq!(user.total_reviews, 0);
        assert!(user.is_active);
        assert!(!user.is_admin);
    }

    #[test]
    fn display_name_falls_back_to_email_local_part() {
        assert_eq!(User::default_display_name("grace.hopper@navy.mil"), "grace.hopper");
    }

    #[test]
    fn response_never_exposes_password_hash() {
        let mut user = User::new("ada@skillmint.io".into(), "secret-hash".into(), "Ada".into());
        user.id = Some(ObjectId::new());
        let value = serde_json::to_value(UserResponse::from(user)).unwrap();

        assert!(value.get("passwordHash").is_none());
        assert_eq!(value["displayName"], "Ada");
    }
}
