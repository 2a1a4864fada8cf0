use crate::utils::to_rfc3339;
use mongodb::bson::{DateTime, oid::ObjectId};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub reviewer_id: ObjectId,
    pub reviewer_name: String,
    pub reviewee_id: ObjectId,
    pub skill_id: ObjectId,
    pub exchange_id: Option<ObjectId>,
    pub rating: i32, // 1-5
    pub session_quality: i32,
    pub punctuality: i32,
    pub communication: i32,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Running mean after one more sample: `(old * count + value) / (count + 1)`.
pub fn incremental_mean(current: f64, count: i32, value: f64) -> (f64, i32) {
    let count = count.max(0);
    let next = count + 1;
    ((current * count as f64 + value) / next as f64, next)
}

/// Running mean after one existing sample changes from `old` to `new`.
pub fn replace_in_mean(current: f64, count: i32, old: f64, new: f64) -> f64 {
    if count <= 0 {
        return new;
    }
    current + (new - old) / count as f64
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewListQuery {
    #[field(name = "skillId")]
    pub skill_id: Option<String>,
    #[field(name = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewDto {
    pub skill_id: Option<String>,
    pub reviewee_id: Option<String>,
    pub exchange_id: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,
    pub comment: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Session quality must be between 1 and 5"))]
    pub session_quality: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Punctuality must be between 1 and 5"))]
    pub punctuality: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Communication must be between 1 and 5"))]
    pub communication: Option<i32>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReviewDto {
    pub id: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,
    pub comment: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Session quality must be between 1 and 5"))]
    pub session_quality: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Punctuality must be between 1 and 5"))]
    pub punctuality: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Communication must be between 1 and 5"))]
    pub communication: Option<i32>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: String,
    pub reviewer_id: String,
    pub reviewer_name: String,
    pub reviewee_id: String,
    pub skill_id: String,
    pub exchange_id: Option<String>,
    pub rating: i32,
    pub session_quality: i32,
    pub punctuality: i32,
    pub communication: i32,
    pub comment: String,
    pub created_at: String,
}

impl From<&Review> for ReviewResponse {
    fn from(r: &Review) -> Self {
        ReviewResponse {
            id: r.id.map(|id| id.to_hex()).unwrap_or_default(),
            reviewer_id: r.reviewer_id.to_hex(),
            reviewer_name: r.reviewer_name.clone(),
            reviewee_id: r.reviewee_id.to_hex(),
            skill_id: r.skill_id.to_hex(),
            exchange_id: r.exchange_id.map(|id| id.to_hex()),
            rating: r.rating,
            session_quality: r.session_quality,
            punctuality: r.punctuality,
            communication: r.communication,
            comment: r.comment.clone(),
            created_at: to_rfc3339(r.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_review_sets_the_mean() {
        assert_eq!(incremental_mean(0.0, 0, 4.0), (4.0, 1));
    }

    #[test]
    fn mean_moves_towards_new_value() {
        let (mean, count) = incremental_mean(4.0, 3, 2.0);
        assert_eq!(count, 4);
        assert!((mean - 3.5).abs() < 1e-9);
    }

    #[test]
    fn sequence_matches_plain_average() {
        let ratings = [5.0, 3.0, 4.0, 1.0, 5.0];
        let (mut mean, mut count) = (0.0, 0);
        for r in ratings {
            (mean, count) = incremental_mean(mean, count, r);
        }
        let expected = ratings.iter().sum::<f64>() / ratings.len() as f64;
        assert_eq!(count, 5);
        assert!((mean - expected).abs() < 1e-9);
    }

    #[test]
    fn edited_rating_replaces_its_sample() {
        // ratings 5, 3, 4 -> mean 4; the 3 becomes a 5
        let mean = replace_in_mean(4.0, 3, 3.0, 5.0);
        assert!((mean - 14.0 / 3.0).abs() < 1e-9);
        assert_eq!(replace_in_mean(0.0, 0, 3.0, 5.0), 5.0);
    }

    #[test]
    fn corrupt_negative_count_is_treated_as_empty() {
        assert_eq!(incremental_mean(3.0, -2, 5.0), (5.0, 1));
    }
}
