use crate::db::{self, DbConn, parse_id};
use crate::guards::AuthGuard;
use crate::models::{IdQuery, SaveSkillDto, Skill, SkillListQuery, SkillResponse};
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use log::warn;
use mongodb::bson::{DateTime, doc};
use mongodb::options::FindOptions;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use validator::Validate;

#[openapi(tag = "Skills")]
#[get("/skills?<query..>")]
pub async fn list_skills(db: &State<DbConn>, query: SkillListQuery) -> ApiResult {
    let mut filter = doc! {};
    if let Some(category) = non_blank(&query.category).filter(|c| *c != "all") {
        filter.insert("category", category);
    }
    if let Some(user_id) = non_blank(&query.user_id) {
        filter.insert("userId", parse_id(user_id, "user ID")?);
    }

    let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();

    let skills: Vec<Skill> = db
        .collection::<Skill>(db::SKILLS)
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let skills: Vec<SkillResponse> = skills.iter().map(SkillResponse::from).collect();

    Ok(Json(ApiResponse::success(serde_json::json!({ "skills": skills }))))
}

/// Creates a skill, or updates one the caller owns when `id` is given.
#[openapi(tag = "Skills")]
#[post("/skills", data = "<dto>")]
pub async fn save_skill(auth: AuthGuard, db: &State<DbConn>, dto: Json<SaveSkillDto>) -> ApiResult {
    dto.validate()?;

    let collection = db.collection::<Skill>(db::SKILLS);
    let now = DateTime::now();

    if let Some(raw_id) = non_blank(&dto.id) {
        let skill_id = parse_id(raw_id, "skill ID")?;

        let updated = collection
            .update_one(
                doc! { "_id": skill_id, "userId": auth.user_id },
                doc! { "$set": {
                    "title": dto.title.trim(),
                    "description": dto.description.trim(),
                    "category": dto.category.trim(),
                    "hourlyRate": dto.hourly_rate,
                    "updatedAt": now,
                } },
                None,
            )
            .await?;

        if updated.matched_count == 0 {
            warn!("User {} tried to edit skill {}", auth.user_id, skill_id);
            return Err(ApiError::forbidden("Unauthorized or skill not found"));
        }

        return Ok(Json(ApiResponse::success_with_message(
            "Skill updated successfully",
            serde_json::json!({ "id": skill_id.to_hex() }),
        )));
    }

    let skill = Skill {
        id: None,
        user_id: auth.user_id,
        title: dto.title.trim().to_string(),
        description: dto.description.trim().to_string(),
        category: dto.category.trim().to_string(),
        hourly_rate: dto.hourly_rate,
        rating: 0.0,
        review_count: 0,
        created_at: now,
        updated_at: now,
    };

    let result = collection.insert_one(&skill, None).await?;
    let id = result
        .inserted_id
        .as_object_id()
        .map(|id| id.to_hex())
        .unwrap_or_default();

    Ok(Json(ApiResponse::success_with_message(
        "Skill created successfully",
        serde_json::json!({ "id": id }),
    )))
}

#[openapi(tag = "Skills")]
#[delete("/skills?<query..>")]
pub async fn delete_skill(auth: AuthGuard, db: &State<DbConn>, query: IdQuery) -> ApiResult {
    let raw_id = non_blank(&query.id).ok_or_else(|| ApiError::bad_request("Skill ID is required"))?;
    let skill_id = parse_id(raw_id, "skill ID")?;

    let result = db
        .collection::<Skill>(db::SKILLS)
        .delete_one(doc! { "_id": skill_id, "userId": auth.user_id }, None)
        .await?;

    if result.deleted_count == 0 {
        return Err(ApiError::forbidden("Unauthorized or skill not found"));
    }

    Ok(Json(ApiResponse::success_with_message(
        "Skill deleted successfully",
        serde_json::json!({}),
    )))
}
