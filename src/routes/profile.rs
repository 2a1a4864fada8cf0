use crate::db::{self, DbConn};
use crate::guards::AuthGuard;
use crate::models::{UpdateProfileDto, User, UserResponse};
use crate::utils::{ApiError, ApiResponse, ApiResult};
use mongodb::bson::{DateTime, Document, doc};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use validator::Validate;

fn clean_list(items: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !out.iter().any(|existing| existing.eq_ignore_ascii_case(item)) {
            out.push(item.to_string());
        }
    }
    out
}

fn profile_updates(dto: &UpdateProfileDto) -> Document {
    let mut set = Document::new();
    if let Some(name) = &dto.display_name {
        set.insert("displayName", name.trim());
    }
    if let Some(bio) = &dto.bio {
        set.insert("bio", bio.trim());
    }
    if let Some(location) = &dto.location {
        set.insert("location", location.trim());
    }
    if let Some(photo) = &dto.photo_url {
        set.insert("photoUrl", photo.trim());
    }
    if let Some(skills) = &dto.skills {
        set.insert("skills", clean_list(skills));
    }
    if let Some(interests) = &dto.interests {
        set.insert("interests", clean_list(interests));
    }
    set
}

#[openapi(tag = "Profile")]
#[get("/profile")]
pub async fn get_profile(auth: AuthGuard, db: &State<DbConn>) -> ApiResult {
    let user = db
        .collection::<User>(db::USERS)
        .find_one(doc! { "_id": auth.user_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "profile": UserResponse::from(user)
    }))))
}

#[openapi(tag = "Profile")]
#[put("/profile", data = "<dto>")]
pub async fn update_profile(
    auth: AuthGuard,
    db: &State<DbConn>,
    dto: Json<UpdateProfileDto>,
) -> ApiResult {
    dto.validate()?;

    let mut set = profile_updates(&dto);
    if set.is_empty() {
        return Err(ApiError::bad_request("No profile fields to update"));
    }
    set.insert("updatedAt", DateTime::now());

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let user = db
        .collection::<User>(db::USERS)
        .find_one_and_update(doc! { "_id": auth.user_id }, doc! { "$set": set }, options)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::success_with_message(
        "Profile updated successfully",
        serde_json::json!({ "profile": UserResponse::from(user) }),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_supplied_fields_are_set() {
        let dto = UpdateProfileDto {
            display_name: Some("  Ada ".into()),
            bio: None,
            location: None,
            photo_url: None,
            skills: Some(vec!["Rust".into(), " rust ".into(), "".into(), "Go".into()]),
            interests: None,
        };
        let set = profile_updates(&dto);

        assert_eq!(set.len(), 2);
        assert_eq!(set.get_str("displayName").unwrap(), "Ada");
        assert_eq!(
            set.get_array("skills").unwrap(),
            &vec![mongodb::bson::Bson::from("Rust"), mongodb::bson::Bson::from("Go")]
        );
    }
}
