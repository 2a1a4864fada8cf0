use crate::db::{self, DbConn};
use crate::guards::AuthGuard;
use crate::models::settings::{SECTIONS, default_section, known_sections, merge_with_defaults};
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use log::info;
use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use mongodb::options::UpdateOptions;
use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct SettingsQuery {
    pub section: Option<String>,
}

async fn stored_settings(db: &DbConn, user_id: ObjectId) -> Result<Option<Map<String, Value>>, ApiError> {
    let stored = db
        .collection::<Document>(db::USER_SETTINGS)
        .find_one(doc! { "userId": user_id }, None)
        .await?;

    Ok(stored
        .and_then(|doc| serde_json::to_value(doc).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        }))
}

fn section_updates(sections: Map<String, Value>, now: DateTime) -> Result<Document, ApiError> {
    let mut set = Document::new();
    for (key, value) in sections {
        set.insert(key, mongodb::bson::to_bson(&value)?);
    }
    set.insert("updatedAt", now);
    Ok(set)
}

#[openapi(tag = "Settings")]
#[get("/settings")]
pub async fn get_settings(auth: AuthGuard, db: &State<DbConn>) -> ApiResult {
    let stored = stored_settings(db, auth.user_id).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "settings": merge_with_defaults(stored.as_ref())
    }))))
}

#[openapi(tag = "Settings")]
#[put("/settings", data = "<body>")]
pub async fn update_settings(auth: AuthGuard, db: &State<DbConn>, body: Json<Value>) -> ApiResult {
    let Value::Object(updates) = body.into_inner() else {
        return Err(ApiError::bad_request("Settings must be an object"));
    };

    let sections = known_sections(&updates);
    if sections.is_empty() {
        return Err(ApiError::bad_request(format!(
            "No valid settings sections provided. Expected one of: {}",
            SECTIONS.join(", ")
        )));
    }

    let now = DateTime::now();
    let set = section_updates(sections, now)?;

    db.collection::<Document>(db::USER_SETTINGS)
        .update_one(
            doc! { "userId": auth.user_id },
            doc! {
                "$set": set,
                "$setOnInsert": { "userId": auth.user_id, "createdAt": now },
            },
            UpdateOptions::builder().upsert(true).build(),
        )
        .await?;

    let stored = stored_settings(db, auth.user_id).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Settings updated successfully",
        serde_json::json!({ "settings": merge_with_defaults(stored.as_ref()) }),
    )))
}

/// Resets one section to its default, or every section when none is named.
#[openapi(tag = "Settings")]
#[delete("/settings?<query..>")]
pub async fn reset_settings(auth: AuthGuard, db: &State<DbConn>, query: SettingsQuery) -> ApiResult {
    let collection = db.collection::<Document>(db::USER_SETTINGS);

    match non_blank(&query.section) {
        Some(section) => {
            let default = default_section(section).ok_or_else(|| ApiError::bad_request("Invalid settings section"))?;

            let result = collection
                .update_one(
                    doc! { "userId": auth.user_id },
                    doc! { "$unset": { section: "" }, "$set": { "updatedAt": DateTime::now() } },
                    None,
                )
                .await?;
            if result.matched_count == 0 {
                return Err(ApiError::not_found("Settings not found"));
            }

            info!("User {} reset settings section {}", auth.user_id, section);

            Ok(Json(ApiResponse::success_with_message(
                format!("{} settings reset to defaults", section),
                serde_json::json!({ "section": section, "settings": default }),
            )))
        }
        None => {
            let result = collection.delete_one(doc! { "userId": auth.user_id }, None).await?;
            if result.deleted_count == 0 {
                return Err(ApiError::not_found("Settings not found"));
            }

            info!("User {} reset all settings", auth.user_id);

            Ok(Json(ApiResponse::success_with_message(
                "All settings reset to defaults",
                serde_json::json!({ "settings": merge_with_defaults(None) }),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn section_updates_stamp_the_write_time() {
        let sections = known_sections(
            json!({ "privacy": { "showEmail": true }, "ignored": 1 })
                .as_object()
                .unwrap(),
        );
        let now = DateTime::from_millis(1_700_000_000_000);
        let set = section_updates(sections, now).unwrap();

        assert!(set.get_document("privacy").unwrap().get_bool("showEmail").unwrap());
        assert!(set.get("ignored").is_none());
        assert_eq!(set.get_datetime("updatedAt").unwrap(), &now);
    }
}
