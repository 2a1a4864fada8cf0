use crate::db::{self, DbConn, parse_id};
use crate::guards::AuthGuard;
use crate::models::{
    CreateNotificationDto, IdQuery, MarkReadDto, Notification, NotificationQuery, NotificationResponse,
};
use crate::services::Notifier;
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use log::info;
use mongodb::bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use mongodb::options::FindOptions;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use validator::Validate;

const DEFAULT_LIMIT: i64 = 50;

fn inbox_filter(user_id: ObjectId, unread_only: bool) -> Document {
    let mut filter = doc! { "userId": user_id };
    if unread_only {
        filter.insert("read", false);
    }
    filter
}

/// Builds the update filter for a mark-read request, always scoped to the owner.
fn mark_read_filter(user_id: ObjectId, dto: &MarkReadDto) -> Result<Document, ApiError> {
    let mut filter = doc! { "userId": user_id, "read": false };

    if dto.mark_all_as_read {
        return Ok(filter);
    }

    let ids = match &dto.notification_ids {
        Some(ids) if !ids.is_empty() => ids
            .iter()
            .map(|raw| parse_id(raw, "notification ID"))
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(ApiError::bad_request(
                "notificationIds or markAllAsRead is required",
            ));
        }
    };

    filter.insert("_id", doc! { "$in": ids });
    Ok(filter)
}

#[openapi(tag = "Notifications")]
#[get("/notifications?<query..>")]
pub async fn list_notifications(auth: AuthGuard, db: &State<DbConn>, query: NotificationQuery) -> ApiResult {
    let collection = db.collection::<Notification>(db::NOTIFICATIONS);

    let options = FindOptions::builder()
        .sort(doc! { "createdAt": -1 })
        .limit(query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 200))
        .build();

    let notifications: Vec<Notification> = collection
        .find(inbox_filter(auth.user_id, query.unread_only.unwrap_or(false)), options)
        .await?
        .try_collect()
        .await?;

    let unread_count = collection
        .count_documents(inbox_filter(auth.user_id, true), None)
        .await?;

    let notifications: Vec<NotificationResponse> =
        notifications.iter().map(NotificationResponse::from).collect();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "notifications": notifications,
        "unreadCount": unread_count,
    }))))
}

#[openapi(tag = "Notifications")]
#[post("/notifications", data = "<dto>")]
pub async fn create_notification(
    _auth: AuthGuard,
    db: &State<DbConn>,
    dto: Json<CreateNotificationDto>,
) -> ApiResult {
    dto.validate()?;
    let user_id = parse_id(&dto.user_id, "user ID")?;

    let data = match &dto.data {
        None | Some(serde_json::Value::Null) => Document::new(),
        Some(value) => match mongodb::bson::to_bson(value)? {
            Bson::Document(doc) => doc,
            _ => return Err(ApiError::bad_request("data must be an object")),
        },
    };

    let mut notification = Notification::new(user_id, dto.kind.trim(), dto.title.trim(), dto.message.trim())
        .with_data(data);
    if let Some(url) = non_blank(&dto.action_url) {
        notification = notification.with_action_url(url);
    }

    let id = Notifier::send(db, notification).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Notification created successfully",
        serde_json::json!({ "id": id.to_hex() }),
    )))
}

#[openapi(tag = "Notifications")]
#[put("/notifications", data = "<dto>")]
pub async fn mark_read(auth: AuthGuard, db: &State<DbConn>, dto: Json<MarkReadDto>) -> ApiResult {
    let filter = mark_read_filter(auth.user_id, &dto)?;

    let result = db
        .collection::<Notification>(db::NOTIFICATIONS)
        .update_many(
            filter,
            doc! { "$set": { "read": true, "readAt": DateTime::now() } },
            None,
        )
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        "Notifications marked as read",
        serde_json::json!({ "updated": result.modified_count }),
    )))
}

#[openapi(tag = "Notifications")]
#[delete("/notifications?<query..>")]
pub async fn delete_notification(auth: AuthGuard, db: &State<DbConn>, query: IdQuery) -> ApiResult {
    let raw_id = non_blank(&query.id).ok_or_else(|| ApiError::bad_request("Notification ID is required"))?;
    let notification_id = parse_id(raw_id, "notification ID")?;

    let result = db
        .collection::<Notification>(db::NOTIFICATIONS)
        .delete_one(doc! { "_id": notification_id, "userId": auth.user_id }, None)
        .await?;

    if result.deleted_count == 0 {
        return Err(ApiError::not_found("Notification not found or unauthorized"));
    }

    info!("Notification {} deleted by {}", notification_id, auth.user_id);

    Ok(Json(ApiResponse::success_with_message(
        "Notification deleted successfully",
        serde_json::json!({}),
    )))
}
