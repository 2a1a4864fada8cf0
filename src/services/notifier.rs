use log::error;
use mongodb::bson::oid::ObjectId;

use crate::db::{self, DbConn};
use crate::models::Notification;
use crate::utils::ApiError;

pub struct Notifier;

impl Notifier {
    pub async fn send(db: &DbConn, notification: Notification) -> Result<ObjectId, ApiError> {
        let result = db
            .collection::<Notification>(db::NOTIFICATIONS)
            .insert_one(&notification, None)
            .await
            .map_err(|e| {
                error!(
                    "Failed to notify {} ({}): {}",
                    notification.user_id, notification.kind, e
                );
                ApiError::from(e)
            })?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ApiError::internal_error("Notification insert returned no id"))
    }

    /// Side-effect notification for a write that already succeeded; failures are logged only.
    pub async fn notify(db: &DbConn, notification: Notification) {
        let _ = Self::send(db, notification).await;
    }
}
