use crate::db::{self, DbConn, parse_id};
use crate::guards::AuthGuard;
use crate::models::{
    Conversation, ConversationPeer, ConversationSummary, LastMessage, Message, MessageQuery, MessageResponse,
    SendMessageDto, User,
};
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank, to_rfc3339};
use log::info;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use mongodb::options::{FindOneOptions, FindOptions};
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use validator::Validate;

fn unread_key(user_id: &ObjectId) -> String {
    format!("unread.{}", user_id.to_hex())
}

async fn conversation_summaries(db: &DbConn, user_id: ObjectId) -> Result<Vec<ConversationSummary>, ApiError> {
    let conversations: Vec<Conversation> = db
        .collection::<Conversation>(db::CONVERSATIONS)
        .find(doc! { "participants": user_id }, None)
        .await?
        .try_collect()
        .await?;

    let users = db.collection::<User>(db::USERS);
    let messages = db.collection::<Message>(db::MESSAGES);
    let newest = FindOneOptions::builder().sort(doc! { "timestamp": -1 }).build();

    let mut ranked: Vec<(DateTime, ConversationSummary)> = Vec::with_capacity(conversations.len());
    for conversation in &conversations {
        let Some(conversation_id) = conversation.id else { continue };

        let peer = match conversation.other_participant(&user_id) {
            Some(other_id) => {
                let name = users
                    .find_one(doc! { "_id": other_id }, None)
                    .await?
                    .map(|u| u.display_name)
                    .unwrap_or_else(|| "Unknown User".to_string());
                ConversationPeer {
                    id: other_id.to_hex(),
                    name,
                }
            }
            None => ConversationPeer {
                id: String::new(),
                name: "Unknown User".to_string(),
            },
        };

        let last = messages
            .find_one(doc! { "conversationId": conversation_id }, newest.clone())
            .await?;
        let activity = last.as_ref().map_or(conversation.created_at, |m| m.timestamp);

        ranked.push((
            activity,
            ConversationSummary {
                id: conversation_id.to_hex(),
                other_user: peer,
                last_message: last.map(|m| LastMessage {
                    text: m.text,
                    timestamp: to_rfc3339(m.timestamp),
                    sender_id: m.sender_id.to_hex(),
                }),
                unread_count: conversation.unread_for(&user_id),
            },
        ));
    }

    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(ranked.into_iter().map(|(_, summary)| summary).collect())
}

/// Lists the caller's conversations, or the messages of one of them.
#[openapi(tag = "Messages")]
#[get("/messages?<query..>")]
pub async fn get_messages(auth: AuthGuard, db: &State<DbConn>, query: MessageQuery) -> ApiResult {
    let Some(raw_id) = non_blank(&query.conversation_id) else {
        let conversations = conversation_summaries(db, auth.user_id).await?;
        return Ok(Json(ApiResponse::success(serde_json::json!({
            "conversations": conversations
        }))));
    };

    let conversation_id = parse_id(raw_id, "conversation ID")?;
    let conversations = db.collection::<Conversation>(db::CONVERSATIONS);

    let conversation = conversations
        .find_one(doc! { "_id": conversation_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Conversation not found"))?;

    if !conversation.is_participant(&auth.user_id) {
        return Err(ApiError::forbidden("Unauthorized to view this conversation"));
    }

    let options = FindOptions::builder().sort(doc! { "timestamp": 1 }).build();
    let messages: Vec<Message> = db
        .collection::<Message>(db::MESSAGES)
        .find(doc! { "conversationId": conversation_id }, options)
        .await?
        .try_collect()
        .await?;

    conversations
        .update_one(
            doc! { "_id": conversation_id },
            doc! { "$set": { unread_key(&auth.user_id): 0 } },
            None,
        )
        .await?;

    let messages: Vec<MessageResponse> = messages.iter().map(MessageResponse::from).collect();

    Ok(Json(ApiResponse::success(serde_json::json!({ "messages": messages }))))
}

#[openapi(tag = "Messages")]
#[post("/messages", data = "<dto>")]
pub async fn send_message(auth: AuthGuard, db: &State<DbConn>, dto: Json<SendMessageDto>) -> ApiResult {
    if dto.text.trim().is_empty() {
        return Err(ApiError::bad_request("Message text is required"));
    }
    dto.validate()?;

    let conversations = db.collection::<Conversation>(db::CONVERSATIONS);

    let (conversation_id, recipient_id) = match non_blank(&dto.conversation_id) {
        Some(raw) => {
            let conversation_id = parse_id(raw, "conversation ID")?;
            let conversation = conversations
                .find_one(doc! { "_id": conversation_id }, None)
                .await?
                .ok_or_else(|| ApiError::not_found("Conversation not found"))?;

            if !conversation.is_participant(&auth.user_id) {
                return Err(ApiError::forbidden("Unauthorized to post in this conversation"));
            }
            let recipient_id = conversation
                .other_participant(&auth.user_id)
                .ok_or_else(|| ApiError::bad_request("Conversation has no other participant"))?;
            (conversation_id, recipient_id)
        }
        None => {
            let raw = non_blank(&dto.recipient_id)
                .ok_or_else(|| ApiError::bad_request("recipientId and text are required"))?;
            let recipient_id = parse_id(raw, "recipient ID")?;

            if recipient_id == auth.user_id {
                return Err(ApiError::bad_request("You cannot message yourself"));
            }

            db.collection::<User>(db::USERS)
                .find_one(doc! { "_id": recipient_id }, None)
                .await?
                .ok_or_else(|| ApiError::not_found("Recipient not found"))?;

            let existing = conversations
                .find_one(
                    doc! { "participants": { "$all": [auth.user_id, recipient_id], "$size": 2 } },
                    None,
                )
                .await?;

            let conversation_id = match existing.and_then(|c| c.id) {
                Some(id) => id,
                None => {
                    let result = conversations
                        .insert_one(Conversation::between(auth.user_id, recipient_id), None)
                        .await?;
                    result
                        .inserted_id
                        .as_object_id()
                        .ok_or_else(|| ApiError::internal_error("Conversation insert returned no id"))?
                }
            };
            (conversation_id, recipient_id)
        }
    };

    let message = Message {
        id: None,
        conversation_id,
        sender_id: auth.user_id,
        text: dto.text.trim().to_string(),
        timestamp: DateTime::now(),
    };
    let result = db
        .collection::<Message>(db::MESSAGES)
        .insert_one(&message, None)
        .await?;

    conversations
        .update_one(
            doc! { "_id": conversation_id },
            doc! { "$inc": { unread_key(&recipient_id): 1 } },
            None,
        )
        .await?;

    info!("Message sent in conversation {} by {}", conversation_id, auth.user_id);

    let message = Message {
        id: result.inserted_id.as_object_id(),
        ..message
    };

    Ok(Json(ApiResponse::success_with_message(
        "Message sent successfully",
        serde_json::json!({
            "conversationId": conversation_id.to_hex(),
            "message": MessageResponse::from(&message),
        }),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_counters_are_keyed_by_hex_id() {
        let id = ObjectId::parse_str("65f0c0ffee0000000000abcd").unwrap();
        assert_eq!(unread_key(&id), "unread.65f0c0ffee0000000000abcd");
    }
}
