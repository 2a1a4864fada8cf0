use crate::db::{self, DbConn, parse_id};
use crate::guards::AuthGuard;
use crate::models::{
    CreateExchangeDto, Exchange, ExchangeListQuery, ExchangeResponse, ExchangeStatus, IdQuery,
    UpdateExchangeDto, User,
};
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use log::warn;
use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use mongodb::options::FindOptions;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use validator::Validate;

async fn owned_exchange(
    db: &DbConn,
    exchange_id: ObjectId,
    user_id: ObjectId,
    verb: &str,
) -> Result<Exchange, ApiError> {
    let exchange = db
        .collection::<Exchange>(db::EXCHANGES)
        .find_one(doc! { "_id": exchange_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Exchange not found"))?;

    if exchange.creator_id != user_id {
        warn!("User {} tried to {} exchange {}", user_id, verb, exchange_id);
        return Err(ApiError::forbidden(format!("Unauthorized to {} this exchange", verb)));
    }

    Ok(exchange)
}

fn exchange_updates(dto: &UpdateExchangeDto) -> Document {
    let mut set = Document::new();
    if let Some(title) = &dto.title {
        set.insert("title", title.trim());
    }
    if let Some(looking_for) = &dto.looking_for {
        set.insert("lookingFor", looking_for.trim());
    }
    if let Some(offering) = &dto.offering {
        set.insert("offering", offering.trim());
    }
    if let Some(time_needed) = dto.time_needed {
        set.insert("timeNeeded", time_needed);
    }
    if let Some(time_offered) = dto.time_offered {
        set.insert("timeOffered", time_offered);
    }
    if let Some(description) = &dto.description {
        set.insert("description", description.trim());
    }
    if let Some(status) = dto.status {
        set.insert("status", status.as_str());
    }
    set
}

/// `filter=mine` lists the caller's exchanges; `filter=myskills` lists the
/// ones looking for a skill on the caller's profile.
#[openapi(tag = "Exchanges")]
#[get("/exchanges?<query..>")]
pub async fn list_exchanges(auth: AuthGuard, db: &State<DbConn>, query: ExchangeListQuery) -> ApiResult {
    let filter = match query.filter.as_deref().unwrap_or("all") {
        "mine" => doc! { "creatorId": auth.user_id },
        "myskills" => {
            let skills = db
                .collection::<User>(db::USERS)
                .find_one(doc! { "_id": auth.user_id }, None)
                .await?
                .map(|u| u.skills)
                .unwrap_or_default();

            if skills.is_empty() {
                doc! {}
            } else {
                doc! { "lookingFor": { "$in": skills } }
            }
        }
        _ => doc! {},
    };

    let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();

    let exchanges: Vec<Exchange> = db
        .collection::<Exchange>(db::EXCHANGES)
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let exchanges: Vec<ExchangeResponse> = exchanges.iter().map(ExchangeResponse::from).collect();

    Ok(Json(ApiResponse::success(serde_json::json!({ "exchanges": exchanges }))))
}

#[openapi(tag = "Exchanges")]
#[post("/exchanges", data = "<dto>")]
pub async fn create_exchange(auth: AuthGuard, db: &State<DbConn>, dto: Json<CreateExchangeDto>) -> ApiResult {
    dto.validate()?;

    let now = DateTime::now();
    let exchange = Exchange {
        id: None,
        creator_id: auth.user_id,
        creator_name: auth.display_name().to_string(),
        title: dto.title.trim().to_string(),
        looking_for: dto.looking_for.trim().to_string(),
        offering: dto.offering.trim().to_string(),
        time_needed: dto.time_needed,
        time_offered: dto.time_offered,
        description: dto.description.trim().to_string(),
        status: ExchangeStatus::Open,
        created_at: now,
        updated_at: now,
    };

    let result = db
        .collection::<Exchange>(db::EXCHANGES)
        .insert_one(&exchange, None)
        .await?;

    let id = result
        .inserted_id
        .as_object_id()
        .map(|id| id.to_hex())
        .unwrap_or_default();

    Ok(Json(ApiResponse::success_with_message(
        "Exchange request created successfully",
        serde_json::json!({ "id": id }),
    )))
}

#[openapi(tag = "Exchanges")]
#[put("/exchanges", data = "<dto>")]
pub async fn update_exchange(auth: AuthGuard, db: &State<DbConn>, dto: Json<UpdateExchangeDto>) -> ApiResult {
    let raw_id = non_blank(&dto.id).ok_or_else(|| ApiError::bad_request("Exchange ID is required"))?;
    let exchange_id = parse_id(raw_id, "exchange ID")?;
    dto.validate()?;

    owned_exchange(db, exchange_id, auth.user_id, "update").await?;

    let mut set = exchange_updates(&dto);
    set.insert("updatedAt", DateTime::now());

    db.collection::<Exchange>(db::EXCHANGES)
        .update_one(doc! { "_id": exchange_id }, doc! { "$set": set }, None)
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        "Exchange updated successfully",
        serde_json::json!({ "id": exchange_id.to_hex() }),
    )))
}

#[openapi(tag = "Exchanges")]
#[delete("/exchanges?<query..>")]
pub async fn delete_exchange(auth: AuthGuard, db: &State<DbConn>, query: IdQuery) -> ApiResult {
    let raw_id = non_blank(&query.id).ok_or_else(|| ApiError::bad_request("Exchange ID is required"))?;
    let exchange_id = parse_id(raw_id, "exchange ID")?;

    owned_exchange(db, exchange_id, auth.user_id, "delete").await?;

    db.collection::<Exchange>(db::EXCHANGES)
        .delete_one(doc! { "_id": exchange_id }, None)
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        "Exchange deleted successfully",
        serde_json::json!({}),
    )))
}
