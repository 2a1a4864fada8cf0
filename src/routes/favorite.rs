use crate::db::{self, DbConn, parse_id};
use crate::guards::AuthGuard;
use crate::models::{
    AddFavoriteDto, Exchange, ExchangeResponse, Favorite, FavoriteListQuery, FavoriteResponse, FavoriteType,
    PublicUser, RemoveFavoriteQuery, Skill, SkillResponse, User,
};
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use log::{debug, info};
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use mongodb::options::FindOptions;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::openapi;

/// What a favorite points at: its public shape and who owns it.
struct FavoriteTarget {
    owner_id: ObjectId,
    item: serde_json::Value,
}

async fn load_target(db: &DbConn, kind: FavoriteType, item_id: ObjectId) -> Result<Option<FavoriteTarget>, ApiError> {
    let filter = doc! { "_id": item_id };

    let target = match kind {
        FavoriteType::Skill => db
            .collection::<Skill>(kind.collection())
            .find_one(filter, None)
            .await?
            .map(|skill| FavoriteTarget {
                owner_id: skill.user_id,
                item: serde_json::to_value(SkillResponse::from(&skill)).unwrap_or_default(),
            }),
        FavoriteType::User => db
            .collection::<User>(kind.collection())
            .find_one(filter, None)
            .await?
            .map(|user| FavoriteTarget {
                owner_id: item_id,
                item: serde_json::to_value(PublicUser::from(&user)).unwrap_or_default(),
            }),
        FavoriteType::Exchange => db
            .collection::<Exchange>(kind.collection())
            .find_one(filter, None)
            .await?
            .map(|exchange| FavoriteTarget {
                owner_id: exchange.creator_id,
                item: serde_json::to_value(ExchangeResponse::from(&exchange)).unwrap_or_default(),
            }),
    };

    Ok(target)
}

#[openapi(tag = "Favorites")]
#[get("/favorites?<query..>")]
pub async fn list_favorites(auth: AuthGuard, db: &State<DbConn>, query: FavoriteListQuery) -> ApiResult {
    let mut filter = doc! { "userId": auth.user_id };

    match non_blank(&query.kind) {
        None | Some("all") => {}
        Some(raw) => {
            let kind = FavoriteType::parse_filter(raw).ok_or_else(|| ApiError::bad_request("Invalid favorite type"))?;
            filter.insert("type", kind.as_str());
        }
    }

    let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
    let favorites: Vec<Favorite> = db
        .collection::<Favorite>(db::FAVORITES)
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let mut resolved = Vec::with_capacity(favorites.len());
    for favorite in &favorites {
        match load_target(db, favorite.kind, favorite.item_id).await? {
            Some(target) => resolved.push(FavoriteResponse::new(favorite, target.item)),
            None => debug!("Dropping dangling favorite {:?} of {}", favorite.id, auth.user_id),
        }
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "favorites": resolved,
        "count": resolved.len(),
    }))))
}

#[openapi(tag = "Favorites")]
#[post("/favorites", data = "<dto>")]
pub async fn add_favorite(auth: AuthGuard, db: &State<DbConn>, dto: Json<AddFavoriteDto>) -> ApiResult {
    let (Some(raw_item), Some(raw_kind)) = (non_blank(&dto.item_id), non_blank(&dto.kind)) else {
        return Err(ApiError::bad_request("itemId and type are required"));
    };

    let kind = FavoriteType::parse(raw_kind).ok_or_else(|| ApiError::bad_request("Invalid favorite type"))?;
    let item_id = parse_id(raw_item, "item ID")?;

    let target = load_target(db, kind, item_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    if target.owner_id == auth.user_id {
        return Err(ApiError::bad_request("You cannot favorite your own items"));
    }

    let favorites = db.collection::<Favorite>(db::FAVORITES);
    let existing = favorites
        .find_one(
            doc! { "userId": auth.user_id, "itemId": item_id, "type": kind.as_str() },
            None,
        )
        .await?;
    if existing.is_some() {
        return Err(ApiError::bad_request("Item already in favorites"));
    }

    let favorite = Favorite {
        id: None,
        user_id: auth.user_id,
        item_id,
        kind,
        created_at: DateTime::now(),
    };
    let result = favorites.insert_one(&favorite, None).await?;
    let id = result.inserted_id.as_object_id().map(|id| id.to_hex()).unwrap_or_default();

    info!("User {} favorited {} {}", auth.user_id, kind.as_str(), item_id);

    Ok(Json(ApiResponse::success_with_message(
        "Added to favorites",
        serde_json::json!({ "id": id }),
    )))
}

#[openapi(tag = "Favorites")]
#[delete("/favorites?<query..>")]
pub async fn remove_favorite(auth: AuthGuard, db: &State<DbConn>, query: RemoveFavoriteQuery) -> ApiResult {
    let favorites = db.collection::<Favorite>(db::FAVORITES);

    if let Some(raw) = non_blank(&query.favorite_id) {
        let favorite_id = parse_id(raw, "favorite ID")?;
        let favorite = favorites
            .find_one(doc! { "_id": favorite_id }, None)
            .await?
            .ok_or_else(|| ApiError::not_found("Favorite not found"))?;

        if favorite.user_id != auth.user_id {
            return Err(ApiError::forbidden("Unauthorized to remove this favorite"));
        }

        favorites.delete_one(doc! { "_id": favorite_id }, None).await?;
    } else {
        let (Some(raw_item), Some(raw_kind)) = (non_blank(&query.item_id), non_blank(&query.kind)) else {
            return Err(ApiError::bad_request("favoriteId or itemId and type are required"));
        };
        let kind = FavoriteType::parse(raw_kind).ok_or_else(|| ApiError::bad_request("Invalid favorite type"))?;
        let item_id = parse_id(raw_item, "item ID")?;

        let result = favorites
            .delete_one(
                doc! { "userId": auth.user_id, "itemId": item_id, "type": kind.as_str() },
                None,
            )
            .await?;
        if result.deleted_count == 0 {
            return Err(ApiError::not_found("Favorite not found"));
        }
    }

    Ok(Json(ApiResponse::success_with_message(
        "Removed from favorites",
        serde_json::json!({}),
    )))
}
