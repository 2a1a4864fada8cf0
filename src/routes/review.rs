use crate::db::{self, DbConn, parse_id};
use crate::guards::AuthGuard;
use crate::models::{
    CreateReviewDto, Notification, Review, ReviewListQuery, ReviewResponse, Skill, UpdateReviewDto, User,
    incremental_mean, replace_in_mean,
};
use crate::services::Notifier;
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use log::{error, info, warn};
use mongodb::ClientSession;
use mongodb::bson::{DateTime, Document, doc, oid::ObjectId};
use mongodb::options::FindOptions;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use validator::Validate;

/// Inserts the review and folds its rating into the skill and reviewee
/// running means. Runs inside the caller's transaction.
async fn record_review(db: &DbConn, txn: &mut ClientSession, review: &Review) -> Result<ObjectId, ApiError> {
    let skills = db.collection::<Skill>(db::SKILLS);
    let users = db.collection::<User>(db::USERS);
    let rating = review.rating as f64;

    let skill = skills
        .find_one_with_session(doc! { "_id": review.skill_id }, None, txn)
        .await?
        .ok_or_else(|| ApiError::not_found("Skill not found"))?;

    let reviewee = users
        .find_one_with_session(doc! { "_id": review.reviewee_id }, None, txn)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let result = db
        .collection::<Review>(db::REVIEWS)
        .insert_one_with_session(review, None, txn)
        .await?;

    let (skill_rating, skill_count) = incremental_mean(skill.rating, skill.review_count, rating);
    skills
        .update_one_with_session(
            doc! { "_id": review.skill_id },
            doc! { "$set": { "rating": skill_rating, "reviewCount": skill_count, "updatedAt": review.created_at } },
            None,
            txn,
        )
        .await?;

    let (user_rating, user_count) = incremental_mean(reviewee.overall_rating, reviewee.total_reviews, rating);
    users
        .update_one_with_session(
            doc! { "_id": review.reviewee_id },
            doc! { "$set": { "overallRating": user_rating, "totalReviews": user_count, "updatedAt": review.created_at } },
            None,
            txn,
        )
        .await?;

    result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Review insert returned no id"))
}

/// Applies an edited rating to both running means and the review itself.
async fn revise_review(
    db: &DbConn,
    txn: &mut ClientSession,
    review: &Review,
    set: Document,
    new_rating: Option<i32>,
) -> Result<(), ApiError> {
    let review_id = review.id.ok_or_else(|| ApiError::internal_error("Review has no id"))?;

    db.collection::<Review>(db::REVIEWS)
        .update_one_with_session(doc! { "_id": review_id }, doc! { "$set": set }, None, txn)
        .await?;

    let Some(new_rating) = new_rating.filter(|r| *r != review.rating) else {
        return Ok(());
    };
    let (old, new) = (review.rating as f64, new_rating as f64);

    let skills = db.collection::<Skill>(db::SKILLS);
    if let Some(skill) = skills
        .find_one_with_session(doc! { "_id": review.skill_id }, None, txn)
        .await?
    {
        skills
            .update_one_with_session(
                doc! { "_id": review.skill_id },
                doc! { "$set": { "rating": replace_in_mean(skill.rating, skill.review_count, old, new) } },
                None,
                txn,
            )
            .await?;
    }

    let users = db.collection::<User>(db::USERS);
    if let Some(user) = users
        .find_one_with_session(doc! { "_id": review.reviewee_id }, None, txn)
        .await?
    {
        users
            .update_one_with_session(
                doc! { "_id": review.reviewee_id },
                doc! { "$set": { "overallRating": replace_in_mean(user.overall_rating, user.total_reviews, old, new) } },
                None,
                txn,
            )
            .await?;
    }

    Ok(())
}

#[openapi(tag = "Reviews")]
#[get("/reviews?<query..>")]
pub async fn list_reviews(db: &State<DbConn>, query: ReviewListQuery) -> ApiResult {
    let filter = match (non_blank(&query.skill_id), non_blank(&query.user_id)) {
        (Some(skill_id), _) => doc! { "skillId": parse_id(skill_id, "skill ID")? },
        (None, Some(user_id)) => doc! { "revieweeId": parse_id(user_id, "user ID")? },
        (None, None) => return Err(ApiError::bad_request("Either skillId or userId is required")),
    };

    let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();

    let reviews: Vec<Review> = db
        .collection::<Review>(db::REVIEWS)
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let reviews: Vec<ReviewResponse> = reviews.iter().map(ReviewResponse::from).collect();

    Ok(Json(ApiResponse::success(serde_json::json!({ "reviews": reviews }))))
}

#[openapi(tag = "Reviews")]
#[post("/reviews", data = "<dto>")]
pub async fn create_review(auth: AuthGuard, db: &State<DbConn>, dto: Json<CreateReviewDto>) -> ApiResult {
    let (Some(skill_raw), Some(reviewee_raw), Some(rating)) =
        (non_blank(&dto.skill_id), non_blank(&dto.reviewee_id), dto.rating)
    else {
        return Err(ApiError::bad_request("skillId, revieweeId, and rating are required"));
    };

    dto.validate()?;

    let skill_id = parse_id(skill_raw, "skill ID")?;
    let reviewee_id = parse_id(reviewee_raw, "reviewee ID")?;
    let exchange_id = non_blank(&dto.exchange_id)
        .map(|raw| parse_id(raw, "exchange ID"))
        .transpose()?;

    if reviewee_id == auth.user_id {
        return Err(ApiError::bad_request("You cannot review yourself"));
    }

    if let Some(exchange_id) = exchange_id {
        let existing = db
            .collection::<Review>(db::REVIEWS)
            .find_one(doc! { "reviewerId": auth.user_id, "exchangeId": exchange_id }, None)
            .await?;
        if existing.is_some() {
            return Err(ApiError::bad_request("You have already reviewed this exchange"));
        }
    }

    let now = DateTime::now();
    let mut review = Review {
        id: None,
        reviewer_id: auth.user_id,
        reviewer_name: auth.display_name().to_string(),
        reviewee_id,
        skill_id,
        exchange_id,
        rating,
        session_quality: dto.session_quality.unwrap_or(rating),
        punctuality: dto.punctuality.unwrap_or(rating),
        communication: dto.communication.unwrap_or(rating),
        comment: dto.comment.as_deref().unwrap_or_default().trim().to_string(),
        created_at: now,
        updated_at: now,
    };

    let mut txn = db.start_session().await?;
    txn.start_transaction(None).await?;

    let review_id = match record_review(db, &mut txn, &review).await {
        Ok(id) => id,
        Err(e) => {
            if let Err(abort) = txn.abort_transaction().await {
                error!("Failed to abort review transaction: {}", abort);
            }
            return Err(e);
        }
    };
    txn.commit_transaction().await?;
    review.id = Some(review_id);

    info!("Review {} by {} for {} ({} stars)", review_id, auth.user_id, reviewee_id, rating);

    Notifier::notify(
        db,
        Notification::new(
            reviewee_id,
            "review_received",
            "New Review",
            format!("{} left you a {}-star review", auth.display_name(), rating),
        )
        .with_data(doc! { "reviewId": review_id.to_hex(), "skillId": skill_id.to_hex() }),
    )
    .await;

    Ok(Json(ApiResponse::success_with_message(
        "Review submitted successfully",
        serde_json::json!({
            "id": review_id.to_hex(),
            "review": ReviewResponse::from(&review),
        }),
    )))
}

#[openapi(tag = "Reviews")]
#[put("/reviews", data = "<dto>")]
pub async fn update_review(auth: AuthGuard, db: &State<DbConn>, dto: Json<UpdateReviewDto>) -> ApiResult {
    let raw_id = non_blank(&dto.id).ok_or_else(|| ApiError::bad_request("Review ID is required"))?;
    let review_id = parse_id(raw_id, "review ID")?;
    dto.validate()?;

    let review = db
        .collection::<Review>(db::REVIEWS)
        .find_one(doc! { "_id": review_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;

    if review.reviewer_id != auth.user_id {
        warn!("User {} tried to edit review {}", auth.user_id, review_id);
        return Err(ApiError::forbidden("Unauthorized to update this review"));
    }

    let mut set = doc! { "updatedAt": DateTime::now() };
    if let Some(rating) = dto.rating {
        set.insert("rating", rating);
    }
    if let Some(comment) = &dto.comment {
        set.insert("comment", comment.trim());
    }
    if let Some(quality) = dto.session_quality {
        set.insert("sessionQuality", quality);
    }
    if let Some(punctuality) = dto.punctuality {
        set.insert("punctuality", punctuality);
    }
    if let Some(communication) = dto.communication {
        set.insert("communication", communication);
    }

    let mut txn = db.start_session().await?;
    txn.start_transaction(None).await?;

    if let Err(e) = revise_review(db, &mut txn, &review, set, dto.rating).await {
        if let Err(abort) = txn.abort_transaction().await {
            error!("Failed to abort review transaction: {}", abort);
        }
        return Err(e);
    }
    txn.commit_transaction().await?;

    Ok(Json(ApiResponse::success_with_message(
        "Review updated successfully",
        serde_json::json!({ "id": review_id.to_hex() }),
    )))
}
