use crate::config::Config;
use crate::db::{self, DbConn};
use crate::models::{AuthDto, RefreshTokenDto, RegisterDto, User, UserResponse};
use crate::services::JwtService;
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank, validate_email};
use log::{info, warn};
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use validator::Validate;

/// --------------------
/// Rate limiter helper
/// --------------------
/// Fixed window counter kept in `rate_limits`, one document per key.
async fn rate_limit(db: &DbConn, key: &str, limit: i32, window_secs: i64) -> Result<(), ApiError> {
    let now = chrono::Utc::now().timestamp_millis();
    let window_expires = DateTime::from_millis(now + window_secs * 1000);

    let collection = db.collection::<mongodb::bson::Document>(db::RATE_LIMITS);

    let existing = collection
        .find_one(doc! { "key": key }, None)
        .await
        .map_err(|_| ApiError::internal_error("Rate limiter lookup failed"))?;

    match existing {
        None => {
            collection
                .insert_one(doc! { "key": key, "count": 1, "expiresAt": window_expires }, None)
                .await
                .map_err(|_| ApiError::internal_error("Rate limiter insert failed"))?;
            Ok(())
        }

        Some(d) => {
            let count = d.get_i32("count").unwrap_or(0);
            let expired = d
                .get_datetime("expiresAt")
                .map(|e| *e < DateTime::now())
                .unwrap_or(true);

            if expired {
                collection
                    .update_one(
                        doc! { "key": key },
                        doc! { "$set": { "count": 1, "expiresAt": window_expires } },
                        None,
                    )
                    .await
                    .map_err(|_| ApiError::internal_error("Rate limiter reset failed"))?;
                return Ok(());
            }

            if count >= limit {
                warn!("Rate limit hit for {}", key);
                return Err(ApiError::too_many_requests(
                    "Too many login attempts. Please try later.",
                ));
            }

            collection
                .update_one(doc! { "key": key }, doc! { "$inc": { "count": 1 } }, None)
                .await
                .map_err(|_| ApiError::internal_error("Rate limiter increment failed"))?;

            Ok(())
        }
    }
}

fn issue_tokens(user_id: &ObjectId, email: &str, name: &str) -> Result<(String, String), ApiError> {
    let access = JwtService::generate_access_token(user_id, email, name)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let refresh = JwtService::generate_refresh_token(user_id, email, name)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    Ok((access, refresh))
}

async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .map_err(|e| ApiError::internal_error(format!("Failed to hash password: {}", e)))
}

async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .map_err(|e| ApiError::internal_error(format!("Failed to verify password: {}", e)))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn register_user(
    db: &DbConn,
    email: &str,
    password: &str,
    display_name: &Option<String>,
) -> ApiResult {
    let email = normalize_email(email);
    if !validate_email(&email) {
        return Err(ApiError::bad_request("A valid email is required"));
    }

    let users = db.collection::<User>(db::USERS);

    if users.find_one(doc! { "email": &email }, None).await?.is_some() {
        return Err(ApiError::bad_request("An account with this email already exists"));
    }

    let display_name = non_blank(display_name)
        .map(str::to_string)
        .unwrap_or_else(|| User::default_display_name(&email));

    let password_hash = hash_password(password.to_string()).await?;
    let mut user = User::new(email, password_hash, display_name);

    let result = users.insert_one(&user, None).await?;
    let user_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("User insert returned no id"))?;
    user.id = Some(user_id);

    let (access_token, refresh_token) = issue_tokens(&user_id, &user.email, &user.display_name)?;

    info!("Registered user {} ({})", user_id, user.email);

    Ok(Json(ApiResponse::success_with_message(
        "User registered successfully",
        serde_json::json!({
            "uid": user_id.to_hex(),
            "user": UserResponse::from(user),
            "accessToken": access_token,
            "refreshToken": refresh_token,
        }),
    )))
}

async fn login_user(db: &DbConn, email: &str, password: &str) -> ApiResult {
    let email = normalize_email(email);

    rate_limit(
        db,
        &format!("login:{}", email),
        Config::login_rate_limit(),
        Config::login_rate_window_secs(),
    )
    .await?;

    let users = db.collection::<User>(db::USERS);

    let user = users
        .find_one(doc! { "email": &email }, None)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !verify_password(password.to_string(), user.password_hash.clone()).await? {
        warn!("Failed login for {}", email);
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    if !user.is_active {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal_error("User document has no id"))?;

    users
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "lastLoginAt": DateTime::now() } },
            None,
        )
        .await?;

    let (access_token, refresh_token) = issue_tokens(&user_id, &user.email, &user.display_name)?;

    Ok(Json(ApiResponse::success_with_message(
        "Login successful",
        serde_json::json!({
            "uid": user_id.to_hex(),
            "user": UserResponse::from(user),
            "accessToken": access_token,
            "refreshToken": refresh_token,
        }),
    )))
}

/// Register or log in depending on `action`.
#[openapi(tag = "Auth")]
#[post("/auth", data = "<dto>")]
pub async fn authenticate(db: &State<DbConn>, dto: Json<AuthDto>) -> ApiResult {
    let action = dto.action.trim().to_lowercase();
    if action != "register" && action != "login" {
        return Err(ApiError::bad_request("Invalid action"));
    }

    dto.validate()?;

    if action == "register" {
        register_user(db, &dto.email, &dto.password, &dto.display_name).await
    } else {
        login_user(db, &dto.email, &dto.password).await
    }
}

#[openapi(tag = "Auth")]
#[post("/register", data = "<dto>")]
pub async fn register(db: &State<DbConn>, dto: Json<RegisterDto>) -> ApiResult {
    dto.validate()?;
    register_user(db, &dto.email, &dto.password, &dto.display_name).await
}

/// --------------------
/// Silent Refresh Token
/// --------------------
#[openapi(tag = "Auth")]
#[post("/auth/refresh", data = "<dto>")]
pub async fn refresh_token(db: &State<DbConn>, dto: Json<RefreshTokenDto>) -> ApiResult {
    let claims = JwtService::verify_token(&dto.refresh_token, true)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;

    let user_id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid user id in token"))?;

    let user = db
        .collection::<User>(db::USERS)
        .find_one(doc! { "_id": user_id }, None)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    if !user.is_active {
        warn!("Refresh refused for disabled user {}", user_id);
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let access = JwtService::generate_access_token(&user_id, &user.email, &user.display_name)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "accessToken": access
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized_before_lookup() {
        assert_eq!(normalize_email("  Ada@SkillMint.IO "), "ada@skillmint.io");
    }
}
