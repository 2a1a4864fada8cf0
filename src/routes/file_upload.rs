use crate::config::Config;
use crate::db::{self, DbConn};
use crate::guards::AuthGuard;
use crate::models::User;
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use data_encoding::BASE64;
use log::{error, info, warn};
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use rocket::State;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

const DEFAULT_UPLOAD_TYPE: &str = "avatar";
const PUBLIC_PREFIX: &str = "/uploads/";

#[derive(FromForm)]
pub struct UploadForm<'r> {
    pub file: Option<TempFile<'r>>,
    #[field(name = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Base64UploadDto {
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub data: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct DeleteUploadQuery {
    pub url: Option<String>,
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Recognises the image formats we accept by their leading bytes.
fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

fn upload_kind(raw: &Option<String>) -> Result<String, ApiError> {
    let kind = non_blank(raw).unwrap_or(DEFAULT_UPLOAD_TYPE);
    let valid = kind.len() <= 32 && kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(ApiError::bad_request("Invalid upload type"));
    }
    Ok(kind.to_string())
}

fn check_size(size: u64) -> Result<(), ApiError> {
    let max = Config::max_upload_bytes();
    if size > max {
        return Err(ApiError::bad_request(format!(
            "File size too large. Maximum {}MB allowed.",
            max / (1024 * 1024)
        )));
    }
    Ok(())
}

fn invalid_type() -> ApiError {
    ApiError::bad_request("Invalid file type. Only JPEG, PNG, WebP, and GIF are allowed.")
}

/// Stored names carry the owner so deletes can be checked without a lookup.
fn stored_file_name(kind: &str, user_id: &ObjectId, extension: &str) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}_{}.{}",
        kind,
        user_id.to_hex(),
        chrono::Utc::now().timestamp_millis(),
        &nonce[..8],
        extension
    )
}

/// Maps a public `/uploads/...` url back to a file the caller owns.
fn owned_upload_path(url: &str, user_id: &ObjectId, upload_dir: &str) -> Result<PathBuf, ApiError> {
    let name = url
        .strip_prefix(PUBLIC_PREFIX)
        .filter(|name| !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains(".."))
        .ok_or_else(|| ApiError::bad_request("Invalid file URL"))?;

    let owner_tag = format!("_{}_", user_id.to_hex());
    if !name.contains(&owner_tag) {
        return Err(ApiError::forbidden("Unauthorized to delete this file"));
    }

    Ok(Path::new(upload_dir).join(name))
}

/// Enough of the upload to tell the image formats apart.
async fn leading_bytes(file: &TempFile<'_>) -> Result<Vec<u8>, ApiError> {
    let reader = file.open().await.map_err(|e| {
        error!("Failed to read upload: {}", e);
        ApiError::internal_error("Failed to read file")
    })?;
    tokio::pin!(reader);

    let mut head = Vec::with_capacity(16);
    reader
        .take(16)
        .read_to_end(&mut head)
        .await
        .map_err(|_| ApiError::internal_error("Failed to read file"))?;
    Ok(head)
}

async fn prepare_dir() -> Result<String, ApiError> {
    let upload_dir = Config::upload_dir();
    fs::create_dir_all(&upload_dir).await.map_err(|e| {
        error!("Failed to create upload directory {}: {}", upload_dir, e);
        ApiError::internal_error("Failed to store file")
    })?;
    Ok(upload_dir)
}

async fn set_avatar(db: &DbConn, user_id: ObjectId, url: &str) -> Result<(), ApiError> {
    db.collection::<User>(db::USERS)
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "photoUrl": url, "updatedAt": DateTime::now() } },
            None,
        )
        .await?;
    Ok(())
}

async fn finish_upload(
    db: &DbConn,
    auth: &AuthGuard,
    kind: &str,
    file_name: String,
    size: u64,
    mime: &str,
) -> ApiResult {
    let url = format!("{}{}", PUBLIC_PREFIX, file_name);

    if kind == DEFAULT_UPLOAD_TYPE {
        set_avatar(db, auth.user_id, &url).await?;
    }

    info!("User {} uploaded {} ({} bytes)", auth.user_id, file_name, size);

    Ok(Json(ApiResponse::success_with_message(
        "File uploaded successfully",
        serde_json::json!({
            "url": url,
            "fileName": file_name,
            "size": size,
            "type": mime,
        }),
    )))
}

/// Multipart upload with a `file` part and an optional `type` part.
#[post("/upload", data = "<form>")]
pub async fn upload_file(auth: AuthGuard, db: &State<DbConn>, mut form: Form<UploadForm<'_>>) -> ApiResult {
    let kind = upload_kind(&form.kind)?;
    let file = form
        .file
        .as_mut()
        .ok_or_else(|| ApiError::bad_request("No file provided"))?;

    let mime = file
        .content_type()
        .map(|ct| format!("{}/{}", ct.top(), ct.sub()).to_lowercase())
        .unwrap_or_default();
    let extension = extension_for_mime(&mime).ok_or_else(invalid_type)?;

    let size = file.len();
    check_size(size)?;

    if sniff_image(&leading_bytes(file).await?) != Some(extension) {
        warn!("Upload from {} does not match declared type {}", auth.user_id, mime);
        return Err(ApiError::bad_request("File content does not match its type"));
    }

    let upload_dir = prepare_dir().await?;
    let file_name = stored_file_name(&kind, &auth.user_id, extension);
    let path = Path::new(&upload_dir).join(&file_name);

    file.persist_to(&path).await.map_err(|e| {
        error!("Failed to save upload {}: {}", path.display(), e);
        ApiError::internal_error("Failed to store file")
    })?;

    finish_upload(db, &auth, &kind, file_name, size, &mime).await
}

#[openapi(tag = "Upload")]
#[post("/upload/base64", data = "<dto>")]
pub async fn upload_base64(auth: AuthGuard, db: &State<DbConn>, dto: Json<Base64UploadDto>) -> ApiResult {
    let (Some(_), Some(mime), Some(data)) = (
        non_blank(&dto.file_name),
        non_blank(&dto.mime_type),
        non_blank(&dto.data),
    ) else {
        return Err(ApiError::bad_request("fileName, mimeType, and data are required"));
    };

    let kind = upload_kind(&dto.kind)?;
    let mime = mime.to_lowercase();
    let extension = extension_for_mime(&mime).ok_or_else(invalid_type)?;

    // Accept data URLs as well as bare base64.
    let payload = data.split_once("base64,").map_or(data, |(_, rest)| rest);
    let bytes = BASE64
        .decode(payload.as_bytes())
        .map_err(|_| ApiError::bad_request("Invalid base64 data"))?;

    let size = bytes.len() as u64;
    check_size(size)?;

    if sniff_image(&bytes) != Some(extension) {
        warn!("Upload from {} does not match declared type {}", auth.user_id, mime);
        return Err(ApiError::bad_request("File content does not match its type"));
    }

    let upload_dir = prepare_dir().await?;
    let file_name = stored_file_name(&kind, &auth.user_id, extension);
    let path = Path::new(&upload_dir).join(&file_name);

    fs::write(&path, &bytes).await.map_err(|e| {
        error!("Failed to write upload {}: {}", path.display(), e);
        ApiError::internal_error("Failed to store file")
    })?;

    finish_upload(db, &auth, &kind, file_name, size, &mime).await
}

#[openapi(tag = "Upload")]
#[delete("/upload?<query..>")]
pub async fn delete_upload(auth: AuthGuard, query: DeleteUploadQuery) -> ApiResult {
    let url = non_blank(&query.url).ok_or_else(|| ApiError::bad_request("File URL is required"))?;
    let path = owned_upload_path(url, &auth.user_id, &Config::upload_dir())?;

    match fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"));
        }
        Err(e) => {
            error!("Failed to delete upload {}: {}", path.display(), e);
            return Err(ApiError::internal_error("Failed to delete file"));
        }
    }

    info!("User {} deleted {}", auth.user_id, url);

    Ok(Json(ApiResponse::success_with_message(
        "File deleted successfully",
        serde_json::json!({}),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_web_image_types_are_accepted() {
        assert_eq!(extension_for_mime("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for_mime("image/gif"), Some("gif"));
        assert_eq!(extension_for_mime("image/svg+xml"), None);
        assert_eq!(extension_for_mime("application/pdf"), None);
    }

    #[test]
    fn sniffs_magic_numbers() {
        assert_eq!(sniff_image(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), Some("jpg"));
        assert_eq!(sniff_image(b"\x89PNG\r\n\x1a\n...."), Some("png"));
        assert_eq!(sniff_image(b"GIF89a......"), Some("gif"));
        assert_eq!(sniff_image(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Some("webp"));
        assert_eq!(sniff_image(b"%PDF-1.7"), None);
    }

    #[test]
    fn upload_type_defaults_to_avatar() {
        assert_eq!(upload_kind(&None).unwrap(), "avatar");
        assert_eq!(upload_kind(&Some("cover".into())).unwrap(), "cover");
        assert!(upload_kind(&Some("../etc".into())).is_err());
    }

    #[test]
    fn stored_names_embed_the_owner() {
        let user = ObjectId::new();
        let name = stored_file_name("avatar", &user, "png");
        assert!(name.starts_with(&format!("avatar_{}_", user.to_hex())));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn deletes_are_limited_to_own_files() {
        let me = ObjectId::new();
        let other = ObjectId::new();
        let mine = format!("/uploads/avatar_{}_1700000000000_abcd1234.png", me.to_hex());
        let theirs = format!("/uploads/avatar_{}_1700000000000_abcd1234.png", other.to_hex());

        let path = owned_upload_path(&mine, &me, "uploads").unwrap();
        assert!(path.starts_with("uploads"));

        assert_eq!(owned_upload_path(&theirs, &me, "uploads").unwrap_err().message, "Unauthorized to delete this file");
        assert_eq!(
            owned_upload_path("/uploads/../Cargo.toml", &me, "uploads").unwrap_err().message,
            "Invalid file URL"
        );
        assert_eq!(owned_upload_path("/etc/passwd", &me, "uploads").unwrap_err().message, "Invalid file URL");
    }
}
