use crate::app;
use crate::db::DbConn;
use crate::services::JwtService;
use mongodb::bson::oid::ObjectId;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use serde_json::{Value, json};

/// The driver connects lazily, so nothing here needs a running MongoDB as
/// long as the request is rejected before its first query.
async fn client() -> Client {
    let mongo = mongodb::Client::with_uri_str("mongodb://localhost:27017")
        .await
        .expect("mongo uri");

    Client::tracked(app().manage(DbConn::new(mongo, "skill-mint-test")))
        .await
        .expect("valid rocket instance")
}

fn bearer() -> Header<'static> {
    let token = JwtService::generate_access_token(&ObjectId::new(), "ada@skillmint.io", "Ada").unwrap();
    Header::new("Authorization", format!("Bearer {}", token))
}

async fn body(response: LocalResponse<'_>) -> Value {
    response.into_json::<Value>().await.expect("json body")
}

#[rocket::async_test]
async fn health_reports_service_without_database() {
    let client = client().await;
    let response = client.get("/api/health").dispatch().await;

    assert_eq!(response.status(), Status::Ok);
    let body = body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["service"], "skill-mint-server");
    assert!(body["version"].is_string());
}

#[rocket::async_test]
async fn protected_routes_require_a_token() {
    let client = client().await;

    for path in ["/api/profile", "/api/wallet", "/api/notifications", "/api/settings", "/api/messages"] {
        let response = client.get(path).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized, "{path}");
        let body = body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Unauthorized");
    }
}

#[rocket::async_test]
async fn garbage_tokens_are_rejected() {
    let client = client().await;
    let response = client
        .get("/api/profile")
        .header(Header::new("Authorization", "Bearer not.a.jwt"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn admin_routes_require_a_token_first() {
    let client = client().await;
    let response = client
        .post("/api/analytics")
        .header(ContentType::JSON)
        .body(json!({ "timeframe": "7d" }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn unknown_routes_return_json_404() {
    let client = client().await;
    let response = client.get("/api/does-not-exist").dispatch().await;

    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(body(response).await["success"], false);
}

#[rocket::async_test]
async fn preflight_requests_get_cors_headers() {
    let client = client().await;
    let response = client
        .options("/api/skills")
        .header(Header::new("Origin", "http://localhost:3000"))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    assert_eq!(
        response.headers().get_one("Access-Control-Allow-Origin"),
        Some("http://localhost:3000")
    );
    assert_eq!(
        response.headers().get_one("Access-Control-Allow-Methods"),
        Some("GET, POST, PUT, DELETE, OPTIONS")
    );
}

#[rocket::async_test]
async fn auth_rejects_unknown_actions() {
    let client = client().await;
    let response = client
        .post("/api/auth")
        .header(ContentType::JSON)
        .body(json!({ "action": "delete", "email": "ada@skillmint.io", "password": "secret123" }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "Invalid action");
}

#[rocket::async_test]
async fn register_validates_password_length() {
    let client = client().await;
    let response = client
        .post("/api/register")
        .header(ContentType::JSON)
        .body(json!({ "email": "ada@skillmint.io", "password": "123" }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "Password must be at least 6 characters");
}

#[rocket::async_test]
async fn mistyped_bodies_are_bad_requests() {
    let client = client().await;
    let response = client
        .post("/api/auth/refresh")
        .header(ContentType::JSON)
        .body(json!({ "refreshToken": 42 }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "Invalid request body");
}

#[rocket::async_test]
async fn refresh_rejects_access_tokens() {
    let client = client().await;
    let access = JwtService::generate_access_token(&ObjectId::new(), "ada@skillmint.io", "Ada").unwrap();
    let response = client
        .post("/api/auth/refresh")
        .header(ContentType::JSON)
        .body(json!({ "refreshToken": access }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn wallet_rejects_unknown_transaction_types() {
    let client = client().await;
    let response = client
        .post("/api/wallet")
        .header(ContentType::JSON)
        .header(bearer())
        .body(json!({ "type": "refund", "amount": 2 }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "Invalid transaction type");
}

#[rocket::async_test]
async fn wallet_transfers_need_a_recipient() {
    let client = client().await;
    let response = client
        .post("/api/wallet")
        .header(ContentType::JSON)
        .header(bearer())
        .body(json!({ "type": "transfer", "amount": 1.5 }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "recipientId is required for transfers");
}

#[rocket::async_test]
async fn sessions_require_core_fields() {
    let client = client().await;
    let response = client
        .post("/api/sessions")
        .header(ContentType::JSON)
        .header(bearer())
        .body(json!({ "skillId": ObjectId::new().to_hex() }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(
        body(response).await["message"],
        "teacherId, skillId, scheduledAt, and duration are required"
    );
}

#[rocket::async_test]
async fn reviews_need_a_skill_or_user() {
    let client = client().await;
    let response = client.get("/api/reviews").dispatch().await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "Either skillId or userId is required");
}

#[rocket::async_test]
async fn search_everything_needs_a_query() {
    let client = client().await;
    let response = client.get("/api/search?type=all").dispatch().await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "Search query is required");
}

#[rocket::async_test]
async fn short_suggestion_queries_return_nothing() {
    let client = client().await;
    let response = client
        .post("/api/search")
        .header(ContentType::JSON)
        .body(json!({ "query": "g" }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response).await["suggestions"], json!([]));
}

#[rocket::async_test]
async fn settings_updates_need_a_known_section() {
    let client = client().await;
    let response = client
        .put("/api/settings")
        .header(ContentType::JSON)
        .header(bearer())
        .body(json!({ "billing": { "plan": "pro" } }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn recommendations_need_a_prompt() {
    let client = client().await;
    let response = client
        .post("/api/recommend-skills")
        .header(ContentType::JSON)
        .header(bearer())
        .body(json!({ "prompt": "" }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "Prompt is required");
}

#[rocket::async_test]
async fn upload_deletes_refuse_paths_outside_uploads() {
    let client = client().await;
    let response = client
        .delete("/api/upload?url=/etc/passwd")
        .header(bearer())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "Invalid file URL");
}

#[rocket::async_test]
async fn notification_mark_read_needs_a_target() {
    let client = client().await;
    let response = client
        .put("/api/notifications")
        .header(ContentType::JSON)
        .header(bearer())
        .body(json!({}).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "notificationIds or markAllAsRead is required");
}

#[rocket::async_test]
async fn multipart_uploads_must_really_be_images() {
    let client = client().await;
    let payload = concat!(
        "--skillmint\r\n",
        "Content-Disposition: form-data; name=\"type\"\r\n\r\n",
        "cover\r\n",
        "--skillmint\r\n",
        "Content-Disposition: form-data; name=\"file\"; filename=\"cover.png\"\r\n",
        "Content-Type: image/png\r\n\r\n",
        "<html><script>alert(1)</script></html>\r\n",
        "--skillmint--\r\n",
    );
    let response = client
        .post("/api/upload")
        .header(ContentType::new("multipart", "form-data").with_params(("boundary", "skillmint")))
        .header(bearer())
        .body(payload)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "File content does not match its type");
}
