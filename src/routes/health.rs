use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::Serialize;

#[derive(Debug, Serialize, JsonSchema)]
pub struct HealthStatus {
    pub success: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[openapi(tag = "Health")]
#[get("/health")]
pub fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        success: true,
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}
