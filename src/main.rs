#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

#[cfg(test)]
mod tests;

use config::Config;
use dotenvy::dotenv;
use log::info;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::fs::{FileServer, Options};
use rocket::http::{Header, Status};
use rocket::response::status;
use rocket::serde::json::{Json, Value, json};
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

fn failure(message: &str) -> Value {
    json!({ "success": false, "message": message })
}

#[catch(400)]
fn bad_request() -> Value {
    failure("Bad request")
}

#[catch(401)]
fn unauthorized() -> Value {
    failure("Unauthorized")
}

#[catch(403)]
fn forbidden() -> Value {
    failure("Admin access required")
}

#[catch(404)]
fn not_found() -> Value {
    failure("Resource not found")
}

/// Malformed JSON bodies and query values are client errors, not 422s.
#[catch(422)]
fn unprocessable() -> status::Custom<Json<Value>> {
    status::Custom(Status::BadRequest, Json(failure("Invalid request body")))
}

#[catch(500)]
fn internal_error() -> Value {
    failure("Internal server error")
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- APP ----------------------------- */

/// The route table without the database fairing, so tests can supply their own handle.
pub fn app() -> Rocket<Build> {
    rocket::build()
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api",
            openapi_get_routes![
                // Health
                routes::health::health,
                // Auth
                routes::auth::authenticate,
                routes::auth::register,
                routes::auth::refresh_token,
                // Profile
                routes::profile::get_profile,
                routes::profile::update_profile,
                // Skills
                routes::skill::list_skills,
                routes::skill::save_skill,
                routes::skill::delete_skill,
                // Exchanges
                routes::exchange::list_exchanges,
                routes::exchange::create_exchange,
                routes::exchange::update_exchange,
                routes::exchange::delete_exchange,
                // Sessions
                routes::session::list_sessions,
                routes::session::create_session,
                routes::session::update_session,
                routes::session::cancel_session,
                // Reviews
                routes::review::list_reviews,
                routes::review::create_review,
                routes::review::update_review,
                // Wallet
                routes::wallet::get_wallet,
                routes::wallet::create_transaction,
                routes::wallet::get_transaction,
                // Notifications
                routes::notification::list_notifications,
                routes::notification::create_notification,
                routes::notification::mark_read,
                routes::notification::delete_notification,
                // Favorites
                routes::favorite::list_favorites,
                routes::favorite::add_favorite,
                routes::favorite::remove_favorite,
                // Messages
                routes::message::get_messages,
                routes::message::send_message,
                // Reports
                routes::report::list_reports,
                routes::report::create_report,
                routes::report::review_report,
                // Search
                routes::search::search,
                routes::search::suggest,
                // Settings
                routes::settings::get_settings,
                routes::settings::update_settings,
                routes::settings::reset_settings,
                // Uploads
                routes::file_upload::upload_base64,
                routes::file_upload::delete_upload,
                // Analytics
                routes::analytics::user_analytics,
                routes::analytics::platform_analytics,
                // Recommendations
                routes::recommend::recommend_skills,
            ],
        )
        // Multipart bodies have no schema, so this one stays out of the OpenAPI document.
        .mount("/api", routes![routes::file_upload::upload_file])
        .mount("/uploads", FileServer::new(Config::upload_dir(), Options::Missing))
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register(
            "/",
            catchers![bad_request, unauthorized, forbidden, not_found, unprocessable, internal_error],
        )
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    info!("🚀 Skill Mint API starting");
    info!("📚 Swagger UI → http://localhost:8000/api/docs");
    if Config::is_development() {
        info!("Running with development settings");
    }
    if !Config::is_gemini_enabled() {
        info!("ROCKET_GEMINI_API_KEY not set; skill recommendations are disabled");
    }

    app().attach(db::init())
}
