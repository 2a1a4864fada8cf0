use rocket::Config as RocketConfig;
use rocket::figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use std::env;
use std::sync::OnceLock;

pub struct Config;

impl Config {
    fn profile() -> String {
        env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string())
    }

    fn figment() -> &'static Figment {
        static FIGMENT: OnceLock<Figment> = OnceLock::new();

        FIGMENT.get_or_init(|| {
            Figment::from(RocketConfig::default())
                .merge(Toml::file("Rocket.toml").nested())
                .select(Self::profile())
                .merge(Env::prefixed("ROCKET_").ignore(&["PROFILE"]).global())
        })
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
    }

    pub fn database_name() -> String {
        Self::figment()
            .extract_inner("database_name")
            .unwrap_or_else(|_| "skill-mint".to_string())
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn jwt_refresh_secret() -> String {
        Self::figment()
            .extract_inner("jwt_refresh_secret")
            .unwrap_or_else(|_| "default-refresh-secret".to_string())
    }

    pub fn jwt_expiry() -> i64 {
        Self::figment().extract_inner("jwt_expiry").unwrap_or(86400)
    }

    pub fn jwt_refresh_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_refresh_expiry")
            .unwrap_or(604800)
    }

    pub fn gemini_api_key() -> Option<String> {
        Self::figment()
            .extract_inner::<String>("gemini_api_key")
            .ok()
            .filter(|key| !key.is_empty())
    }

    pub fn gemini_model() -> String {
        Self::figment()
            .extract_inner("gemini_model")
            .unwrap_or_else(|_| "gemini-1.5-flash".to_string())
    }

    pub fn is_gemini_enabled() -> bool {
        Self::gemini_api_key().is_some()
    }

    pub fn upload_dir() -> String {
        Self::figment()
            .extract_inner("upload_dir")
            .unwrap_or_else(|_| "uploads".to_string())
    }

    pub fn max_upload_bytes() -> u64 {
        Self::figment()
            .extract_inner("max_upload_bytes")
            .unwrap_or(5 * 1024 * 1024)
    }

    pub fn login_rate_limit() -> i32 {
        Self::figment().extract_inner("login_rate_limit").unwrap_or(5)
    }

    pub fn login_rate_window_secs() -> i64 {
        Self::figment()
            .extract_inner("login_rate_window_secs")
            .unwrap_or(600)
    }

    pub fn is_development() -> bool {
        Self::profile() == "development"
    }
}
