pub mod analytics;
pub mod gemini;
pub mod jwt;
pub mod notifier;
pub mod search;

pub use gemini::GeminiService;
pub use jwt::JwtService;
pub use notifier::Notifier;
