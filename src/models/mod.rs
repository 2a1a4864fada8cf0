pub mod exchange;
pub mod favorite;
pub mod message;
pub mod notification;
pub mod report;
pub mod review;
pub mod session;
pub mod settings;
pub mod skill;
pub mod transaction;
pub mod user;

pub use exchange::*;
pub use favorite::*;
pub use message::*;
pub use notification::*;
pub use report::*;
pub use review::*;
pub use session::*;
pub use skill::*;
pub use transaction::*;
pub use user::*;

use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Deserialize;

/// `?id=` on DELETE routes.
#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct IdQuery {
    pub id: Option<String>,
}
