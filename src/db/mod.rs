use log::{error, info};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::{Client, ClientSession, Database};
use rocket::fairing::AdHoc;
use std::ops::Deref;

pub const USERS: &str = "users";
pub const SKILLS: &str = "skills";
pub const EXCHANGES: &str = "exchanges";
pub const SESSIONS: &str = "sessions";
pub const REVIEWS: &str = "reviews";
pub const TRANSACTIONS: &str = "transactions";
pub const NOTIFICATIONS: &str = "notifications";
pub const FAVORITES: &str = "favorites";
pub const REPORTS: &str = "reports";
pub const CONVERSATIONS: &str = "conversations";
pub const MESSAGES: &str = "messages";
pub const USER_SETTINGS: &str = "user_settings";
pub const RATE_LIMITS: &str = "rate_limits";

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(conn) => {
                info!("✓ MongoDB connected successfully");
                rocket.manage(conn)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<DbConn, mongodb::error::Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    client
        .database("admin")
        .run_command(doc! {"ping": 1}, None)
        .await?;

    Ok(DbConn::new(client, &crate::config::Config::database_name()))
}

/// Parses a hex id coming from a request, naming the field in the error.
pub fn parse_id(raw: &str, what: &str) -> Result<ObjectId, crate::utils::ApiError> {
    ObjectId::parse_str(raw.trim())
        .map_err(|_| crate::utils::ApiError::bad_request(format!("Invalid {}", what)))
}

/// Managed database handle. Keeps the client so routes can open
/// sessions for multi-document transactions.
pub struct DbConn {
    client: Client,
    database: Database,
}

impl DbConn {
    pub fn new(client: Client, database_name: &str) -> Self {
        let database = client.database(database_name);
        DbConn { client, database }
    }

    pub async fn start_session(&self) -> Result<ClientSession, mongodb::error::Error> {
        self.client.start_session(None).await
    }
}

impl Deref for DbConn {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.database
    }
}
