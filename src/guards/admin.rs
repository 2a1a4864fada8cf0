use crate::db::{self, DbConn};
use crate::guards::AuthGuard;
use log::warn;
use mongodb::bson::doc;
use rocket::State;
use rocket::http::Status;
use rocket::request::{self, FromRequest, Outcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};

/// Authenticated caller whose user document carries `isAdmin: true`.
pub struct AdminGuard {
    pub auth: AuthGuard,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let auth = match req.guard::<AuthGuard>().await {
            Outcome::Success(auth) => auth,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let db = match req.guard::<&State<DbConn>>().await {
            Outcome::Success(db) => db,
            _ => return Outcome::Error((Status::InternalServerError, ())),
        };

        let user = db
            .collection::<crate::models::User>(db::USERS)
            .find_one(doc! { "_id": auth.user_id }, None)
            .await;

        match user {
            Ok(Some(user)) if user.is_admin => Outcome::Success(AdminGuard { auth }),
            Ok(_) => {
                warn!("Admin guard rejected user {}", auth.user_id.to_hex());
                Outcome::Error((Status::Forbidden, ()))
            }
            Err(e) => {
                warn!("Admin guard lookup failed: {}", e);
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for AdminGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
