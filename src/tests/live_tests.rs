//! End-to-end checks that need a MongoDB replica set (wallet and review
//! writes run in transactions). Set `MONGODB_TEST_URI`, for example
//! `mongodb://localhost:27017/?replicaSet=rs0`; without it these return early.

use crate::app;
use crate::db::{self, DbConn};
use crate::models::{LedgerEntry, Skill, TransactionType, User};
use crate::services::JwtService;
use mongodb::bson::{DateTime, doc, oid::ObjectId};
use rocket::futures::TryStreamExt;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use serde_json::{Value, json};

const TEST_DATABASE: &str = "skill-mint-test";

async fn live() -> Option<(Client, DbConn)> {
    let Ok(uri) = std::env::var("MONGODB_TEST_URI") else {
        eprintln!("MONGODB_TEST_URI not set, skipping");
        return None;
    };
    let mongo = mongodb::Client::with_uri_str(&uri).await.expect("mongo uri");

    let client = Client::tracked(app().manage(DbConn::new(mongo.clone(), TEST_DATABASE)))
        .await
        .expect("valid rocket instance");

    Some((client, DbConn::new(mongo, TEST_DATABASE)))
}

async fn seed_user(db: &DbConn, name: &str, adjust: impl FnOnce(&mut User)) -> ObjectId {
    let mut user = User::new(
        format!("{}.{}@skillmint.io", name.to_lowercase(), ObjectId::new().to_hex()),
        "not-a-real-hash".into(),
        name.into(),
    );
    adjust(&mut user);

    db.collection::<User>(db::USERS)
        .insert_one(&user, None)
        .await
        .expect("insert user")
        .inserted_id
        .as_object_id()
        .expect("user id")
}

async fn load_user(db: &DbConn, id: ObjectId) -> User {
    db.collection::<User>(db::USERS)
        .find_one(doc! { "_id": id }, None)
        .await
        .expect("find user")
        .expect("user exists")
}

async fn ledger_of(db: &DbConn, id: ObjectId) -> Vec<LedgerEntry> {
    db.collection::<LedgerEntry>(db::TRANSACTIONS)
        .find(doc! { "userId": id }, None)
        .await
        .expect("find ledger")
        .try_collect()
        .await
        .expect("read ledger")
}

fn bearer_for(id: ObjectId, name: &str) -> Header<'static> {
    let token = JwtService::generate_access_token(&id, "member@skillmint.io", name).unwrap();
    Header::new("Authorization", format!("Bearer {}", token))
}

async fn body(response: LocalResponse<'_>) -> Value {
    response.into_json::<Value>().await.expect("json body")
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[rocket::async_test]
async fn overdraft_leaves_balance_and_ledger_untouched() {
    let Some((client, db)) = live().await else { return };
    let user = seed_user(&db, "Ada", |u| u.hour_balance = 1.0).await;

    let response = client
        .post("/api/wallet")
        .header(ContentType::JSON)
        .header(bearer_for(user, "Ada"))
        .body(json!({ "type": "withdrawal", "amount": 5 }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "Insufficient balance");

    let after = load_user(&db, user).await;
    assert_eq!(after.hour_balance, 1.0);
    assert_eq!(after.total_spent, 0.0);
    assert!(ledger_of(&db, user).await.is_empty());
}

#[rocket::async_test]
async fn transfer_moves_hours_and_writes_both_rows() {
    let Some((client, db)) = live().await else { return };
    let sender = seed_user(&db, "Ada", |u| u.hour_balance = 10.0).await;
    let recipient = seed_user(&db, "Grace", |u| u.hour_balance = 2.0).await;

    let response = client
        .post("/api/wallet")
        .header(ContentType::JSON)
        .header(bearer_for(sender, "Ada"))
        .body(json!({ "type": "transfer", "amount": 4, "recipientId": recipient.to_hex() }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    let receipt = body(response).await;
    assert_eq!(receipt["transaction"]["newBalance"], 6.0);
    assert_eq!(receipt["transaction"]["type"], "transfer");

    let sent = load_user(&db, sender).await;
    assert_eq!(sent.hour_balance, 6.0);
    assert_eq!(sent.total_spent, 4.0);
    let received = load_user(&db, recipient).await;
    assert_eq!(received.hour_balance, 6.0);
    assert_eq!(received.total_earned, 4.0);

    let sender_rows = ledger_of(&db, sender).await;
    assert_eq!(sender_rows.len(), 1);
    assert_eq!(sender_rows[0].kind, TransactionType::Transfer);
    assert_eq!(sender_rows[0].recipient_id, Some(recipient));
    assert_eq!(sender_rows[0].balance_after, 6.0);

    let recipient_rows = ledger_of(&db, recipient).await;
    assert_eq!(recipient_rows.len(), 1);
    assert_eq!(recipient_rows[0].kind, TransactionType::TransferReceived);
    assert_eq!(recipient_rows[0].from_user_id, Some(sender));
    assert_eq!(recipient_rows[0].description, "Transfer received from Ada");
}

#[rocket::async_test]
async fn transfer_to_a_missing_recipient_changes_nothing() {
    let Some((client, db)) = live().await else { return };
    let sender = seed_user(&db, "Ada", |u| u.hour_balance = 10.0).await;

    let response = client
        .post("/api/wallet")
        .header(ContentType::JSON)
        .header(bearer_for(sender, "Ada"))
        .body(json!({ "type": "transfer", "amount": 4, "recipientId": ObjectId::new().to_hex() }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(load_user(&db, sender).await.hour_balance, 10.0);
    assert!(ledger_of(&db, sender).await.is_empty());
}

#[rocket::async_test]
async fn reviews_fold_into_skill_and_user_means() {
    let Some((client, db)) = live().await else { return };
    let reviewer = seed_user(&db, "Sam", |_| {}).await;
    let teacher = seed_user(&db, "Kai", |u| {
        u.overall_rating = 4.0;
        u.total_reviews = 1;
    })
    .await;

    let now = DateTime::now();
    let skill_id = db
        .collection::<Skill>(db::SKILLS)
        .insert_one(
            Skill {
                id: None,
                user_id: teacher,
                title: "Sourdough".into(),
                description: String::new(),
                category: "Cooking".into(),
                hourly_rate: 1.0,
                rating: 4.0,
                review_count: 1,
                created_at: now,
                updated_at: now,
            },
            None,
        )
        .await
        .expect("insert skill")
        .inserted_id
        .as_object_id()
        .expect("skill id");

    let response = client
        .post("/api/reviews")
        .header(ContentType::JSON)
        .header(bearer_for(reviewer, "Sam"))
        .body(json!({ "skillId": skill_id.to_hex(), "revieweeId": teacher.to_hex(), "rating": 2 }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    let review_id = body(response).await["id"].as_str().expect("review id").to_string();

    let skill = db
        .collection::<Skill>(db::SKILLS)
        .find_one(doc! { "_id": skill_id }, None)
        .await
        .unwrap()
        .unwrap();
    assert!(close(skill.rating, 3.0));
    assert_eq!(skill.review_count, 2);

    let reviewee = load_user(&db, teacher).await;
    assert!(close(reviewee.overall_rating, 3.0));
    assert_eq!(reviewee.total_reviews, 2);

    // 4 and 2 -> 3; the 2 becomes a 4
    let response = client
        .put("/api/reviews")
        .header(ContentType::JSON)
        .header(bearer_for(reviewer, "Sam"))
        .body(json!({ "id": review_id, "rating": 4 }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let skill = db
        .collection::<Skill>(db::SKILLS)
        .find_one(doc! { "_id": skill_id }, None)
        .await
        .unwrap()
        .unwrap();
    assert!(close(skill.rating, 4.0));
    assert_eq!(skill.review_count, 2);

    let reviewee = load_user(&db, teacher).await;
    assert!(close(reviewee.overall_rating, 4.0));
    assert_eq!(reviewee.total_reviews, 2);
}

#[rocket::async_test]
async fn refresh_issues_a_new_access_token() {
    let Some((client, db)) = live().await else { return };
    let user = seed_user(&db, "Ada", |_| {}).await;
    let refresh = JwtService::generate_refresh_token(&user, "ada@skillmint.io", "Ada").unwrap();

    let response = client
        .post("/api/auth/refresh")
        .header(ContentType::JSON)
        .body(json!({ "refreshToken": refresh }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);
    let access = body(response).await["accessToken"].as_str().expect("access token").to_string();
    let claims = JwtService::verify_token(&access, false).unwrap();
    assert_eq!(claims.sub, user.to_hex());
    assert_eq!(claims.name, "Ada");
}

#[rocket::async_test]
async fn refresh_refuses_disabled_accounts() {
    let Some((client, db)) = live().await else { return };
    let user = seed_user(&db, "Mallory", |u| u.is_active = false).await;
    let refresh = JwtService::generate_refresh_token(&user, "mallory@skillmint.io", "Mallory").unwrap();

    let response = client
        .post("/api/auth/refresh")
        .header(ContentType::JSON)
        .body(json!({ "refreshToken": refresh }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Forbidden);
    assert_eq!(body(response).await["message"], "Account is disabled");
}

#[rocket::async_test]
async fn refresh_for_a_deleted_account_is_unauthorized() {
    let Some((client, _db)) = live().await else { return };
    let refresh = JwtService::generate_refresh_token(&ObjectId::new(), "gone@skillmint.io", "Gone").unwrap();

    let response = client
        .post("/api/auth/refresh")
        .header(ContentType::JSON)
        .body(json!({ "refreshToken": refresh }).to_string())
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn reports_cannot_name_an_unrelated_account() {
    let Some((client, db)) = live().await else { return };
    let reporter = seed_user(&db, "Sam", |_| {}).await;
    let owner = seed_user(&db, "Kai", |_| {}).await;
    let bystander = seed_user(&db, "Lee", |_| {}).await;

    let now = DateTime::now();
    let skill_id = db
        .collection::<Skill>(db::SKILLS)
        .insert_one(
            Skill {
                id: None,
                user_id: owner,
                title: "Knife juggling".into(),
                description: String::new(),
                category: "Circus".into(),
                hourly_rate: 1.0,
                rating: 0.0,
                review_count: 0,
                created_at: now,
                updated_at: now,
            },
            None,
        )
        .await
        .expect("insert skill")
        .inserted_id
        .as_object_id()
        .expect("skill id");

    let response = client
        .post("/api/reports")
        .header(ContentType::JSON)
        .header(bearer_for(reporter, "Sam"))
        .body(
            json!({
                "reportType": "skill",
                "reportedItemId": skill_id.to_hex(),
                "reportedUserId": bystander.to_hex(),
                "reason": "spam",
            })
            .to_string(),
        )
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(body(response).await["message"], "reportedUserId does not match the reported item");
}
