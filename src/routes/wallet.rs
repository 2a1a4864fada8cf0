use crate::db::{self, DbConn, parse_id};
use crate::guards::AuthGuard;
use crate::models::{
    LedgerEntry, LedgerEntryResponse, TransactionLookupDto, TransactionType, User, WalletBalance,
    WalletError, WalletOperationDto, WalletQuery,
};
use crate::utils::{ApiError, ApiResponse, ApiResult, non_blank};
use log::{error, info, warn};
use mongodb::ClientSession;
use mongodb::bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use mongodb::options::FindOptions;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket_okapi::openapi;

const DEFAULT_HISTORY: i64 = 50;
const MAX_HISTORY: i64 = 200;

/// A validated wallet request, ready to run inside a transaction.
struct WalletOperation {
    user_id: ObjectId,
    user_name: String,
    kind: TransactionType,
    amount: f64,
    recipient_id: Option<ObjectId>,
    session_id: Option<ObjectId>,
    exchange_id: Option<ObjectId>,
    description: Option<String>,
    metadata: Document,
}

struct WalletReceipt {
    transaction_id: ObjectId,
    new_balance: f64,
}

fn balance_of(user: &User) -> WalletBalance {
    WalletBalance {
        balance: user.hour_balance,
        total_earned: user.total_earned,
        total_spent: user.total_spent,
    }
}

fn metadata_document(value: Option<&serde_json::Value>) -> Result<Document, ApiError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Document::new()),
        Some(value) => match mongodb::bson::to_bson(value)? {
            Bson::Document(doc) => Ok(doc),
            _ => Err(ApiError::bad_request("metadata must be an object")),
        },
    }
}

fn parse_operation(auth: &AuthGuard, dto: &WalletOperationDto) -> Result<WalletOperation, ApiError> {
    let (Some(raw_kind), Some(amount)) = (non_blank(&dto.kind), dto.amount) else {
        return Err(ApiError::bad_request("type and amount are required"));
    };

    let kind = TransactionType::parse_input(raw_kind)
        .ok_or_else(|| ApiError::bad_request("Invalid transaction type"))?;

    if !amount.is_finite() || amount <= 0.0 {
        return Err(ApiError::bad_request("Amount must be greater than zero"));
    }

    let recipient_id = non_blank(&dto.recipient_id)
        .map(|raw| parse_id(raw, "recipient ID"))
        .transpose()?;

    if kind == TransactionType::Transfer {
        match recipient_id {
            None => return Err(ApiError::bad_request("recipientId is required for transfers")),
            Some(id) if id == auth.user_id => {
                return Err(ApiError::bad_request("You cannot transfer hours to yourself"));
            }
            _ => {}
        }
    }

    Ok(WalletOperation {
        user_id: auth.user_id,
        user_name: auth.display_name().to_string(),
        kind,
        amount,
        recipient_id: recipient_id.filter(|_| kind == TransactionType::Transfer),
        session_id: non_blank(&dto.session_id)
            .map(|raw| parse_id(raw, "session ID"))
            .transpose()?,
        exchange_id: non_blank(&dto.exchange_id)
            .map(|raw| parse_id(raw, "exchange ID"))
            .transpose()?,
        description: non_blank(&dto.description).map(str::to_string),
        metadata: metadata_document(dto.metadata.as_ref())?,
    })
}

async fn set_balance(
    db: &DbConn,
    txn: &mut ClientSession,
    user_id: ObjectId,
    next: WalletBalance,
    now: DateTime,
) -> Result<(), ApiError> {
    db.collection::<User>(db::USERS)
        .update_one_with_session(
            doc! { "_id": user_id },
            doc! { "$set": {
                "hourBalance": next.balance,
                "totalEarned": next.total_earned,
                "totalSpent": next.total_spent,
                "updatedAt": now,
            } },
            None,
            txn,
        )
        .await?;
    Ok(())
}

/// Moves hours and appends ledger rows. Every read and write goes through
/// `txn`, so either all of it lands or none of it does.
async fn apply_operation(
    db: &DbConn,
    txn: &mut ClientSession,
    op: &WalletOperation,
) -> Result<WalletReceipt, ApiError> {
    let users = db.collection::<User>(db::USERS);
    let ledger = db.collection::<LedgerEntry>(db::TRANSACTIONS);
    let now = DateTime::now();

    let user = users
        .find_one_with_session(doc! { "_id": op.user_id }, None, txn)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let next = balance_of(&user).apply(op.kind, op.amount).map_err(|e| match e {
        WalletError::InsufficientBalance { balance, requested } => {
            warn!(
                "Insufficient balance for {}: has {}, needs {}",
                op.user_id, balance, requested
            );
            ApiError::bad_request(e.to_string())
        }
    })?;

    set_balance(db, txn, op.user_id, next, now).await?;

    if let Some(recipient_id) = op.recipient_id {
        let recipient = users
            .find_one_with_session(doc! { "_id": recipient_id }, None, txn)
            .await?
            .ok_or_else(|| ApiError::not_found("Recipient not found"))?;

        let credited = balance_of(&recipient)
            .apply(TransactionType::TransferReceived, op.amount)
            .map_err(|e| ApiError::internal_error(e.to_string()))?;

        set_balance(db, txn, recipient_id, credited, now).await?;

        let received = LedgerEntry {
            id: None,
            user_id: recipient_id,
            kind: TransactionType::TransferReceived,
            amount: op.amount,
            recipient_id: None,
            from_user_id: Some(op.user_id),
            session_id: op.session_id,
            exchange_id: op.exchange_id,
            description: op
                .description
                .clone()
                .unwrap_or_else(|| format!("Transfer received from {}", op.user_name)),
            metadata: op.metadata.clone(),
            balance_after: credited.balance,
            status: "completed".to_string(),
            created_at: now,
        };
        ledger.insert_one_with_session(&received, None, txn).await?;
    }

    let entry = LedgerEntry {
        id: None,
        user_id: op.user_id,
        kind: op.kind,
        amount: op.amount,
        recipient_id: op.recipient_id,
        from_user_id: None,
        session_id: op.session_id,
        exchange_id: op.exchange_id,
        description: op
            .description
            .clone()
            .unwrap_or_else(|| op.kind.default_description()),
        metadata: op.metadata.clone(),
        balance_after: next.balance,
        status: "completed".to_string(),
        created_at: now,
    };
    let result = ledger.insert_one_with_session(&entry, None, txn).await?;

    let transaction_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Ledger insert returned no id"))?;

    Ok(WalletReceipt {
        transaction_id,
        new_balance: next.balance,
    })
}

#[openapi(tag = "Wallet")]
#[get("/wallet?<query..>")]
pub async fn get_wallet(auth: AuthGuard, db: &State<DbConn>, query: WalletQuery) -> ApiResult {
    let user = db
        .collection::<User>(db::USERS)
        .find_one(doc! { "_id": auth.user_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let wallet = serde_json::json!({
        "balance": user.hour_balance,
        "totalEarned": user.total_earned,
        "totalSpent": user.total_spent,
        "pendingEarnings": user.pending_earnings,
    });

    if !query.transactions.unwrap_or(false) {
        return Ok(Json(ApiResponse::success(serde_json::json!({ "wallet": wallet }))));
    }

    let limit = query.limit.unwrap_or(DEFAULT_HISTORY).clamp(1, MAX_HISTORY);
    let options = FindOptions::builder()
        .sort(doc! { "createdAt": -1 })
        .limit(limit)
        .build();

    let entries: Vec<LedgerEntry> = db
        .collection::<LedgerEntry>(db::TRANSACTIONS)
        .find(doc! { "userId": auth.user_id }, options)
        .await?
        .try_collect()
        .await?;

    let transactions: Vec<LedgerEntryResponse> = entries.iter().map(LedgerEntryResponse::from).collect();

    Ok(Json(ApiResponse::success(serde_json::json!({
        "wallet": wallet,
        "transactions": transactions,
    }))))
}

#[openapi(tag = "Wallet")]
#[post("/wallet", data = "<dto>")]
pub async fn create_transaction(auth: AuthGuard, db: &State<DbConn>, dto: Json<WalletOperationDto>) -> ApiResult {
    let op = parse_operation(&auth, &dto)?;

    let mut txn = db.start_session().await?;
    txn.start_transaction(None).await?;

    let receipt = match apply_operation(db, &mut txn, &op).await {
        Ok(receipt) => receipt,
        Err(e) => {
            if let Err(abort) = txn.abort_transaction().await {
                error!("Failed to abort wallet transaction: {}", abort);
            }
            return Err(e);
        }
    };
    txn.commit_transaction().await?;

    info!(
        "Wallet {} of {} by {} (balance now {})",
        op.kind.as_str(),
        op.amount,
        op.user_id,
        receipt.new_balance
    );

    Ok(Json(ApiResponse::success_with_message(
        "Transaction completed successfully",
        serde_json::json!({
            "transaction": {
                "transactionId": receipt.transaction_id.to_hex(),
                "newBalance": receipt.new_balance,
                "amount": op.amount,
                "type": op.kind,
            }
        }),
    )))
}

/// Looks up a single ledger row visible to the caller.
#[openapi(tag = "Wallet")]
#[put("/wallet", data = "<dto>")]
pub async fn get_transaction(auth: AuthGuard, db: &State<DbConn>, dto: Json<TransactionLookupDto>) -> ApiResult {
    let raw_id = non_blank(&dto.transaction_id)
        .ok_or_else(|| ApiError::bad_request("Transaction ID is required"))?;
    let transaction_id = parse_id(raw_id, "transaction ID")?;

    let entry = db
        .collection::<LedgerEntry>(db::TRANSACTIONS)
        .find_one(doc! { "_id": transaction_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;

    if entry.user_id != auth.user_id && entry.recipient_id != Some(auth.user_id) {
        warn!("User {} tried to read transaction {}", auth.user_id, transaction_id);
        return Err(ApiError::forbidden("Unauthorized to view this transaction"));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "transaction": LedgerEntryResponse::from(&entry)
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn caller() -> AuthGuard {
        AuthGuard {
            user_id: ObjectId::new(),
            email: "ada@skillmint.io".into(),
            name: "Ada".into(),
        }
    }

    fn dto(body: serde_json::Value) -> WalletOperationDto {
        serde_json::from_value(body).unwrap()
    }

    fn rejection(auth: &AuthGuard, body: serde_json::Value) -> String {
        match parse_operation(auth, &dto(body)) {
            Ok(_) => panic!("expected rejection"),
            Err(e) => e.message,
        }
    }

    #[test]
    fn requires_type_and_amount() {
        let auth = caller();
        assert_eq!(rejection(&auth, json!({ "amount": 2 })), "type and amount are required");
        assert_eq!(rejection(&auth, json!({ "type": "bonus" })), "type and amount are required");
    }

    #[test]
    fn rejects_unknown_types_and_non_positive_amounts() {
        let auth = caller();
        assert_eq!(rejection(&auth, json!({ "type": "refund", "amount": 1 })), "Invalid transaction type");
        assert_eq!(
            rejection(&auth, json!({ "type": "transfer_received", "amount": 1 })),
            "Invalid transaction type"
        );
        assert_eq!(
            rejection(&auth, json!({ "type": "deposit", "amount": 0 })),
            "Amount must be greater than zero"
        );
        assert_eq!(
            rejection(&auth, json!({ "type": "deposit", "amount": -3.5 })),
            "Amount must be greater than zero"
        );
    }

    #[test]
    fn transfers_need_another_recipient() {
        let auth = caller();
        assert_eq!(
            rejection(&auth, json!({ "type": "transfer", "amount": 1 })),
            "recipientId is required for transfers"
        );
        assert_eq!(
            rejection(&auth, json!({ "type": "transfer", "amount": 1, "recipientId": auth.user_id.to_hex() })),
            "You cannot transfer hours to yourself"
        );
    }

    #[test]
    fn recipient_is_ignored_outside_transfers() {
        let auth = caller();
        let op = parse_operation(
            &auth,
            &dto(json!({ "type": "bonus", "amount": 2, "recipientId": ObjectId::new().to_hex() })),
        )
        .unwrap();
        assert!(op.recipient_id.is_none());
    }

    #[test]
    fn metadata_must_be_an_object() {
        let auth = caller();
        assert_eq!(
            rejection(&auth, json!({ "type": "bonus", "amount": 1, "metadata": [1, 2] })),
            "metadata must be an object"
        );

        let op = parse_operation(
            &auth,
            &dto(json!({ "type": "bonus", "amount": 1, "metadata": { "campaign": "launch" } })),
        )
        .unwrap();
        assert_eq!(op.metadata.get_str("campaign").unwrap(), "launch");
    }
}
