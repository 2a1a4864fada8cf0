use crate::utils::to_rfc3339;
use mongodb::bson::{DateTime, Document, oid::ObjectId};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    SessionPayment,
    SessionEarning,
    ExchangeCompletion,
    Bonus,
    Penalty,
    Transfer,
    Withdrawal,
    Deposit,
    /// Written for the recipient side of a transfer; never accepted as input.
    TransferReceived,
}

impl TransactionType {
    pub const EARNINGS: [TransactionType; 3] = [
        TransactionType::SessionEarning,
        TransactionType::ExchangeCompletion,
        TransactionType::Bonus,
    ];

    pub fn parse_input(raw: &str) -> Option<Self> {
        match raw {
            "session_payment" => Some(TransactionType::SessionPayment),
            "session_earning" => Some(TransactionType::SessionEarning),
            "exchange_completion" => Some(TransactionType::ExchangeCompletion),
            "bonus" => Some(TransactionType::Bonus),
            "penalty" => Some(TransactionType::Penalty),
            "transfer" => Some(TransactionType::Transfer),
            "withdrawal" => Some(TransactionType::Withdrawal),
            "deposit" => Some(TransactionType::Deposit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::SessionPayment => "session_payment",
            TransactionType::SessionEarning => "session_earning",
            TransactionType::ExchangeCompletion => "exchange_completion",
            TransactionType::Bonus => "bonus",
            TransactionType::Penalty => "penalty",
            TransactionType::Transfer => "transfer",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Deposit => "deposit",
            TransactionType::TransferReceived => "transfer_received",
        }
    }

    pub fn is_debit(&self) -> bool {
        matches!(
            self,
            TransactionType::SessionPayment
                | TransactionType::Transfer
                | TransactionType::Withdrawal
                | TransactionType::Penalty
        )
    }

    pub fn default_description(&self) -> String {
        format!("{} transaction", self.as_str().replacen('_', " ", 1))
    }
}

/// Balance fields of a user document, read inside the wallet transaction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WalletBalance {
    pub balance: f64,
    pub total_earned: f64,
    pub total_spent: f64,
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum WalletError {
    #[error("Insufficient balance")]
    InsufficientBalance { balance: f64, requested: f64 },
}

impl WalletBalance {
    /// Debits reduce the balance and grow `total_spent`; everything else
    /// credits and grows `total_earned`. A debit larger than the balance is
    /// rejected and leaves `self` untouched.
    pub fn apply(&self, kind: TransactionType, amount: f64) -> Result<WalletBalance, WalletError> {
        if kind.is_debit() {
            if self.balance < amount {
                return Err(WalletError::InsufficientBalance {
                    balance: self.balance,
                    requested: amount,
                });
            }
            Ok(WalletBalance {
                balance: self.balance - amount,
                total_earned: self.total_earned,
                total_spent: self.total_spent + amount,
            })
        } else {
            Ok(WalletBalance {
                balance: self.balance + amount,
                total_earned: self.total_earned + amount,
                total_spent: self.total_spent,
            })
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub recipient_id: Option<ObjectId>,
    pub from_user_id: Option<ObjectId>,
    pub session_id: Option<ObjectId>,
    pub exchange_id: Option<ObjectId>,
    pub description: String,
    #[serde(default)]
    pub metadata: Document,
    pub balance_after: f64,
    pub status: String,
    pub created_at: DateTime,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct WalletQuery {
    pub transactions: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletOperationDto {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<f64>,
    pub recipient_id: Option<String>,
    pub session_id: Option<String>,
    pub exchange_id: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLookupDto {
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryResponse {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub recipient_id: Option<String>,
    pub from_user_id: Option<String>,
    pub session_id: Option<String>,
    pub exchange_id: Option<String>,
    pub description: String,
    pub metadata: serde_json::Value,
    pub balance_after: f64,
    pub status: String,
    pub created_at: String,
}

impl From<&LedgerEntry> for LedgerEntryResponse {
    fn from(e: &LedgerEntry) -> Self {
        LedgerEntryResponse {
            id: e.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: e.user_id.to_hex(),
            kind: e.kind,
            amount: e.amount,
            recipient_id: e.recipient_id.map(|id| id.to_hex()),
            from_user_id: e.from_user_id.map(|id| id.to_hex()),
            session_id: e.session_id.map(|id| id.to_hex()),
            exchange_id: e.exchange_id.map(|id| id.to_hex()),
            description: e.description.clone(),
            metadata: serde_json::to_value(&e.metadata).unwrap_or(serde_json::Value::Null),
            balance_after: e.balance_after,
            status: e.status.clone(),
            created_at: to_rfc3339(e.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(balance: f64) -> WalletBalance {
        WalletBalance {
            balance,
            total_earned: 10.0,
            total_spent: 4.0,
        }
    }

    #[test]
    fn debit_types() {
        for kind in ["session_payment", "transfer", "withdrawal", "penalty"] {
            assert!(TransactionType::parse_input(kind).unwrap().is_debit(), "{kind}");
        }
        for kind in ["session_earning", "exchange_completion", "bonus", "deposit"] {
            assert!(!TransactionType::parse_input(kind).unwrap().is_debit(), "{kind}");
        }
    }

    #[test]
    fn transfer_received_is_not_an_input_type() {
        assert!(TransactionType::parse_input("transfer_received").is_none());
        assert!(TransactionType::parse_input("refund").is_none());
    }

    #[test]
    fn debit_reduces_balance_and_tracks_spending() {
        let next = wallet(6.0).apply(TransactionType::Withdrawal, 2.5).unwrap();
        assert_eq!(next.balance, 3.5);
        assert_eq!(next.total_spent, 6.5);
        assert_eq!(next.total_earned, 10.0);
    }

    #[test]
    fn debit_may_empty_the_wallet_exactly() {
        let next = wallet(3.0).apply(TransactionType::Transfer, 3.0).unwrap();
        assert_eq!(next.balance, 0.0);
    }

    #[test]
    fn overdraft_is_rejected() {
        let err = wallet(1.0).apply(TransactionType::SessionPayment, 1.5).unwrap_err();
        assert_eq!(
            err,
            WalletError::InsufficientBalance {
                balance: 1.0,
                requested: 1.5
            }
        );
        assert_eq!(err.to_string(), "Insufficient balance");
    }

    #[test]
    fn credit_grows_balance_and_earnings() {
        let next = wallet(1.0).apply(TransactionType::Deposit, 4.0).unwrap();
        assert_eq!(next.balance, 5.0);
        assert_eq!(next.total_earned, 14.0);
        assert_eq!(next.total_spent, 4.0);
    }

    #[test]
    fn default_descriptions_replace_the_first_underscore() {
        assert_eq!(
            TransactionType::SessionPayment.default_description(),
            "session payment transaction"
        );
        assert_eq!(
            TransactionType::TransferReceived.default_description(),
            "transfer received transaction"
        );
    }
}
