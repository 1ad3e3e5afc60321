use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Amounts on the wire are integer minor units (kobo).

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpinRequest {
    pub client_seed: String,
    pub bet: u64,
    pub panels: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpinResponse {
    pub server_seed_hash: String,
    pub nonce: u64,
    pub symbols: Vec<String>,
    pub tier: String,
    pub payout: u64,
    pub balance: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyResponse {
    pub server_seed_hash: String,
    pub nonce: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateAccountRequest {
    pub username: String,
    /// Code of the account that referred this one
    #[serde(default)]
    pub referrer_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccountView {
    pub id: i64,
    pub username: String,
    pub balance: u64,
    pub referral_code: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    /// Credit back of a rejected withdrawal request
    Refund,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::Refund => "refund",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransactionRequest {
    pub kind: TransactionKind,
    pub amount: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransactionResponse {
    pub id: i64,
    pub kind: TransactionKind,
    pub amount: u64,
    pub balance: u64,
    /// Set for withdrawals, which wait for admin review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawal_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            other => Err(format!("unknown withdrawal status `{other}`")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WithdrawalView {
    pub id: i64,
    pub account_id: i64,
    pub amount: u64,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WithdrawalResponse {
    pub withdrawal: WithdrawalView,
    /// Account balance after the review
    pub balance: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WithdrawalsResponse {
    pub withdrawals: Vec<WithdrawalView>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WithdrawalsQuery {
    pub status: Option<WithdrawalStatus>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReferralBonusResponse {
    pub referral_code: String,
    pub referred_accounts: i64,
    pub total_bet: u64,
    pub referral_bonus: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WinnerEntry {
    pub username: String,
    pub tier: String,
    pub payout: u64,
    pub ts: DateTime<Utc>,
    pub headline: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WinnersResponse {
    pub winners: Vec<WinnerEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub username: String,
    pub total_payout: u64,
    pub wins: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LeaderboardResponse {
    pub leaders: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BountyResponse {
    pub bounty_prize: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FeedQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutcomeLogEntry {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub account_id: i64,
    pub bet: u64,
    pub panels: u8,
    pub symbols: Vec<String>,
    pub tier: String,
    pub payout: u64,
    pub balance_after: u64,
    /// `None` for spins settled without a provably-fair draw
    pub nonce: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("service temporarily unavailable")]
    Unavailable,
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Invalid(_) => 400,
            ApiError::Unauthorized => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InsufficientFunds => 422,
            ApiError::Internal => 500,
            ApiError::Unavailable => 503,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_kind_wire_format() {
        let req: TransactionRequest =
            serde_json::from_str(r#"{"kind":"withdrawal","amount":100000}"#).unwrap();
        assert_eq!(req.kind, TransactionKind::Withdrawal);
        assert_eq!(req.amount, 100_000);
    }

    #[test]
    fn withdrawal_id_only_on_withdrawals() {
        let deposit = TransactionResponse {
            id: 1,
            kind: TransactionKind::Deposit,
            amount: 5,
            balance: 5,
            withdrawal_id: None,
        };
        let json = serde_json::to_string(&deposit).unwrap();
        assert!(!json.contains("withdrawal_id"));
        let q: WithdrawalsQuery = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(q.status, Some(WithdrawalStatus::Pending));
        assert_eq!("rejected".parse::<WithdrawalStatus>(), Ok(WithdrawalStatus::Rejected));
    }

    #[test]
    fn missing_nonce_is_null_not_zero() {
        let entry = OutcomeLogEntry {
            id: 1,
            ts: Utc::now(),
            account_id: 1,
            bet: 10,
            panels: 3,
            symbols: vec!["whot_20.png".into(); 3],
            tier: "ultimate".into(),
            payout: 10_000,
            balance_after: 10_000,
            nonce: None,
        };
        let json: serde_json::Value = serde_json::to_value(&entry).unwrap();
        assert!(json["nonce"].is_null());
    }

    #[test]
    fn server_faults_hide_detail() {
        assert_eq!(ApiError::Internal.to_string(), "internal server error");
        assert_eq!(ApiError::InsufficientFunds.status_code(), 422);
    }
}
