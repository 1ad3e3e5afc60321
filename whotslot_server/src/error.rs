use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use whotslot_core::CoreError;
use whotslot_shared::{ApiError, ErrorBody};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("bet must be between 1 and {max}, got {bet}")]
    InvalidBet { bet: u64, max: u64 },
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid username: {0}")]
    InvalidUsername(String),
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("account {0} not found")]
    AccountNotFound(i64),
    #[error("username `{0}` is already taken")]
    DuplicateUsername(String),
    #[error("referral code `{0}` does not exist")]
    UnknownReferralCode(String),
    #[error("invalid referrer code `{0}`")]
    InvalidReferrer(String),
    #[error("withdrawal request {0} not found")]
    WithdrawalNotFound(i64),
    #[error("withdrawal request {0} was already reviewed")]
    WithdrawalResolved(i64),
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] sqlx::Error),
    #[error("persistence timed out after {0:?}")]
    PersistenceTimeout(Duration),
    #[error("random source unavailable: {0}")]
    RandomSourceUnavailable(String),
    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for LedgerError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::RandomSourceUnavailable(msg) => LedgerError::RandomSourceUnavailable(msg),
            other => LedgerError::Core(other),
        }
    }
}

impl LedgerError {
    /// Storage-side failures; the caller may retry the whole operation.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            LedgerError::PersistenceFailure(_) | LedgerError::PersistenceTimeout(_)
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidBet { .. }
            | LedgerError::InvalidAmount(_)
            | LedgerError::InvalidUsername(_)
            | LedgerError::InvalidReferrer(_) => ApiError::Invalid(e.to_string()),
            LedgerError::InsufficientFunds => ApiError::InsufficientFunds,
            LedgerError::AccountNotFound(id) => ApiError::NotFound(format!("account {id}")),
            LedgerError::DuplicateUsername(_) | LedgerError::WithdrawalResolved(_) => {
                ApiError::Conflict(e.to_string())
            }
            LedgerError::UnknownReferralCode(code) => {
                ApiError::NotFound(format!("referral code {code}"))
            }
            LedgerError::WithdrawalNotFound(id) => {
                ApiError::NotFound(format!("withdrawal request {id}"))
            }
            LedgerError::Core(CoreError::InvalidPanelCount(_))
            | LedgerError::Core(CoreError::UnknownSymbol(_)) => ApiError::Invalid(e.to_string()),
            LedgerError::RandomSourceUnavailable(_) => {
                error!(error = %e, "spin aborted");
                ApiError::Unavailable
            }
            LedgerError::PersistenceFailure(_)
            | LedgerError::PersistenceTimeout(_)
            | LedgerError::Core(_) => {
                error!(error = %e, "ledger operation failed");
                ApiError::Internal
            }
        }
    }
}

/// `ApiError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiFailure(pub ApiError);

impl From<ApiError> for ApiFailure {
    fn from(e: ApiError) -> Self {
        ApiFailure(e)
    }
}

impl From<LedgerError> for ApiFailure {
    fn from(e: LedgerError) -> Self {
        ApiFailure(e.into())
    }
}

impl From<CoreError> for ApiFailure {
    fn from(e: CoreError) -> Self {
        LedgerError::from(e).into()
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_faults_keep_detail() {
        let api: ApiError = LedgerError::InvalidBet { bet: 0, max: 10 }.into();
        assert_eq!(api.status_code(), 400);
        assert!(api.to_string().contains("between 1 and 10"));
        let api: ApiError = LedgerError::AccountNotFound(7).into();
        assert_eq!(api.to_string(), "account 7 not found");
    }

    #[test]
    fn withdrawal_review_faults() {
        let api: ApiError = LedgerError::WithdrawalResolved(3).into();
        assert_eq!(api.status_code(), 409);
        let api: ApiError = LedgerError::WithdrawalNotFound(3).into();
        assert_eq!(api.to_string(), "withdrawal request 3 not found");
    }

    #[test]
    fn storage_faults_are_opaque() {
        let api: ApiError = LedgerError::PersistenceFailure(sqlx::Error::PoolTimedOut).into();
        assert_eq!(api.status_code(), 500);
        assert_eq!(api.to_string(), "internal server error");
        let api: ApiError = LedgerError::PersistenceTimeout(Duration::from_secs(1)).into();
        assert_eq!(api.status_code(), 500);
    }

    #[test]
    fn entropy_outage_is_unavailable() {
        let e: LedgerError = CoreError::RandomSourceUnavailable("down".into()).into();
        assert!(matches!(e, LedgerError::RandomSourceUnavailable(_)));
        assert_eq!(ApiError::from(e).status_code(), 503);
    }
}
