use sqlx::SqlitePool;
use std::future::Future;
use std::time::Duration;
use tracing::{info, instrument, warn};

use whotslot_core::{referral_code, Amount, CoreError, OsEntropy, ReferralPolicy};
use whotslot_shared::{
    AccountView, ReferralBonusResponse, TransactionKind, TransactionResponse, WithdrawalResponse,
    WithdrawalStatus, WithdrawalView,
};

use crate::config::GameSettings;
use crate::error::{LedgerError, LedgerResult};
use crate::store;

const MAX_USERNAME_LEN: usize = 32;
const REFERRAL_CODE_LEN: usize = 4;
const REFERRAL_CODE_ATTEMPTS: usize = 8;

/// Deposits, withdrawal requests and their review, account registration
/// and referral bonuses.
#[derive(Clone)]
pub struct Wallet {
    db: SqlitePool,
    min_withdrawal: Amount,
    referral: ReferralPolicy,
    timeout: Duration,
}

impl Wallet {
    pub fn new(db: SqlitePool, settings: &GameSettings) -> Self {
        Self {
            db,
            min_withdrawal: settings.min_withdrawal(),
            referral: settings.referral_policy(),
            timeout: settings.persistence_timeout(),
        }
    }

    async fn bounded<T>(&self, op: impl Future<Output = LedgerResult<T>>) -> LedgerResult<T> {
        tokio::time::timeout(self.timeout, op).await.map_err(|_| {
            warn!(timeout = ?self.timeout, "wallet operation timed out, rolled back");
            LedgerError::PersistenceTimeout(self.timeout)
        })?
    }

    #[instrument(skip(self))]
    pub async fn create_account(
        &self,
        username: &str,
        referrer_code: Option<&str>,
    ) -> LedgerResult<AccountView> {
        let username = username.trim();
        validate_username(username)?;
        let referrer = referrer_code.map(str::trim).filter(|c| !c.is_empty());
        if let Some(code) = referrer {
            if !store::referral_code_exists(&self.db, code).await? {
                return Err(LedgerError::InvalidReferrer(code.to_string()));
            }
        }

        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let code = referral_code(&mut OsEntropy, REFERRAL_CODE_LEN)?;
            if let Some(row) = store::create_account(&self.db, username, &code, referrer).await? {
                info!(account = row.id, referral_code = %row.referral_code, "account created");
                return Ok(view(row));
            }
        }
        Err(LedgerError::RandomSourceUnavailable(
            "no free referral code found".into(),
        ))
    }

    pub async fn account(&self, id: i64) -> LedgerResult<AccountView> {
        Ok(view(store::get_account(&self.db, id).await?))
    }

    pub async fn deposit(
        &self,
        account_id: i64,
        amount: Amount,
    ) -> LedgerResult<TransactionResponse> {
        self.transact(account_id, TransactionKind::Deposit, amount)
            .await
    }

    /// Debit the balance and file a pending request for admin review.
    pub async fn withdraw(
        &self,
        account_id: i64,
        amount: Amount,
    ) -> LedgerResult<TransactionResponse> {
        self.transact(account_id, TransactionKind::Withdrawal, amount)
            .await
    }

    #[instrument(skip(self), fields(amount = amount.get()))]
    pub async fn transact(
        &self,
        account_id: i64,
        kind: TransactionKind,
        amount: Amount,
    ) -> LedgerResult<TransactionResponse> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount("amount must be positive".into()));
        }
        match kind {
            TransactionKind::Refund => {
                return Err(LedgerError::InvalidAmount(
                    "refunds come from rejecting a withdrawal request".into(),
                ))
            }
            TransactionKind::Withdrawal if amount < self.min_withdrawal => {
                return Err(LedgerError::InvalidAmount(format!(
                    "minimum withdrawal is {}",
                    self.min_withdrawal.grouped()
                )))
            }
            _ => {}
        }

        let receipt = self.bounded(self.apply(account_id, kind, amount)).await?;
        info!(kind = kind.as_str(), balance = receipt.balance, "transaction recorded");
        Ok(receipt)
    }

    async fn apply(
        &self,
        account_id: i64,
        kind: TransactionKind,
        amount: Amount,
    ) -> LedgerResult<TransactionResponse> {
        let value = store::to_db(amount)?;
        let mut tx = self.db.begin().await?;

        let balance = match kind {
            TransactionKind::Withdrawal => store::debit(&mut *tx, account_id, value).await?,
            _ => store::credit(&mut *tx, account_id, value).await?,
        };
        let Some(balance) = balance else {
            let reason = if !store::account_exists(&mut *tx, account_id).await? {
                LedgerError::AccountNotFound(account_id)
            } else if kind == TransactionKind::Withdrawal {
                LedgerError::InsufficientFunds
            } else {
                LedgerError::InvalidAmount("deposit would overflow the balance".into())
            };
            tx.rollback().await?;
            return Err(reason);
        };

        let id =
            store::insert_transaction(&mut *tx, account_id, kind.as_str(), value, balance).await?;
        let withdrawal_id = if kind == TransactionKind::Withdrawal {
            Some(store::insert_withdrawal(&mut *tx, account_id, value).await?.id)
        } else {
            None
        };
        tx.commit().await?;

        Ok(TransactionResponse {
            id,
            kind,
            amount: amount.get(),
            balance: store::from_db(balance).get(),
            withdrawal_id,
        })
    }

    pub async fn withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
        limit: i64,
    ) -> LedgerResult<Vec<WithdrawalView>> {
        let rows = store::list_withdrawals(&self.db, status, limit).await?;
        Ok(rows.iter().map(|r| r.to_view()).collect())
    }

    /// Mark a pending request as paid out. The balance was already debited.
    #[instrument(skip(self))]
    pub async fn approve_withdrawal(&self, id: i64) -> LedgerResult<WithdrawalResponse> {
        let res = self
            .bounded(self.review(id, WithdrawalStatus::Approved))
            .await?;
        info!(account = res.withdrawal.account_id, "withdrawal approved");
        Ok(res)
    }

    /// Refuse a pending request and credit the amount back.
    #[instrument(skip(self))]
    pub async fn reject_withdrawal(&self, id: i64) -> LedgerResult<WithdrawalResponse> {
        let res = self
            .bounded(self.review(id, WithdrawalStatus::Rejected))
            .await?;
        info!(
            account = res.withdrawal.account_id,
            refunded = res.withdrawal.amount,
            "withdrawal rejected"
        );
        Ok(res)
    }

    async fn review(&self, id: i64, status: WithdrawalStatus) -> LedgerResult<WithdrawalResponse> {
        let mut tx = self.db.begin().await?;

        let Some(row) = store::resolve_withdrawal(&mut *tx, id, status).await? else {
            let reason = match store::get_withdrawal(&mut *tx, id).await? {
                Some(_) => LedgerError::WithdrawalResolved(id),
                None => LedgerError::WithdrawalNotFound(id),
            };
            tx.rollback().await?;
            return Err(reason);
        };

        let balance = if status == WithdrawalStatus::Rejected {
            let balance = store::credit(&mut *tx, row.account_id, row.amount)
                .await?
                .ok_or(LedgerError::Core(CoreError::Overflow))?;
            store::insert_transaction(
                &mut *tx,
                row.account_id,
                TransactionKind::Refund.as_str(),
                row.amount,
                balance,
            )
            .await?;
            balance
        } else {
            store::account_balance(&mut *tx, row.account_id).await?
        };
        tx.commit().await?;

        Ok(WithdrawalResponse {
            withdrawal: row.to_view(),
            balance: store::from_db(balance).get(),
        })
    }

    pub async fn referral_bonus(&self, code: &str) -> LedgerResult<ReferralBonusResponse> {
        if !store::referral_code_exists(&self.db, code).await? {
            return Err(LedgerError::UnknownReferralCode(code.to_string()));
        }
        let totals = store::referral_totals(&self.db, code).await?;
        let total_bet = store::from_db(totals.total_bet);
        Ok(ReferralBonusResponse {
            referral_code: code.to_string(),
            referred_accounts: totals.referred_accounts,
            total_bet: total_bet.get(),
            referral_bonus: self.referral.bonus(total_bet).get(),
        })
    }
}

fn validate_username(username: &str) -> LedgerResult<()> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(LedgerError::InvalidUsername(format!(
            "must be 1 to {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(LedgerError::InvalidUsername(
            "only letters, digits, '_', '-' and '.' are allowed".into(),
        ));
    }
    Ok(())
}

fn view(row: store::AccountRow) -> AccountView {
    AccountView {
        id: row.id,
        username: row.username,
        balance: store::from_db(row.balance).get(),
        referral_code: row.referral_code,
    }
}
