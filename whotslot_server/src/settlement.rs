//! Spin settlement: one balance transition and one ledger row per spin.
//!
//! The debit, the credit and the outcome insert share a single SQLite
//! transaction. The debit is conditional (`balance >= bet`) and is the first
//! statement, so the transaction owns the write lock from the funds check to
//! the commit. Concurrent spins on one account therefore serialize and the
//! loser sees the already-debited balance. Any error, timeout or cancellation
//! drops the transaction, which rolls it back.

use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use whotslot_core::{Amount, BountyPolicy, CoreError, Paytable, SpinOutcome, WinTier};

use crate::bounty::BountyCache;
use crate::config::GameSettings;
use crate::error::{LedgerError, LedgerResult};
use crate::store::{self, NewOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub record_id: i64,
    pub tier: WinTier,
    pub payout: Amount,
    pub new_balance: Amount,
}

#[derive(Clone)]
pub struct SettlementService {
    db: SqlitePool,
    paytable: Paytable,
    policy: BountyPolicy,
    max_bet: Amount,
    timeout: Duration,
    bounty_cache: Arc<BountyCache>,
}

impl SettlementService {
    pub fn new(db: SqlitePool, settings: &GameSettings, bounty_cache: Arc<BountyCache>) -> Self {
        Self {
            db,
            paytable: Paytable::standard(),
            policy: settings.bounty_policy(),
            max_bet: settings.max_bet(),
            timeout: settings.persistence_timeout(),
            bounty_cache,
        }
    }

    /// Reject a bet before any reel is spun.
    pub fn validate_bet(&self, bet: Amount) -> LedgerResult<()> {
        if bet.is_zero() || bet > self.max_bet {
            return Err(LedgerError::InvalidBet {
                bet: bet.get(),
                max: self.max_bet.get(),
            });
        }
        Ok(())
    }

    pub async fn settle(
        &self,
        account_id: i64,
        bet: Amount,
        outcome: &SpinOutcome,
    ) -> LedgerResult<Settlement> {
        self.settle_spin(account_id, bet, outcome, None).await
    }

    /// Settle a spin drawn from the provably-fair stream, recording its nonce.
    pub async fn settle_provable(
        &self,
        account_id: i64,
        bet: Amount,
        outcome: &SpinOutcome,
        nonce: i64,
    ) -> LedgerResult<Settlement> {
        self.settle_spin(account_id, bet, outcome, Some(nonce)).await
    }

    #[instrument(skip(self, outcome), fields(bet = bet.get(), symbols = ?outcome.names()))]
    async fn settle_spin(
        &self,
        account_id: i64,
        bet: Amount,
        outcome: &SpinOutcome,
        nonce: Option<i64>,
    ) -> LedgerResult<Settlement> {
        self.validate_bet(bet)?;
        let tier = self.paytable.classify(outcome.symbols())?;

        let op = self.apply(account_id, bet, outcome, tier, nonce);
        let settled = tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| {
                warn!(timeout = ?self.timeout, "settlement timed out, rolled back");
                LedgerError::PersistenceTimeout(self.timeout)
            })??;

        if tier == WinTier::Bounty {
            self.bounty_cache.invalidate();
        }
        info!(
            tier = %settled.tier,
            payout = settled.payout.get(),
            balance = settled.new_balance.get(),
            record = settled.record_id,
            "spin settled"
        );
        Ok(settled)
    }

    async fn apply(
        &self,
        account_id: i64,
        bet: Amount,
        outcome: &SpinOutcome,
        tier: WinTier,
        nonce: Option<i64>,
    ) -> LedgerResult<Settlement> {
        let bet_db = store::to_db(bet)?;
        let mut tx = self.db.begin().await?;

        if store::debit(&mut *tx, account_id, bet_db).await?.is_none() {
            let reason = if store::account_exists(&mut *tx, account_id).await? {
                LedgerError::InsufficientFunds
            } else {
                LedgerError::AccountNotFound(account_id)
            };
            tx.rollback().await?;
            return Err(reason);
        }

        // Fresh read under the write lock: two bounty hits can never both
        // collect the same accumulated pool.
        let pool_value = if tier == WinTier::Bounty {
            self.policy
                .pool(store::from_db(store::bets_since_last_bounty(&mut *tx).await?))
        } else {
            Amount::ZERO
        };
        let payout = self.paytable.payout(tier, bet, pool_value)?;

        let balance = store::credit(&mut *tx, account_id, store::to_db(payout)?)
            .await?
            .ok_or(LedgerError::Core(CoreError::Overflow))?;

        let names = outcome.names();
        let record_id = store::insert_outcome(
            &mut *tx,
            &NewOutcome {
                account_id,
                bet: bet_db,
                panels: outcome.panels().get() as u8,
                symbols: &names,
                tier: tier.as_str(),
                payout: store::to_db(payout)?,
                balance_after: balance,
                nonce,
            },
        )
        .await?;

        tx.commit().await?;

        Ok(Settlement {
            record_id,
            tier,
            payout,
            new_balance: store::from_db(balance),
        })
    }
}
