//! SQLite ledger. Only this module writes SQL.
//!
//! Functions taking `&mut SqliteConnection` are meant to run inside a caller's
//! transaction; the ones taking `&SqlitePool` are standalone reads or single
//! statements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use whotslot_core::{derive_hash_hex, generate_server_seed, Amount, CoreError};
use whotslot_shared::{WithdrawalStatus, WithdrawalView};

use crate::error::{LedgerError, LedgerResult};

pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let opts = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(opts)
        .await
}

pub async fn init_db(db: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(db).await?;
    let p = get_params(db).await?;
    if p.server_seed.is_empty() {
        let hash = rotate_seed(db, &generate_server_seed()?).await?;
        info!(server_seed_hash = %hash, "generated initial server seed");
    } else if p.server_seed_hash != derive_hash_hex(p.server_seed.as_bytes()) {
        // keep the published hash honest if the seed was edited by hand
        warn!("server seed hash was stale, recomputing");
        let hash = derive_hash_hex(p.server_seed.as_bytes());
        sqlx::query("UPDATE params SET server_seed_hash = ? WHERE id = 1")
            .bind(hash)
            .execute(db)
            .await?;
    }
    Ok(())
}

pub fn to_db(amount: Amount) -> LedgerResult<i64> {
    i64::try_from(amount.get()).map_err(|_| LedgerError::Core(CoreError::Overflow))
}

/// Columns carry `CHECK (>= 0)`, so a negative value never comes back.
pub fn from_db(v: i64) -> Amount {
    Amount::new(u64::try_from(v).unwrap_or(0))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn parse_ts(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Provably-fair parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredParams {
    pub server_seed: String,
    pub server_seed_hash: String,
    pub nonce: i64,
}

pub async fn get_params(pool: &SqlitePool) -> LedgerResult<StoredParams> {
    let row = sqlx::query_as::<_, StoredParams>(
        "SELECT server_seed, server_seed_hash, nonce FROM params WHERE id = 1",
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Reserve the next spin nonce. Atomic, so concurrent spins never share one.
pub async fn next_nonce(pool: &SqlitePool) -> LedgerResult<StoredParams> {
    let row = sqlx::query_as::<_, StoredParams>(
        "UPDATE params SET nonce = nonce + 1 WHERE id = 1 \
         RETURNING server_seed, server_seed_hash, nonce",
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Install a new server seed and restart the nonce. Returns the new hash.
pub async fn rotate_seed(pool: &SqlitePool, new_seed: &str) -> LedgerResult<String> {
    let hash = derive_hash_hex(new_seed.as_bytes());
    sqlx::query("UPDATE params SET server_seed = ?, server_seed_hash = ?, nonce = 0 WHERE id = 1")
        .bind(new_seed)
        .bind(&hash)
        .execute(pool)
        .await?;
    Ok(hash)
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub balance: i64,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub created_at: String,
}

/// `Ok(None)` when `referral_code` is already taken; the caller picks
/// another code and retries.
pub async fn create_account(
    pool: &SqlitePool,
    username: &str,
    referral_code: &str,
    referred_by: Option<&str>,
) -> LedgerResult<Option<AccountRow>> {
    let res = sqlx::query_as::<_, AccountRow>(
        "INSERT INTO accounts (username, balance, referral_code, referred_by, created_at) \
         VALUES (?, 0, ?, ?, ?) \
         RETURNING id, username, balance, referral_code, referred_by, created_at",
    )
    .bind(username)
    .bind(referral_code)
    .bind(referred_by)
    .bind(now())
    .fetch_one(pool)
    .await;
    match res {
        Ok(row) => Ok(Some(row)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            if e.message().contains("referral_code") {
                Ok(None)
            } else {
                Err(LedgerError::DuplicateUsername(username.to_string()))
            }
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn get_account(pool: &SqlitePool, id: i64) -> LedgerResult<AccountRow> {
    sqlx::query_as::<_, AccountRow>(
        "SELECT id, username, balance, referral_code, referred_by, created_at \
         FROM accounts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(LedgerError::AccountNotFound(id))
}

pub async fn account_exists(conn: &mut SqliteConnection, id: i64) -> LedgerResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM accounts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

pub async fn account_balance(conn: &mut SqliteConnection, id: i64) -> LedgerResult<i64> {
    let balance: Option<i64> = sqlx::query_scalar("SELECT balance FROM accounts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    balance.ok_or(LedgerError::AccountNotFound(id))
}

/// Conditional debit: only succeeds when the balance covers `amount`.
/// `None` means nothing changed (missing account or insufficient funds).
///
/// Issued as the first statement of a transaction it also takes the SQLite
/// write lock, so every later read in that transaction is current.
pub async fn debit(
    conn: &mut SqliteConnection,
    account_id: i64,
    amount: i64,
) -> LedgerResult<Option<i64>> {
    let balance = sqlx::query_scalar(
        "UPDATE accounts SET balance = balance - ?1 WHERE id = ?2 AND balance >= ?1 \
         RETURNING balance",
    )
    .bind(amount)
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(balance)
}

/// `None` when the account is missing or the credit would overflow.
pub async fn credit(
    conn: &mut SqliteConnection,
    account_id: i64,
    amount: i64,
) -> LedgerResult<Option<i64>> {
    let balance = sqlx::query_scalar(
        "UPDATE accounts SET balance = balance + ?1 \
         WHERE id = ?2 AND balance <= 9223372036854775807 - ?1 \
         RETURNING balance",
    )
    .bind(amount)
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(balance)
}

// ---------------------------------------------------------------------------
// Outcome ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewOutcome<'a> {
    pub account_id: i64,
    pub bet: i64,
    pub panels: u8,
    pub symbols: &'a [String],
    pub tier: &'a str,
    pub payout: i64,
    pub balance_after: i64,
    pub nonce: Option<i64>,
}

pub async fn insert_outcome(conn: &mut SqliteConnection, o: &NewOutcome<'_>) -> LedgerResult<i64> {
    let symbols_json = serde_json::to_string(o.symbols).expect("a string list always serialises");
    let id = sqlx::query_scalar(
        "INSERT INTO outcomes \
         (account_id, bet, panels, symbols_json, tier, payout, balance_after, nonce, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(o.account_id)
    .bind(o.bet)
    .bind(o.panels as i64)
    .bind(symbols_json)
    .bind(o.tier)
    .bind(o.payout)
    .bind(o.balance_after)
    .bind(o.nonce)
    .bind(now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Sum of every bet placed after the most recent bounty win (all accounts).
pub async fn bets_since_last_bounty(conn: &mut SqliteConnection) -> LedgerResult<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(bet), 0) FROM outcomes \
         WHERE id > COALESCE((SELECT MAX(id) FROM outcomes WHERE tier = 'bounty'), 0)",
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(total)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutcomeRow {
    pub id: i64,
    pub account_id: i64,
    pub bet: i64,
    pub panels: i64,
    pub symbols_json: String,
    pub tier: String,
    pub payout: i64,
    pub balance_after: i64,
    pub nonce: Option<i64>,
    pub created_at: String,
}

impl OutcomeRow {
    pub fn symbols(&self) -> Vec<String> {
        serde_json::from_str(&self.symbols_json).unwrap_or_default()
    }

    pub fn to_log_entry(&self) -> whotslot_shared::OutcomeLogEntry {
        whotslot_shared::OutcomeLogEntry {
            id: self.id,
            ts: parse_ts(&self.created_at),
            account_id: self.account_id,
            bet: from_db(self.bet).get(),
            panels: self.panels as u8,
            symbols: self.symbols(),
            tier: self.tier.clone(),
            payout: from_db(self.payout).get(),
            balance_after: from_db(self.balance_after).get(),
            nonce: self.nonce,
        }
    }
}

const OUTCOME_COLUMNS: &str =
    "id, account_id, bet, panels, symbols_json, tier, payout, balance_after, nonce, created_at";

/// Newest first.
pub async fn recent_outcomes(pool: &SqlitePool, limit: i64) -> LedgerResult<Vec<OutcomeRow>> {
    let sql = format!("SELECT {OUTCOME_COLUMNS} FROM outcomes ORDER BY id DESC LIMIT ?");
    Ok(sqlx::query_as::<_, OutcomeRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

/// Whole ledger, oldest first.
pub async fn all_outcomes(pool: &SqlitePool) -> LedgerResult<Vec<OutcomeRow>> {
    let sql = format!("SELECT {OUTCOME_COLUMNS} FROM outcomes ORDER BY id ASC");
    Ok(sqlx::query_as::<_, OutcomeRow>(&sql).fetch_all(pool).await?)
}

pub async fn outcomes_for_account(
    pool: &SqlitePool,
    account_id: i64,
) -> LedgerResult<Vec<OutcomeRow>> {
    let sql =
        format!("SELECT {OUTCOME_COLUMNS} FROM outcomes WHERE account_id = ? ORDER BY id ASC");
    Ok(sqlx::query_as::<_, OutcomeRow>(&sql)
        .bind(account_id)
        .fetch_all(pool)
        .await?)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WinnerRow {
    pub username: String,
    pub tier: String,
    pub payout: i64,
    pub created_at: String,
}

impl WinnerRow {
    pub fn to_entry(&self) -> whotslot_shared::WinnerEntry {
        let payout = from_db(self.payout);
        let tier = self.tier.replace('_', " ");
        whotslot_shared::WinnerEntry {
            username: self.username.clone(),
            tier: self.tier.clone(),
            payout: payout.get(),
            ts: parse_ts(&self.created_at),
            headline: format!(
                "{} has won a {} jackpot for {}!",
                self.username,
                tier,
                payout.grouped()
            ),
        }
    }
}

/// Newest winning spins, for the winner ticker.
pub async fn recent_winners(pool: &SqlitePool, limit: i64) -> LedgerResult<Vec<WinnerRow>> {
    Ok(sqlx::query_as::<_, WinnerRow>(
        "SELECT a.username, o.tier, o.payout, o.created_at \
         FROM outcomes o JOIN accounts a ON a.id = o.account_id \
         WHERE o.tier != 'none' \
         ORDER BY o.id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeaderRow {
    pub username: String,
    pub total_payout: i64,
    pub wins: i64,
}

/// Accounts ranked by total winnings.
pub async fn leaderboard(pool: &SqlitePool, limit: i64) -> LedgerResult<Vec<LeaderRow>> {
    Ok(sqlx::query_as::<_, LeaderRow>(
        "SELECT a.username, SUM(o.payout) AS total_payout, COUNT(*) AS wins \
         FROM outcomes o JOIN accounts a ON a.id = o.account_id \
         WHERE o.tier != 'none' \
         GROUP BY a.id, a.username \
         ORDER BY total_payout DESC, a.id ASC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

// ---------------------------------------------------------------------------
// Referrals
// ---------------------------------------------------------------------------

pub async fn referral_code_exists(pool: &SqlitePool, code: &str) -> LedgerResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM accounts WHERE referral_code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReferralRow {
    pub referred_accounts: i64,
    pub total_bet: i64,
}

/// Accounts registered with `code` and every bet they have placed.
pub async fn referral_totals(pool: &SqlitePool, code: &str) -> LedgerResult<ReferralRow> {
    Ok(sqlx::query_as::<_, ReferralRow>(
        "SELECT \
           (SELECT COUNT(*) FROM accounts WHERE referred_by = ?1) AS referred_accounts, \
           (SELECT COALESCE(SUM(o.bet), 0) FROM outcomes o \
              JOIN accounts a ON a.id = o.account_id \
              WHERE a.referred_by = ?1) AS total_bet",
    )
    .bind(code)
    .fetch_one(pool)
    .await?)
}

// ---------------------------------------------------------------------------
// Deposits and withdrawals
// ---------------------------------------------------------------------------

pub async fn insert_transaction(
    conn: &mut SqliteConnection,
    account_id: i64,
    kind: &str,
    amount: i64,
    balance_after: i64,
) -> LedgerResult<i64> {
    let id = sqlx::query_scalar(
        "INSERT INTO transactions (account_id, kind, amount, balance_after, created_at) \
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(account_id)
    .bind(kind)
    .bind(amount)
    .bind(balance_after)
    .bind(now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn count_transactions(pool: &SqlitePool, account_id: i64) -> LedgerResult<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE account_id = ?")
            .bind(account_id)
            .fetch_one(pool)
            .await?,
    )
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WithdrawalRow {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub status: String,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

impl WithdrawalRow {
    pub fn to_view(&self) -> WithdrawalView {
        WithdrawalView {
            id: self.id,
            account_id: self.account_id,
            amount: from_db(self.amount).get(),
            status: self.status.parse().unwrap_or(WithdrawalStatus::Pending),
            created_at: parse_ts(&self.created_at),
            resolved_at: self.resolved_at.as_deref().map(parse_ts),
        }
    }
}

const WITHDRAWAL_COLUMNS: &str = "id, account_id, amount, status, created_at, resolved_at";

pub async fn insert_withdrawal(
    conn: &mut SqliteConnection,
    account_id: i64,
    amount: i64,
) -> LedgerResult<WithdrawalRow> {
    let sql = format!(
        "INSERT INTO withdrawal_requests (account_id, amount, status, created_at) \
         VALUES (?, ?, 'pending', ?) RETURNING {WITHDRAWAL_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, WithdrawalRow>(&sql)
        .bind(account_id)
        .bind(amount)
        .bind(now())
        .fetch_one(&mut *conn)
        .await?)
}

/// Move a pending request to `status`. `None` when the request is missing or
/// was already reviewed; nothing changes in that case.
pub async fn resolve_withdrawal(
    conn: &mut SqliteConnection,
    id: i64,
    status: WithdrawalStatus,
) -> LedgerResult<Option<WithdrawalRow>> {
    let sql = format!(
        "UPDATE withdrawal_requests SET status = ?, resolved_at = ? \
         WHERE id = ? AND status = 'pending' RETURNING {WITHDRAWAL_COLUMNS}"
    );
    Ok(sqlx::query_as::<_, WithdrawalRow>(&sql)
        .bind(status.as_str())
        .bind(now())
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn get_withdrawal(
    conn: &mut SqliteConnection,
    id: i64,
) -> LedgerResult<Option<WithdrawalRow>> {
    let sql = format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests WHERE id = ?");
    Ok(sqlx::query_as::<_, WithdrawalRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Newest first, optionally filtered by status.
pub async fn list_withdrawals(
    pool: &SqlitePool,
    status: Option<WithdrawalStatus>,
    limit: i64,
) -> LedgerResult<Vec<WithdrawalRow>> {
    let sql = format!(
        "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawal_requests \
         WHERE ?1 IS NULL OR status = ?1 ORDER BY id DESC LIMIT ?2"
    );
    Ok(sqlx::query_as::<_, WithdrawalRow>(&sql)
        .bind(status.map(WithdrawalStatus::as_str))
        .bind(limit)
        .fetch_all(pool)
        .await?)
}
