use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use whotslot_core::{spin, Amount, PanelCount, ProvablyFairRng};
use whotslot_shared::{
    AccountView, ApiError, BountyResponse, CreateAccountRequest, FeedQuery, LeaderboardEntry,
    LeaderboardResponse, ReferralBonusResponse, SpinRequest, SpinResponse, TransactionRequest,
    TransactionResponse, VerifyResponse, WinnersResponse, WithdrawalResponse, WithdrawalsQuery,
    WithdrawalsResponse,
};

use crate::bounty::BountyCache;
use crate::config::GameSettings;
use crate::error::ApiFailure;
use crate::settlement::SettlementService;
use crate::store;
use crate::wallet::Wallet;

pub const DEFAULT_FEED_LIMIT: i64 = 50;
const MAX_FEED_LIMIT: i64 = 200;
const MAX_CLIENT_SEED_LEN: usize = 64;

type Admin = Option<TypedHeader<Authorization<Bearer>>>;
type ApiResponse<T> = Result<Json<T>, ApiFailure>;

pub struct AppState {
    pub db: SqlitePool,
    pub api_key: String,
    pub settlement: SettlementService,
    pub wallet: Wallet,
    pub bounty: Arc<BountyCache>,
}

impl AppState {
    pub fn new(db: SqlitePool, api_key: impl Into<String>, settings: &GameSettings) -> Self {
        let bounty = Arc::new(BountyCache::new(
            settings.bounty_policy(),
            settings.bounty_cache_ttl(),
        ));
        Self {
            settlement: SettlementService::new(db.clone(), settings, bounty.clone()),
            wallet: Wallet::new(db.clone(), settings),
            api_key: api_key.into(),
            bounty,
            db,
        }
    }

    fn require_admin(&self, auth: Admin) -> Result<(), ApiFailure> {
        match auth {
            Some(TypedHeader(Authorization(bearer))) if bearer.token() == self.api_key => Ok(()),
            _ => {
                warn!("rejected admin request");
                Err(ApiError::Unauthorized.into())
            }
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/verify", get(route_verify))
        .route("/accounts", post(route_create_account))
        .route("/accounts/{id}", get(route_account))
        .route("/accounts/{id}/transactions", post(route_transaction))
        .route("/accounts/{id}/spin", post(route_spin))
        .route("/winners", get(route_winners))
        .route("/leaderboard", get(route_leaderboard))
        .route("/bounty", get(route_bounty))
        .route("/referrals/{code}/bonus", get(route_referral_bonus))
        .route("/withdrawals", get(route_withdrawals))
        .route("/withdrawals/{id}/approve", post(route_approve_withdrawal))
        .route("/withdrawals/{id}/reject", post(route_reject_withdrawal))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

fn feed_limit(q: &FeedQuery) -> i64 {
    clamp_limit(q.limit)
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT)
}

async fn route_verify(State(state): State<Arc<AppState>>) -> ApiResponse<VerifyResponse> {
    let p = store::get_params(&state.db).await?;
    Ok(Json(VerifyResponse {
        server_seed_hash: p.server_seed_hash,
        nonce: p.nonce as u64,
    }))
}

async fn route_create_account(
    State(state): State<Arc<AppState>>,
    auth: Admin,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountView>), ApiFailure> {
    state.require_admin(auth)?;
    let account = state
        .wallet
        .create_account(&req.username, req.referrer_code.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn route_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResponse<AccountView> {
    Ok(Json(state.wallet.account(id).await?))
}

async fn route_transaction(
    State(state): State<Arc<AppState>>,
    auth: Admin,
    Path(id): Path<i64>,
    Json(req): Json<TransactionRequest>,
) -> ApiResponse<TransactionResponse> {
    state.require_admin(auth)?;
    let receipt = state
        .wallet
        .transact(id, req.kind, Amount::new(req.amount))
        .await?;
    Ok(Json(receipt))
}

/// Open to any caller that knows the account id. There is no player session
/// layer; the bet is still bounded by the account's own balance.
async fn route_spin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<SpinRequest>,
) -> ApiResponse<SpinResponse> {
    let bet = Amount::new(req.bet);
    state.settlement.validate_bet(bet)?;
    let panels = PanelCount::try_from(req.panels)?;
    if req.client_seed.is_empty() || req.client_seed.len() > MAX_CLIENT_SEED_LEN {
        return Err(ApiError::Invalid(format!(
            "client_seed must be 1 to {MAX_CLIENT_SEED_LEN} bytes"
        ))
        .into());
    }

    let p = store::next_nonce(&state.db).await?;
    let rng = ProvablyFairRng::new(p.server_seed, req.client_seed, p.nonce as u64);
    let outcome = spin(panels, &mut rng.stream())?;
    let settled = state
        .settlement
        .settle_provable(id, bet, &outcome, p.nonce)
        .await?;

    Ok(Json(SpinResponse {
        server_seed_hash: p.server_seed_hash,
        nonce: p.nonce as u64,
        symbols: outcome.names(),
        tier: settled.tier.as_str().to_string(),
        payout: settled.payout.get(),
        balance: settled.new_balance.get(),
    }))
}

async fn route_winners(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FeedQuery>,
) -> ApiResponse<WinnersResponse> {
    let rows = store::recent_winners(&state.db, feed_limit(&q)).await?;
    Ok(Json(WinnersResponse {
        winners: rows.iter().map(|r| r.to_entry()).collect(),
    }))
}

async fn route_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FeedQuery>,
) -> ApiResponse<LeaderboardResponse> {
    let rows = store::leaderboard(&state.db, feed_limit(&q)).await?;
    Ok(Json(LeaderboardResponse {
        leaders: rows
            .into_iter()
            .map(|r| LeaderboardEntry {
                username: r.username,
                total_payout: store::from_db(r.total_payout).get(),
                wins: r.wins,
            })
            .collect(),
    }))
}

async fn route_bounty(State(state): State<Arc<AppState>>) -> ApiResponse<BountyResponse> {
    let prize = state.bounty.current(&state.db).await?;
    Ok(Json(BountyResponse {
        bounty_prize: prize.get(),
    }))
}

async fn route_referral_bonus(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResponse<ReferralBonusResponse> {
    Ok(Json(state.wallet.referral_bonus(&code).await?))
}

async fn route_withdrawals(
    State(state): State<Arc<AppState>>,
    auth: Admin,
    Query(q): Query<WithdrawalsQuery>,
) -> ApiResponse<WithdrawalsResponse> {
    state.require_admin(auth)?;
    let withdrawals = state
        .wallet
        .withdrawals(q.status, clamp_limit(q.limit))
        .await?;
    Ok(Json(WithdrawalsResponse { withdrawals }))
}

async fn route_approve_withdrawal(
    State(state): State<Arc<AppState>>,
    auth: Admin,
    Path(id): Path<i64>,
) -> ApiResponse<WithdrawalResponse> {
    state.require_admin(auth)?;
    Ok(Json(state.wallet.approve_withdrawal(id).await?))
}

async fn route_reject_withdrawal(
    State(state): State<Arc<AppState>>,
    auth: Admin,
    Path(id): Path<i64>,
) -> ApiResponse<WithdrawalResponse> {
    state.require_admin(auth)?;
    Ok(Json(state.wallet.reject_withdrawal(id).await?))
}
