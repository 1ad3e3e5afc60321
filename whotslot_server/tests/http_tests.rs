use reqwest::{Client, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use whotslot_server::{router, store, AppState, GameSettings};
use whotslot_shared::{
    AccountView, SpinResponse, TransactionResponse, VerifyResponse, WithdrawalResponse,
    WithdrawalStatus, WithdrawalsResponse,
};

const KEY: &str = "test-key";

struct TestServer {
    _dir: TempDir,
    state: Arc<AppState>,
    base: String,
    client: Client,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
        let db = store::connect(&url, 5).await.unwrap();
        store::init_db(&db).await.unwrap();
        let state = Arc::new(AppState::new(db, KEY, &GameSettings::default()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            _dir: dir,
            state,
            base: format!("http://{addr}"),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn account(&self, username: &str, deposit: u64) -> AccountView {
        let account: AccountView = self
            .client
            .post(self.url("/accounts"))
            .bearer_auth(KEY)
            .json(&json!({ "username": username }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if deposit > 0 {
            let res = self
                .client
                .post(self.url(&format!("/accounts/{}/transactions", account.id)))
                .bearer_auth(KEY)
                .json(&json!({ "kind": "deposit", "amount": deposit }))
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        account
    }

    async fn spin(&self, id: i64, bet: u64, panels: u8) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/accounts/{id}/spin")))
            .json(&json!({ "client_seed": "lucky", "bet": bet, "panels": panels }))
            .send()
            .await
            .unwrap()
    }

    async fn nonce(&self) -> u64 {
        let v: VerifyResponse = self
            .client
            .get(self.url("/verify"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        v.nonce
    }
}

#[tokio::test]
async fn admin_routes_need_the_api_key() {
    let srv = TestServer::start().await;
    let body = json!({ "username": "ada" });

    let res = srv
        .client
        .post(srv.url("/accounts"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .post(srv.url("/accounts"))
        .bearer_auth("wrong-key")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(srv.url("/withdrawals"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .post(srv.url("/accounts"))
        .bearer_auth(KEY)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn spin_status_codes() {
    let srv = TestServer::start().await;
    let ada = srv.account("ada", 1_000).await;

    // rejected before a nonce is reserved
    assert_eq!(srv.spin(ada.id, 0, 4).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(srv.spin(ada.id, 100, 5).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(srv.nonce().await, 0);

    let res = srv.spin(ada.id, 1_001, 4).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = srv.spin(4_242, 100, 4).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv.spin(ada.id, 100, 4).await;
    assert_eq!(res.status(), StatusCode::OK);
    let spun: SpinResponse = res.json().await.unwrap();
    assert_eq!(spun.symbols.len(), 4);

    let stored = srv.state.wallet.account(ada.id).await.unwrap().balance;
    assert_eq!(spun.balance, stored);
    assert_eq!(stored, 1_000 - 100 + spun.payout);
}

#[tokio::test]
async fn withdrawal_review_over_http() {
    let srv = TestServer::start().await;
    let ada = srv.account("ada", 300_000).await;

    let mut requests = Vec::new();
    for _ in 0..2 {
        let receipt: TransactionResponse = srv
            .client
            .post(srv.url(&format!("/accounts/{}/transactions", ada.id)))
            .bearer_auth(KEY)
            .json(&json!({ "kind": "withdrawal", "amount": 100_000 }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        requests.push(receipt.withdrawal_id.unwrap());
    }

    let listed: WithdrawalsResponse = srv
        .client
        .get(srv.url("/withdrawals?status=pending"))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.withdrawals.len(), 2);

    let approved: WithdrawalResponse = srv
        .client
        .post(srv.url(&format!("/withdrawals/{}/approve", requests[0])))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(approved.withdrawal.status, WithdrawalStatus::Approved);
    assert_eq!(approved.balance, 100_000);

    let rejected: WithdrawalResponse = srv
        .client
        .post(srv.url(&format!("/withdrawals/{}/reject", requests[1])))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rejected.withdrawal.status, WithdrawalStatus::Rejected);
    assert_eq!(rejected.balance, 200_000);

    let res = srv
        .client
        .post(srv.url(&format!("/withdrawals/{}/reject", requests[1])))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv
        .client
        .post(srv.url("/withdrawals/777/approve"))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn referral_bonus_route() {
    let srv = TestServer::start().await;
    let host = srv.account("host", 0).await;

    let res = srv
        .client
        .get(srv.url(&format!("/referrals/{}/bonus", host.referral_code)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["referred_accounts"], 0);
    assert_eq!(body["referral_bonus"], 0);

    let res = srv
        .client
        .get(srv.url("/referrals/ZZZZZ/bonus"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = srv
        .client
        .post(srv.url("/accounts"))
        .bearer_auth(KEY)
        .json(&json!({ "username": "guest", "referrer_code": "ZZZZZ" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
