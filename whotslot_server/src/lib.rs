//! Whot slots server: ledger, settlement and the HTTP surface.

pub mod bounty;
pub mod config;
pub mod error;
pub mod routes;
pub mod settlement;
pub mod store;
pub mod wallet;

pub use bounty::BountyCache;
pub use config::{GameSettings, ServerConfig};
pub use error::{ApiFailure, LedgerError, LedgerResult};
pub use routes::{router, AppState};
pub use settlement::{Settlement, SettlementService};
pub use wallet::Wallet;
