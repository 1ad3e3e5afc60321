pub mod bounty;
pub mod engine;
pub mod error;
pub mod money;
pub mod paytable;
pub mod referral;
pub mod rng;
pub mod symbols;

pub use crate::bounty::BountyPolicy;
pub use crate::engine::{spin, spin_with_seeds, verify_outcome, PanelCount, SpinOutcome};
pub use crate::error::{CoreError, CoreResult};
pub use crate::money::Amount;
pub use crate::paytable::{Paytable, WinTier, BOUNTY_SET};
pub use crate::referral::ReferralPolicy;
pub use crate::rng::{
    derive_hash_hex, generate_server_seed, referral_code, uniform_index, EntropySource,
    HmacStream, OsEntropy, ProvablyFairRng,
};
pub use crate::symbols::{Shape, Symbol, CATALOG, WILDCARD};
