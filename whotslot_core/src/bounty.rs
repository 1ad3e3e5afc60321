use serde::{Deserialize, Serialize};

use crate::money::Amount;

/// Progressive bounty: a share of every bet since the last bounty win,
/// never less than the base prize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyPolicy {
    pub base_prize: Amount,
    pub rate_bps: u32,
}

impl Default for BountyPolicy {
    fn default() -> Self {
        Self {
            // ₦50,000 in kobo
            base_prize: Amount::new(5_000_000),
            rate_bps: 100,
        }
    }
}

impl BountyPolicy {
    pub fn pool(&self, bets_since_last_win: Amount) -> Amount {
        self.base_prize.max(bets_since_last_win.scale_bps(self.rate_bps))
    }
}
