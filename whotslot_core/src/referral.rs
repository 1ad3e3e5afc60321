use serde::{Deserialize, Serialize};

use crate::money::Amount;

/// Bonus owed to a referrer: a share of every bet placed by the accounts
/// they brought in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralPolicy {
    pub rate_bps: u32,
}

impl Default for ReferralPolicy {
    fn default() -> Self {
        // 0.5 %
        Self { rate_bps: 50 }
    }
}

impl ReferralPolicy {
    pub fn bonus(&self, referred_bets: Amount) -> Amount {
        referred_bets.scale_bps(self.rate_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_a_percent_rounded_down() {
        let p = ReferralPolicy::default();
        assert_eq!(p.bonus(Amount::new(1_000_000)), Amount::new(5_000));
        assert_eq!(p.bonus(Amount::new(199)), Amount::ZERO);
        assert_eq!(p.bonus(Amount::ZERO), Amount::ZERO);
    }
}
