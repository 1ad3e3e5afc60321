use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::{
    engine::PanelCount,
    error::CoreResult,
    money::Amount,
    symbols::{Shape, Symbol},
};

/// Win categories, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinTier {
    Bounty,
    Ultimate,
    Platinum,
    Gold,
    Silver,
    BonusShape,
    BonusNumber,
    None,
}

impl WinTier {
    pub const ALL: [WinTier; 8] = [
        WinTier::Bounty,
        WinTier::Ultimate,
        WinTier::Platinum,
        WinTier::Gold,
        WinTier::Silver,
        WinTier::BonusShape,
        WinTier::BonusNumber,
        WinTier::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WinTier::Bounty => "bounty",
            WinTier::Ultimate => "ultimate",
            WinTier::Platinum => "platinum",
            WinTier::Gold => "gold",
            WinTier::Silver => "silver",
            WinTier::BonusShape => "bonus_shape",
            WinTier::BonusNumber => "bonus_number",
            WinTier::None => "none",
        }
    }

    pub fn is_win(self) -> bool {
        self != WinTier::None
    }
}

impl fmt::Display for WinTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WinTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WinTier::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown win tier `{s}`"))
    }
}

/// Cards that together trigger the bounty, in any order and any panels.
pub const BOUNTY_SET: [Symbol; 4] = [
    crate::symbols::CATALOG[0],  // circle_1
    crate::symbols::CATALOG[3],  // circle_4
    crate::symbols::CATALOG[27], // cross_5
    crate::symbols::CATALOG[31], // cross_13
];

/// Fixed bet multipliers per tier. Bounty pays the pool instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paytable {
    pub ultimate: u64,
    pub platinum: u64,
    pub gold: u64,
    pub silver: u64,
    pub bonus_shape: u64,
    pub bonus_number: u64,
    /// Panels that must agree for the bonus tiers.
    pub bonus_threshold: usize,
}

impl Default for Paytable {
    fn default() -> Self {
        Self::standard()
    }
}

impl Paytable {
    pub fn standard() -> Self {
        Self {
            ultimate: 1000,
            platinum: 500,
            gold: 300,
            silver: 50,
            bonus_shape: 10,
            bonus_number: 5,
            bonus_threshold: 3,
        }
    }

    /// `None` for the bounty, whose prize is not a multiple of the bet.
    pub fn multiplier(&self, tier: WinTier) -> Option<u64> {
        match tier {
            WinTier::Bounty => None,
            WinTier::Ultimate => Some(self.ultimate),
            WinTier::Platinum => Some(self.platinum),
            WinTier::Gold => Some(self.gold),
            WinTier::Silver => Some(self.silver),
            WinTier::BonusShape => Some(self.bonus_shape),
            WinTier::BonusNumber => Some(self.bonus_number),
            WinTier::None => Some(0),
        }
    }

    /// First matching tier in priority order.
    pub fn classify(&self, symbols: &[Symbol]) -> CoreResult<WinTier> {
        PanelCount::try_from(symbols.len())?;
        let first = symbols[0];

        let tier = if BOUNTY_SET.iter().all(|b| symbols.contains(b)) {
            WinTier::Bounty
        } else if symbols.iter().all(|s| s.is_wildcard()) {
            WinTier::Ultimate
        } else if symbols.iter().all(|s| *s == first) {
            WinTier::Platinum
        } else if symbols.iter().all(|s| s.rank() == first.rank()) {
            WinTier::Gold
        } else if symbols.iter().all(|s| s.shape() == first.shape()) {
            WinTier::Silver
        } else if largest_group(symbols.iter().map(|s| s.rank())) >= self.bonus_threshold {
            WinTier::BonusShape
        } else if largest_group::<Shape>(symbols.iter().map(|s| s.shape()))
            >= self.bonus_threshold
        {
            WinTier::BonusNumber
        } else {
            WinTier::None
        };
        Ok(tier)
    }

    pub fn payout(&self, tier: WinTier, bet: Amount, bounty_pool: Amount) -> CoreResult<Amount> {
        match self.multiplier(tier) {
            Some(m) => bet.checked_mul(m),
            None => Ok(bounty_pool),
        }
    }

    /// Classify and price a spin in one step.
    pub fn evaluate(
        &self,
        symbols: &[Symbol],
        bet: Amount,
        bounty_pool: Amount,
    ) -> CoreResult<(WinTier, Amount)> {
        let tier = self.classify(symbols)?;
        let payout = self.payout(tier, bet, bounty_pool)?;
        Ok((tier, payout))
    }
}

fn largest_group<K: Eq + Hash>(keys: impl Iterator<Item = K>) -> usize {
    let mut freq: HashMap<K, usize> = HashMap::new();
    for k in keys {
        *freq.entry(k).or_insert(0) += 1;
    }
    freq.into_values().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn tier(cards: &[&str]) -> WinTier {
        let symbols: Vec<Symbol> = cards.iter().map(|c| c.parse().unwrap()).collect();
        Paytable::standard().classify(&symbols).unwrap()
    }

    #[test]
    fn bounty_set_identifiers() {
        let names: Vec<String> = BOUNTY_SET.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            ["circle_1.png", "circle_4.png", "cross_5.png", "cross_13.png"]
        );
    }

    #[test]
    fn tier_labels_round_trip() {
        for t in WinTier::ALL {
            assert_eq!(t.as_str().parse::<WinTier>(), Ok(t));
        }
        assert!("jackpot".parse::<WinTier>().is_err());
    }

    #[test]
    fn each_tier() {
        let cases: [(&[&str], WinTier); 8] = [
            (
                &["cross_13.png", "circle_4.png", "cross_5.png", "circle_1.png"],
                WinTier::Bounty,
            ),
            (&["whot_20.png"; 3], WinTier::Ultimate),
            (&["star_8.png"; 4], WinTier::Platinum),
            (&["star_7.png", "circle_7.png", "cross_7.png"], WinTier::Gold),
            (
                &["square_1.png", "square_2.png", "square_3.png", "square_14.png"],
                WinTier::Silver,
            ),
            (
                &["circle_3.png", "circle_7.png", "circle_3.png", "square_3.png"],
                WinTier::BonusShape,
            ),
            (
                &["star_1.png", "star_2.png", "star_3.png", "cross_5.png"],
                WinTier::BonusNumber,
            ),
            (
                &["circle_1.png", "triangle_2.png", "star_4.png", "square_5.png"],
                WinTier::None,
            ),
        ];
        for (cards, expected) in cases {
            assert_eq!(tier(cards), expected, "{cards:?}");
        }
    }

    #[test]
    fn bonus_needs_three_of_four() {
        // two pairs: no tier reaches the threshold
        assert_eq!(
            tier(&["circle_3.png", "circle_3.png", "star_5.png", "star_5.png"]),
            WinTier::None
        );
        // three panels with only a pair never reach a bonus tier
        assert_eq!(
            tier(&["circle_3.png", "star_3.png", "cross_5.png"]),
            WinTier::None
        );
    }

    #[test]
    fn bounty_beats_multiplier_tiers() {
        let pt = Paytable::standard();
        let symbols: Vec<Symbol> = ["circle_1.png", "circle_4.png", "cross_5.png", "cross_13.png"]
            .iter()
            .map(|c| c.parse().unwrap())
            .collect();
        let (t, payout) = pt.evaluate(&symbols, Amount::new(10), Amount::new(7_777)).unwrap();
        assert_eq!(t, WinTier::Bounty);
        assert_eq!(payout, Amount::new(7_777));
    }

    #[test]
    fn overflow_is_an_error() {
        let pt = Paytable::standard();
        assert_eq!(
            pt.payout(WinTier::Ultimate, Amount::new(u64::MAX), Amount::ZERO),
            Err(CoreError::Overflow)
        );
    }
}
