//! Integer currency. Every amount is a count of minor units (kobo); nothing
//! in payout or pool math ever touches floating point.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Basis points in one whole (100 %).
pub const BPS_DENOMINATOR: u64 = 10_000;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn new(minor_units: u64) -> Self {
        Self(minor_units)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> CoreResult<Amount> {
        self.0.checked_add(rhs.0).map(Amount).ok_or(CoreError::Overflow)
    }

    /// `None` when `rhs` exceeds `self`; balances never wrap below zero.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn checked_mul(self, multiplier: u64) -> CoreResult<Amount> {
        self.0
            .checked_mul(multiplier)
            .map(Amount)
            .ok_or(CoreError::Overflow)
    }

    /// `floor(self * bps / 10_000)`, computed in 128 bits so it cannot overflow.
    pub fn scale_bps(self, bps: u32) -> Amount {
        let scaled = (self.0 as u128 * bps as u128) / BPS_DENOMINATOR as u128;
        Amount(u64::try_from(scaled).unwrap_or(u64::MAX))
    }

    /// Digits grouped in thousands, e.g. `1,250,000`.
    pub fn grouped(self) -> String {
        let digits = self.0.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
        out
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
