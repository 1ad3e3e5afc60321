use serde::{Deserialize, Serialize};

use crate::{
    error::{CoreError, CoreResult},
    rng::{uniform_index, EntropySource, ProvablyFairRng},
    symbols::{Symbol, CATALOG},
};

/// How many independent reels a game shows. Chosen before the spin starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PanelCount {
    Three,
    Four,
}

impl PanelCount {
    pub fn get(self) -> usize {
        match self {
            PanelCount::Three => 3,
            PanelCount::Four => 4,
        }
    }
}

impl TryFrom<usize> for PanelCount {
    type Error = CoreError;

    fn try_from(n: usize) -> Result<Self, Self::Error> {
        match n {
            3 => Ok(PanelCount::Three),
            4 => Ok(PanelCount::Four),
            other => Err(CoreError::InvalidPanelCount(other)),
        }
    }
}

impl TryFrom<u8> for PanelCount {
    type Error = CoreError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        PanelCount::try_from(n as usize)
    }
}

impl From<PanelCount> for u8 {
    fn from(p: PanelCount) -> Self {
        p.get() as u8
    }
}

/// The resting symbol of every panel, left to right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Symbol>", into = "Vec<Symbol>")]
pub struct SpinOutcome {
    symbols: Vec<Symbol>,
}

impl SpinOutcome {
    pub fn new(symbols: Vec<Symbol>) -> CoreResult<Self> {
        PanelCount::try_from(symbols.len())?;
        Ok(Self { symbols })
    }

    /// Build from card identifiers such as `"circle_3.png"`.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> CoreResult<Self> {
        let symbols = names
            .iter()
            .map(|n| n.as_ref().parse())
            .collect::<CoreResult<Vec<Symbol>>>()?;
        Self::new(symbols)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn panels(&self) -> PanelCount {
        match self.symbols.len() {
            3 => PanelCount::Three,
            _ => PanelCount::Four,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.to_string()).collect()
    }
}

impl TryFrom<Vec<Symbol>> for SpinOutcome {
    type Error = CoreError;

    fn try_from(symbols: Vec<Symbol>) -> Result<Self, Self::Error> {
        SpinOutcome::new(symbols)
    }
}

impl From<SpinOutcome> for Vec<Symbol> {
    fn from(o: SpinOutcome) -> Self {
        o.symbols
    }
}

/// Resolve every panel independently and uniformly over the whole catalog.
pub fn spin<E: EntropySource + ?Sized>(
    panels: PanelCount,
    entropy: &mut E,
) -> CoreResult<SpinOutcome> {
    let mut symbols = Vec::with_capacity(panels.get());
    for _ in 0..panels.get() {
        symbols.push(CATALOG[uniform_index(entropy, CATALOG.len())?]);
    }
    Ok(SpinOutcome { symbols })
}

/// Convenience: perform a spin creating the RNG from seeds.
pub fn spin_with_seeds(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    panels: PanelCount,
) -> CoreResult<SpinOutcome> {
    let rng = ProvablyFairRng::new(server_seed, client_seed, nonce);
    spin(panels, &mut rng.stream())
}

/// Verify that a revealed outcome matches what the seeds would produce.
pub fn verify_outcome(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    expected: &SpinOutcome,
) -> bool {
    match spin_with_seeds(server_seed, client_seed, nonce, expected.panels()) {
        Ok(actual) => actual == *expected,
        Err(_) => false,
    }
}
