use parking_lot::Mutex;
use sqlx::SqlitePool;
use std::time::{Duration, Instant};

use whotslot_core::{Amount, BountyPolicy};

use crate::error::LedgerResult;
use crate::store;

#[derive(Default)]
struct Slot {
    generation: u64,
    value: Option<(Instant, Amount)>,
}

/// Short-lived copy of the bounty pool for public readers.
///
/// Settlement never reads through this cache; it recomputes the pool inside
/// its own transaction and calls [`BountyCache::invalidate`] after a bounty
/// win commits. A read that started before an invalidation does not store
/// its result.
pub struct BountyCache {
    policy: BountyPolicy,
    ttl: Duration,
    slot: Mutex<Slot>,
}

impl BountyCache {
    pub fn new(policy: BountyPolicy, ttl: Duration) -> Self {
        Self {
            policy,
            ttl,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Fresh cached value, or the generation a refill must match.
    fn cached(&self) -> Result<Amount, u64> {
        let slot = self.slot.lock();
        match slot.value {
            Some((at, value)) if at.elapsed() < self.ttl => Ok(value),
            _ => Err(slot.generation),
        }
    }

    fn store(&self, generation: u64, value: Amount) -> bool {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            return false;
        }
        slot.value = Some((Instant::now(), value));
        true
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock();
        slot.generation = slot.generation.wrapping_add(1);
        slot.value = None;
    }

    pub async fn current(&self, pool: &SqlitePool) -> LedgerResult<Amount> {
        let generation = match self.cached() {
            Ok(value) => return Ok(value),
            Err(generation) => generation,
        };
        let mut conn = pool.acquire().await?;
        let bets = store::bets_since_last_bounty(&mut *conn).await?;
        let value = self.policy.pool(store::from_db(bets));
        self.store(generation, value);
        Ok(value)
    }
}
