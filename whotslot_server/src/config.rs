use clap::{Args, Parser};
use std::time::Duration;

use whotslot_core::{Amount, BountyPolicy, ReferralPolicy};

/// Server configuration. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "whotslot-server", about = "Whot slots HTTP server")]
pub struct ServerConfig {
    /// Database URL, default sqlite://whotslot.db
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://whotslot.db")]
    pub database_url: String,
    /// Bearer token for admin endpoints
    #[arg(long, env = "API_KEY", default_value = "dev-key")]
    pub api_key: String,
    #[arg(long, env = "BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
    #[command(flatten)]
    pub game: GameSettings,
}

/// Money rules and timeouts shared by the server and the admin CLI.
#[derive(Debug, Clone, Args)]
pub struct GameSettings {
    /// Largest accepted bet, minor units
    #[arg(long, env = "MAX_BET", default_value_t = 1_000_000)]
    pub max_bet: u64,
    /// Smallest accepted withdrawal, minor units
    #[arg(long, env = "MIN_WITHDRAWAL", default_value_t = 100_000)]
    pub min_withdrawal: u64,
    #[arg(long, env = "BOUNTY_BASE_PRIZE", default_value_t = 5_000_000)]
    pub bounty_base_prize: u64,
    /// Share of every bet fed into the bounty, basis points
    #[arg(long, env = "BOUNTY_RATE_BPS", default_value_t = 100)]
    pub bounty_rate_bps: u32,
    /// How long public readers may see a stale bounty value
    #[arg(long, env = "BOUNTY_CACHE_SECS", default_value_t = 120)]
    pub bounty_cache_secs: u64,
    /// Referrer's share of referred accounts' bets, basis points
    #[arg(long, env = "REFERRAL_RATE_BPS", default_value_t = 50)]
    pub referral_rate_bps: u32,
    #[arg(long, env = "PERSISTENCE_TIMEOUT_MS", default_value_t = 5_000)]
    pub persistence_timeout_ms: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_bet: 1_000_000,
            min_withdrawal: 100_000,
            bounty_base_prize: 5_000_000,
            bounty_rate_bps: 100,
            bounty_cache_secs: 120,
            referral_rate_bps: 50,
            persistence_timeout_ms: 5_000,
        }
    }
}

impl GameSettings {
    pub fn bounty_policy(&self) -> BountyPolicy {
        BountyPolicy {
            base_prize: Amount::new(self.bounty_base_prize),
            rate_bps: self.bounty_rate_bps,
        }
    }

    pub fn referral_policy(&self) -> ReferralPolicy {
        ReferralPolicy {
            rate_bps: self.referral_rate_bps,
        }
    }

    pub fn max_bet(&self) -> Amount {
        Amount::new(self.max_bet)
    }

    pub fn min_withdrawal(&self) -> Amount {
        Amount::new(self.min_withdrawal)
    }

    pub fn bounty_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.bounty_cache_secs)
    }

    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_millis(self.persistence_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_flag_defaults() {
        let cfg = ServerConfig::parse_from(["whotslot-server"]);
        let d = GameSettings::default();
        assert_eq!(cfg.game.max_bet, d.max_bet);
        assert_eq!(cfg.game.bounty_rate_bps, d.bounty_rate_bps);
        assert_eq!(cfg.game.referral_policy(), ReferralPolicy::default());
        assert_eq!(cfg.game.persistence_timeout(), d.persistence_timeout());
    }

    #[test]
    fn flags_override() {
        let cfg = ServerConfig::parse_from([
            "whotslot-server",
            "--max-bet",
            "500",
            "--bind",
            "0.0.0.0:9000",
        ]);
        assert_eq!(cfg.game.max_bet(), Amount::new(500));
        assert_eq!(cfg.bind, "0.0.0.0:9000");
    }
}
