use clap::{Parser, Subcommand};
use sqlx::SqlitePool;

use whotslot_core::{generate_server_seed, Amount};
use whotslot_server::{store, BountyCache, GameSettings, Wallet};
use whotslot_shared::{WithdrawalResponse, WithdrawalStatus};

#[derive(Parser)]
#[command(name = "whotslot-cli", about = "Admin CLI for the Whot slots ledger")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Database URL, default sqlite://whotslot.db
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://whotslot.db")]
    database_url: String,
    #[command(flatten)]
    game: GameSettings,
}

#[derive(Subcommand)]
enum Commands {
    /// Rotate the server seed; a random one is generated when omitted
    RotateSeed { new_seed: Option<String> },
    /// View last N settled spins
    ViewLogs {
        #[arg(default_value_t = 20)]
        n: i64,
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Export the whole outcome ledger to CSV path
    ExportCsv { path: String },
    CreateAccount {
        username: String,
        /// Referral code of the inviting account
        #[arg(long)]
        referrer: Option<String>,
    },
    /// Credit an account, amount in minor units
    Deposit { id: i64, amount: u64 },
    /// File a withdrawal request, amount in minor units
    Withdraw { id: i64, amount: u64 },
    /// List withdrawal requests, newest first
    Withdrawals {
        #[arg(long)]
        status: Option<WithdrawalStatus>,
        #[arg(default_value_t = 50)]
        n: i64,
    },
    ApproveWithdrawal { id: i64 },
    /// Reject a pending request and refund the account
    RejectWithdrawal { id: i64 },
    /// Bonus owed to the owner of a referral code
    ReferralBonus { code: String },
    /// Recent winners ticker
    Winners {
        #[arg(default_value_t = 10)]
        n: i64,
    },
    /// Current bounty prize
    Bounty,
}

async fn get_pool(url: &str) -> anyhow::Result<SqlitePool> {
    let pool = store::connect(url, 2).await?;
    store::init_db(&pool).await?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let pool = get_pool(&cli.database_url).await?;
    let wallet = Wallet::new(pool.clone(), &cli.game);

    match cli.command {
        Commands::RotateSeed { new_seed } => {
            let seed = match new_seed {
                Some(seed) => seed,
                None => generate_server_seed()?,
            };
            let hash = store::rotate_seed(&pool, &seed).await?;
            println!("Rotated server seed. New hash: {}", hash);
        }
        Commands::ViewLogs { n, json } => {
            for row in store::recent_outcomes(&pool, n).await? {
                if json {
                    println!("{}", serde_json::to_string(&row.to_log_entry())?);
                    continue;
                }
                println!(
                    "#{:>6} {} acct={} bet={} panels={} [{}] tier={} payout={} balance={}",
                    row.id,
                    row.created_at,
                    row.account_id,
                    row.bet,
                    row.panels,
                    row.symbols().join(" "),
                    row.tier,
                    row.payout,
                    row.balance_after
                );
            }
        }
        Commands::ExportCsv { path } => {
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record([
                "id",
                "ts",
                "account_id",
                "bet",
                "panels",
                "symbols",
                "tier",
                "payout",
                "balance_after",
                "nonce",
            ])?;
            let rows = store::all_outcomes(&pool).await?;
            for r in &rows {
                wtr.write_record(&[
                    r.id.to_string(),
                    r.created_at.clone(),
                    r.account_id.to_string(),
                    r.bet.to_string(),
                    r.panels.to_string(),
                    r.symbols().join(" "),
                    r.tier.clone(),
                    r.payout.to_string(),
                    r.balance_after.to_string(),
                    r.nonce.map(|n| n.to_string()).unwrap_or_default(),
                ])?;
            }
            wtr.flush()?;
            println!("Exported {} rows to {}", rows.len(), path);
        }
        Commands::CreateAccount { username, referrer } => {
            let account = wallet.create_account(&username, referrer.as_deref()).await?;
            println!(
                "Created account #{} ({}), referral code {}",
                account.id, account.username, account.referral_code
            );
        }
        Commands::Deposit { id, amount } => {
            let r = wallet.deposit(id, Amount::new(amount)).await?;
            println!("Deposit #{} ok, balance {}", r.id, Amount::new(r.balance).grouped());
        }
        Commands::Withdraw { id, amount } => {
            let r = wallet.withdraw(id, Amount::new(amount)).await?;
            println!(
                "Withdrawal #{} pending as request #{}, balance {}",
                r.id,
                r.withdrawal_id.unwrap_or_default(),
                Amount::new(r.balance).grouped()
            );
        }
        Commands::Withdrawals { status, n } => {
            for w in wallet.withdrawals(status, n).await? {
                println!(
                    "#{:>6} {} acct={} amount={} {}",
                    w.id,
                    w.created_at.format("%Y-%m-%d %H:%M"),
                    w.account_id,
                    Amount::new(w.amount).grouped(),
                    w.status.as_str()
                );
            }
        }
        Commands::ApproveWithdrawal { id } => {
            print_review(&wallet.approve_withdrawal(id).await?);
        }
        Commands::RejectWithdrawal { id } => {
            print_review(&wallet.reject_withdrawal(id).await?);
        }
        Commands::ReferralBonus { code } => {
            let r = wallet.referral_bonus(&code).await?;
            println!(
                "{}: {} referred, total bet {}, bonus {}",
                r.referral_code,
                r.referred_accounts,
                Amount::new(r.total_bet).grouped(),
                Amount::new(r.referral_bonus).grouped()
            );
        }
        Commands::Winners { n } => {
            for row in store::recent_winners(&pool, n).await? {
                let entry = row.to_entry();
                println!("{} {}", entry.ts.format("%Y-%m-%d %H:%M"), entry.headline);
            }
        }
        Commands::Bounty => {
            let cache = BountyCache::new(cli.game.bounty_policy(), cli.game.bounty_cache_ttl());
            println!("Bounty prize: {}", cache.current(&pool).await?.grouped());
        }
    }

    Ok(())
}

fn print_review(r: &WithdrawalResponse) {
    println!(
        "Withdrawal request #{} {}, account #{} balance {}",
        r.withdrawal.id,
        r.withdrawal.status.as_str(),
        r.withdrawal.account_id,
        Amount::new(r.balance).grouped()
    );
}
