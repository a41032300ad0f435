//! `bottle` — command-line client for a local bottle ledger.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use bottle_kernel::domain::{
    ActorId, BottleState, RecordAddress, TransactionOutcome, MAX_DAILY_ACTIONS,
};
use bottle_kernel::query;
use bottle_runtime::audit::audit_ledger;
use bottle_runtime::config::RuntimeConfig;
use bottle_runtime::ledger::Ledger;
use bottle_runtime::telemetry;

/// Throw messages in bottles and retrieve other people's.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Acting public key, 64 hex characters
    #[arg(short, long, value_name = "HEX")]
    actor: Option<ActorId>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Throw a bottle carrying a message
    Throw {
        #[arg(short, long)]
        message: String,
        /// Bottle id; defaults to the current time in milliseconds
        #[arg(long)]
        id: Option<u64>,
        /// Asset amount deposited with the bottle
        #[arg(long, default_value_t = 0)]
        amount: u64,
    },
    /// Retrieve a drifting bottle
    Retrieve {
        /// Record address; defaults to the most recent bottle you did not throw
        #[arg(short, long)]
        record: Option<RecordAddress>,
    },
    /// List bottles, most recent first
    List {
        /// Show retrieved bottles instead of drifting ones
        #[arg(long)]
        retrieved: bool,
    },
    /// Show a single bottle
    Show { address: RecordAddress },
    /// Actions left today for the acting key
    Quota,
    /// Replay the log and check it against live state and the latest snapshot
    Verify,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = RuntimeConfig::load(args.config.as_deref()).context("loading config")?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    telemetry::init(&config.log_filter)?;

    let mut ledger = Ledger::open_with(&config)
        .with_context(|| format!("opening ledger in {}", config.data_dir.display()))?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?;
    let timestamp = i64::try_from(now.as_secs()).context("timestamp out of range")?;

    match args.cmd {
        Command::Throw {
            message,
            id,
            amount,
        } => {
            let actor = require_actor(args.actor)?;
            let id = match id {
                Some(id) => id,
                None => u64::try_from(now.as_millis()).context("id out of range")?,
            };
            let outcome = ledger.throw(actor, timestamp, id, amount, message)?;
            report(&outcome);
        }
        Command::Retrieve { record } => {
            let actor = require_actor(args.actor)?;
            let outcome = match record {
                Some(record) => ledger.retrieve_record(actor, timestamp, record)?,
                None => ledger.retrieve_latest(actor, timestamp)?,
            };
            report(&outcome);
            if let Some(bottle) = ledger.bottle(outcome.address()) {
                println!("{}", bottle.message);
            }
        }
        Command::List { retrieved } => {
            let filters = if retrieved {
                query::retrieved_filters()
            } else {
                query::drifting_filters()
            };
            for candidate in ledger.candidates(&filters, None)? {
                if let Some(bottle) = ledger.bottle(candidate.address) {
                    println!(
                        "{:>6}  thrown_at={}  sender={}  {} bytes",
                        candidate.address,
                        candidate.thrown_at,
                        bottle.sender,
                        bottle.message.len()
                    );
                }
            }
        }
        Command::Show { address } => {
            let Some(bottle) = ledger.bottle(address) else {
                bail!("no bottle at address {address}");
            };
            println!("address:    {address}");
            println!("id:         {}", bottle.id);
            println!("sender:     {}", bottle.sender);
            println!("thrown_at:  {}", bottle.thrown_at);
            match bottle.state {
                BottleState::Drifting => println!("state:      drifting"),
                BottleState::Retrieved {
                    retrievee,
                    retrieved_at,
                } => {
                    println!("state:      retrieved by {retrievee} at {retrieved_at}");
                    println!("message:    {}", bottle.message);
                }
            }
            println!(
                "asset:      {} ({} units)",
                bottle.asset.escrow, bottle.asset.amount
            );
        }
        Command::Quota => {
            let actor = require_actor(args.actor)?;
            println!(
                "{} of {MAX_DAILY_ACTIONS} actions left today",
                ledger.remaining_actions(&actor, timestamp)
            );
        }
        Command::Verify => {
            let report = audit_ledger(&ledger)?;
            println!("transactions: {}", report.transactions);
            println!("replay hash:  {}", report.replay_hash);
            println!("live hash:    {}", report.live_hash);
            if let Some(snap) = &report.snapshot {
                println!(
                    "snapshot {}:  restorable={} matches_replay={}",
                    snap.sequence, snap.restorable, snap.matches_replay
                );
            }
            if !report.is_clean() {
                bail!("ledger audit failed: {:?}", report.live_vs_replay);
            }
            println!("ok");
        }
    }

    Ok(())
}

fn require_actor(actor: Option<ActorId>) -> Result<ActorId> {
    actor.context("--actor is required for this command")
}

fn report(outcome: &TransactionOutcome) {
    match outcome {
        TransactionOutcome::Thrown {
            address,
            quota_used,
        } => println!("threw bottle {address} ({quota_used}/{MAX_DAILY_ACTIONS} actions used today)"),
        TransactionOutcome::Retrieved {
            address,
            quota_used,
        } => println!("retrieved bottle {address} ({quota_used}/{MAX_DAILY_ACTIONS} actions used today)"),
    }
}
