use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use zeratul_staking::{
    Address, Balance, Payout, PayoutError, SnapshotStore, StakingService, ValidatorRegistry,
};

mod genesis;

use crate::genesis::Genesis;

#[derive(Parser, Debug)]
#[command(name = "stakectl")]
#[command(about = "operate a validator staking registry", long_about = None)]
struct Args {
    /// registry database path
    #[arg(long, env = "STAKECTL_DB", default_value = "./stakectl.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the registry from a genesis file
    Genesis {
        /// genesis json (config + bootstrap validators)
        file: PathBuf,
    },

    /// Register a validator with attached self-stake
    Register {
        #[arg(long)]
        validator: Address,
        #[arg(long)]
        manager: Address,
        /// commission rate (0-100)
        #[arg(long)]
        rate: u8,
        #[arg(long)]
        stake: Balance,
    },

    /// Delegate stake to a validator
    Buy {
        #[arg(long)]
        holder: Address,
        #[arg(long)]
        validator: Address,
        #[arg(long)]
        amount: Balance,
    },

    /// Sell stock back into a pending refund
    Sell {
        #[arg(long)]
        holder: Address,
        #[arg(long)]
        validator: Address,
        #[arg(long)]
        shares: Balance,
    },

    /// Pay out a pending refund
    Claim {
        #[arg(long)]
        holder: Address,
        #[arg(long)]
        validator: Address,
    },

    /// Change a validator's commission rate (manager only)
    Commission {
        #[arg(long)]
        caller: Address,
        #[arg(long)]
        validator: Address,
        #[arg(long)]
        rate: u8,
    },

    /// List validators by stake (defaults to the active set)
    Top {
        #[arg(short, long)]
        n: Option<usize>,
    },

    /// Show registry config and totals
    Info,

    /// Show one validator's ledger
    Validator {
        address: Address,
        /// also show this holder's shares and pending refund
        #[arg(long)]
        holder: Option<Address>,
    },
}

/// Records refunds in the log; settlement happens outside the registry
struct LogPayout;

impl Payout for LogPayout {
    fn pay(&self, to: &Address, amount: Balance) -> Result<(), PayoutError> {
        info!(%to, %amount, "refund released");
        Ok(())
    }
}

fn load<P: Payout>(store: &SnapshotStore, payout: P) -> Result<StakingService<P>> {
    let service = match store.load()? {
        Some(snapshot) => StakingService::from_snapshot(snapshot, payout)?,
        None => StakingService::with_registry(ValidatorRegistry::new(), payout),
    };
    Ok(service)
}

fn save<P: Payout>(store: &SnapshotStore, service: &StakingService<P>) -> Result<()> {
    store.save(&service.snapshot()).context("saving registry")?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stakectl=info,zeratul_staking=info".into()),
        )
        .init();

    let args = Args::parse();
    let store = SnapshotStore::open(&args.db)
        .with_context(|| format!("opening {}", args.db.display()))?;
    let service = load(&store, LogPayout)?;

    run(&store, &service, args.command)
}

/// Execute one command, saving the registry after every change
fn run<P: Payout>(store: &SnapshotStore, service: &StakingService<P>, command: Command) -> Result<()> {
    match command {
        Command::Genesis { file } => {
            if service.config().is_ok() {
                bail!("registry already initialized");
            }
            Genesis::load(&file)?.apply(service)?;
            save(store, service)?;
            println!("initialized, total stake {}", service.total_stake());
        }
        Command::Register { validator, manager, rate, stake } => {
            service.register_validator(validator, manager, rate, stake)?;
            save(store, service)?;
            println!("registered {}", validator);
        }
        Command::Buy { holder, validator, amount } => {
            let minted = service.buy_stocks(holder, validator, amount)?;
            save(store, service)?;
            println!("minted {} stock", minted);
        }
        Command::Sell { holder, validator, shares } => {
            let released = service.sell_stocks(holder, validator, shares)?;
            save(store, service)?;
            println!("queued {} for refund", released);
        }
        Command::Claim { holder, validator } => {
            // the claimed state is on disk before any payout
            let amount = service.take_refund(holder, validator)?;
            save(store, service)?;
            if let Err(e) = service.settle(holder, validator, amount) {
                save(store, service)?;
                return Err(e.into());
            }
            println!("paid {}", amount);
        }
        Command::Commission { caller, validator, rate } => {
            service.update_commission(caller, validator, rate)?;
            save(store, service)?;
            println!("commission of {} set to {}", validator, rate);
        }
        Command::Top { n } => {
            let validators = match n {
                Some(n) => service.top_validators(n)?,
                None => service.active_validators()?,
            };
            for (rank, validator) in validators.iter().enumerate() {
                let info = service.ledger_info(*validator)?;
                println!("{:>3}  {}  {}", rank + 1, validator, info.total_stake);
            }
        }
        Command::Info => {
            let config = service.config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("validators: {}", service.validator_count());
            println!("total stake: {}", service.total_stake());
        }
        Command::Validator { address, holder } => {
            let info = service.ledger_info(address)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            if let Some(holder) = holder {
                println!("shares: {}", service.shares_of(address, holder)?);
                println!("pending: {}", service.pending_of(address, holder)?);
            }
        }
    }
    Ok(())
}
