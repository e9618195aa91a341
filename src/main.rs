use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use yuk_ledger::ledger::{format_units, parse_units, Amount, TokenLedger};
use yuk_ledger::store;

#[derive(Parser)]
#[command(name = "yuk", version, about = "File-backed ledger for the YUK token")]
struct Cli {
    /// Path to the ledger state file
    #[arg(long, global = true, default_value = "yuk-state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new ledger, crediting the full supply to the deployer
    Init {
        /// Account credited with the initial supply
        #[arg(long)]
        deployer: String,
        /// Initial supply in whole YUK (decimal, e.g. "1000" or "0.5")
        #[arg(long)]
        supply: String,
    },
    /// Print token metadata and the current state root
    Info,
    /// Print an account balance
    Balance { account: String },
    /// Print the remaining allowance for an owner/spender pair
    Allowance { owner: String, spender: String },
    /// Move tokens from the caller's account to a recipient
    Transfer {
        /// Authenticated caller (the account being debited)
        #[arg(long)]
        caller: String,
        to: String,
        /// Amount in whole YUK
        amount: String,
    },
    /// Set the allowance a spender may move out of the caller's account
    Approve {
        /// Authenticated caller (the account granting the allowance)
        #[arg(long)]
        caller: String,
        spender: String,
        /// Amount in whole YUK; 0 revokes
        amount: String,
    },
    /// Move tokens out of an owner's account under a granted allowance
    TransferFrom {
        /// Authenticated caller (the spender consuming the allowance)
        #[arg(long)]
        caller: String,
        from: String,
        to: String,
        /// Amount in whole YUK
        amount: String,
    },
    /// Recheck state-file integrity (state root and conservation)
    Verify,
}

fn bail(err: impl Display) -> ! {
    eprintln!("error: {err}");
    process::exit(2)
}

fn parse_amount(text: &str) -> Amount {
    match parse_units(text) {
        Ok(units) => units,
        Err(err) => bail(err),
    }
}

fn load_state(path: &Path) -> TokenLedger {
    match store::load(path) {
        Ok(ledger) => ledger,
        Err(err) => bail(err),
    }
}

fn save_state(path: &Path, ledger: &TokenLedger) {
    if let Err(err) = store::save(path, ledger) {
        bail(err);
    }
}

fn main() {
    let cli = Cli::parse();
    let state = cli.state.as_path();

    match cli.command {
        Command::Init { deployer, supply } => {
            if state.exists() {
                bail(format!(
                    "state file {} already exists; the ledger is constructed exactly once",
                    state.display()
                ));
            }
            let initial_supply = parse_amount(&supply);
            let ledger = TokenLedger::new(deployer.clone(), initial_supply);
            save_state(state, &ledger);
            println!(
                "Ledger initialized → {} ({} YUK to {})",
                state.display(),
                format_units(initial_supply),
                deployer
            );
        }
        Command::Info => {
            let ledger = load_state(state);
            println!("name:         {}", ledger.name());
            println!("symbol:       {}", ledger.symbol());
            println!("decimals:     {}", ledger.decimals());
            println!(
                "total supply: {} YUK ({} units)",
                format_units(ledger.total_supply()),
                ledger.total_supply()
            );
            println!("state root:   {}", hex::encode(ledger.state_root()));
        }
        Command::Balance { account } => {
            let ledger = load_state(state);
            let balance = ledger.balance_of(&account);
            println!("{} YUK ({} units)", format_units(balance), balance);
        }
        Command::Allowance { owner, spender } => {
            let ledger = load_state(state);
            let remaining = ledger.allowance(&owner, &spender);
            println!("{} YUK ({} units)", format_units(remaining), remaining);
        }
        Command::Transfer { caller, to, amount } => {
            let units = parse_amount(&amount);
            let mut ledger = load_state(state);
            if let Err(err) = ledger.transfer(&caller, &to, units) {
                bail(err);
            }
            save_state(state, &ledger);
            println!("Transferred {} YUK: {} → {}", format_units(units), caller, to);
        }
        Command::Approve {
            caller,
            spender,
            amount,
        } => {
            let units = parse_amount(&amount);
            let mut ledger = load_state(state);
            ledger.approve(&caller, &spender, units);
            save_state(state, &ledger);
            println!(
                "Approved {} YUK: {} may spend from {}",
                format_units(units),
                spender,
                caller
            );
        }
        Command::TransferFrom {
            caller,
            from,
            to,
            amount,
        } => {
            let units = parse_amount(&amount);
            let mut ledger = load_state(state);
            if let Err(err) = ledger.transfer_from(&caller, &from, &to, units) {
                bail(err);
            }
            save_state(state, &ledger);
            println!(
                "Transferred {} YUK: {} → {} (spender {})",
                format_units(units),
                from,
                to,
                caller
            );
        }
        Command::Verify => {
            let ledger = load_state(state);
            println!(
                "verify: OK (state root {} & conservation match)",
                hex::encode(ledger.state_root())
            );
        }
    }
}
