//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

/// Inspect and edit the wallet's local exchange rate and coin cache.
#[derive(Parser, Debug)]
#[command(name = "walletcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the database, apply pending migrations and print the ledger
    Migrate,

    /// Read and write exchange rates
    #[command(subcommand)]
    Rates(RatesCommand),

    /// Manage the enabled coin list
    #[command(subcommand)]
    Coins(CoinsCommand),

    /// Print every snapshot of a live query until interrupted
    #[command(subcommand)]
    Watch(WatchCommand),
}

/// Subcommands for `walletcache rates`
#[derive(Subcommand, Debug)]
pub enum RatesCommand {
    /// Show the current quote for a pair
    Latest {
        #[command(flatten)]
        pair: PairArgs,
        /// Hide the quote when it is older than this many seconds
        #[arg(long)]
        max_age_secs: Option<i64>,
    },
    /// Replace the current quote for a pair
    Set {
        #[command(flatten)]
        pair: PairArgs,
        value: Decimal,
        /// RFC 3339 quote time, defaults to now
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Store a historical observation
    Append {
        #[command(flatten)]
        pair: PairArgs,
        value: Decimal,
        /// RFC 3339 observation time
        #[arg(long)]
        timestamp: String,
    },
    /// List historical rates of exactly zero for a currency
    Zero { currency: String },
    /// Delete every stored rate
    Clear,
}

/// Subcommands for `walletcache coins`
#[derive(Subcommand, Debug)]
pub enum CoinsCommand {
    /// List enabled coins in display order
    List {
        /// Include disabled coins
        #[arg(long)]
        all: bool,
    },
    /// Replace the enabled set; each entry is CODE:TITLE:TYPE
    Set {
        #[arg(required = true)]
        coins: Vec<String>,
    },
    /// Delete every coin row
    Clear,
}

/// Subcommands for `walletcache watch`
#[derive(Subcommand, Debug)]
pub enum WatchCommand {
    /// Follow the latest quote of a pair
    Rates(PairArgs),
    /// Follow the enabled coin list
    Coins,
}

#[derive(Args, Debug)]
pub struct PairArgs {
    /// Coin code, e.g. BTC
    pub coin: String,
    /// Fiat currency code, e.g. USD
    pub currency: String,
}
