mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use walletcache_core::config::StorageConfig;
use walletcache_storage_sqlite::WalletStorage;

use cli::{Cli, Commands};

fn init_tracing() {
    let log_format =
        std::env::var("WALLETCACHE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = StorageConfig::from_env()?;
    let storage = WalletStorage::open(&config)?;
    tracing::debug!("Using database at {}", storage.db_path());

    match cli.command {
        Commands::Migrate => commands::migrate(&storage)?,
        Commands::Rates(command) => commands::rates(&storage, command).await?,
        Commands::Coins(command) => commands::coins(&storage, command).await?,
        Commands::Watch(command) => commands::watch(&storage, command).await?,
    }
    Ok(())
}
