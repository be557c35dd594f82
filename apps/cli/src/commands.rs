//! Subcommand handlers.

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use walletcache_core::coins::{Coin, CoinType};
use walletcache_core::live::LiveQuery;
use walletcache_core::rates::Rate;
use walletcache_storage_sqlite::WalletStorage;

use crate::cli::{CoinsCommand, PairArgs, RatesCommand, WatchCommand};

pub fn migrate(storage: &WalletStorage) -> anyhow::Result<()> {
    println!("database: {}", storage.db_path());
    for version in storage.applied_migrations()? {
        println!("applied: {}", version);
    }
    Ok(())
}

pub async fn rates(storage: &WalletStorage, command: RatesCommand) -> anyhow::Result<()> {
    let rates = storage.rates();
    match command {
        RatesCommand::Latest { pair, max_age_secs } => {
            let latest = rates.get_latest_rate(&pair.coin, &pair.currency)?;
            let latest = match max_age_secs {
                Some(secs) => Rate::non_expired(latest, Duration::seconds(secs), Utc::now()),
                None => latest,
            };
            print_json(&latest)?;
        }
        RatesCommand::Set {
            pair,
            value,
            timestamp,
        } => {
            let timestamp = match timestamp {
                Some(raw) => parse_timestamp(&raw)?,
                None => Utc::now(),
            };
            rates
                .set_latest(Rate::latest(pair.coin, pair.currency, value, timestamp))
                .await?;
        }
        RatesCommand::Append {
            pair,
            value,
            timestamp,
        } => {
            let timestamp = parse_timestamp(&timestamp)?;
            rates
                .append(Rate::historical(pair.coin, pair.currency, value, timestamp))
                .await?;
        }
        RatesCommand::Zero { currency } => {
            print_json(&rates.get_zero_value_historical_rates(&currency)?)?;
        }
        RatesCommand::Clear => rates.clear_all().await?,
    }
    Ok(())
}

pub async fn coins(storage: &WalletStorage, command: CoinsCommand) -> anyhow::Result<()> {
    let coins = storage.coins();
    match command {
        CoinsCommand::List { all: true } => print_json(&coins.get_all_coins()?)?,
        CoinsCommand::List { all: false } => print_json(&coins.get_enabled_coins()?)?,
        CoinsCommand::Set { coins: specs } => {
            let parsed = specs
                .iter()
                .map(|spec| parse_coin(spec))
                .collect::<anyhow::Result<Vec<_>>>()?;
            coins.replace_enabled_coins(parsed).await?;
        }
        CoinsCommand::Clear => coins.clear_all().await?,
    }
    Ok(())
}

pub async fn watch(storage: &WalletStorage, command: WatchCommand) -> anyhow::Result<()> {
    match command {
        WatchCommand::Rates(PairArgs { coin, currency }) => {
            follow(storage.rates().latest(&coin, &currency)).await
        }
        WatchCommand::Coins => follow(storage.coins().enabled_coins()).await,
    }
}

async fn follow<T>(query: LiveQuery<T>) -> anyhow::Result<()>
where
    T: Clone + serde::Serialize + Send + Sync + 'static,
{
    let mut snapshots = Box::pin(query.into_stream());
    loop {
        tokio::select! {
            snapshot = snapshots.next() => match snapshot {
                Some(snapshot) => print_json(&snapshot)?,
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, closing live query");
                return Ok(());
            }
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("invalid RFC 3339 timestamp '{}'", raw))
}

/// Parses `CODE:TITLE:TYPE`. The type may itself contain colons
/// (`erc20:<address>:<decimals>`).
pub fn parse_coin(spec: &str) -> anyhow::Result<Coin> {
    let mut parts = spec.splitn(3, ':');
    let (code, title, kind) = match (parts.next(), parts.next(), parts.next()) {
        (Some(code), Some(title), Some(kind)) if !code.is_empty() && !title.is_empty() => {
            (code, title, kind)
        }
        _ => bail!("expected CODE:TITLE:TYPE, got '{}'", spec),
    };
    let coin_type = kind
        .parse::<CoinType>()
        .map_err(|e| anyhow!("coin '{}': {}", code, e))?;
    Ok(Coin::new(title, code, coin_type))
}
