//! Opened wallet database: pool, migrations, writer actor and repositories.

use log::info;
use std::sync::Arc;

use crate::coins::CoinRepository;
use crate::db::{self, write_actor, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::rates::RateRepository;
use crate::schema::{enabled_coin, rate};
use diesel::prelude::*;
use walletcache_core::coins::CoinRepositoryTrait;
use walletcache_core::config::StorageConfig;
use walletcache_core::errors::Result;
use walletcache_core::live::{LiveQueryBus, TableChange};
use walletcache_core::rates::RateRepositoryTrait;

/// Entry point to the wallet cache.
///
/// Opening runs every pending migration before any repository is handed out,
/// so callers never observe a partially migrated schema. Must be opened from
/// within a Tokio runtime because the writer actor is spawned on it.
#[derive(Clone)]
pub struct WalletStorage {
    db_path: String,
    pool: Arc<DbPool>,
    writer: WriteHandle,
    bus: LiveQueryBus,
    rates: Arc<RateRepository>,
    coins: Arc<CoinRepository>,
}

impl WalletStorage {
    pub fn open(config: &StorageConfig) -> Result<Self> {
        config.validate()?;

        let db_path = db::init(config)?;
        let pool = db::create_pool(&db_path, config)?;
        db::run_migrations(&pool)?;

        let bus = LiveQueryBus::new();
        let writer =
            write_actor::spawn_writer((*pool).clone(), bus.clone(), config.writer_queue_capacity);

        let rates = Arc::new(RateRepository::new(
            Arc::clone(&pool),
            writer.clone(),
            bus.clone(),
        ));
        let coins = Arc::new(CoinRepository::new(
            Arc::clone(&pool),
            writer.clone(),
            bus.clone(),
        ));

        info!("Wallet storage opened at {}", db_path);

        Ok(Self {
            db_path,
            pool,
            writer,
            bus,
            rates,
            coins,
        })
    }

    pub fn rates(&self) -> Arc<dyn RateRepositoryTrait> {
        self.rates.clone()
    }

    pub fn coins(&self) -> Arc<dyn CoinRepositoryTrait> {
        self.coins.clone()
    }

    pub fn bus(&self) -> &LiveQueryBus {
        &self.bus
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn applied_migrations(&self) -> Result<Vec<String>> {
        db::applied_migrations(&self.pool)
    }

    /// Empties both tables in one transaction, e.g. on wallet logout.
    pub async fn clear_all(&self) -> Result<()> {
        self.writer
            .exec(
                vec![TableChange::AllRates, TableChange::EnabledCoins],
                |conn| {
                    diesel::delete(rate::table)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                    diesel::delete(enabled_coin::table)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                    Ok(())
                },
            )
            .await
    }
}
