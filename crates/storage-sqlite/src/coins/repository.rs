use async_trait::async_trait;
use diesel::prelude::*;
use log::warn;
use std::collections::HashSet;
use std::sync::Arc;

use super::model::EnabledCoinDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::enabled_coin;
use walletcache_core::coins::{Coin, CoinRepositoryTrait, StoredCoin};
use walletcache_core::errors::{Error, Result, ValidationError};
use walletcache_core::live::{best_effort, Interest, LiveQuery, LiveQueryBus, Table, TableChange};

/// Enabled coin list backed by the `enabled_coin` table.
#[derive(Clone)]
pub struct CoinRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    bus: LiveQueryBus,
}

impl CoinRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle, bus: LiveQueryBus) -> Self {
        Self { pool, writer, bus }
    }

    fn load_enabled(pool: &DbPool) -> Result<Vec<Coin>> {
        let mut conn = get_connection(pool)?;
        let rows = enabled_coin::table
            .filter(enabled_coin::enabled.eq(true))
            .order_by(enabled_coin::coin_order.asc())
            .select(EnabledCoinDB::as_select())
            .load::<EnabledCoinDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match Coin::try_from(row) {
                Ok(coin) => Some(coin),
                Err(e) => {
                    warn!("Skipping undecodable coin row: {}", e);
                    None
                }
            })
            .collect())
    }

    fn load_all(pool: &DbPool) -> Result<Vec<StoredCoin>> {
        let mut conn = get_connection(pool)?;
        enabled_coin::table
            .order_by((
                enabled_coin::enabled.desc(),
                enabled_coin::coin_order.asc(),
                enabled_coin::code.asc(),
            ))
            .select(EnabledCoinDB::as_select())
            .load::<EnabledCoinDB>(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(StoredCoin::try_from)
            .collect()
    }

    fn ensure_unique_codes(coins: &[Coin]) -> Result<()> {
        let mut seen = HashSet::with_capacity(coins.len());
        for coin in coins {
            if !seen.insert(coin.code.as_str()) {
                return Err(Error::Validation(ValidationError::InvalidInput(format!(
                    "coin code '{}' appears more than once",
                    coin.code
                ))));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CoinRepositoryTrait for CoinRepository {
    fn get_enabled_coins(&self) -> Result<Vec<Coin>> {
        Self::load_enabled(&self.pool)
    }

    fn get_all_coins(&self) -> Result<Vec<StoredCoin>> {
        Self::load_all(&self.pool)
    }

    fn enabled_coins(&self) -> LiveQuery<Vec<Coin>> {
        let pool = Arc::clone(&self.pool);
        self.bus
            .subscribe(Interest::Table(Table::EnabledCoin), move || {
                best_effort("enabled coins", Self::load_enabled(&pool))
            })
    }

    async fn replace_enabled_coins(&self, coins: Vec<Coin>) -> Result<()> {
        Self::ensure_unique_codes(&coins)?;

        self.writer
            .exec(vec![TableChange::EnabledCoins], move |conn| {
                diesel::update(enabled_coin::table)
                    .set((
                        enabled_coin::enabled.eq(false),
                        enabled_coin::coin_order.eq(None::<i32>),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                for (order, coin) in coins.iter().enumerate() {
                    let order = i32::try_from(order).map_err(|_| {
                        Error::Validation(ValidationError::InvalidInput(
                            "too many enabled coins".to_string(),
                        ))
                    })?;
                    diesel::replace_into(enabled_coin::table)
                        .values(&EnabledCoinDB::enabled(coin, order))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(())
            })
            .await
    }

    async fn clear_all(&self) -> Result<()> {
        self.writer
            .exec(vec![TableChange::EnabledCoins], |conn| {
                diesel::delete(enabled_coin::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
