//! Database model for the enabled coin list.

use diesel::prelude::*;
use walletcache_core::coins::{Coin, CoinType, StoredCoin};
use walletcache_core::errors::Error;

/// Database model for an `enabled_coin` row.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::enabled_coin)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EnabledCoinDB {
    pub title: String,
    pub code: String,
    pub coin_type: String,
    pub enabled: bool,
    pub coin_order: Option<i32>,
}

impl EnabledCoinDB {
    /// Row for a coin that is enabled at display position `order`.
    pub fn enabled(coin: &Coin, order: i32) -> Self {
        Self {
            title: coin.title.clone(),
            code: coin.code.clone(),
            coin_type: coin.coin_type.as_db_string(),
            enabled: true,
            coin_order: Some(order),
        }
    }
}

impl TryFrom<EnabledCoinDB> for StoredCoin {
    type Error = Error;

    fn try_from(db: EnabledCoinDB) -> Result<Self, Self::Error> {
        let coin_type = db.coin_type.parse::<CoinType>().map_err(|e| {
            Error::InvalidStoredValue(format!("coin '{}': {}", db.code, e))
        })?;

        Ok(StoredCoin {
            coin: Coin {
                title: db.title,
                code: db.code,
                coin_type,
            },
            enabled: db.enabled,
            order: db.coin_order,
        })
    }
}

impl TryFrom<EnabledCoinDB> for Coin {
    type Error = Error;

    fn try_from(db: EnabledCoinDB) -> Result<Self, Self::Error> {
        StoredCoin::try_from(db).map(|stored| stored.coin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_row_carries_order_and_type() {
        let coin = Coin::new(
            "Tether",
            "USDT",
            CoinType::Erc20 {
                address: "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
                decimals: 6,
            },
        );
        let row = EnabledCoinDB::enabled(&coin, 2);
        assert!(row.enabled);
        assert_eq!(row.coin_order, Some(2));
        assert!(row.coin_type.starts_with("erc20:"));

        let stored = StoredCoin::try_from(row).unwrap();
        assert_eq!(stored.coin, coin);
        assert_eq!(stored.order, Some(2));
    }

    #[test]
    fn test_unknown_coin_type_is_rejected() {
        let row = EnabledCoinDB {
            title: "Dogecoin".to_string(),
            code: "DOGE".to_string(),
            coin_type: "dogecoin".to_string(),
            enabled: true,
            coin_order: Some(0),
        };
        assert!(matches!(
            Coin::try_from(row),
            Err(Error::InvalidStoredValue(_))
        ));
    }
}
