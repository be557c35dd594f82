use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{Error, Result};

/// Blockchain family of a coin.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoinType {
    Bitcoin,
    BitcoinCash,
    Ethereum,
    Erc20 { address: String, decimals: u8 },
}

impl CoinType {
    const ERC20_PREFIX: &'static str = "erc20";

    /// Textual form stored in the `coin_type` column.
    pub fn as_db_string(&self) -> String {
        match self {
            CoinType::Bitcoin => "bitcoin".to_string(),
            CoinType::BitcoinCash => "bitcoin_cash".to_string(),
            CoinType::Ethereum => "ethereum".to_string(),
            CoinType::Erc20 { address, decimals } => {
                format!("{}:{}:{}", Self::ERC20_PREFIX, address, decimals)
            }
        }
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_db_string())
    }
}

impl FromStr for CoinType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bitcoin" => return Ok(CoinType::Bitcoin),
            "bitcoin_cash" => return Ok(CoinType::BitcoinCash),
            "ethereum" => return Ok(CoinType::Ethereum),
            _ => {}
        }

        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Self::ERC20_PREFIX), Some(address), Some(decimals)) if !address.is_empty() => {
                let decimals = decimals.parse::<u8>().map_err(|_| {
                    Error::InvalidStoredValue(format!("invalid erc20 decimals in '{}'", s))
                })?;
                Ok(CoinType::Erc20 {
                    address: address.to_string(),
                    decimals,
                })
            }
            _ => Err(Error::InvalidStoredValue(format!("unknown coin type '{}'", s))),
        }
    }
}

/// A coin the user can enable in the wallet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    pub title: String,
    pub code: String,
    pub coin_type: CoinType,
}

impl Coin {
    pub fn new(title: impl Into<String>, code: impl Into<String>, coin_type: CoinType) -> Self {
        Self {
            title: title.into(),
            code: code.into(),
            coin_type,
        }
    }
}

/// A coin row together with its enablement state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredCoin {
    pub coin: Coin,
    pub enabled: bool,
    pub order: Option<i32>,
}
