//! Change and interest descriptors.

use serde::{Deserialize, Serialize};

use crate::rates::PairKey;

/// Tables owned by the wallet cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Rate,
    EnabledCoin,
}

/// Rows touched by a committed write unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TableChange {
    /// Rate rows of the listed pairs.
    Rates { pairs: Vec<PairKey> },
    /// Every rate row (bulk delete).
    AllRates,
    /// The enabled coin table.
    EnabledCoins,
}

impl TableChange {
    pub fn rate_pair(pair: PairKey) -> Self {
        Self::Rates { pairs: vec![pair] }
    }

    pub fn table(&self) -> Table {
        match self {
            TableChange::Rates { .. } | TableChange::AllRates => Table::Rate,
            TableChange::EnabledCoins => Table::EnabledCoin,
        }
    }
}

/// The rows a live query reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interest {
    /// Any change to the table.
    Table(Table),
    /// Rate rows of one pair.
    RatePair(PairKey),
    /// Rate rows of any coin quoted in this currency.
    RateCurrency(String),
}

impl Interest {
    pub fn is_affected_by(&self, change: &TableChange) -> bool {
        match (self, change) {
            (Interest::Table(table), change) => *table == change.table(),
            (_, TableChange::EnabledCoins) => false,
            (_, TableChange::AllRates) => true,
            (Interest::RatePair(pair), TableChange::Rates { pairs }) => pairs.contains(pair),
            (Interest::RateCurrency(currency), TableChange::Rates { pairs }) => {
                pairs.iter().any(|p| &p.currency_code == currency)
            }
        }
    }
}
