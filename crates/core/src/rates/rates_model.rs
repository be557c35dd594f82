use chrono::{DateTime, Duration, SubsecRound, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::TIMESTAMP_SUBSEC_DIGITS;

/// A quote of one coin in one fiat currency.
///
/// A pair has at most one row with `is_latest == true` (the current quote).
/// Rows with `is_latest == false` are historical observations keyed by
/// `timestamp` and are never mutated after insert.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Rate {
    pub coin_code: String,
    pub currency_code: String,
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
    pub is_latest: bool,
}

impl Rate {
    /// Creates a current quote for the pair. The timestamp is truncated to
    /// microseconds, the precision kept by the store.
    pub fn latest(
        coin_code: impl Into<String>,
        currency_code: impl Into<String>,
        value: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            coin_code: coin_code.into(),
            currency_code: currency_code.into(),
            value,
            timestamp: timestamp.trunc_subsecs(TIMESTAMP_SUBSEC_DIGITS),
            is_latest: true,
        }
    }

    /// Creates a historical observation for the pair.
    pub fn historical(
        coin_code: impl Into<String>,
        currency_code: impl Into<String>,
        value: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            is_latest: false,
            ..Self::latest(coin_code, currency_code, value, timestamp)
        }
    }

    /// False when the timestamp carries sub-microsecond digits the store
    /// would drop.
    pub fn has_storable_timestamp(&self) -> bool {
        self.timestamp.nanosecond() % 1_000 == 0
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(&self.coin_code, &self.currency_code)
    }

    /// Age of the quote at `now`. Negative for quotes stamped in the future.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.timestamp
    }

    /// A rate is expired when its age is strictly greater than `max_age`.
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(now) > max_age
    }

    /// Maps an expired rate to `None`.
    pub fn non_expired(rate: Option<Rate>, max_age: Duration, now: DateTime<Utc>) -> Option<Rate> {
        rate.filter(|r| !r.is_expired(max_age, now))
    }
}

/// Identifies a (coin, currency) pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct PairKey {
    pub coin_code: String,
    pub currency_code: String,
}

impl PairKey {
    pub fn new(coin_code: &str, currency_code: &str) -> Self {
        Self {
            coin_code: coin_code.to_string(),
            currency_code: currency_code.to_string(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.coin_code, self.currency_code)
    }
}
