//! Database model for exchange rates.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use walletcache_core::errors::{Error, ValidationError};
use walletcache_core::rates::Rate;

/// Database model for a rate row.
///
/// `date` holds seconds since the Unix epoch with microsecond precision; an
/// f64 represents every current-era microsecond exactly.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::rate)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RateDB {
    pub coin_code: String,
    pub currency_code: String,
    pub value: String,
    pub date: f64,
    pub is_latest: bool,
}

const MICROS_PER_SECOND: f64 = 1_000_000.0;

pub(crate) fn timestamp_to_date(timestamp: &DateTime<Utc>) -> f64 {
    timestamp.timestamp_micros() as f64 / MICROS_PER_SECOND
}

pub(crate) fn date_to_timestamp(date: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros((date * MICROS_PER_SECOND).round() as i64)
}

/// Rejects timestamps with digits below a microsecond, which would be lost
/// on write and could collide with another row's key.
pub(crate) fn ensure_storable(rate: &Rate) -> Result<(), Error> {
    if rate.has_storable_timestamp() {
        Ok(())
    } else {
        Err(Error::Validation(ValidationError::InvalidInput(format!(
            "rate timestamp {} for {} is finer than a microsecond",
            rate.timestamp.to_rfc3339(),
            rate.pair()
        ))))
    }
}

pub(crate) fn parse_value(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

impl From<&Rate> for RateDB {
    fn from(rate: &Rate) -> Self {
        Self {
            coin_code: rate.coin_code.clone(),
            currency_code: rate.currency_code.clone(),
            value: rate.value.to_string(),
            date: timestamp_to_date(&rate.timestamp),
            is_latest: rate.is_latest,
        }
    }
}

impl TryFrom<RateDB> for Rate {
    type Error = Error;

    fn try_from(db: RateDB) -> Result<Self, Self::Error> {
        let value = parse_value(&db.value).ok_or_else(|| {
            Error::InvalidStoredValue(format!(
                "rate value '{}' for {}/{}",
                db.value, db.coin_code, db.currency_code
            ))
        })?;
        let timestamp = date_to_timestamp(db.date).ok_or_else(|| {
            Error::InvalidStoredValue(format!(
                "rate date {} for {}/{}",
                db.date, db.coin_code, db.currency_code
            ))
        })?;

        Ok(Rate {
            coin_code: db.coin_code,
            currency_code: db.currency_code,
            value,
            timestamp,
            is_latest: db.is_latest,
        })
    }
}
