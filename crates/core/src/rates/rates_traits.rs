use super::rates_model::Rate;
use crate::errors::Result;
use crate::live::LiveQuery;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Trait defining the contract for exchange rate storage.
///
/// Live queries must be opened from within a Tokio runtime. They always carry
/// an initial value and refresh after every committed write that can affect
/// them.
#[async_trait]
pub trait RateRepositoryTrait: Send + Sync {
    fn get_latest_rate(&self, coin_code: &str, currency_code: &str) -> Result<Option<Rate>>;
    fn get_historical_rate(
        &self,
        coin_code: &str,
        currency_code: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Rate>>;
    fn get_zero_value_historical_rates(&self, currency_code: &str) -> Result<Vec<Rate>>;
    fn get_rates(&self, coin_code: &str, currency_code: &str) -> Result<Vec<Rate>>;

    fn latest(&self, coin_code: &str, currency_code: &str) -> LiveQuery<Option<Rate>>;
    /// Like [`latest`](Self::latest), but a rate older than `max_age` at the
    /// time of each emission is delivered as `None`.
    fn non_expired_latest(
        &self,
        coin_code: &str,
        currency_code: &str,
        max_age: Duration,
    ) -> LiveQuery<Option<Rate>>;
    fn historical(
        &self,
        coin_code: &str,
        currency_code: &str,
        timestamp: DateTime<Utc>,
    ) -> LiveQuery<Option<Rate>>;
    fn zero_value_historical(&self, currency_code: &str) -> LiveQuery<Vec<Rate>>;

    /// Replaces the pair's current quote in a single write unit.
    async fn set_latest(&self, rate: Rate) -> Result<()>;
    async fn append(&self, rate: Rate) -> Result<()>;
    async fn clear_all(&self) -> Result<()>;
}
