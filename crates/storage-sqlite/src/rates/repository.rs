use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use log::warn;
use std::sync::Arc;

use super::model::{ensure_storable, parse_value, timestamp_to_date, RateDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::rate;
use walletcache_core::errors::Result;
use walletcache_core::live::{best_effort, Interest, LiveQuery, LiveQueryBus, TableChange};
use walletcache_core::rates::{PairKey, Rate, RateRepositoryTrait};

/// Exchange rate storage backed by the `rate` table.
///
/// Reads go through the pool; writes go through the writer actor and are
/// announced on the live query bus.
#[derive(Clone)]
pub struct RateRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    bus: LiveQueryBus,
}

impl RateRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle, bus: LiveQueryBus) -> Self {
        Self { pool, writer, bus }
    }

    fn load_latest(pool: &DbPool, coin_code: &str, currency_code: &str) -> Result<Option<Rate>> {
        let mut conn = get_connection(pool)?;
        rate::table
            .filter(rate::coin_code.eq(coin_code))
            .filter(rate::currency_code.eq(currency_code))
            .filter(rate::is_latest.eq(true))
            .select(RateDB::as_select())
            .first::<RateDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(Rate::try_from)
            .transpose()
    }

    fn load_historical(
        pool: &DbPool,
        coin_code: &str,
        currency_code: &str,
        timestamp: &DateTime<Utc>,
    ) -> Result<Option<Rate>> {
        let mut conn = get_connection(pool)?;
        rate::table
            .filter(rate::coin_code.eq(coin_code))
            .filter(rate::currency_code.eq(currency_code))
            .filter(rate::date.eq(timestamp_to_date(timestamp)))
            .filter(rate::is_latest.eq(false))
            .select(RateDB::as_select())
            .first::<RateDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(Rate::try_from)
            .transpose()
    }

    /// Historical rows whose value is exactly zero. The text column is parsed
    /// here rather than compared in SQL so that `0.00` and `0E-8` also match.
    fn load_zero_value_historical(pool: &DbPool, currency_code: &str) -> Result<Vec<Rate>> {
        let mut conn = get_connection(pool)?;
        let rows = rate::table
            .filter(rate::currency_code.eq(currency_code))
            .filter(rate::is_latest.eq(false))
            .order_by((rate::coin_code.asc(), rate::date.asc()))
            .select(RateDB::as_select())
            .load::<RateDB>(&mut conn)
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .filter(|row| parse_value(&row.value).is_some_and(|v| v.is_zero()))
            .filter_map(|row| match Rate::try_from(row) {
                Ok(rate) => Some(rate),
                Err(e) => {
                    warn!("Skipping undecodable rate row: {}", e);
                    None
                }
            })
            .collect())
    }

    fn load_rates(pool: &DbPool, coin_code: &str, currency_code: &str) -> Result<Vec<Rate>> {
        let mut conn = get_connection(pool)?;
        rate::table
            .filter(rate::coin_code.eq(coin_code))
            .filter(rate::currency_code.eq(currency_code))
            .order_by((rate::date.desc(), rate::is_latest.desc()))
            .select(RateDB::as_select())
            .load::<RateDB>(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(Rate::try_from)
            .collect()
    }
}

#[async_trait]
impl RateRepositoryTrait for RateRepository {
    fn get_latest_rate(&self, coin_code: &str, currency_code: &str) -> Result<Option<Rate>> {
        Self::load_latest(&self.pool, coin_code, currency_code)
    }

    fn get_historical_rate(
        &self,
        coin_code: &str,
        currency_code: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<Rate>> {
        Self::load_historical(&self.pool, coin_code, currency_code, &timestamp)
    }

    fn get_zero_value_historical_rates(&self, currency_code: &str) -> Result<Vec<Rate>> {
        Self::load_zero_value_historical(&self.pool, currency_code)
    }

    fn get_rates(&self, coin_code: &str, currency_code: &str) -> Result<Vec<Rate>> {
        Self::load_rates(&self.pool, coin_code, currency_code)
    }

    fn latest(&self, coin_code: &str, currency_code: &str) -> LiveQuery<Option<Rate>> {
        let pool = Arc::clone(&self.pool);
        let pair = PairKey::new(coin_code, currency_code);
        let key = pair.clone();
        self.bus.subscribe(Interest::RatePair(pair), move || {
            best_effort(
                "latest rate",
                Self::load_latest(&pool, &key.coin_code, &key.currency_code),
            )
        })
    }

    fn non_expired_latest(
        &self,
        coin_code: &str,
        currency_code: &str,
        max_age: Duration,
    ) -> LiveQuery<Option<Rate>> {
        let pool = Arc::clone(&self.pool);
        let pair = PairKey::new(coin_code, currency_code);
        let key = pair.clone();
        self.bus.subscribe(Interest::RatePair(pair), move || {
            let latest = best_effort(
                "non-expired latest rate",
                Self::load_latest(&pool, &key.coin_code, &key.currency_code),
            );
            Rate::non_expired(latest, max_age, Utc::now())
        })
    }

    fn historical(
        &self,
        coin_code: &str,
        currency_code: &str,
        timestamp: DateTime<Utc>,
    ) -> LiveQuery<Option<Rate>> {
        let pool = Arc::clone(&self.pool);
        let pair = PairKey::new(coin_code, currency_code);
        let key = pair.clone();
        self.bus.subscribe(Interest::RatePair(pair), move || {
            best_effort(
                "historical rate",
                Self::load_historical(&pool, &key.coin_code, &key.currency_code, &timestamp),
            )
        })
    }

    fn zero_value_historical(&self, currency_code: &str) -> LiveQuery<Vec<Rate>> {
        let pool = Arc::clone(&self.pool);
        let currency = currency_code.to_string();
        self.bus
            .subscribe(Interest::RateCurrency(currency.clone()), move || {
                best_effort(
                    "zero value historical rates",
                    Self::load_zero_value_historical(&pool, &currency),
                )
            })
    }

    async fn set_latest(&self, latest: Rate) -> Result<()> {
        ensure_storable(&latest)?;
        let latest = Rate {
            is_latest: true,
            ..latest
        };
        let changes = vec![TableChange::rate_pair(latest.pair())];

        self.writer
            .exec(changes, move |conn| {
                diesel::delete(
                    rate::table
                        .filter(rate::coin_code.eq(&latest.coin_code))
                        .filter(rate::currency_code.eq(&latest.currency_code))
                        .filter(rate::is_latest.eq(true)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;

                diesel::insert_into(rate::table)
                    .values(&RateDB::from(&latest))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn append(&self, observed: Rate) -> Result<()> {
        ensure_storable(&observed)?;
        let changes = vec![TableChange::rate_pair(observed.pair())];

        self.writer
            .exec(changes, move |conn| {
                diesel::replace_into(rate::table)
                    .values(&RateDB::from(&observed))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn clear_all(&self) -> Result<()> {
        self.writer
            .exec(vec![TableChange::AllRates], |conn| {
                diesel::delete(rate::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{self, TestDb};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    const WAIT: StdDuration = StdDuration::from_secs(5);

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn create_test_repository() -> (RateRepository, TestDb) {
        let db = testing::setup();
        let repo = RateRepository::new(db.pool.clone(), db.writer.clone(), db.bus.clone());
        (repo, db)
    }

    fn latest_rows(db: &TestDb, coin_code: &str, currency_code: &str) -> i64 {
        let mut conn = get_connection(&db.pool).unwrap();
        rate::table
            .filter(rate::coin_code.eq(coin_code))
            .filter(rate::currency_code.eq(currency_code))
            .filter(rate::is_latest.eq(true))
            .count()
            .get_result(&mut conn)
            .unwrap()
    }

    #[tokio::test]
    async fn test_set_latest_keeps_single_latest_row() {
        let (repo, db) = create_test_repository();

        for (secs, value) in [(100, dec!(6400)), (200, dec!(6500)), (150, dec!(6450))] {
            repo.set_latest(Rate::latest("BTC", "USD", value, at(secs)))
                .await
                .unwrap();
        }

        assert_eq!(latest_rows(&db, "BTC", "USD"), 1);
        assert_eq!(
            repo.get_latest_rate("BTC", "USD").unwrap(),
            Some(Rate::latest("BTC", "USD", dec!(6450), at(150)))
        );
    }

    #[tokio::test]
    async fn test_set_latest_forces_latest_flag_and_leaves_history() {
        let (repo, db) = create_test_repository();
        repo.append(Rate::historical("BTC", "USD", dec!(6000), at(50)))
            .await
            .unwrap();

        repo.set_latest(Rate::historical("BTC", "USD", dec!(6500), at(60)))
            .await
            .unwrap();

        let latest = repo.get_latest_rate("BTC", "USD").unwrap().unwrap();
        assert!(latest.is_latest);
        assert_eq!(latest_rows(&db, "BTC", "USD"), 1);
        assert_eq!(
            repo.get_historical_rate("BTC", "USD", at(50)).unwrap(),
            Some(Rate::historical("BTC", "USD", dec!(6000), at(50)))
        );
        assert_eq!(repo.get_rates("BTC", "USD").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_latest_is_scoped_to_pair() {
        let (repo, _db) = create_test_repository();
        repo.set_latest(Rate::latest("BTC", "USD", dec!(6500), at(10)))
            .await
            .unwrap();
        repo.set_latest(Rate::latest("BTC", "EUR", dec!(5700), at(10)))
            .await
            .unwrap();

        assert_eq!(
            repo.get_latest_rate("BTC", "EUR").unwrap().map(|r| r.value),
            Some(dec!(5700))
        );
        assert_eq!(repo.get_latest_rate("ETH", "USD").unwrap(), None);
    }

    #[tokio::test]
    async fn test_historical_lookup_requires_exact_timestamp_and_flag() {
        let (repo, _db) = create_test_repository();
        repo.append(Rate::historical("ETH", "USD", dec!(210), at(1_000)))
            .await
            .unwrap();
        repo.set_latest(Rate::latest("ETH", "USD", dec!(220), at(2_000)))
            .await
            .unwrap();

        assert!(repo.get_historical_rate("ETH", "USD", at(1_000)).unwrap().is_some());
        assert_eq!(repo.get_historical_rate("ETH", "USD", at(1_001)).unwrap(), None);
        // The latest row is not a historical observation.
        assert_eq!(repo.get_historical_rate("ETH", "USD", at(2_000)).unwrap(), None);
    }

    #[tokio::test]
    async fn test_append_replaces_same_key() {
        let (repo, _db) = create_test_repository();
        repo.append(Rate::historical("BTC", "USD", dec!(1), at(5)))
            .await
            .unwrap();
        repo.append(Rate::historical("BTC", "USD", dec!(2), at(5)))
            .await
            .unwrap();

        let rates = repo.get_rates("BTC", "USD").unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].value, dec!(2));
    }

    #[tokio::test]
    async fn test_zero_value_historical_filters_latest_and_non_zero() {
        let (repo, _db) = create_test_repository();
        let zero_btc = Rate::historical("BTC", "USD", Decimal::ZERO, at(1));
        let zero_eth = Rate::historical("ETH", "USD", dec!(0.00), at(2));
        repo.append(zero_btc.clone()).await.unwrap();
        repo.append(zero_eth.clone()).await.unwrap();
        repo.append(Rate::historical("BTC", "USD", dec!(6500), at(3)))
            .await
            .unwrap();
        repo.append(Rate::historical("BTC", "EUR", Decimal::ZERO, at(4)))
            .await
            .unwrap();
        repo.set_latest(Rate::latest("BCH", "USD", Decimal::ZERO, at(5)))
            .await
            .unwrap();

        let zero = repo.get_zero_value_historical_rates("USD").unwrap();
        assert_eq!(zero.len(), 2);
        assert!(zero.iter().all(|r| !r.is_latest && r.value.is_zero()));
        assert!(zero.iter().all(|r| r.currency_code == "USD"));
        assert!(zero.contains(&zero_btc));
        assert!(zero.iter().any(|r| r.coin_code == "ETH"));
    }

    #[tokio::test]
    async fn test_clear_all_removes_every_row() {
        let (repo, _db) = create_test_repository();
        repo.set_latest(Rate::latest("BTC", "USD", dec!(1), at(1)))
            .await
            .unwrap();
        repo.append(Rate::historical("BTC", "USD", dec!(1), at(0)))
            .await
            .unwrap();

        repo.clear_all().await.unwrap();

        assert!(repo.get_rates("BTC", "USD").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_live_query_tracks_writes() {
        let (repo, _db) = create_test_repository();
        let mut live = repo.latest("BTC", "USD");
        assert_eq!(live.next().await, Some(None));

        repo.set_latest(Rate::latest("BTC", "USD", dec!(6500), at(10)))
            .await
            .unwrap();
        let first = timeout(WAIT, live.wait_for(|r| r.is_some())).await.unwrap();
        assert_eq!(first.flatten().map(|r| r.value), Some(dec!(6500)));

        repo.set_latest(Rate::latest("BTC", "USD", dec!(6600), at(20)))
            .await
            .unwrap();
        let second = timeout(
            WAIT,
            live.wait_for(|r| r.as_ref().map(|r| r.value) == Some(dec!(6600))),
        )
        .await
        .unwrap();
        assert!(second.is_some());

        repo.clear_all().await.unwrap();
        let cleared = timeout(WAIT, live.wait_for(|r| r.is_none())).await.unwrap();
        assert_eq!(cleared, Some(None));
    }

    #[tokio::test]
    async fn test_non_expired_latest_hides_stale_quotes() {
        let (repo, _db) = create_test_repository();
        let max_age = Duration::minutes(10);
        let mut live = repo.non_expired_latest("ETH", "USD", max_age);
        assert_eq!(live.next().await, Some(None));

        let stale = Rate::latest("ETH", "USD", dec!(200), Utc::now() - Duration::hours(1));
        repo.set_latest(stale).await.unwrap();
        assert_eq!(repo.get_latest_rate("ETH", "USD").unwrap().map(|r| r.value), Some(dec!(200)));
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(live.current(), None);

        let fresh_at = Utc::now();
        repo.set_latest(Rate::latest("ETH", "USD", dec!(210), fresh_at))
            .await
            .unwrap();
        let fresh = timeout(WAIT, live.wait_for(|r| r.is_some())).await.unwrap();
        assert_eq!(fresh.flatten().map(|r| r.value), Some(dec!(210)));
    }

    #[tokio::test]
    async fn test_historical_live_query_sees_appended_row() {
        let (repo, _db) = create_test_repository();
        let mut live = repo.historical("BTC", "USD", at(3_600));
        assert_eq!(live.next().await, Some(None));

        repo.append(Rate::historical("BTC", "USD", dec!(6100), at(3_600)))
            .await
            .unwrap();

        let found = timeout(WAIT, live.wait_for(|r| r.is_some())).await.unwrap();
        assert_eq!(found.flatten().map(|r| r.value), Some(dec!(6100)));
    }

    #[tokio::test]
    async fn test_zero_value_live_query_refreshes_for_currency() {
        let (repo, _db) = create_test_repository();
        let mut live = repo.zero_value_historical("USD");
        assert_eq!(live.next().await, Some(Vec::new()));

        repo.append(Rate::historical("BTC", "USD", Decimal::ZERO, at(7)))
            .await
            .unwrap();

        let rows = timeout(WAIT, live.wait_for(|rows| rows.len() == 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rows[0].coin_code, "BTC");
    }

    #[tokio::test]
    async fn test_dropped_live_query_is_deregistered() {
        let (repo, db) = create_test_repository();
        let live = repo.latest("BTC", "USD");
        assert_eq!(db.bus.subscription_count(), 1);

        drop(live);
        assert_eq!(db.bus.subscription_count(), 0);

        repo.set_latest(Rate::latest("BTC", "USD", dec!(1), at(1)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_appends_within_one_millisecond_are_distinct_rows() {
        let (repo, _db) = create_test_repository();
        let t0 = Utc.timestamp_opt(1_700_000_000, 100_000).unwrap();
        let t1 = t0 + Duration::microseconds(300);

        repo.append(Rate::historical("BTC", "USD", dec!(6500), t0))
            .await
            .unwrap();
        repo.append(Rate::historical("BTC", "USD", dec!(6501), t1))
            .await
            .unwrap();

        assert_eq!(repo.get_rates("BTC", "USD").unwrap().len(), 2);
        assert_eq!(
            repo.get_historical_rate("BTC", "USD", t1).unwrap().map(|r| r.value),
            Some(dec!(6501))
        );
    }

    #[tokio::test]
    async fn test_latest_read_back_equals_written_rate() {
        let (repo, _db) = create_test_repository();
        let written = Rate::latest("BTC", "USD", dec!(6500.123), Utc::now());

        repo.set_latest(written.clone()).await.unwrap();

        assert_eq!(repo.get_latest_rate("BTC", "USD").unwrap(), Some(written));
    }

    #[tokio::test]
    async fn test_sub_microsecond_timestamp_is_rejected() {
        let (repo, _db) = create_test_repository();
        let rate = Rate {
            timestamp: Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap(),
            ..Rate::historical("BTC", "USD", dec!(1), at(0))
        };

        let err = repo.append(rate.clone()).await.unwrap_err();
        assert!(matches!(err, walletcache_core::errors::Error::Validation(_)));
        assert!(repo.set_latest(rate).await.is_err());
        assert!(repo.get_rates("BTC", "USD").unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_never_lose_rows() {
        let (repo, _db) = create_test_repository();

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.append(Rate::historical("BTC", "USD", Decimal::from(i), at(i)))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(repo.get_rates("BTC", "USD").unwrap().len(), 40);
    }
}
