//! Wallet cache core - domain entities, repository traits and live queries.
//!
//! This crate is database-agnostic. It defines the exchange rate and enabled
//! coin models, the repository traits implemented by the `storage-sqlite`
//! crate, and the [`live::LiveQueryBus`] that turns committed writes into
//! fresh snapshots for subscribers.

pub mod coins;
pub mod config;
pub mod constants;
pub mod errors;
pub mod live;
pub mod rates;

pub use coins::{Coin, CoinType, StoredCoin};
pub use config::StorageConfig;
pub use live::{LiveQuery, LiveQueryBus};
pub use rates::Rate;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
