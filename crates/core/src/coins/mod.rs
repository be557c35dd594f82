//! Enabled coins module - domain model and repository trait.

mod coins_model;
mod coins_traits;

pub use coins_model::{Coin, CoinType, StoredCoin};
pub use coins_traits::CoinRepositoryTrait;
