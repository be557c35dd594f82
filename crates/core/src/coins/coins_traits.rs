use super::coins_model::{Coin, StoredCoin};
use crate::errors::Result;
use crate::live::LiveQuery;
use async_trait::async_trait;

/// Trait defining the contract for the enabled coin list.
#[async_trait]
pub trait CoinRepositoryTrait: Send + Sync {
    /// Enabled coins in display order.
    fn get_enabled_coins(&self) -> Result<Vec<Coin>>;
    fn get_all_coins(&self) -> Result<Vec<StoredCoin>>;

    fn enabled_coins(&self) -> LiveQuery<Vec<Coin>>;

    /// Replaces the whole enabled set. The input order becomes the display
    /// order; coins missing from `coins` end up disabled.
    async fn replace_enabled_coins(&self, coins: Vec<Coin>) -> Result<()>;
    async fn clear_all(&self) -> Result<()>;
}
