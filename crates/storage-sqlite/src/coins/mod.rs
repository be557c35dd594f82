//! SQLite storage implementation for the enabled coin list.

mod model;
mod repository;

pub use model::EnabledCoinDB;
pub use repository::CoinRepository;

// Re-export trait from core for convenience
pub use walletcache_core::coins::CoinRepositoryTrait;
