//! SQLite storage implementation for exchange rates.

mod model;
mod repository;

pub use model::RateDB;
pub use repository::RateRepository;

// Re-export trait from core for convenience
pub use walletcache_core::rates::RateRepositoryTrait;
