//! SQLite storage for the wallet cache.
//!
//! This crate implements the repository traits defined in `walletcache-core`
//! with Diesel over SQLite and contains:
//! - Connection pooling and the single writer actor
//! - Embedded, versioned schema migrations
//! - The exchange rate and enabled coin repositories
//! - Database-specific model types (with Diesel derives)
//!
//! ```text
//!   walletcache-core (models, traits, live queries)
//!                  │
//!                  ▼
//!   walletcache-storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```
//!
//! Most callers only need [`WalletStorage`].

pub mod db;
pub mod errors;
pub mod schema;

pub mod coins;
pub mod rates;
mod storage;

pub use storage::WalletStorage;

// Re-export database utilities
pub use db::{
    applied_migrations, create_pool, get_connection, get_db_path, has_pending_migrations, init,
    run_migrations, DbConnection, DbPool, WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from walletcache-core for convenience
pub use walletcache_core::errors::{DatabaseError, Error, Result};
