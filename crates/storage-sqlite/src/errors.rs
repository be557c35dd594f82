//! Storage-specific error types for SQLite operations.
//!
//! This module provides error types that wrap Diesel-specific errors and convert
//! them to the database-agnostic error types defined in `walletcache_core`.

use diesel::result::Error as DieselError;
use thiserror::Error;
use walletcache_core::errors::{DatabaseError, Error};

/// Storage-specific errors that wrap Diesel and r2d2 types.
///
/// These errors are internal to the storage layer and are converted to
/// `walletcache_core::Error` before being returned to callers.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error(transparent)]
    Core(Error),
}

/// Convert core Error to StorageError (for write_actor transaction wrapper)
impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::Core(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            // r2d2 only errors at runtime when no connection frees up in time.
            StorageError::PoolError(e) => Error::Database(DatabaseError::ConnectionFailed(
                format!("no pooled connection available: {}", e),
            )),
            StorageError::QueryFailed(DieselError::NotFound) => {
                Error::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            StorageError::QueryFailed(DieselError::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            )) => Error::Database(DatabaseError::UniqueViolation(info.message().to_string())),
            StorageError::QueryFailed(DieselError::RollbackTransaction) => Error::Database(
                DatabaseError::TransactionFailed("transaction rolled back".to_string()),
            ),
            StorageError::QueryFailed(e) => {
                Error::Database(DatabaseError::QueryFailed(e.to_string()))
            }
            StorageError::MigrationFailed(e) => Error::Database(DatabaseError::MigrationFailed(e)),
            // Errors raised by a write job pass through untouched.
            StorageError::Core(e) => e,
        }
    }
}

/// Extension trait for easily converting Diesel Results to core Results.
///
/// This provides a `.into_core()` method on any `Result<T, diesel::result::Error>`
/// which handles the conversion through StorageError.
pub trait IntoCore<T> {
    fn into_core(self) -> walletcache_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, DieselError> {
    fn into_core(self) -> walletcache_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, r2d2::Error> {
    fn into_core(self) -> walletcache_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, diesel::ConnectionError> {
    fn into_core(self) -> walletcache_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_core_not_found() {
        let err: Error = StorageError::QueryFailed(DieselError::NotFound).into();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
    }

    #[test]
    fn test_migration_failure_is_not_transient() {
        let err: Error = StorageError::MigrationFailed("table rate already exists".into()).into();
        assert!(matches!(err, Error::Database(DatabaseError::MigrationFailed(_))));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_core_error_survives_round_trip() {
        let original = Error::Validation(walletcache_core::errors::ValidationError::InvalidInput(
            "duplicate coin code".into(),
        ));
        let err: Error = StorageError::from(original).into();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_pool_checkout_failure_is_a_connection_failure() {
        use diesel::r2d2::{ConnectionManager, Pool};
        use diesel::SqliteConnection;

        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(std::time::Duration::from_millis(50))
            .build(ConnectionManager::<SqliteConnection>::new(":memory:"))
            .unwrap();
        let _held = pool.get().unwrap();

        let err = pool.get().map(|_| ()).into_core().unwrap_err();
        assert!(matches!(
            err,
            Error::Database(DatabaseError::ConnectionFailed(_))
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn test_query_failure_is_transient() {
        let err = Err::<(), _>(DieselError::BrokenTransactionManager).into_core();
        assert!(err.unwrap_err().is_transient());
    }
}
