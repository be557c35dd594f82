//! Connection pool, schema migrations and the single writer.

use log::{error, info};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use diesel::connection::{Connection, SimpleConnection};
use diesel::r2d2::{self, ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::errors::{IntoCore, StorageError};
use walletcache_core::config::StorageConfig;
use walletcache_core::errors::{DatabaseError, Error, Result};

pub(crate) const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

pub mod write_actor;
pub use write_actor::WriteHandle;

/// Ensures the database file's directory exists and switches the file to WAL
/// mode. Returns the database path.
pub fn init(config: &StorageConfig) -> Result<String> {
    let db_path = get_db_path(config);

    if let Some(db_dir) = Path::new(&db_path).parent() {
        if !db_dir.as_os_str().is_empty() && !db_dir.exists() {
            fs::create_dir_all(db_dir)?;
        }
    }

    let mut conn = SqliteConnection::establish(&db_path).into_core()?;
    conn.batch_execute(&format!(
        "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = {};
            PRAGMA synchronous  = NORMAL;
        ",
        config.busy_timeout_ms
    ))
    .into_core()?;

    Ok(db_path)
}

pub fn create_pool(db_path: &str, config: &StorageConfig) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = Pool::builder()
        .max_size(config.pool_max_size)
        .min_idle(Some(1)) // Keep at least one connection ready
        .connection_timeout(config.connection_timeout())
        .connection_customizer(Box::new(ConnectionCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)
        .map_err(|e| Error::Database(DatabaseError::PoolCreationFailed(e.to_string())))?;
    Ok(Arc::new(pool))
}

/// Applies every pending migration, each in its own transaction, and returns
/// the versions applied by this call.
pub fn run_migrations(pool: &DbPool) -> Result<Vec<String>> {
    info!("Running database migrations");
    let mut connection = get_connection(pool)?;

    let applied: Vec<String> = connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| {
            error!("Database migration failed: {}", e);
            Error::from(StorageError::MigrationFailed(e.to_string()))
        })?
        .iter()
        .map(|version| version.to_string())
        .collect();

    if applied.is_empty() {
        info!("No pending migrations to apply.");
    } else {
        info!("Applied the following migrations:");
        for migration_version in &applied {
            info!("  - {}", migration_version);
        }
    }

    Ok(applied)
}

/// Versions recorded in the migration ledger, oldest first.
pub fn applied_migrations(pool: &DbPool) -> Result<Vec<String>> {
    let mut connection = get_connection(pool)?;
    let mut versions: Vec<String> = connection
        .applied_migrations()
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))?
        .iter()
        .map(|version| version.to_string())
        .collect();
    versions.sort();
    Ok(versions)
}

pub fn has_pending_migrations(pool: &DbPool) -> Result<bool> {
    let mut connection = get_connection(pool)?;
    connection
        .has_pending_migration(MIGRATIONS)
        .map_err(|e| Error::Database(DatabaseError::QueryFailed(e.to_string())))
}

pub fn get_db_path(config: &StorageConfig) -> String {
    config.db_path().to_string_lossy().to_string()
}

/// Gets a connection from the pool
pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    pool.get().into_core()
}

#[derive(Debug)]
struct ConnectionCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "
            PRAGMA busy_timeout = {};
            PRAGMA synchronous = NORMAL;
        ",
            self.busy_timeout_ms
        ))
        .map_err(r2d2::Error::QueryError)?;

        Ok(())
    }
}
