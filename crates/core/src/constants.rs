/// Database file created inside the application data directory
pub const DEFAULT_DB_FILE_NAME: &str = "wallet.sqlite";

/// Maximum number of pooled reader connections
pub const DEFAULT_POOL_MAX_SIZE: u32 = 8;

/// Seconds to wait for a pooled connection
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// SQLite busy timeout applied to every connection
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 30_000;

/// Capacity of the writer actor's job queue
pub const DEFAULT_WRITER_QUEUE_CAPACITY: usize = 1024;

/// Directory created under the per-user data directory
pub const APP_DIR_NAME: &str = "walletcache";

/// The writer actor keeps one pooled connection for its lifetime, so reads
/// need at least one more.
pub const MIN_POOL_SIZE: u32 = 2;

/// Fractional second digits kept for rate timestamps (microseconds)
pub const TIMESTAMP_SUBSEC_DIGITS: u16 = 6;
