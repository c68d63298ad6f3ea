//! # Connection Pool and Client
//!
//! Pool creation and configuration for SQLite, wrapped in the cheap,
//! cloneable [`DbClient`] handle every repository holds.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  Process startup                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(url) / from_env() / in_memory()                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbClient::new(config).await                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                          │                                      │
//! │       ▼                          ▼                                      │
//! │  statement without tx       run_transaction                            │
//! │  (borrows a conn per call)  (holds one conn until commit/rollback)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## In-Memory Databases
//! Every SQLite connection to `:memory:` opens its own private database, so
//! [`DbConfig::in_memory`] pins the pool to a single connection. Code running
//! inside a transaction must then use the transaction's context for every
//! statement: a pool-routed statement would wait for the connection the
//! transaction is holding.

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::stats::{ClientStats, StatsSnapshot};

/// Connection string used by [`DbConfig::in_memory`].
pub const IN_MEMORY_URL: &str = "sqlite::memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("sqlite://data/app.db")
///     .max_connections(8)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// sqlx connection string (`sqlite://path/to.db`, `sqlite::memory:`).
    pub url: String,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Enforce `FOREIGN KEY` constraints.
    /// Default: true
    pub foreign_keys: bool,
}

impl DbConfig {
    /// Creates a configuration for the given connection string.
    ///
    /// File databases are created if they don't exist.
    pub fn new(url: impl Into<String>) -> Self {
        DbConfig {
            url: url.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            foreign_keys: true,
        }
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let client = DbClient::new(DbConfig::in_memory()).await?;
    /// // Database is isolated and gone when the client closes
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            url: IN_MEMORY_URL.to_string(),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            foreign_keys: true,
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// | Variable                  | Required | Default |
    /// |---------------------------|----------|---------|
    /// | `DATABASE_URL`            | yes      |         |
    /// | `DB_MAX_CONNECTIONS`      | no       | 5       |
    /// | `DB_MIN_CONNECTIONS`      | no       | 1       |
    /// | `DB_CONNECT_TIMEOUT_SECS` | no       | 30      |
    pub fn from_env() -> DbResult<Self> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| DbError::Config("DATABASE_URL is not set".to_string()))?;

        let mut config = DbConfig::new(url);
        if let Some(max) = env_number::<u32>("DB_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(min) = env_number::<u32>("DB_MIN_CONNECTIONS")? {
            config.min_connections = min;
        }
        if let Some(secs) = env_number::<u64>("DB_CONNECT_TIMEOUT_SECS")? {
            config.connect_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets whether foreign keys are enforced.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Whether this configuration points at a private in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

fn env_number<N: FromStr>(name: &str) -> DbResult<Option<N>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<N>()
            .map(Some)
            .map_err(|_| DbError::Config(format!("{name} must be a number, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}

// =============================================================================
// Client
// =============================================================================

/// Shared database handle: the pool plus execution counters.
///
/// Cloning is cheap; every clone talks to the same pool.
#[derive(Debug, Clone)]
pub struct DbClient {
    pool: SqlitePool,
    stats: Arc<ClientStats>,
}

impl DbClient {
    /// Creates a new connection pool.
    ///
    /// ## What This Does
    /// 1. Parses the connection string
    /// 2. Configures SQLite:
    ///    - WAL mode for file databases
    ///    - NORMAL synchronous
    ///    - Foreign keys per config
    /// 3. Creates the connection pool
    ///
    /// ## Returns
    /// * `Ok(DbClient)` - Ready-to-use client
    /// * `Err(DbError::ConnectionFailed)` - Bad URL or unreachable database
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(url = %config.url, "Initializing database connection");

        let mut connect_options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(config.foreign_keys)
            .create_if_missing(true);

        if !config.is_in_memory() {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        Ok(DbClient {
            pool,
            stats: Arc::new(ClientStats::default()),
        })
    }

    /// Connects with default settings for the given connection string.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let client = DbClient::connect("sqlite://data/app.db").await?;
    /// ```
    pub async fn connect(url: &str) -> DbResult<Self> {
        let config = DbConfig::new(url);
        let config = if config.is_in_memory() {
            DbConfig {
                url: config.url,
                ..DbConfig::in_memory()
            }
        } else {
            config
        };
        Self::new(config).await
    }

    /// Returns a reference to the connection pool.
    ///
    /// For schema setup and one-off statements. Statements issued here bypass
    /// the ambient transaction and the statement counter.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool.
    ///
    /// After calling close, every operation fails with
    /// `DbError::ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Runs `SELECT 1`, surfacing the failure.
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        match self.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                false
            }
        }
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Statements run through repositories since the client was created.
    pub fn statements_executed(&self) -> u64 {
        self.stats.snapshot().statements
    }

    pub(crate) fn counters(&self) -> &ClientStats {
        &self.stats
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_client() {
        let client = DbClient::new(DbConfig::in_memory()).await.unwrap();

        assert!(client.health_check().await);
        assert_eq!(client.statements_executed(), 0);
    }

    #[tokio::test]
    async fn test_connect_in_memory_url() {
        let client = DbClient::connect(IN_MEMORY_URL).await.unwrap();
        assert!(client.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_keeps_in_memory_url() {
        let client = DbClient::connect("sqlite:breeze_connect?mode=memory")
            .await
            .unwrap();

        assert_eq!(client.pool().options().get_max_connections(), 1);
        assert_eq!(
            client.pool().connect_options().get_filename(),
            std::path::Path::new("breeze_connect")
        );
        assert!(client.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_client_fails() {
        let client = DbClient::new(DbConfig::in_memory()).await.unwrap();
        client.close().await;

        assert!(!client.health_check().await);
        assert!(matches!(
            client.ping().await,
            Err(DbError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_url_fails() {
        let result = DbClient::connect("sqlite:///missing-dir/nested/app.db").await;
        assert!(matches!(result, Err(DbError::ConnectionFailed(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("sqlite://app.db")
            .max_connections(10)
            .min_connections(2)
            .foreign_keys(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.foreign_keys);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }
}
