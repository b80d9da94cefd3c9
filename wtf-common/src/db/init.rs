//! Database initialization
//!
//! Opens (creating if needed) the SQLite database, applies connection
//! pragmas on every pooled connection and creates the dial tables.
//! Safe to run against an existing database.

use crate::config::TomlConfig;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Current schema version
///
/// Increment when the table definitions below change.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Connection pool settings
#[derive(Debug, Clone, Copy)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl From<&TomlConfig> for DatabaseOptions {
    fn from(config: &TomlConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }
}

/// Initialize database connection with default options
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    init_database_with(db_path, DatabaseOptions::default()).await
}

/// Initialize database connection and create tables if needed
pub async fn init_database_with(db_path: &Path, options: DatabaseOptions) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas set here apply to every connection the pool opens.
    // WAL lets readers proceed while one writer holds the lock; the busy
    // timeout makes concurrent writers queue instead of failing.
    let connect_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(options.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(connect_options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema_version_table(&pool).await?;
    create_dials_table(&pool).await?;
    create_dial_memberships_table(&pool).await?;
    create_dial_values_table(&pool).await?;
    record_schema_version(&pool).await?;

    info!(
        "Database ready (max_connections={}, busy_timeout={} ms)",
        options.max_connections,
        options.busy_timeout.as_millis()
    );

    Ok(pool)
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the dials table
///
/// `value` caches the rounded mean of the dial's memberships.
async fn create_dials_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            value INTEGER NOT NULL DEFAULT 0,
            invite_code TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS dials_user_id_idx ON dials (user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the dial_memberships table
///
/// The composite primary key enforces one membership per (dial, user).
async fn create_dial_memberships_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dial_memberships (
            dial_id INTEGER NOT NULL REFERENCES dials (id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL,
            value INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (dial_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS dial_memberships_user_id_idx ON dial_memberships (user_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the dial_values history table
///
/// One row per dial per minute bucket.
async fn create_dial_values_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dial_values (
            dial_id INTEGER NOT NULL REFERENCES dials (id) ON DELETE CASCADE,
            "timestamp" TEXT NOT NULL,
            value INTEGER NOT NULL,
            PRIMARY KEY (dial_id, "timestamp")
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    let current: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await?;

    match current {
        Some(version) if version == CURRENT_SCHEMA_VERSION => {
            info!("Database schema is up to date (v{})", version);
        }
        Some(version) if version > CURRENT_SCHEMA_VERSION => {
            warn!(
                "Database schema version ({}) is newer than code version ({})",
                version, CURRENT_SCHEMA_VERSION
            );
        }
        _ => {
            sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
                .bind(CURRENT_SCHEMA_VERSION)
                .execute(pool)
                .await?;
            info!("Database schema initialized (v{})", CURRENT_SCHEMA_VERSION);
        }
    }

    Ok(())
}
