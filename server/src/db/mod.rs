//! Database pool and migrations

use std::time::Duration;

use anyhow::{Context, Result};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

/// Applies per-connection PRAGMAs on every pool checkout
#[derive(Debug, Clone)]
struct SqlitePragmas {
    busy_timeout_ms: u64,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        // Participants, splits and KYC rows cascade from their transaction
        sql_query("PRAGMA foreign_keys = ON;")
            .execute(conn)
            .map_err(r2d2::Error::QueryError)?;

        // Wait for the writer lock instead of failing with SQLITE_BUSY
        sql_query(format!("PRAGMA busy_timeout = {};", self.busy_timeout_ms))
            .execute(conn)
            .map_err(r2d2::Error::QueryError)?;

        sql_query("PRAGMA synchronous = NORMAL;")
            .execute(conn)
            .map_err(r2d2::Error::QueryError)?;

        Ok(())
    }
}

/// Create the SQLite connection pool
///
/// # Arguments
/// * `database_url` - Path to the SQLite database file (or `:memory:`)
/// * `pool_size` - Maximum number of pooled connections
/// * `busy_timeout_ms` - How long a connection waits on a locked database
pub fn create_pool(database_url: &str, pool_size: u32, busy_timeout_ms: u64) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);

    r2d2::Pool::builder()
        .max_size(pool_size)
        .connection_timeout(Duration::from_secs(30))
        .connection_customizer(Box::new(SqlitePragmas { busy_timeout_ms }))
        .build(manager)
        .context("Failed to create database connection pool")
}

/// Apply all pending embedded migrations
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    for version in applied {
        tracing::info!(%version, "Applied migration");
    }
    Ok(())
}

/// Single in-memory connection with the schema applied, for tests and tools
pub fn establish_in_memory() -> Result<SqliteConnection> {
    let mut conn =
        SqliteConnection::establish(":memory:").context("Failed to open in-memory database")?;
    sql_query("PRAGMA foreign_keys = ON;")
        .execute(&mut conn)
        .context("Failed to enable foreign keys")?;
    run_migrations(&mut conn)?;
    Ok(conn)
}

/// In-memory pool with the schema applied. Capped at one connection since
/// every `:memory:` connection is a separate database.
pub fn in_memory_pool() -> Result<DbPool> {
    let pool = create_pool(":memory:", 1, 5_000)?;
    let mut conn = pool.get().context("Failed to get DB connection")?;
    run_migrations(&mut conn)?;
    Ok(pool)
}
