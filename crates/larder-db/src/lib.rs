//! SQLite access layer for larder.
//!
//! All queries live here, grouped by area: [`inventory`] (ingredients,
//! recipes, menu catalog), [`ledger`] (goods-inward receipts and manual
//! adjustments), and [`orders`] (synced orders, deduction audit rows, and
//! the sync watermark). Callers hold a [`SqlitePool`]; anything that must be
//! atomic with other writes takes a `&mut SqliteConnection` so it can run
//! inside a caller-owned transaction.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub mod inventory;
pub mod ledger;
pub mod orders;

/// Connect to SQLite, creating the database file if it does not exist.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid sqlite url {url}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await
        .context("failed to connect to sqlite")?;

    Ok(pool)
}

/// In-memory database on a single connection.
///
/// The pool is capped at one connection: every `:memory:` connection is its
/// own database, so a larger pool would hand out empty databases.
pub async fn connect_memory() -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .context("invalid in-memory sqlite url")?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .context("failed to open in-memory sqlite")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &SqlitePool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (i32,) = sqlx::query_as::<_, (i32,)>(
        r#"
        select exists (
            select 1 from sqlite_master
            where type = 'table' and name = 'orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_orders_table: exists == 1,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

/// Detect a SQLite unique-constraint violation.
///
/// The orders idempotency gate relies on this: two overlapping syncs racing
/// on the same external order id must surface as a rejected insert, not a
/// silent duplicate.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            // SQLITE_CONSTRAINT_UNIQUE = 2067, SQLITE_CONSTRAINT_PRIMARYKEY = 1555.
            matches!(db_err.code().as_deref(), Some("2067") | Some("1555"))
                || db_err.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}
