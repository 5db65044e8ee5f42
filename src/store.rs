use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};

/// Schema name the staging database is attached under.
pub const STAGING_SCHEMA: &str = "kbo_stg";

const BUSY_TIMEOUT: Duration = Duration::from_secs(60);

pub fn default_staging_path(db_path: &Path) -> PathBuf {
    let stem = db_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "kbo".to_string());
    db_path.with_file_name(format!("{stem}.staging.sqlite"))
}

/// Opens the final store read-write with the staging database attached.
pub fn open_store(db_path: &Path, staging_path: &Path) -> Result<Connection> {
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    attach_staging(&connection, staging_path)?;
    Ok(connection)
}

pub fn open_read_only(db_path: &Path) -> Result<Connection> {
    let connection = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database read-only: {}", db_path.display()))?;
    connection
        .busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    Ok(connection)
}

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign key enforcement")?;
    connection
        .busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    Ok(())
}

fn attach_staging(connection: &Connection, staging_path: &Path) -> Result<()> {
    let staging = staging_path.to_string_lossy();
    connection
        .execute(&format!("ATTACH DATABASE ?1 AS {STAGING_SCHEMA}"), [staging.as_ref()])
        .with_context(|| format!("failed to attach staging database {}", staging_path.display()))?;

    // In-memory staging has no journal to switch.
    if staging != ":memory:" {
        connection
            .pragma_update(
                Some(STAGING_SCHEMA),
                "journal_mode",
                "WAL",
            )
            .context("failed to set staging journal_mode=WAL")?;
    }
    Ok(())
}

pub fn count_rows(connection: &Connection, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    connection
        .query_row(&sql, [], |row| row.get(0))
        .with_context(|| format!("failed to count rows in {table}"))
}
