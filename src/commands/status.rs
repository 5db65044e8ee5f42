use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::ingest::sanity_counts;
use crate::store::open_read_only;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();

    info!(cache_root = %args.store.cache_root.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database missing");
        return Ok(());
    }

    let connection = open_read_only(&db_path)?;
    let schema_version = metadata_value(&connection, "db_schema_version")?;
    let updated_at = metadata_value(&connection, "db_updated_at")?;
    info!(
        path = %db_path.display(),
        schema_version = %schema_version.unwrap_or_default(),
        updated_at = %updated_at.unwrap_or_default(),
        "database status"
    );

    let counts = sanity_counts(&connection)?;
    info!(
        enterprises = counts.enterprises,
        establishments = counts.establishments,
        addresses = counts.addresses,
        contacts = counts.contacts,
        activities = counts.activities,
        "row counts"
    );

    let mut statement = connection
        .prepare("SELECT variable, value FROM extract_meta ORDER BY variable")
        .context("failed to read extract metadata")?;
    let rows = statement
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if rows.is_empty() {
        warn!("no extract metadata loaded");
    }
    for (variable, value) in rows {
        info!(variable = %variable, value = %value, "extract metadata");
    }

    Ok(())
}

fn metadata_value(connection: &Connection, key: &str) -> Result<Option<String>> {
    connection
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("failed to read metadata key {key}"))
}
