use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::store::STAGING_SCHEMA;
use crate::util::now_utc_string;

use super::staging::StagingJob;

pub(crate) const DB_SCHEMA_VERSION: &str = "1.0.0";

const FINAL_TABLES_SQL: &str = "
CREATE TABLE IF NOT EXISTS metadata (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS code (
  category TEXT NOT NULL,
  code TEXT NOT NULL,
  language TEXT NOT NULL,
  description TEXT NOT NULL,
  PRIMARY KEY (category, code, language)
);

CREATE TABLE IF NOT EXISTS enterprise (
  enterprise_number TEXT PRIMARY KEY,
  status TEXT NOT NULL,
  juridical_situation TEXT NOT NULL,
  type_of_enterprise TEXT NOT NULL,
  juridical_form TEXT NULL,
  juridical_form_cac TEXT NULL,
  start_date DATE NOT NULL
);

CREATE TABLE IF NOT EXISTS establishment (
  establishment_number TEXT PRIMARY KEY,
  start_date DATE NOT NULL,
  enterprise_number TEXT NOT NULL REFERENCES enterprise(enterprise_number)
);

CREATE TABLE IF NOT EXISTS branch (
  id TEXT PRIMARY KEY,
  start_date DATE NOT NULL,
  enterprise_number TEXT NOT NULL REFERENCES enterprise(enterprise_number)
);

CREATE TABLE IF NOT EXISTS denomination (
  entity_number TEXT NOT NULL,
  language TEXT NOT NULL,
  type_of_denomination TEXT NOT NULL,
  denomination TEXT NOT NULL,
  PRIMARY KEY (entity_number, language, type_of_denomination, denomination)
);

CREATE TABLE IF NOT EXISTS address (
  entity_number TEXT NOT NULL,
  type_of_address TEXT NOT NULL,
  country_nl TEXT NULL,
  country_fr TEXT NULL,
  zipcode TEXT NULL,
  municipality_nl TEXT NULL,
  municipality_fr TEXT NULL,
  street_nl TEXT NULL,
  street_fr TEXT NULL,
  house_number TEXT NULL,
  box TEXT NULL,
  extra_address_info TEXT NULL,
  date_striking_off DATE NULL
);

CREATE TABLE IF NOT EXISTS contact (
  entity_number TEXT NOT NULL,
  entity_contact TEXT NOT NULL,
  contact_type TEXT NOT NULL,
  value TEXT NOT NULL,
  PRIMARY KEY (entity_number, entity_contact, contact_type, value)
);

CREATE TABLE IF NOT EXISTS activity (
  entity_number TEXT NOT NULL,
  activity_group TEXT NOT NULL,
  nace_version INTEGER NOT NULL,
  nace_code TEXT NOT NULL,
  classification TEXT NOT NULL,
  PRIMARY KEY (entity_number, activity_group, nace_version, nace_code, classification)
);

CREATE TABLE IF NOT EXISTS extract_meta (
  variable TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
";

const FINAL_INDEXES_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_establishment_enterprise ON establishment(enterprise_number);
CREATE INDEX IF NOT EXISTS idx_branch_enterprise ON branch(enterprise_number);
CREATE INDEX IF NOT EXISTS idx_address_entity ON address(entity_number);
CREATE INDEX IF NOT EXISTS idx_activity_entity ON activity(entity_number);
CREATE INDEX IF NOT EXISTS idx_activity_nace ON activity(nace_version, nace_code);
CREATE INDEX IF NOT EXISTS idx_code_code ON code(code);
";

pub(crate) fn create_final_tables(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(FINAL_TABLES_SQL)
        .context("failed to create final tables")?;
    connection
        .execute_batch(FINAL_INDEXES_SQL)
        .context("failed to create final indexes")?;
    Ok(())
}

/// Creates every final and staging table and index, then relaxes legacy
/// constraints. Safe to run on every start; never drops rows.
pub(crate) fn ensure_schema(connection: &mut Connection, jobs: &[StagingJob]) -> Result<()> {
    create_final_tables(connection)?;

    relax_juridical_form_not_null(connection)?;

    for job in jobs {
        connection
            .execute_batch(&staging_table_sql(job))
            .with_context(|| format!("failed to create staging table {}", job.table))?;
    }

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    info!(version = DB_SCHEMA_VERSION, "schema ready");
    Ok(())
}

fn staging_table_sql(job: &StagingJob) -> String {
    let columns = job
        .columns
        .iter()
        .map(|column| format!("  \"{column}\" TEXT"))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "CREATE TABLE IF NOT EXISTS {STAGING_SCHEMA}.{} (\n{columns}\n);",
        job.table
    )
}

fn column_is_not_null(connection: &Connection, table_name: &str, column_name: &str) -> Result<bool> {
    let pragma_sql = format!("PRAGMA main.table_info({table_name})");
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to inspect schema for table {table_name}"))?;

    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        let existing_name: String = row.get(1)?;
        if existing_name == column_name {
            let not_null: i64 = row.get(3)?;
            return Ok(not_null != 0);
        }
    }

    Ok(false)
}

/// Older stores declared `enterprise.juridical_form` NOT NULL. SQLite cannot
/// drop a column constraint, so the table is rebuilt with its rows intact.
fn relax_juridical_form_not_null(connection: &mut Connection) -> Result<()> {
    if !column_is_not_null(connection, "enterprise", "juridical_form")? {
        return Ok(());
    }

    warn!("enterprise.juridical_form is NOT NULL; rebuilding table to relax it");

    // foreign_keys cannot change inside a transaction.
    connection
        .pragma_update(None, "foreign_keys", "OFF")
        .context("failed to suspend foreign keys for table rebuild")?;

    let rebuilt = rebuild_enterprise_table(connection);

    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to restore foreign keys after table rebuild")?;

    rebuilt
}

fn rebuild_enterprise_table(connection: &mut Connection) -> Result<()> {
    let tx = connection.transaction()?;
    tx.execute_batch(
        "
        CREATE TABLE main.enterprise_relaxed (
          enterprise_number TEXT PRIMARY KEY,
          status TEXT NOT NULL,
          juridical_situation TEXT NOT NULL,
          type_of_enterprise TEXT NOT NULL,
          juridical_form TEXT NULL,
          juridical_form_cac TEXT NULL,
          start_date DATE NOT NULL
        );
        INSERT INTO main.enterprise_relaxed(
          enterprise_number, status, juridical_situation, type_of_enterprise,
          juridical_form, juridical_form_cac, start_date
        )
        SELECT
          enterprise_number, status, juridical_situation, type_of_enterprise,
          juridical_form, juridical_form_cac, start_date
        FROM main.enterprise;
        DROP TABLE main.enterprise;
        ALTER TABLE main.enterprise_relaxed RENAME TO enterprise;
        ",
    )
    .context("failed to rebuild enterprise table")?;

    let mut violations = 0_usize;
    {
        let mut statement = tx.prepare("PRAGMA main.foreign_key_check")?;
        let mut rows = statement.query([])?;
        while rows.next()?.is_some() {
            violations += 1;
        }
    }
    if violations > 0 {
        bail!("enterprise rebuild left {violations} dangling foreign keys");
    }

    tx.commit()?;
    Ok(())
}
