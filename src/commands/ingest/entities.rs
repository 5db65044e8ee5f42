//! Declarative description of every final table the transform writes.
//!
//! Each [`EntityTable`] names its natural key and conflict policy; the SQL
//! used to write it is derived from that description by [`write_entity_rows`]
//! so conflict targets always agree with the column list.

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, ffi, params_from_iter};
use tracing::debug;

use crate::error::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConflictPolicy {
    /// Upsert on the key, overwriting every non-key column.
    Overwrite,
    /// Keep the first row written for a key; later duplicates are dropped.
    InsertMissing,
    /// Delete every existing row for the keys being loaded, then insert.
    ReplaceAll,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Reference {
    pub column: &'static str,
    pub entity: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EntityTable {
    pub entity: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub key: &'static [&'static str],
    pub policy: ConflictPolicy,
    pub reference: Option<Reference>,
}

pub(crate) const CODE: EntityTable = EntityTable {
    entity: "code",
    table: "code",
    columns: &["category", "code", "language", "description"],
    key: &["category", "code", "language"],
    policy: ConflictPolicy::Overwrite,
    reference: None,
};

pub(crate) const ENTERPRISE: EntityTable = EntityTable {
    entity: "enterprise",
    table: "enterprise",
    columns: &[
        "enterprise_number",
        "status",
        "juridical_situation",
        "type_of_enterprise",
        "juridical_form",
        "juridical_form_cac",
        "start_date",
    ],
    key: &["enterprise_number"],
    policy: ConflictPolicy::Overwrite,
    reference: None,
};

pub(crate) const ESTABLISHMENT: EntityTable = EntityTable {
    entity: "establishment",
    table: "establishment",
    columns: &["establishment_number", "start_date", "enterprise_number"],
    key: &["establishment_number"],
    policy: ConflictPolicy::Overwrite,
    reference: Some(Reference {
        column: "enterprise_number",
        entity: "enterprise",
    }),
};

pub(crate) const BRANCH: EntityTable = EntityTable {
    entity: "branch",
    table: "branch",
    columns: &["id", "start_date", "enterprise_number"],
    key: &["id"],
    policy: ConflictPolicy::Overwrite,
    reference: Some(Reference {
        column: "enterprise_number",
        entity: "enterprise",
    }),
};

pub(crate) const DENOMINATION: EntityTable = EntityTable {
    entity: "denomination",
    table: "denomination",
    columns: &[
        "entity_number",
        "language",
        "type_of_denomination",
        "denomination",
    ],
    key: &[
        "entity_number",
        "language",
        "type_of_denomination",
        "denomination",
    ],
    policy: ConflictPolicy::InsertMissing,
    reference: None,
};

pub(crate) const ADDRESS: EntityTable = EntityTable {
    entity: "address",
    table: "address",
    columns: &[
        "entity_number",
        "type_of_address",
        "country_nl",
        "country_fr",
        "zipcode",
        "municipality_nl",
        "municipality_fr",
        "street_nl",
        "street_fr",
        "house_number",
        "box",
        "extra_address_info",
        "date_striking_off",
    ],
    key: &["entity_number"],
    policy: ConflictPolicy::ReplaceAll,
    reference: None,
};

pub(crate) const CONTACT: EntityTable = EntityTable {
    entity: "contact",
    table: "contact",
    columns: &["entity_number", "entity_contact", "contact_type", "value"],
    key: &["entity_number", "entity_contact", "contact_type", "value"],
    policy: ConflictPolicy::InsertMissing,
    reference: None,
};

pub(crate) const ACTIVITY: EntityTable = EntityTable {
    entity: "activity",
    table: "activity",
    columns: &[
        "entity_number",
        "activity_group",
        "nace_version",
        "nace_code",
        "classification",
    ],
    key: &[
        "entity_number",
        "activity_group",
        "nace_version",
        "nace_code",
        "classification",
    ],
    policy: ConflictPolicy::InsertMissing,
    reference: None,
};

pub(crate) const EXTRACT_META: EntityTable = EntityTable {
    entity: "extract meta",
    table: "extract_meta",
    columns: &["variable", "value"],
    key: &["variable"],
    policy: ConflictPolicy::Overwrite,
    reference: None,
};

impl EntityTable {
    pub(crate) fn insert_sql(&self) -> String {
        let columns = self.columns.join(", ");
        let placeholders = (1..=self.columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT INTO {}({columns}) VALUES({placeholders})",
            self.table
        );

        match self.policy {
            ConflictPolicy::Overwrite => {
                let updates = self
                    .columns
                    .iter()
                    .filter(|column| !self.key.contains(column))
                    .map(|column| format!("{column}=excluded.{column}"))
                    .collect::<Vec<_>>();
                if updates.is_empty() {
                    format!("{insert} ON CONFLICT({}) DO NOTHING", self.key.join(", "))
                } else {
                    format!(
                        "{insert} ON CONFLICT({}) DO UPDATE SET {}",
                        self.key.join(", "),
                        updates.join(", ")
                    )
                }
            }
            ConflictPolicy::InsertMissing => {
                format!("{insert} ON CONFLICT({}) DO NOTHING", self.key.join(", "))
            }
            ConflictPolicy::ReplaceAll => insert,
        }
    }

    /// Deletes the rows about to be replaced. `source_sql` must select the
    /// key columns under their final names.
    fn replace_scope_sql(&self, source_sql: &str) -> String {
        let key = self.key.join(", ");
        format!(
            "DELETE FROM {table} WHERE ({key}) IN (SELECT {key} FROM ({source_sql}))",
            table = self.table
        )
    }

    fn column_value<'v>(&self, values: &'v [Value], column: &str) -> Option<&'v Value> {
        self.columns
            .iter()
            .position(|candidate| *candidate == column)
            .and_then(|index| values.get(index))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WriteOutcome {
    pub rows_read: u64,
    pub rows_written: u64,
}

/// Streams `source_sql` through `convert` into `target` under its conflict
/// policy. The first failing row aborts the step; the caller owns the
/// transaction and decides what that rolls back.
pub(crate) fn write_entity_rows<F>(
    connection: &Connection,
    target: &EntityTable,
    source_sql: &str,
    convert: F,
) -> Result<WriteOutcome>
where
    F: Fn(&Row<'_>) -> Result<Vec<Value>>,
{
    if target.policy == ConflictPolicy::ReplaceAll {
        let removed = connection
            .execute(&target.replace_scope_sql(source_sql), [])
            .with_context(|| format!("failed to clear {} rows being reloaded", target.entity))?;
        debug!(entity = target.entity, removed, "cleared rows before reload");
    }

    let mut insert = connection
        .prepare(&target.insert_sql())
        .with_context(|| format!("failed to prepare {} write", target.entity))?;
    let mut select = connection
        .prepare(source_sql)
        .with_context(|| format!("failed to prepare {} staging read", target.entity))?;

    let mut outcome = WriteOutcome::default();
    let mut rows = select.query([])?;
    while let Some(row) = rows.next()? {
        outcome.rows_read += 1;
        let values = convert(row)?;
        let changed = insert
            .execute(params_from_iter(values.iter()))
            .map_err(|err| write_error(target, &values, err))?;
        outcome.rows_written += changed as u64;
    }

    Ok(outcome)
}

fn write_error(target: &EntityTable, values: &[Value], err: rusqlite::Error) -> anyhow::Error {
    let key = values.first().map(value_text).unwrap_or_default();

    if let (Some(reference), rusqlite::Error::SqliteFailure(failure, _)) = (target.reference, &err) {
        if failure.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
            let referenced = target
                .column_value(values, reference.column)
                .map(value_text)
                .unwrap_or_default();
            return RegistryError::Referential {
                entity: target.entity,
                key,
                referenced: format!("{} {referenced}", reference.entity),
            }
            .into();
        }
    }

    anyhow::Error::new(err).context(format!("failed to write {} {key}", target.entity))
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => text.clone(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
