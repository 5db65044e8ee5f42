use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use tracing::info;

use crate::error::RegistryError;
use crate::model::TransformStep;
use crate::util::{non_empty, parse_source_date};

use super::entities::{
    ACTIVITY, ADDRESS, BRANCH, CODE, CONTACT, DENOMINATION, ENTERPRISE, ESTABLISHMENT,
    EXTRACT_META, EntityTable, write_entity_rows,
};

type Convert = fn(&Row<'_>) -> Result<Vec<Value>>;

struct Step {
    name: &'static str,
    target: &'static EntityTable,
    source_sql: &'static str,
    convert: Convert,
}

// Empty keys count as absent: the extract encodes missing values as "".
const STEPS: &[Step] = &[
    Step {
        name: "code",
        target: &CODE,
        source_sql: r#"
            SELECT "Category" AS category, "Code" AS code, "Language" AS language,
                   "Description" AS description
            FROM kbo_stg.code
            WHERE NULLIF("Category", '') IS NOT NULL
        "#,
        convert: all_text,
    },
    Step {
        name: "code_nacebel_2025",
        target: &CODE,
        source_sql: r#"
            SELECT category, code, language, description FROM (
              SELECT 'NACEBEL_2025' AS category, "CODE" AS code, 'NL' AS language,
                     NULLIF("NATIONAL_TITLE_BE_NL", '') AS description
              FROM kbo_stg.nacebel2025
              UNION ALL
              SELECT 'NACEBEL_2025', "CODE", 'FR', NULLIF("NATIONAL_TITLE_BE_FR", '')
              FROM kbo_stg.nacebel2025
              UNION ALL
              SELECT 'NACEBEL_2025', "CODE", 'DE', NULLIF("NATIONAL_TITLE_BE_DE", '')
              FROM kbo_stg.nacebel2025
              UNION ALL
              SELECT 'NACEBEL_2025', "CODE", 'EN', NULLIF("NATIONAL_TITLE_BE_EN", '')
              FROM kbo_stg.nacebel2025
            )
            WHERE NULLIF(code, '') IS NOT NULL AND description IS NOT NULL
        "#,
        convert: all_text,
    },
    Step {
        name: "enterprise",
        target: &ENTERPRISE,
        source_sql: r#"
            SELECT "EnterpriseNumber" AS enterprise_number, "Status", "JuridicalSituation",
                   "TypeOfEnterprise", "JuridicalForm", "JuridicalFormCAC", "StartDate"
            FROM kbo_stg.enterprise
            WHERE NULLIF("EnterpriseNumber", '') IS NOT NULL
        "#,
        convert: enterprise_row,
    },
    Step {
        name: "establishment",
        target: &ESTABLISHMENT,
        source_sql: r#"
            SELECT "EstablishmentNumber" AS establishment_number, "StartDate", "EnterpriseNumber"
            FROM kbo_stg.establishment
            WHERE NULLIF("EstablishmentNumber", '') IS NOT NULL
        "#,
        convert: establishment_row,
    },
    Step {
        name: "branch",
        target: &BRANCH,
        source_sql: r#"
            SELECT "Id" AS id, "StartDate", "EnterpriseNumber"
            FROM kbo_stg.branch
            WHERE NULLIF("Id", '') IS NOT NULL
        "#,
        convert: branch_row,
    },
    Step {
        name: "denomination",
        target: &DENOMINATION,
        source_sql: r#"
            SELECT "EntityNumber" AS entity_number, "Language" AS language,
                   "TypeOfDenomination" AS type_of_denomination, "Denomination" AS denomination
            FROM kbo_stg.denomination
            WHERE NULLIF("EntityNumber", '') IS NOT NULL
        "#,
        convert: all_text,
    },
    Step {
        name: "address",
        target: &ADDRESS,
        source_sql: r#"
            SELECT "EntityNumber" AS entity_number, "TypeOfAddress", "CountryNL", "CountryFR",
                   "Zipcode", "MunicipalityNL", "MunicipalityFR", "StreetNL", "StreetFR",
                   "HouseNumber", "Box", "ExtraAddressInfo", "DateStrikingOff"
            FROM kbo_stg.address
            WHERE NULLIF("EntityNumber", '') IS NOT NULL
        "#,
        convert: address_row,
    },
    Step {
        name: "contact",
        target: &CONTACT,
        source_sql: r#"
            SELECT "EntityNumber" AS entity_number, "EntityContact" AS entity_contact,
                   "ContactType" AS contact_type, "Value" AS value
            FROM kbo_stg.contact
            WHERE NULLIF("EntityNumber", '') IS NOT NULL
        "#,
        convert: all_text,
    },
    Step {
        name: "activity",
        target: &ACTIVITY,
        source_sql: r#"
            SELECT "EntityNumber" AS entity_number, "ActivityGroup", "NaceVersion",
                   "NaceCode", "Classification"
            FROM kbo_stg.activity
            WHERE NULLIF("EntityNumber", '') IS NOT NULL
        "#,
        convert: activity_row,
    },
    Step {
        name: "extract_meta",
        target: &EXTRACT_META,
        source_sql: r#"
            SELECT "Variable" AS variable, "Value" AS value
            FROM kbo_stg.meta
            WHERE NULLIF("Variable", '') IS NOT NULL
        "#,
        convert: all_text,
    },
];

/// Writes every final table from staging, in foreign-key order, inside one
/// transaction. Nothing is committed unless all steps succeed.
pub(crate) fn transform(connection: &mut Connection) -> Result<Vec<TransformStep>> {
    let tx = connection.transaction()?;
    let mut report = Vec::with_capacity(STEPS.len());

    for step in STEPS {
        let outcome = write_entity_rows(&tx, step.target, step.source_sql, step.convert)
            .with_context(|| format!("transform step `{}` failed", step.name))?;
        info!(
            step = step.name,
            rows_read = outcome.rows_read,
            rows_written = outcome.rows_written,
            "transform step completed"
        );
        report.push(TransformStep {
            step: step.name.to_string(),
            rows_written: outcome.rows_written,
        });
    }

    tx.commit().context("failed to commit transform")?;
    Ok(report)
}

fn text(row: &Row<'_>, index: usize) -> Result<Option<String>> {
    Ok(row.get::<_, Option<String>>(index)?)
}

fn text_value(value: Option<String>) -> Value {
    value.map(Value::Text).unwrap_or(Value::Null)
}

fn all_text(row: &Row<'_>) -> Result<Vec<Value>> {
    (0..row.as_ref().column_count())
        .map(|index| text(row, index).map(text_value))
        .collect()
}

fn date_value(
    entity: &'static str,
    key: &str,
    column: &'static str,
    raw: Option<String>,
) -> Result<Value> {
    let raw = raw.unwrap_or_default();
    match parse_source_date(&raw) {
        Ok(date) => Ok(Value::Text(date.to_string())),
        Err(err) => Err(RegistryError::RowParse {
            entity,
            key: key.to_string(),
            column,
            value: raw,
            reason: err.to_string(),
        }
        .into()),
    }
}

fn enterprise_row(row: &Row<'_>) -> Result<Vec<Value>> {
    let key = text(row, 0)?.unwrap_or_default();
    let start_date = date_value("enterprise", &key, "StartDate", text(row, 6)?)?;
    Ok(vec![
        Value::Text(key),
        text_value(text(row, 1)?),
        text_value(text(row, 2)?),
        text_value(text(row, 3)?),
        text_value(text(row, 4)?),
        text_value(non_empty(text(row, 5)?)),
        start_date,
    ])
}

fn establishment_row(row: &Row<'_>) -> Result<Vec<Value>> {
    dated_child_row("establishment", row)
}

fn branch_row(row: &Row<'_>) -> Result<Vec<Value>> {
    dated_child_row("branch", row)
}

/// `(key, StartDate, EnterpriseNumber)` rows shared by establishments and branches.
fn dated_child_row(entity: &'static str, row: &Row<'_>) -> Result<Vec<Value>> {
    let key = text(row, 0)?.unwrap_or_default();
    let start_date = date_value(entity, &key, "StartDate", text(row, 1)?)?;
    Ok(vec![Value::Text(key), start_date, text_value(text(row, 2)?)])
}

fn address_row(row: &Row<'_>) -> Result<Vec<Value>> {
    let key = text(row, 0)?.unwrap_or_default();
    let mut values = vec![Value::Text(key.clone()), text_value(text(row, 1)?)];
    for index in 2..12 {
        values.push(text_value(non_empty(text(row, index)?)));
    }
    let striking_off = match non_empty(text(row, 12)?) {
        Some(raw) => date_value("address", &key, "DateStrikingOff", Some(raw))?,
        None => Value::Null,
    };
    values.push(striking_off);
    Ok(values)
}

fn activity_row(row: &Row<'_>) -> Result<Vec<Value>> {
    let key = text(row, 0)?.unwrap_or_default();
    let raw_version = text(row, 2)?.unwrap_or_default();
    let nace_version = raw_version.trim().parse::<i64>().map_err(|err| {
        RegistryError::RowParse {
            entity: "activity",
            key: key.clone(),
            column: "NaceVersion",
            value: raw_version.clone(),
            reason: err.to_string(),
        }
    })?;

    Ok(vec![
        Value::Text(key),
        text_value(text(row, 1)?),
        Value::Integer(nace_version),
        text_value(text(row, 3)?),
        text_value(text(row, 4)?),
    ])
}
