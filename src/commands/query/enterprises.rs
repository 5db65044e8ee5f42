use anyhow::{Context, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::error::RegistryError;
use crate::juridical_form::{UNKNOWN_FORM, classify_juridical_form};
use crate::labels::LabelResolver;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
/// Highest page whose offset still fits in an `i64`.
const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// SQLite's own `lower()` and `LIKE` only fold ASCII.
const FOLD_FUNCTION: &str = "unicode_lower";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    /// Unparseable or zero values fall back to page 1 and the default size.
    pub fn sanitize(page: Option<&str>, page_size: Option<&str>) -> Self {
        let parse = |value: Option<&str>| {
            value
                .and_then(|value| value.trim().parse::<i64>().ok())
                .filter(|value| *value != 0)
        };

        Self {
            page: parse(page).unwrap_or(1).clamp(1, MAX_PAGE),
            page_size: parse(page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    fn offset(self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnterpriseListItem {
    pub enterprise_number: String,
    pub status: String,
    pub juridical_form: Option<String>,
    pub start_date: Option<String>,
    pub names: Vec<String>,
    pub juridical_form_group: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnterpriseList {
    pub items: Vec<EnterpriseListItem>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenominationView {
    pub language: String,
    pub type_of_denomination: String,
    pub denomination: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressView {
    pub type_of_address: String,
    pub country_nl: Option<String>,
    pub country_fr: Option<String>,
    pub zipcode: Option<String>,
    pub municipality_nl: Option<String>,
    pub municipality_fr: Option<String>,
    pub street_nl: Option<String>,
    pub street_fr: Option<String>,
    pub house_number: Option<String>,
    #[serde(rename = "box")]
    pub box_number: Option<String>,
    pub extra_address_info: Option<String>,
    pub date_striking_off: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactView {
    pub entity_contact: String,
    pub contact_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    pub activity_group: String,
    pub nace_version: i64,
    pub nace_code: String,
    pub nace_label: Option<String>,
    pub classification: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnterpriseDetail {
    pub enterprise_number: String,
    pub status: String,
    pub status_label: Option<String>,
    pub juridical_situation: String,
    pub juridical_situation_label: Option<String>,
    pub type_of_enterprise: String,
    pub type_of_enterprise_label: Option<String>,
    pub juridical_form: Option<String>,
    pub juridical_form_label: Option<String>,
    pub juridical_form_display: Option<String>,
    pub juridical_form_cac: Option<String>,
    pub juridical_form_group: String,
    pub start_date: Option<String>,
    pub denominations: Vec<DenominationView>,
    pub addresses: Vec<AddressView>,
    pub contacts: Vec<ContactView>,
    pub activities: Vec<ActivityView>,
}

type EnterpriseRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// Matches the term against the enterprise number or any of its names,
/// newest enterprises first.
pub fn list_enterprises(
    connection: &Connection,
    search: Option<&str>,
    pagination: Pagination,
) -> Result<EnterpriseList> {
    register_fold_function(connection)?;

    let pattern = search
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| format!("%{}%", term.to_lowercase()));

    let filter = format!(
        "
        WHERE ?1 IS NULL
           OR {FOLD_FUNCTION}(e.enterprise_number) LIKE ?1
           OR EXISTS (
             SELECT 1 FROM denomination d
             WHERE d.entity_number = e.enterprise_number
               AND {FOLD_FUNCTION}(d.denomination) LIKE ?1
           )"
    );

    let total: i64 = connection
        .query_row(
            &format!("SELECT COUNT(*) FROM enterprise e {filter}"),
            params![pattern],
            |row| row.get(0),
        )
        .context("failed to count matching enterprises")?;

    let mut statement = connection.prepare(&format!(
        "SELECT e.enterprise_number, e.status, e.juridical_form, e.start_date
         FROM enterprise e
         {filter}
         ORDER BY e.start_date DESC NULLS LAST, e.enterprise_number
         LIMIT ?2 OFFSET ?3"
    ))?;
    let rows = statement
        .query_map(
            params![pattern, pagination.page_size, pagination.offset()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("failed to list enterprises")?;

    let mut items = Vec::with_capacity(rows.len());
    for (enterprise_number, status, juridical_form, start_date) in rows {
        let names = distinct_names(connection, &enterprise_number)?;
        let juridical_form_group =
            classify_juridical_form(juridical_form.as_deref(), None, None, None);
        items.push(EnterpriseListItem {
            enterprise_number,
            status,
            juridical_form,
            start_date,
            names,
            juridical_form_group,
        });
    }

    Ok(EnterpriseList {
        items,
        total,
        page: pagination.page,
        page_size: pagination.page_size,
    })
}

/// Registers the Unicode case fold used by search. Re-registering on the
/// same connection replaces the previous definition.
fn register_fold_function(connection: &Connection) -> Result<()> {
    connection
        .create_scalar_function(
            FOLD_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |context| {
                let value = context.get::<Option<String>>(0)?;
                Ok(value.map(|value| value.to_lowercase()))
            },
        )
        .with_context(|| format!("failed to register {FOLD_FUNCTION}"))
}

fn distinct_names(connection: &Connection, entity_number: &str) -> Result<Vec<String>> {
    let mut statement = connection.prepare_cached(
        "SELECT DISTINCT denomination FROM denomination
         WHERE entity_number = ?1
         ORDER BY denomination",
    )?;
    let names = statement
        .query_map([entity_number], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

/// Fails with [`RegistryError::NotFound`] when the enterprise does not exist.
pub fn enterprise_detail(
    connection: &Connection,
    enterprise_number: &str,
    preferred_language: Option<&str>,
) -> Result<EnterpriseDetail> {
    let enterprise: Option<EnterpriseRow> = connection
        .query_row(
            "SELECT enterprise_number, status, juridical_situation, type_of_enterprise,
                    juridical_form, juridical_form_cac, start_date
             FROM enterprise WHERE enterprise_number = ?1",
            [enterprise_number],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            },
        )
        .optional()
        .with_context(|| format!("failed to read enterprise {enterprise_number}"))?;

    let Some((
        enterprise_number,
        status,
        juridical_situation,
        type_of_enterprise,
        juridical_form,
        juridical_form_cac,
        start_date,
    )) = enterprise
    else {
        return Err(RegistryError::NotFound {
            enterprise_number: enterprise_number.to_string(),
        }
        .into());
    };

    let resolver = LabelResolver::new(connection);
    let juridical_form_label =
        resolver.resolve_label("JuridicalForm", juridical_form.as_deref(), preferred_language)?;
    let juridical_situation_label = resolver.resolve_label(
        "JuridicalSituation",
        Some(&juridical_situation),
        preferred_language,
    )?;
    let type_of_enterprise_label = resolver.resolve_label(
        "TypeOfEnterprise",
        Some(&type_of_enterprise),
        preferred_language,
    )?;
    let status_label = resolver.resolve_status(Some(&status), preferred_language)?;

    let juridical_form_group = classify_juridical_form(
        juridical_form.as_deref(),
        Some(&type_of_enterprise),
        juridical_form_label.as_deref(),
        type_of_enterprise_label.as_deref(),
    );
    let juridical_form_display = Some(juridical_form_group.clone())
        .filter(|group| group != UNKNOWN_FORM)
        .or_else(|| juridical_form_label.clone())
        .or_else(|| juridical_form.clone().filter(|form| !form.is_empty()));

    let denominations = denominations(connection, &enterprise_number)?;
    let addresses = addresses(connection, &enterprise_number)?;
    let contacts = contacts(connection, &enterprise_number)?;
    let activities = activities(&resolver, connection, &enterprise_number, preferred_language)?;

    Ok(EnterpriseDetail {
        enterprise_number,
        status,
        status_label,
        juridical_situation,
        juridical_situation_label,
        type_of_enterprise,
        type_of_enterprise_label,
        juridical_form,
        juridical_form_label,
        juridical_form_display,
        juridical_form_cac,
        juridical_form_group,
        start_date,
        denominations,
        addresses,
        contacts,
        activities,
    })
}

fn denominations(connection: &Connection, entity_number: &str) -> Result<Vec<DenominationView>> {
    let mut statement = connection.prepare(
        "SELECT language, type_of_denomination, denomination
         FROM denomination
         WHERE entity_number = ?1
         ORDER BY language, type_of_denomination",
    )?;
    let rows = statement
        .query_map([entity_number], |row| {
            Ok(DenominationView {
                language: row.get(0)?,
                type_of_denomination: row.get(1)?,
                denomination: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn addresses(connection: &Connection, entity_number: &str) -> Result<Vec<AddressView>> {
    let mut statement = connection.prepare(
        "SELECT type_of_address, country_nl, country_fr, zipcode,
                municipality_nl, municipality_fr, street_nl, street_fr,
                house_number, box, extra_address_info, date_striking_off
         FROM address
         WHERE entity_number = ?1",
    )?;
    let rows = statement
        .query_map([entity_number], |row| {
            Ok(AddressView {
                type_of_address: row.get(0)?,
                country_nl: row.get(1)?,
                country_fr: row.get(2)?,
                zipcode: row.get(3)?,
                municipality_nl: row.get(4)?,
                municipality_fr: row.get(5)?,
                street_nl: row.get(6)?,
                street_fr: row.get(7)?,
                house_number: row.get(8)?,
                box_number: row.get(9)?,
                extra_address_info: row.get(10)?,
                date_striking_off: row.get(11)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn contacts(connection: &Connection, entity_number: &str) -> Result<Vec<ContactView>> {
    let mut statement = connection.prepare(
        "SELECT entity_contact, contact_type, value
         FROM contact
         WHERE entity_number = ?1",
    )?;
    let rows = statement
        .query_map([entity_number], |row| {
            Ok(ContactView {
                entity_contact: row.get(0)?,
                contact_type: row.get(1)?,
                value: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn activities(
    resolver: &LabelResolver<'_>,
    connection: &Connection,
    entity_number: &str,
    preferred_language: Option<&str>,
) -> Result<Vec<ActivityView>> {
    let mut statement = connection.prepare(
        "SELECT activity_group, nace_version, nace_code, classification
         FROM activity
         WHERE entity_number = ?1
         ORDER BY activity_group, nace_version DESC, nace_code",
    )?;
    let rows = statement
        .query_map([entity_number], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(activity_group, nace_version, nace_code, classification)| {
            let nace_label = resolver.resolve_activity_label(&nace_code, preferred_language)?;
            Ok(ActivityView {
                activity_group,
                nace_version,
                nace_code,
                nace_label,
                classification,
            })
        })
        .collect()
}
