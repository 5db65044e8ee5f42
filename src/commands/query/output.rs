use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use super::enterprises::{EnterpriseDetail, EnterpriseList};

pub(super) fn write_json_response<T: Serialize>(response: &T, what: &str) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, response)
        .with_context(|| format!("failed to serialize {what} json output"))?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

pub(super) fn write_list_text(list: &EnterpriseList) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Enterprises: {} (page {} of size {})",
        list.total, list.page, list.page_size
    )?;
    for item in &list.items {
        writeln!(
            output,
            "{}  {}  {}  start={}  {}",
            item.enterprise_number,
            item.status,
            item.juridical_form_group,
            item.start_date.as_deref().unwrap_or("-"),
            item.names.join(" | "),
        )?;
    }

    output.flush()?;
    Ok(())
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

pub(super) fn write_detail_text(detail: &EnterpriseDetail) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Enterprise {}", detail.enterprise_number)?;
    writeln!(
        output,
        "  status: {} ({})",
        detail.status,
        or_dash(detail.status_label.as_deref())
    )?;
    writeln!(
        output,
        "  juridical situation: {} ({})",
        detail.juridical_situation,
        or_dash(detail.juridical_situation_label.as_deref())
    )?;
    writeln!(
        output,
        "  type: {} ({})",
        detail.type_of_enterprise,
        or_dash(detail.type_of_enterprise_label.as_deref())
    )?;
    writeln!(
        output,
        "  juridical form: {} [{}] group={}",
        or_dash(detail.juridical_form_display.as_deref()),
        or_dash(detail.juridical_form.as_deref()),
        detail.juridical_form_group
    )?;
    writeln!(
        output,
        "  start date: {}",
        or_dash(detail.start_date.as_deref())
    )?;

    writeln!(output, "Denominations: {}", detail.denominations.len())?;
    for denomination in &detail.denominations {
        writeln!(
            output,
            "  [{} type={}] {}",
            denomination.language, denomination.type_of_denomination, denomination.denomination
        )?;
    }

    writeln!(output, "Addresses: {}", detail.addresses.len())?;
    for address in &detail.addresses {
        writeln!(
            output,
            "  [{}] {} {}{} {} {}",
            address.type_of_address,
            or_dash(address.street_nl.as_deref().or(address.street_fr.as_deref())),
            or_dash(address.house_number.as_deref()),
            address
                .box_number
                .as_deref()
                .map(|value| format!(" bus {value}"))
                .unwrap_or_default(),
            or_dash(address.zipcode.as_deref()),
            or_dash(
                address
                    .municipality_nl
                    .as_deref()
                    .or(address.municipality_fr.as_deref())
            ),
        )?;
    }

    writeln!(output, "Contacts: {}", detail.contacts.len())?;
    for contact in &detail.contacts {
        writeln!(
            output,
            "  [{} {}] {}",
            contact.entity_contact, contact.contact_type, contact.value
        )?;
    }

    writeln!(output, "Activities: {}", detail.activities.len())?;
    for activity in &detail.activities {
        writeln!(
            output,
            "  [{} nace{} {}] {} {}",
            activity.activity_group,
            activity.nace_version,
            activity.classification,
            activity.nace_code,
            or_dash(activity.nace_label.as_deref()),
        )?;
    }

    output.flush()?;
    Ok(())
}
