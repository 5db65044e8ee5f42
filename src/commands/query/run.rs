use anyhow::{Result, bail};
use tracing::info;

use crate::cli::{SearchArgs, ShowArgs};
use crate::store::open_read_only;

use super::enterprises::{Pagination, enterprise_detail, list_enterprises};
use super::output::{write_detail_text, write_json_response, write_list_text};

pub(crate) fn run_search(args: SearchArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();
    if !db_path.exists() {
        bail!("database not found: {}", db_path.display());
    }
    let connection = open_read_only(&db_path)?;

    let pagination = Pagination::sanitize(args.page.as_deref(), args.page_size.as_deref());
    let list = list_enterprises(&connection, args.term.as_deref(), pagination)?;

    info!(
        term = %args.term.as_deref().unwrap_or_default(),
        total = list.total,
        page = list.page,
        page_size = list.page_size,
        returned = list.items.len(),
        "search completed"
    );

    if args.json {
        write_json_response(&list, "search")
    } else {
        write_list_text(&list)
    }
}

pub(crate) fn run_show(args: ShowArgs) -> Result<()> {
    let db_path = args.store.resolved_db_path();
    if !db_path.exists() {
        bail!("database not found: {}", db_path.display());
    }
    let connection = open_read_only(&db_path)?;

    let detail = enterprise_detail(&connection, &args.enterprise_number, args.lang.as_deref())?;

    if args.json {
        write_json_response(&detail, "enterprise")
    } else {
        write_detail_text(&detail)
    }
}
