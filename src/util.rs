use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Source extracts write every date as `DD-MM-YYYY`.
pub const SOURCE_DATE_FORMAT: &str = "%d-%m-%Y";

static SOURCE_DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}-\d{2}-\d{4}$").expect("date shape regex is valid"));

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Parses a source date. Any shape other than `DD-MM-YYYY` is rejected.
pub fn parse_source_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if !SOURCE_DATE_SHAPE.is_match(trimmed) {
        bail!("date `{value}` is not in DD-MM-YYYY form");
    }

    NaiveDate::parse_from_str(trimmed, SOURCE_DATE_FORMAT)
        .with_context(|| format!("date `{value}` is not a valid calendar date"))
}

/// Maps empty strings to `None`, the way the extract encodes missing values.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];

    loop {
        let count = file
            .read(&mut buf)
            .with_context(|| format!("failed to read file for hashing: {}", path.display()))?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_source_date_reads_day_month_year() {
        let date = parse_source_date("05-03-1998").expect("date should parse");
        assert_eq!(date, NaiveDate::from_ymd_opt(1998, 3, 5).expect("valid date"));
    }

    #[test]
    fn parse_source_date_rejects_iso_and_short_forms() {
        assert!(parse_source_date("1998-03-05").is_err());
        assert!(parse_source_date("5-3-1998").is_err());
        assert!(parse_source_date("31-02-2020").is_err());
        assert!(parse_source_date("").is_err());
    }

    #[test]
    fn non_empty_drops_blank_strings_only() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(" ".to_string())), Some(" ".to_string()));
    }
}
