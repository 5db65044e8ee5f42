//! Label lookup over the multilingual `code` table.
//!
//! Every resolver picks one description for a `(category, code)` pair by
//! ranking the available languages against a priority list built from the
//! caller's preference. The resolver only reads, so one instance can be
//! shared by any number of callers.

use std::cmp::Ordering;

use anyhow::{Context, Result};
use rusqlite::Connection;

pub const BASE_LANGUAGES: [&str; 4] = ["NL", "FR", "DE", "EN"];
pub const STATUS_CATEGORY: &str = "Status";
/// Newest NACE vintage; wins over older code sets for the same code.
pub const NACEBEL_2025: &str = "NACEBEL_2025";

/// Preferred language first (two letters, uppercased, taken from the first
/// comma-separated entry), then the base order, without duplicates.
pub fn language_order(preferred: Option<&str>) -> Vec<String> {
    let preferred = preferred
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().chars().take(2).collect::<String>().to_uppercase())
        .filter(|value| !value.is_empty());

    let mut order: Vec<String> = Vec::with_capacity(BASE_LANGUAGES.len() + 1);
    for language in preferred
        .into_iter()
        .chain(BASE_LANGUAGES.iter().map(|value| value.to_string()))
    {
        if !order.contains(&language) {
            order.push(language);
        }
    }
    order
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LabelCandidate {
    category: String,
    language: String,
    description: String,
}

fn language_rank(order: &[String], language: &str) -> usize {
    order
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(language))
        .unwrap_or(order.len())
}

/// Orders by preferred category (when given), language priority, language
/// name, then category name descending so newer vintages come first.
fn compare_candidates(
    left: &LabelCandidate,
    right: &LabelCandidate,
    order: &[String],
    preferred_category: Option<&str>,
) -> Ordering {
    let category_rank = |candidate: &LabelCandidate| match preferred_category {
        Some(category) if candidate.category == category => 0,
        Some(_) => 1,
        None => 0,
    };

    category_rank(left)
        .cmp(&category_rank(right))
        .then_with(|| language_rank(order, &left.language).cmp(&language_rank(order, &right.language)))
        .then_with(|| left.language.cmp(&right.language))
        .then_with(|| right.category.cmp(&left.category))
}

fn best_description(
    candidates: Vec<LabelCandidate>,
    order: &[String],
    preferred_category: Option<&str>,
) -> Option<String> {
    candidates
        .into_iter()
        .min_by(|left, right| compare_candidates(left, right, order, preferred_category))
        .map(|candidate| candidate.description)
        .filter(|description| !description.is_empty())
}

pub struct LabelResolver<'c> {
    connection: &'c Connection,
}

impl<'c> LabelResolver<'c> {
    pub fn new(connection: &'c Connection) -> Self {
        Self { connection }
    }

    pub fn resolve_label(
        &self,
        category: &str,
        code: Option<&str>,
        preferred_language: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(code) = code.filter(|code| !code.is_empty()) else {
            return Ok(None);
        };

        let candidates = self
            .candidates(
                "SELECT category, language, description FROM code
                 WHERE category = ?1 AND code = ?2",
                &[category, code],
            )
            .with_context(|| format!("failed to resolve {category} label for {code}"))?;

        Ok(best_description(
            candidates,
            &language_order(preferred_language),
            None,
        ))
    }

    /// Searches every `NACE*` code set; `NACEBEL_2025` wins before language
    /// priority is considered.
    pub fn resolve_activity_label(
        &self,
        code: &str,
        preferred_language: Option<&str>,
    ) -> Result<Option<String>> {
        if code.is_empty() {
            return Ok(None);
        }

        let candidates = self
            .candidates(
                "SELECT category, language, description FROM code
                 WHERE code = ?1 AND UPPER(category) LIKE 'NACE%'",
                &[code],
            )
            .with_context(|| format!("failed to resolve activity label for {code}"))?;

        Ok(best_description(
            candidates,
            &language_order(preferred_language),
            Some(NACEBEL_2025),
        ))
    }

    pub fn resolve_status(
        &self,
        code: Option<&str>,
        preferred_language: Option<&str>,
    ) -> Result<Option<String>> {
        self.resolve_label(STATUS_CATEGORY, code, preferred_language)
    }

    fn candidates(&self, sql: &str, params: &[&str]) -> Result<Vec<LabelCandidate>> {
        let mut statement = self.connection.prepare_cached(sql)?;
        let rows = statement.query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(LabelCandidate {
                category: row.get(0)?,
                language: row.get(1)?,
                description: row.get(2)?,
            })
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            candidates.push(row?);
        }
        Ok(candidates)
    }
}
