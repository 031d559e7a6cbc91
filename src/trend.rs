// 📈 Trailing twelve-month milk yield series.
//
// The raw GROUP BY only returns months that have records. The series is laid
// onto a complete calendar grid so every month is present, zero when empty.

use crate::dates::{self, DATE_FORMAT};
use crate::scope::Scope;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::collections::HashMap;

pub const SERIES_MONTHS: u32 = 12;

/// Records older than this many days are not queried.
pub const SERIES_WINDOW_DAYS: i64 = 365;

/// Monthly yield sums (`YYYY-MM`, total) for the scope over the trailing 365 days.
pub fn monthly_yield_rows(conn: &Connection, scope: &Scope, today: NaiveDate) -> Result<Vec<(String, f64)>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let start = dates::days_before(today, SERIES_WINDOW_DAYS)
        .format(DATE_FORMAT)
        .to_string();

    let mut stmt = conn.prepare(
        "SELECT strftime('%Y-%m', record_date) AS month, SUM(yield_value)
           FROM milk_yield
          WHERE ear_tag IN (SELECT value FROM json_each(?1))
            AND record_date >= ?2
          GROUP BY month
          ORDER BY month",
    )?;

    let rows = stmt
        .query_map(params![scope.tags_json()?, start], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
            ))
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to group milk yield by month")?;

    Ok(rows
        .into_iter()
        .filter_map(|(month, total)| month.map(|m| (m, total)))
        .collect())
}

/// Align sparse monthly rows onto the trailing twelve calendar months ending at `today`.
///
/// Always returns exactly twelve `(YYYY-MM, total)` pairs, oldest first. Rows for
/// months outside the grid are ignored.
pub fn align_monthly_series(rows: &[(String, f64)], today: NaiveDate) -> Vec<(String, f64)> {
    let totals: HashMap<&str, f64> = rows
        .iter()
        .map(|(month, total)| (month.as_str(), *total))
        .collect();

    dates::trailing_month_labels(today, SERIES_MONTHS)
        .into_iter()
        .map(|label| {
            let total = totals.get(label.as_str()).copied().unwrap_or(0.0);
            (label, total)
        })
        .collect()
}

pub fn trailing_12_month_series(conn: &Connection, scope: &Scope, today: NaiveDate) -> Result<Vec<(String, f64)>> {
    let rows = monthly_yield_rows(conn, scope, today)?;
    Ok(align_monthly_series(&rows, today))
}
