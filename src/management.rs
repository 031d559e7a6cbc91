// Trailing three-month management counters.
//
// These queries are global: they are not filtered by farm or scope.

use crate::dates::TrailingWindow;
use crate::scope::EventStatus;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

pub const MANAGEMENT_WINDOW_MONTHS: u32 = 3;

pub fn management_window(now: NaiveDateTime) -> TrailingWindow {
    TrailingWindow::months(now, MANAGEMENT_WINDOW_MONTHS)
}

/// Deliveries whose breeding date falls inside the trailing window.
pub fn recent_births_count(conn: &Connection, now: NaiveDateTime) -> Result<u64> {
    let (start, end) = management_window(now).date_bounds();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*)
               FROM repro
              WHERE delivery_status = 'Delivery'
                AND breeding_date BETWEEN ?1 AND ?2",
            params![start, end],
            |row| row.get(0),
        )
        .context("Failed to count recent births")?;

    Ok(count.max(0) as u64)
}

/// Calf tags of the recent deliveries, in record order. Blank tags are left out.
pub fn recent_calf_tags(conn: &Connection, now: NaiveDateTime) -> Result<Vec<String>> {
    let (start, end) = management_window(now).date_bounds();
    let mut stmt = conn.prepare(
        "SELECT calf_tag_number
           FROM repro
          WHERE delivery_status = 'Delivery'
            AND calf_tag_number IS NOT NULL
            AND calf_tag_number != ''
            AND breeding_date BETWEEN ?1 AND ?2
          ORDER BY id",
    )?;

    let tags = stmt
        .query_map(params![start, end], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()
        .context("Failed to load recent calf tags")?;

    Ok(tags)
}

/// Ownership events with `status` inside the trailing window.
pub fn issue_count(conn: &Connection, status: EventStatus, now: NaiveDateTime) -> Result<u64> {
    let (start, end) = management_window(now).datetime_bounds();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*)
               FROM issue
              WHERE event_status = ?1
                AND event_date BETWEEN ?2 AND ?3",
            params![status.as_str(), start, end],
            |row| row.get(0),
        )
        .with_context(|| format!("Failed to count {} events", status.as_str()))?;

    Ok(count.max(0) as u64)
}
