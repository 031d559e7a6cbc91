// Scope-based totals and farm headcounts.
//
// Every scoped query short-circuits on an empty scope, so an empty selection
// yields zeros without touching the database.

use crate::dates::{self, parse_date_exact};
use crate::scope::Scope;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::debug;

/// Heifers are female animals younger than this many (average) months.
pub const HEIFER_MAX_AGE_MONTHS: f64 = 24.0;

pub fn total_count(scope: &Scope) -> usize {
    scope.len()
}

/// Sum of all milk yield recorded for the ear tags in scope.
pub fn total_milk_yield(conn: &Connection, scope: &Scope) -> Result<f64> {
    if scope.is_empty() {
        return Ok(0.0);
    }

    let total: Option<f64> = conn
        .query_row(
            "SELECT SUM(yield_value)
               FROM milk_yield
              WHERE ear_tag IN (SELECT value FROM json_each(?1))",
            params![scope.tags_json()?],
            |row| row.get(0),
        )
        .context("Failed to sum milk yield")?;

    Ok(total.unwrap_or(0.0))
}

/// Number of distinct days with a milk record in scope.
pub fn total_lactation_days(conn: &Connection, scope: &Scope) -> Result<u64> {
    if scope.is_empty() {
        return Ok(0);
    }

    let days: i64 = conn
        .query_row(
            "SELECT COUNT(DISTINCT record_date)
               FROM milk_yield
              WHERE ear_tag IN (SELECT value FROM json_each(?1))",
            params![scope.tags_json()?],
            |row| row.get(0),
        )
        .context("Failed to count lactation days")?;

    Ok(days.max(0) as u64)
}

/// Milk yield per calendar year, ascending. Records without a readable date are skipped.
pub fn yield_by_year(conn: &Connection, scope: &Scope) -> Result<Vec<(i32, f64)>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT CAST(strftime('%Y', record_date) AS INTEGER) AS record_year,
                SUM(yield_value)
           FROM milk_yield
          WHERE ear_tag IN (SELECT value FROM json_each(?1))
            AND strftime('%Y', record_date) IS NOT NULL
          GROUP BY record_year
          ORDER BY record_year",
    )?;

    let rows = stmt
        .query_map(params![scope.tags_json()?], |row| {
            Ok((row.get::<_, i32>(0)?, row.get::<_, Option<f64>>(1)?.unwrap_or(0.0)))
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to group milk yield by year")?;

    Ok(rows)
}

/// Reproduction records of animals in scope whose delivery ended in abortion.
pub fn abortion_count(conn: &Connection, scope: &Scope) -> Result<u64> {
    if scope.is_empty() {
        return Ok(0);
    }

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*)
               FROM repro r
               JOIN animals a ON r.animal_id = a.id
              WHERE a.farm_name = ?1
                AND a.ear_tag IN (SELECT value FROM json_each(?2))
                AND lower(r.delivery_status) = 'abortion'",
            params![scope.farm(), scope.tags_json()?],
            |row| row.get(0),
        )
        .context("Failed to count abortions")?;

    Ok(count.max(0) as u64)
}

/// Female animals of `farm` younger than 24 average months.
///
/// Birth dates that are missing or unreadable exclude the animal from the count.
/// Birth dates are parsed as stored, so a padded value is unreadable too.
pub fn heifer_count(conn: &Connection, farm: &str, today: NaiveDate) -> Result<u64> {
    let mut stmt = conn.prepare(
        "SELECT ear_tag, birth_date FROM animals WHERE farm_name = ?1 AND gender = 'F'",
    )?;

    let rows = stmt
        .query_map(params![farm], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to load birth dates")?;

    let mut count = 0;
    for (ear_tag, birth_date) in rows {
        let Some(raw) = birth_date else { continue };
        match parse_date_exact(&raw) {
            Ok(born) if dates::age_in_months(born, today) < HEIFER_MAX_AGE_MONTHS => count += 1,
            Ok(_) => {}
            Err(err) => debug!(ear_tag = ?ear_tag, error = %err, "skipping unreadable birth date"),
        }
    }

    Ok(count)
}

/// Animals of `farm` recorded with gender `Bull`.
pub fn bull_count(conn: &Connection, farm: &str) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM animals WHERE farm_name = ?1 AND gender = 'Bull'",
            params![farm],
            |row| row.get(0),
        )
        .context("Failed to count bulls")?;

    Ok(count.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{resolve_scope, StatusFilter};
    use crate::test_support::{Fixture, NewRepro};
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn total_scope(fx: &Fixture, farm: &str) -> Scope {
        fx.store()
            .with_connection(|conn| resolve_scope(conn, farm, StatusFilter::Total))
            .unwrap()
    }

    fn milk_fixture() -> Fixture {
        let fx = Fixture::new();
        fx.add_animal("Sunrise", "A1", "F", None);
        fx.add_animal("Sunrise", "A2", "F", None);
        fx.add_animal("Hillside", "H1", "F", None);

        fx.add_milk("A1", "2023-12-30", 10.5);
        fx.add_milk("A1", "2024-01-02", 12.0);
        fx.add_milk("A2", "2024-01-02", 8.0);
        fx.add_milk("A2", "2024-01-03", 9.5);
        fx.add_milk("A2", "not a date", 1.0);
        fx.add_milk("H1", "2024-01-02", 100.0);
        fx
    }

    #[test]
    fn test_milk_totals() {
        let fx = milk_fixture();
        let scope = total_scope(&fx, "Sunrise");

        let (total, days, by_year) = fx
            .store()
            .with_connection(|conn| {
                Ok((
                    total_milk_yield(conn, &scope)?,
                    total_lactation_days(conn, &scope)?,
                    yield_by_year(conn, &scope)?,
                ))
            })
            .unwrap();

        assert_eq!(total_count(&scope), 2);
        assert!((total - 41.0).abs() < 1e-9);
        // 2023-12-30, 2024-01-02, 2024-01-03 and the malformed date string.
        assert_eq!(days, 4);
        assert_eq!(by_year, vec![(2023, 10.5), (2024, 29.5)]);
    }

    #[test]
    fn test_empty_scope_yields_zeros() {
        let fx = milk_fixture();
        let scope = total_scope(&fx, "Nowhere");

        let (total, days, by_year, abortions) = fx
            .store()
            .with_connection(|conn| {
                Ok((
                    total_milk_yield(conn, &scope)?,
                    total_lactation_days(conn, &scope)?,
                    yield_by_year(conn, &scope)?,
                    abortion_count(conn, &scope)?,
                ))
            })
            .unwrap();

        assert_eq!(total, 0.0);
        assert_eq!(days, 0);
        assert!(by_year.is_empty());
        assert_eq!(abortions, 0);
    }

    #[test]
    fn test_scope_without_records_sums_to_zero() {
        let fx = Fixture::new();
        fx.add_animal("Sunrise", "A1", "F", None);
        let scope = total_scope(&fx, "Sunrise");

        let total = fx
            .store()
            .with_connection(|conn| total_milk_yield(conn, &scope))
            .unwrap();

        assert_eq!(total, 0.0);
    }

    #[test]
    fn test_abortion_count_is_case_insensitive_and_farm_scoped() {
        let fx = Fixture::new();
        let a1 = fx.add_animal("Sunrise", "A1", "F", None);
        let a2 = fx.add_animal("Sunrise", "A2", "F", None);
        let h1 = fx.add_animal("Hillside", "A1", "F", None);

        for (animal_id, status) in [
            (a1, "Abortion"),
            (a1, "abortion"),
            (a2, "ABORTION"),
            (a2, "Delivery"),
            (h1, "abortion"),
        ] {
            fx.add_repro(NewRepro {
                animal_id,
                breeding_date: Some("2023-06-01"),
                delivery_status: Some(status),
                ..Default::default()
            });
        }

        let scope = total_scope(&fx, "Sunrise");
        let count = fx
            .store()
            .with_connection(|conn| abortion_count(conn, &scope))
            .unwrap();

        assert_eq!(count, 3);
    }

    #[test]
    fn test_heifer_and_bull_counts() {
        let today = date(2024, 6, 15);
        let born_30_months_ago = (today - Duration::days(915)).format("%Y-%m-%d").to_string();
        let born_10_months_ago = (today - Duration::days(305)).format("%Y-%m-%d").to_string();

        let fx = Fixture::new();
        fx.add_animal("Sunrise", "A1", "F", Some(&born_30_months_ago));
        fx.add_animal("Sunrise", "A2", "F", Some(&born_10_months_ago));
        fx.add_animal("Sunrise", "A3", "Bull", Some(&born_10_months_ago));

        let (heifers, bulls) = fx
            .store()
            .with_connection(|conn| Ok((heifer_count(conn, "Sunrise", today)?, bull_count(conn, "Sunrise")?)))
            .unwrap();

        assert_eq!(heifers, 1);
        assert_eq!(bulls, 1);
    }

    #[test]
    fn test_heifer_count_skips_bad_birth_dates() {
        let today = date(2024, 6, 15);
        let fx = Fixture::new();
        fx.add_animal("Sunrise", "A1", "F", None);
        fx.add_animal("Sunrise", "A2", "F", Some(""));
        fx.add_animal("Sunrise", "A3", "F", Some("15/06/2023"));
        // Padded dates are unreadable; the same date stored plainly counts.
        fx.add_animal("Sunrise", "A4", "F", Some(" 2023-06-15 "));
        fx.add_animal("Sunrise", "A7", "F", Some("2023-06-15"));
        // 24 average months is 732 days; day 732 is no longer a heifer.
        fx.add_animal("Sunrise", "A5", "F", Some("2022-06-14"));
        fx.add_animal("Sunrise", "A6", "F", Some("2022-06-15"));
        fx.add_animal("Hillside", "H1", "F", Some("2024-01-01"));
        fx.add_animal("Sunrise", "M1", "M", Some("2024-01-01"));

        let heifers = fx
            .store()
            .with_connection(|conn| heifer_count(conn, "Sunrise", today))
            .unwrap();

        assert_eq!(heifers, 2);
    }

    #[test]
    fn test_heifer_count_rejects_padded_birth_date() {
        let today = date(2024, 6, 15);
        let fx = Fixture::new();
        fx.add_animal("Sunrise", "A1", "F", Some(" 2023-06-15 "));
        fx.add_animal("Sunrise", "A2", "F", Some("2023-06-15\t"));

        let heifers = fx
            .store()
            .with_connection(|conn| heifer_count(conn, "Sunrise", today))
            .unwrap();

        assert_eq!(heifers, 0);
    }

    #[test]
    fn test_bull_count_is_exact_gender() {
        let fx = Fixture::new();
        fx.add_animal("Sunrise", "B1", "Bull", None);
        fx.add_animal("Sunrise", "B2", "bull", None);
        fx.add_animal("Sunrise", "M1", "M", None);
        fx.add_animal("Hillside", "B3", "Bull", None);

        let bulls = fx
            .store()
            .with_connection(|conn| bull_count(conn, "Sunrise"))
            .unwrap();

        assert_eq!(bulls, 1);
    }

    #[test]
    fn test_aggregations_are_idempotent() {
        let fx = milk_fixture();
        let scope = total_scope(&fx, "Sunrise");
        let run = || {
            fx.store()
                .with_connection(|conn| {
                    Ok((
                        total_milk_yield(conn, &scope)?,
                        total_lactation_days(conn, &scope)?,
                        yield_by_year(conn, &scope)?,
                    ))
                })
                .unwrap()
        };

        assert_eq!(run(), run());
    }
}
