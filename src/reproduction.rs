// Usage & reproduction summaries over the whole herd.

use crate::dates;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// Sire usage and abortion history look back this many 365-day years.
pub const USAGE_WINDOW_YEARS: i64 = 3;

/// Abortions needed before an animal is reported as a frequent aborter.
pub const FREQUENT_ABORTION_MIN: i64 = 3;

pub fn usage_window_start(today: NaiveDate) -> String {
    dates::days_before(today, USAGE_WINDOW_YEARS * 365)
        .format(dates::DATE_FORMAT)
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SireUsage {
    pub bull_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParityLeader {
    pub ear_tag: String,
    pub parity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbortionLeader {
    pub ear_tag: String,
    pub abortions: u64,
}

/// The `limit` most used sires in the usage window, by count then name.
pub fn top_sires(conn: &Connection, today: NaiveDate, limit: usize) -> Result<Vec<SireUsage>> {
    let mut stmt = conn.prepare(
        "SELECT bull_name, COUNT(*) AS cnt
           FROM repro
          WHERE breeding_date >= ?1
            AND bull_name IS NOT NULL AND bull_name != ''
          GROUP BY bull_name
          ORDER BY cnt DESC, bull_name ASC
          LIMIT ?2",
    )?;

    let sires = stmt
        .query_map(params![usage_window_start(today), limit as i64], |row| {
            Ok(SireUsage {
                bull_name: row.get(0)?,
                count: row.get::<_, i64>(1)?.max(0) as u64,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to rank sire usage")?;

    Ok(sires)
}

pub fn top_sire(conn: &Connection, today: NaiveDate) -> Result<Option<SireUsage>> {
    Ok(top_sires(conn, today, 1)?.into_iter().next())
}

/// Mean parity of female animals, one sample per animal.
///
/// Each animal contributes the parity of its latest record (by breeding date, then id)
/// that has a parity value.
pub fn average_parity(conn: &Connection) -> Result<Option<f64>> {
    conn.query_row(
        "SELECT AVG(parity)
           FROM (
                SELECT r.parity,
                       ROW_NUMBER() OVER (
                           PARTITION BY r.animal_id
                           ORDER BY r.breeding_date DESC, r.id DESC
                       ) AS rn
                  FROM repro r
                  JOIN animals a ON r.animal_id = a.id
                 WHERE a.gender = 'F' AND r.parity IS NOT NULL
           )
          WHERE rn = 1",
        [],
        |row| row.get(0),
    )
    .context("Failed to average parity")
}

/// Female animal with the highest recorded parity. Ties go to the lowest ear tag.
pub fn highest_parity_cow(conn: &Connection) -> Result<Option<ParityLeader>> {
    conn.query_row(
        "SELECT a.ear_tag, r.parity
           FROM repro r
           JOIN animals a ON r.animal_id = a.id
          WHERE a.gender = 'F' AND r.parity IS NOT NULL
          ORDER BY r.parity DESC, a.ear_tag ASC, r.id ASC
          LIMIT 1",
        [],
        |row| {
            Ok(ParityLeader {
                ear_tag: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                parity: row.get(1)?,
            })
        },
    )
    .optional()
    .context("Failed to find highest parity cow")
}

/// Animal with the most abortions in the usage window, if it has at least three.
pub fn frequent_abortion_cow(conn: &Connection, today: NaiveDate) -> Result<Option<AbortionLeader>> {
    conn.query_row(
        "SELECT a.ear_tag, COUNT(*) AS cnt
           FROM repro r
           JOIN animals a ON r.animal_id = a.id
          WHERE lower(r.delivery_status) = 'abortion'
            AND r.breeding_date >= ?1
          GROUP BY a.id
         HAVING cnt >= ?2
          ORDER BY cnt DESC, a.ear_tag ASC
          LIMIT 1",
        params![usage_window_start(today), FREQUENT_ABORTION_MIN],
        |row| {
            Ok(AbortionLeader {
                ear_tag: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                abortions: row.get::<_, i64>(1)?.max(0) as u64,
            })
        },
    )
    .optional()
    .context("Failed to find frequent abortion cow")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, NewRepro};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn bred(fx: &Fixture, animal_id: i64, breeding_date: &str, bull_name: &str) {
        fx.add_repro(NewRepro {
            animal_id,
            breeding_date: Some(breeding_date),
            bull_name: Some(bull_name),
            ..Default::default()
        });
    }

    #[test]
    fn test_usage_window_start() {
        assert_eq!(usage_window_start(today()), "2021-06-02");
    }

    #[test]
    fn test_top_sires_ranking_and_ties() {
        let fx = Fixture::new();
        let a1 = fx.add_animal("Sunrise", "A1", "F", None);
        let h1 = fx.add_animal("Hillside", "H1", "F", None);

        for date in ["2023-01-01", "2023-02-01", "2023-03-01"] {
            bred(&fx, a1, date, "Zeus");
        }
        bred(&fx, a1, "2023-04-01", "Atlas");
        bred(&fx, h1, "2023-05-01", "Atlas");
        bred(&fx, h1, "2023-06-01", "Boreas");
        bred(&fx, h1, "2023-07-01", "Boreas");
        bred(&fx, h1, "2023-08-01", "");
        // Outside the window.
        for date in ["2020-01-01", "2020-02-01", "2020-03-01", "2020-04-01"] {
            bred(&fx, a1, date, "Ancient");
        }

        let (top, top3) = fx
            .store()
            .with_connection(|conn| Ok((top_sire(conn, today())?, top_sires(conn, today(), 3)?)))
            .unwrap();

        assert_eq!(
            top,
            Some(SireUsage {
                bull_name: "Zeus".to_string(),
                count: 3
            })
        );
        let names: Vec<(&str, u64)> = top3
            .iter()
            .map(|s| (s.bull_name.as_str(), s.count))
            .collect();
        assert_eq!(names, vec![("Zeus", 3), ("Atlas", 2), ("Boreas", 2)]);
    }

    #[test]
    fn test_no_sires_is_none() {
        let fx = Fixture::new();
        let top = fx
            .store()
            .with_connection(|conn| top_sire(conn, today()))
            .unwrap();
        assert!(top.is_none());
    }

    #[test]
    fn test_parity_summaries_use_one_sample_per_cow() {
        let fx = Fixture::new();
        let a1 = fx.add_animal("Sunrise", "A1", "F", None);
        let a2 = fx.add_animal("Sunrise", "A2", "F", None);
        let bull = fx.add_animal("Sunrise", "B1", "Bull", None);

        // A1 has three records; only the latest parity (4) counts for the average.
        for (date, parity) in [("2021-01-01", 2), ("2022-01-01", 3), ("2023-01-01", 4)] {
            fx.add_repro(NewRepro {
                animal_id: a1,
                breeding_date: Some(date),
                parity: Some(parity),
                ..Default::default()
            });
        }
        fx.add_repro(NewRepro {
            animal_id: a2,
            breeding_date: Some("2023-01-01"),
            parity: Some(1),
            ..Default::default()
        });
        fx.add_repro(NewRepro {
            animal_id: a2,
            breeding_date: Some("2023-09-01"),
            ..Default::default()
        });
        fx.add_repro(NewRepro {
            animal_id: bull,
            breeding_date: Some("2023-01-01"),
            parity: Some(9),
            ..Default::default()
        });

        let (average, highest) = fx
            .store()
            .with_connection(|conn| Ok((average_parity(conn)?, highest_parity_cow(conn)?)))
            .unwrap();

        assert_eq!(average, Some(2.5));
        assert_eq!(
            highest,
            Some(ParityLeader {
                ear_tag: "A1".to_string(),
                parity: 4
            })
        );
    }

    #[test]
    fn test_parity_summaries_without_data() {
        let fx = Fixture::new();
        fx.add_animal("Sunrise", "A1", "F", None);

        let (average, highest) = fx
            .store()
            .with_connection(|conn| Ok((average_parity(conn)?, highest_parity_cow(conn)?)))
            .unwrap();

        assert_eq!(average, None);
        assert_eq!(highest, None);
    }

    #[test]
    fn test_frequent_abortion_cow_needs_three() {
        let fx = Fixture::new();
        let a1 = fx.add_animal("Sunrise", "A1", "F", None);
        let a2 = fx.add_animal("Sunrise", "A2", "F", None);
        let a3 = fx.add_animal("Sunrise", "A3", "F", None);

        let abort = |animal_id, date| {
            fx.add_repro(NewRepro {
                animal_id,
                breeding_date: Some(date),
                delivery_status: Some("Abortion"),
                ..Default::default()
            });
        };

        for date in ["2022-01-01", "2022-06-01", "2023-01-01"] {
            abort(a1, date);
        }
        for date in ["2022-01-01", "2022-06-01", "2023-01-01", "2023-06-01"] {
            abort(a2, date);
        }
        // Two recent plus two outside the window: not frequent.
        for date in ["2019-01-01", "2020-01-01", "2023-01-01", "2023-06-01"] {
            abort(a3, date);
        }

        let leader = fx
            .store()
            .with_connection(|conn| frequent_abortion_cow(conn, today()))
            .unwrap();

        assert_eq!(
            leader,
            Some(AbortionLeader {
                ear_tag: "A2".to_string(),
                abortions: 4
            })
        );
    }

    #[test]
    fn test_two_abortions_is_not_frequent() {
        let fx = Fixture::new();
        let a1 = fx.add_animal("Sunrise", "A1", "F", None);
        for date in ["2023-01-01", "2023-06-01"] {
            fx.add_repro(NewRepro {
                animal_id: a1,
                breeding_date: Some(date),
                delivery_status: Some("abortion"),
                ..Default::default()
            });
        }

        let leader = fx
            .store()
            .with_connection(|conn| frequent_abortion_cow(conn, today()))
            .unwrap();

        assert!(leader.is_none());
    }
}
