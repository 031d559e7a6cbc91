use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only handle on the livestock database.
///
/// The handle only remembers where the database lives. Every operation acquires its own
/// connection through [`Store::with_connection`], so nothing is shared between calls.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire a connection, run `f`, and close the connection on every exit path.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database {}", self.path.display()))?;

        let result = f(&conn);

        if let Err((_conn, err)) = conn.close() {
            debug!(error = %err, path = %self.path.display(), "closing connection failed");
            if result.is_ok() {
                return Err(err).context("Failed to close database connection");
            }
        }

        result
    }
}

// ============================================================================
// ROW TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Gender {
    Female,
    Bull,
    Other(String),
}

impl Gender {
    /// Female animals are stored as `F`, bulls as `Bull`. Anything else is kept verbatim.
    pub fn from_db(raw: Option<&str>) -> Self {
        match raw {
            Some("F") => Gender::Female,
            Some("Bull") => Gender::Bull,
            Some(other) => Gender::Other(other.to_string()),
            None => Gender::Other(String::new()),
        }
    }

    pub fn is_female(&self) -> bool {
        matches!(self, Gender::Female)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Animal {
    pub id: i64,
    pub ear_tag: String,
    pub farm_name: String,
    pub gender: Gender,
    pub birth_date: Option<String>,
}

impl Animal {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let gender: Option<String> = row.get(3)?;
        Ok(Animal {
            id: row.get(0)?,
            ear_tag: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            farm_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            gender: Gender::from_db(gender.as_deref()),
            birth_date: row.get(4)?,
        })
    }
}

/// One breeding attempt and its outcome.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReproRecord {
    pub id: i64,
    pub animal_id: i64,
    pub breeding_date: Option<String>,
    pub bull_name: Option<String>,
    pub parity: Option<i64>,
    pub pregnancy_status: Option<String>,
    pub delivery_status: Option<String>,
    pub calving_date: Option<String>,
    pub calf_tag_number: Option<String>,
}

impl ReproRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ReproRecord {
            id: row.get(0)?,
            animal_id: row.get(1)?,
            breeding_date: row.get(2)?,
            bull_name: row.get(3)?,
            parity: row.get(4)?,
            pregnancy_status: row.get(5)?,
            delivery_status: row.get(6)?,
            calving_date: row.get(7)?,
            calf_tag_number: row.get(8)?,
        })
    }

    pub fn has_calved(&self) -> bool {
        self.calving_date
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

// ============================================================================
// LOOKUPS
// ============================================================================

const ANIMAL_COLUMNS: &str = "id, ear_tag, farm_name, gender, birth_date";

pub fn find_animal(conn: &Connection, animal_id: i64) -> Result<Option<Animal>> {
    let sql = format!("SELECT {ANIMAL_COLUMNS} FROM animals WHERE id = ?1");
    conn.query_row(&sql, params![animal_id], Animal::from_row)
        .optional()
        .with_context(|| format!("Failed to load animal {animal_id}"))
}

/// Animals of `farm` whose ear tag appears in `tags_json` (a JSON array of strings).
pub fn animals_by_tags(conn: &Connection, farm: &str, tags_json: &str) -> Result<Vec<Animal>> {
    let sql = format!(
        "SELECT {ANIMAL_COLUMNS}
           FROM animals
          WHERE farm_name = ?1
            AND ear_tag IN (SELECT value FROM json_each(?2))
          ORDER BY ear_tag, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let animals = stmt
        .query_map(params![farm, tags_json], Animal::from_row)?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to load animals in scope")?;

    Ok(animals)
}

/// Latest reproduction record by breeding date. Equal dates resolve to the highest row id.
pub fn latest_repro(conn: &Connection, animal_id: i64) -> Result<Option<ReproRecord>> {
    conn.query_row(
        "SELECT id, animal_id, breeding_date, bull_name, parity,
                pregnancy_status, delivery_status, calving_date, calf_tag_number
           FROM repro
          WHERE animal_id = ?1
          ORDER BY breeding_date DESC, id DESC
          LIMIT 1",
        params![animal_id],
        ReproRecord::from_row,
    )
    .optional()
    .with_context(|| format!("Failed to load latest repro record for animal {animal_id}"))
}

/// Latest lactation period string, compared as text.
pub fn latest_lactation_period(conn: &Connection, animal_id: i64) -> Result<Option<String>> {
    let period: Option<Option<String>> = conn
        .query_row(
            "SELECT period
               FROM lactation
              WHERE animal_id = ?1
              ORDER BY period DESC, id DESC
              LIMIT 1",
            params![animal_id],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to load lactation period for animal {animal_id}"))?;

    Ok(period.flatten().filter(|p| !p.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, NewRepro};

    #[test]
    fn test_with_connection_reads_fixture() {
        let fx = Fixture::new();
        fx.add_animal("Sunrise", "A1", "F", Some("2020-01-01"));

        let count: i64 = fx
            .store()
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM animals", [], |row| row.get(0))?)
            })
            .unwrap();

        assert_eq!(count, 1);
    }

    #[test]
    fn test_store_is_read_only() {
        let fx = Fixture::new();

        let result = fx.store().with_connection(|conn| {
            conn.execute("DELETE FROM animals", [])?;
            Ok(())
        });

        assert!(result.is_err(), "writes must be rejected by a read-only connection");
    }

    #[test]
    fn test_missing_database_is_an_error() {
        let store = Store::open("/nonexistent/dir/animals.db");
        let result = store.with_connection(|_conn| Ok(()));

        assert!(result.is_err());
    }

    #[test]
    fn test_closure_error_is_returned() {
        let fx = Fixture::new();
        let result: Result<()> = fx
            .store()
            .with_connection(|conn| Ok(conn.execute_batch("SELECT * FROM no_such_table")?));

        assert!(result.is_err());
    }

    #[test]
    fn test_gender_from_db() {
        assert_eq!(Gender::from_db(Some("F")), Gender::Female);
        assert_eq!(Gender::from_db(Some("Bull")), Gender::Bull);
        assert_eq!(Gender::from_db(Some("M")), Gender::Other("M".to_string()));
        assert_eq!(Gender::from_db(None), Gender::Other(String::new()));
        assert!(!Gender::Bull.is_female());
    }

    #[test]
    fn test_latest_repro_prefers_latest_date_then_highest_id() {
        let fx = Fixture::new();
        let id = fx.add_animal("Sunrise", "A1", "F", None);
        fx.add_repro(NewRepro {
            animal_id: id,
            breeding_date: Some("2023-06-01"),
            bull_name: Some("First"),
            ..Default::default()
        });
        fx.add_repro(NewRepro {
            animal_id: id,
            breeding_date: Some("2023-06-01"),
            bull_name: Some("Second"),
            ..Default::default()
        });
        fx.add_repro(NewRepro {
            animal_id: id,
            breeding_date: Some("2023-01-01"),
            bull_name: Some("Older"),
            ..Default::default()
        });

        let latest = fx
            .store()
            .with_connection(|conn| latest_repro(conn, id))
            .unwrap()
            .unwrap();

        assert_eq!(latest.bull_name.as_deref(), Some("Second"));
    }

    #[test]
    fn test_latest_lactation_period_orders_by_text() {
        let fx = Fixture::new();
        let id = fx.add_animal("Sunrise", "A1", "F", None);
        fx.add_lactation(id, "2023-01-01 ~ 2023-09-30");
        fx.add_lactation(id, "2024-01-01 ~ 2024-01-20");

        let period = fx
            .store()
            .with_connection(|conn| latest_lactation_period(conn, id))
            .unwrap();

        assert_eq!(period.as_deref(), Some("2024-01-01 ~ 2024-01-20"));
    }

    #[test]
    fn test_has_calved_ignores_blank_dates() {
        let mut record = ReproRecord::default();
        assert!(!record.has_calved());

        record.calving_date = Some("   ".to_string());
        assert!(!record.has_calved());

        record.calving_date = Some("2023-10-01".to_string());
        assert!(record.has_calved());
    }
}
