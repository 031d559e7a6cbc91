//! Temporary SQLite fixtures shared by the unit tests.

use crate::db::Store;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use tempfile::TempDir;

const SCHEMA: &str = "
    CREATE TABLE animals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ear_tag TEXT,
        farm_name TEXT,
        gender TEXT,
        birth_date TEXT
    );
    CREATE TABLE issue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        farm_name TEXT,
        ear_tag TEXT,
        event_status TEXT,
        event_date TEXT
    );
    CREATE TABLE repro (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        animal_id INTEGER,
        breeding_date TEXT,
        bull_name TEXT,
        parity INTEGER,
        pregnancy_status TEXT,
        delivery_status TEXT,
        calving_date TEXT,
        calf_tag_number TEXT
    );
    CREATE TABLE lactation (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        animal_id INTEGER,
        period TEXT
    );
    CREATE TABLE milk_yield (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ear_tag TEXT,
        record_date TEXT,
        yield_value REAL
    );
";

#[derive(Debug, Default, Clone, Copy)]
pub struct NewRepro<'a> {
    pub animal_id: i64,
    pub breeding_date: Option<&'a str>,
    pub bull_name: Option<&'a str>,
    pub parity: Option<i64>,
    pub pregnancy_status: Option<&'a str>,
    pub delivery_status: Option<&'a str>,
    pub calving_date: Option<&'a str>,
    pub calf_tag_number: Option<&'a str>,
}

/// A database file in a temporary directory, with a writable connection for seeding.
pub struct Fixture {
    _dir: TempDir,
    path: PathBuf,
    conn: Connection,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("animals.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        Self {
            _dir: dir,
            path,
            conn,
        }
    }

    pub fn store(&self) -> Store {
        Store::open(&self.path)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn add_animal(&self, farm: &str, ear_tag: &str, gender: &str, birth_date: Option<&str>) -> i64 {
        self.conn
            .execute(
                "INSERT INTO animals (ear_tag, farm_name, gender, birth_date) VALUES (?1, ?2, ?3, ?4)",
                params![ear_tag, farm, gender, birth_date],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    pub fn add_issue(&self, farm: &str, ear_tag: &str, status: &str, event_date: &str) {
        self.conn
            .execute(
                "INSERT INTO issue (farm_name, ear_tag, event_status, event_date) VALUES (?1, ?2, ?3, ?4)",
                params![farm, ear_tag, status, event_date],
            )
            .unwrap();
    }

    pub fn add_repro(&self, repro: NewRepro<'_>) -> i64 {
        self.conn
            .execute(
                "INSERT INTO repro (
                    animal_id, breeding_date, bull_name, parity,
                    pregnancy_status, delivery_status, calving_date, calf_tag_number
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    repro.animal_id,
                    repro.breeding_date,
                    repro.bull_name,
                    repro.parity,
                    repro.pregnancy_status,
                    repro.delivery_status,
                    repro.calving_date,
                    repro.calf_tag_number,
                ],
            )
            .unwrap();
        self.conn.last_insert_rowid()
    }

    pub fn add_lactation(&self, animal_id: i64, period: &str) {
        self.conn
            .execute(
                "INSERT INTO lactation (animal_id, period) VALUES (?1, ?2)",
                params![animal_id, period],
            )
            .unwrap();
    }

    pub fn add_milk(&self, ear_tag: &str, record_date: &str, yield_value: f64) {
        self.conn
            .execute(
                "INSERT INTO milk_yield (ear_tag, record_date, yield_value) VALUES (?1, ?2, ?3)",
                params![ear_tag, record_date, yield_value],
            )
            .unwrap();
    }
}
