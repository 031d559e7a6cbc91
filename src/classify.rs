// 🐄 Per-animal derived state: breeding diagnosis and animal category.
//
// Both classifiers look at the latest related record only. Malformed data never
// fails a classification; it selects the default outcome instead.

use crate::dates::LactationPeriod;
use crate::db::{self, Gender, ReproRecord};
use crate::scope::Scope;
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

/// Pregnancy status marker written by the data-entry system.
pub const PREGNANT_MARKER: &str = "임신";

/// A lactation that ended at most this many days ago still counts as milking.
pub const MILKING_GAP_DAYS: i64 = 10;

// ============================================================================
// BREEDING DIAGNOSIS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BreedingDiagnosis {
    Open,
    Pregnant,
    Mating,
}

impl BreedingDiagnosis {
    pub const ALL: [BreedingDiagnosis; 3] = [
        BreedingDiagnosis::Open,
        BreedingDiagnosis::Pregnant,
        BreedingDiagnosis::Mating,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BreedingDiagnosis::Open => "Open",
            BreedingDiagnosis::Pregnant => "Pregnant",
            BreedingDiagnosis::Mating => "Mating",
        }
    }
}

/// Diagnose from the animal's gender and its latest reproduction record.
pub fn diagnose(gender: &Gender, latest: Option<&ReproRecord>) -> BreedingDiagnosis {
    if !gender.is_female() {
        return BreedingDiagnosis::Open;
    }

    let Some(record) = latest else {
        return BreedingDiagnosis::Mating;
    };

    // A completed calving resets the animal to open.
    if record.has_calved() {
        return BreedingDiagnosis::Open;
    }

    match record.pregnancy_status.as_deref().map(str::trim) {
        Some(PREGNANT_MARKER) => BreedingDiagnosis::Pregnant,
        _ => BreedingDiagnosis::Mating,
    }
}

/// Breeding diagnosis of one animal. Unknown animals are `Open`.
pub fn classify_breeding(conn: &Connection, animal_id: i64) -> Result<BreedingDiagnosis> {
    let Some(animal) = db::find_animal(conn, animal_id)? else {
        return Ok(BreedingDiagnosis::Open);
    };
    if !animal.gender.is_female() {
        return Ok(BreedingDiagnosis::Open);
    }

    let latest = db::latest_repro(conn, animal_id)?;
    Ok(diagnose(&animal.gender, latest.as_ref()))
}

// ============================================================================
// ANIMAL CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnimalCategory {
    Fattening,
    Milking,
    Dry,
}

impl AnimalCategory {
    pub const ALL: [AnimalCategory; 3] = [
        AnimalCategory::Fattening,
        AnimalCategory::Milking,
        AnimalCategory::Dry,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AnimalCategory::Fattening => "Fattening",
            AnimalCategory::Milking => "Milking",
            AnimalCategory::Dry => "Dry",
        }
    }
}

/// Categorize from the animal's latest lactation period string.
pub fn categorize(latest_period: Option<&str>, today: NaiveDate) -> AnimalCategory {
    let Some(raw) = latest_period else {
        return AnimalCategory::Fattening;
    };

    match LactationPeriod::parse(raw) {
        Ok(period) if period.days_since_end(today) <= MILKING_GAP_DAYS => AnimalCategory::Milking,
        Ok(_) => AnimalCategory::Dry,
        Err(err) => {
            debug!(period = raw, error = %err, "unparseable lactation period");
            AnimalCategory::Fattening
        }
    }
}

/// Animal category of one animal. Unknown animals are `Fattening`.
pub fn classify_category(conn: &Connection, animal_id: i64, today: NaiveDate) -> Result<AnimalCategory> {
    let period = db::latest_lactation_period(conn, animal_id)?;
    Ok(categorize(period.as_deref(), today))
}

// ============================================================================
// DISTRIBUTIONS
// ============================================================================

fn tally<T: PartialEq + Copy>(order: &[T], values: &[T], label: impl Fn(&T) -> &'static str) -> Vec<(String, u64)> {
    order
        .iter()
        .map(|wanted| {
            let count = values.iter().filter(|v| *v == wanted).count() as u64;
            (label(wanted).to_string(), count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// Breeding diagnosis counts over a scope, in `Open, Pregnant, Mating` order, zero counts omitted.
pub fn breeding_distribution(conn: &Connection, scope: &Scope) -> Result<Vec<(String, u64)>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let animals = db::animals_by_tags(conn, scope.farm(), &scope.tags_json()?)?;
    let mut diagnoses = Vec::with_capacity(animals.len());
    for animal in &animals {
        let latest = if animal.gender.is_female() {
            db::latest_repro(conn, animal.id)?
        } else {
            None
        };
        diagnoses.push(diagnose(&animal.gender, latest.as_ref()));
    }

    Ok(tally(&BreedingDiagnosis::ALL, &diagnoses, BreedingDiagnosis::label))
}

/// Animal category counts over a scope, in `Fattening, Milking, Dry` order, zero counts omitted.
pub fn category_distribution(conn: &Connection, scope: &Scope, today: NaiveDate) -> Result<Vec<(String, u64)>> {
    if scope.is_empty() {
        return Ok(Vec::new());
    }

    let animals = db::animals_by_tags(conn, scope.farm(), &scope.tags_json()?)?;
    let mut categories = Vec::with_capacity(animals.len());
    for animal in &animals {
        categories.push(classify_category(conn, animal.id, today)?);
    }

    Ok(tally(&AnimalCategory::ALL, &categories, AnimalCategory::label))
}
