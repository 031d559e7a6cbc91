// Farm report assembly.
//
// Each public metric runs on its own connection and never fails: a store error
// becomes a `MetricWarning` and the metric falls back to 0, an empty list or "-".

use crate::aggregates;
use crate::classify;
use crate::db::Store;
use crate::management;
use crate::reproduction::{self, AbortionLeader, ParityLeader, SireUsage};
use crate::scope::{self, EventStatus, Scope, StatusFilter};
use crate::trend;
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Sentinel shown when a metric has no data.
pub const NO_DATA: &str = "-";

/// A metric that could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricWarning {
    pub metric: &'static str,
    pub message: String,
}

impl fmt::Display for MetricWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.metric, self.message)
    }
}

// ============================================================================
// METRIC BOUNDARY
// ============================================================================

/// Metric calculator bound to one store and one report instant.
pub struct FarmStats<'a> {
    store: &'a Store,
    as_of: NaiveDateTime,
    warnings: Vec<MetricWarning>,
}

impl<'a> FarmStats<'a> {
    pub fn new(store: &'a Store, as_of: NaiveDateTime) -> Self {
        Self {
            store,
            as_of,
            warnings: Vec::new(),
        }
    }

    pub fn as_of(&self) -> NaiveDateTime {
        self.as_of
    }

    pub fn today(&self) -> NaiveDate {
        self.as_of.date()
    }

    pub fn warnings(&self) -> &[MetricWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<MetricWarning> {
        self.warnings
    }

    /// Run `op` on a fresh connection, returning `default` (and recording a warning) on failure.
    fn guarded<T, F>(&mut self, metric: &'static str, default: T, op: F) -> T
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        match self.store.with_connection(op) {
            Ok(value) => {
                debug!(metric, "metric computed");
                value
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!(metric, error = %message, "metric failed, using default");
                self.warnings.push(MetricWarning { metric, message });
                default
            }
        }
    }

    pub fn farms(&mut self) -> Vec<String> {
        self.guarded("list_farms", Vec::new(), scope::list_farms)
    }

    pub fn resolve_scope(&mut self, farm: &str, status: StatusFilter) -> Scope {
        self.guarded("resolve_scope", Scope::empty(farm, status), |conn| {
            scope::resolve_scope(conn, farm, status)
        })
    }

    pub fn total_animals(&self, scope: &Scope) -> usize {
        aggregates::total_count(scope)
    }

    pub fn total_milk_yield(&mut self, scope: &Scope) -> f64 {
        if scope.is_empty() {
            return 0.0;
        }
        self.guarded("total_milk_yield", 0.0, |conn| {
            aggregates::total_milk_yield(conn, scope)
        })
    }

    pub fn total_lactation_days(&mut self, scope: &Scope) -> u64 {
        if scope.is_empty() {
            return 0;
        }
        self.guarded("total_lactation_days", 0, |conn| {
            aggregates::total_lactation_days(conn, scope)
        })
    }

    pub fn yield_by_year(&mut self, scope: &Scope) -> Vec<(i32, f64)> {
        if scope.is_empty() {
            return Vec::new();
        }
        self.guarded("yield_by_year", Vec::new(), |conn| {
            aggregates::yield_by_year(conn, scope)
        })
    }

    pub fn abortion_count(&mut self, scope: &Scope) -> u64 {
        if scope.is_empty() {
            return 0;
        }
        self.guarded("abortion_count", 0, |conn| {
            aggregates::abortion_count(conn, scope)
        })
    }

    pub fn heifer_count(&mut self, farm: &str) -> u64 {
        let today = self.today();
        self.guarded("heifer_count", 0, |conn| {
            aggregates::heifer_count(conn, farm, today)
        })
    }

    pub fn bull_count(&mut self, farm: &str) -> u64 {
        self.guarded("bull_count", 0, |conn| aggregates::bull_count(conn, farm))
    }

    pub fn breeding_diagnosis(&mut self, animal_id: i64) -> classify::BreedingDiagnosis {
        self.guarded("breeding_diagnosis", classify::BreedingDiagnosis::Open, |conn| {
            classify::classify_breeding(conn, animal_id)
        })
    }

    pub fn animal_category(&mut self, animal_id: i64) -> classify::AnimalCategory {
        let today = self.today();
        self.guarded("animal_category", classify::AnimalCategory::Fattening, |conn| {
            classify::classify_category(conn, animal_id, today)
        })
    }

    pub fn breeding_distribution(&mut self, scope: &Scope) -> Vec<(String, u64)> {
        if scope.is_empty() {
            return Vec::new();
        }
        self.guarded("breeding_distribution", Vec::new(), |conn| {
            classify::breeding_distribution(conn, scope)
        })
    }

    pub fn category_distribution(&mut self, scope: &Scope) -> Vec<(String, u64)> {
        if scope.is_empty() {
            return Vec::new();
        }
        let today = self.today();
        self.guarded("category_distribution", Vec::new(), |conn| {
            classify::category_distribution(conn, scope, today)
        })
    }

    pub fn monthly_yield_trend(&mut self, scope: &Scope) -> Vec<(String, f64)> {
        let today = self.today();
        let grid = trend::align_monthly_series(&[], today);
        if scope.is_empty() {
            return grid;
        }
        self.guarded("monthly_yield_trend", grid, |conn| {
            trend::trailing_12_month_series(conn, scope, today)
        })
    }

    pub fn recent_births(&mut self) -> u64 {
        let now = self.as_of;
        self.guarded("recent_births", 0, |conn| {
            management::recent_births_count(conn, now)
        })
    }

    pub fn recent_calf_tags(&mut self) -> Vec<String> {
        let now = self.as_of;
        self.guarded("recent_calf_tags", Vec::new(), |conn| {
            management::recent_calf_tags(conn, now)
        })
    }

    pub fn issue_count(&mut self, status: EventStatus) -> u64 {
        let now = self.as_of;
        let metric = match status {
            EventStatus::Cull => "cull_count",
            EventStatus::Sell => "sales",
            EventStatus::Dead => "deaths",
            EventStatus::Owned => "owned_count",
        };
        self.guarded(metric, 0, |conn| {
            management::issue_count(conn, status, now)
        })
    }

    pub fn top_sire(&mut self) -> Option<SireUsage> {
        let today = self.today();
        self.guarded("top_sire", None, |conn| reproduction::top_sire(conn, today))
    }

    pub fn top3_sire_usage(&mut self) -> Vec<SireUsage> {
        let today = self.today();
        self.guarded("top3_sire_usage", Vec::new(), |conn| {
            reproduction::top_sires(conn, today, 3)
        })
    }

    pub fn average_parity(&mut self) -> Option<f64> {
        self.guarded("average_parity", None, reproduction::average_parity)
    }

    pub fn highest_parity_cow(&mut self) -> Option<ParityLeader> {
        self.guarded("highest_parity_cow", None, reproduction::highest_parity_cow)
    }

    pub fn frequent_abortion_cow(&mut self) -> Option<AbortionLeader> {
        let today = self.today();
        self.guarded("frequent_abortion_cow", None, |conn| {
            reproduction::frequent_abortion_cow(conn, today)
        })
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

pub fn format_top_sire(sire: Option<&SireUsage>) -> String {
    match sire {
        Some(s) => format!("{} ({} times)", s.bull_name, s.count),
        None => NO_DATA.to_string(),
    }
}

/// One `"<name>: <n> times"` line per sire, or `-` when there are none.
pub fn format_sire_usage(sires: &[(String, u64)]) -> String {
    if sires.is_empty() {
        return NO_DATA.to_string();
    }
    sires
        .iter()
        .map(|(name, count)| format!("{name}: {count} times"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_average_parity(average: Option<f64>) -> String {
    average.map_or_else(|| NO_DATA.to_string(), |avg| format!("{avg:.1}"))
}

pub fn format_parity_leader(leader: Option<&ParityLeader>) -> String {
    leader.map_or_else(
        || NO_DATA.to_string(),
        |l| format!("{} ({})", l.ear_tag, l.parity),
    )
}

pub fn format_abortion_leader(leader: Option<&AbortionLeader>) -> String {
    leader.map_or_else(
        || NO_DATA.to_string(),
        |l| format!("{} ({})", l.ear_tag, l.abortions),
    )
}

pub fn format_calf_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        NO_DATA.to_string()
    } else {
        tags.join(", ")
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralInfo {
    pub total_animals: usize,
    pub heifer_count: u64,
    pub bull_count: u64,
    pub total_milk_yield: f64,
    pub total_lactation_days: u64,
    pub abortion_count: u64,
}

/// Trailing three-month counters (all farms).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagementInfo {
    pub births: u64,
    pub calf_tags: Vec<String>,
    pub cull_count: u64,
    pub sales: u64,
    pub deaths: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReproductionInfo {
    pub top_sire: String,
    pub sire_usage: Vec<(String, u64)>,
    pub average_parity: String,
    pub highest_parity_cow: String,
    pub frequent_abortion_cow: String,
}

/// Chart-ready `(label, value)` series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCharts {
    pub breeding_diagnosis: Vec<(String, u64)>,
    pub animal_category: Vec<(String, u64)>,
    pub yield_by_year: Vec<(i32, f64)>,
    pub monthly_yield: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FarmReport {
    pub farm: String,
    pub status: StatusFilter,
    pub as_of: NaiveDateTime,
    pub general: GeneralInfo,
    pub management: ManagementInfo,
    pub reproduction: ReproductionInfo,
    pub charts: ReportCharts,
    pub warnings: Vec<MetricWarning>,
}

/// Compute every metric of the report for one farm/status selection.
pub fn assemble_report(store: &Store, farm: &str, status: StatusFilter, as_of: NaiveDateTime) -> FarmReport {
    let mut stats = FarmStats::new(store, as_of);
    let scope = stats.resolve_scope(farm, status);

    let general = GeneralInfo {
        total_animals: stats.total_animals(&scope),
        heifer_count: stats.heifer_count(farm),
        bull_count: stats.bull_count(farm),
        total_milk_yield: stats.total_milk_yield(&scope),
        total_lactation_days: stats.total_lactation_days(&scope),
        abortion_count: stats.abortion_count(&scope),
    };

    let management = ManagementInfo {
        births: stats.recent_births(),
        calf_tags: stats.recent_calf_tags(),
        cull_count: stats.issue_count(EventStatus::Cull),
        sales: stats.issue_count(EventStatus::Sell),
        deaths: stats.issue_count(EventStatus::Dead),
    };

    let top_sire = stats.top_sire();
    let sire_usage = stats.top3_sire_usage();
    let average_parity = stats.average_parity();
    let highest_parity = stats.highest_parity_cow();
    let frequent_abortion = stats.frequent_abortion_cow();

    let reproduction = ReproductionInfo {
        top_sire: format_top_sire(top_sire.as_ref()),
        sire_usage: sire_usage
            .into_iter()
            .map(|s| (s.bull_name, s.count))
            .collect(),
        average_parity: format_average_parity(average_parity),
        highest_parity_cow: format_parity_leader(highest_parity.as_ref()),
        frequent_abortion_cow: format_abortion_leader(frequent_abortion.as_ref()),
    };

    let charts = ReportCharts {
        breeding_diagnosis: stats.breeding_distribution(&scope),
        animal_category: stats.category_distribution(&scope),
        yield_by_year: stats.yield_by_year(&scope),
        monthly_yield: stats.monthly_yield_trend(&scope),
    };

    FarmReport {
        farm: farm.to_string(),
        status,
        as_of,
        general,
        management,
        reproduction,
        charts,
        warnings: stats.into_warnings(),
    }
}

impl fmt::Display for FarmReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Farm: {} (Status: {})", self.farm, self.status)?;
        writeln!(f, "As of: {}", self.as_of.format(crate::dates::DATETIME_FORMAT))?;

        writeln!(f, "\nGeneral Info")?;
        writeln!(f, "  Total Animals:        {}", self.general.total_animals)?;
        writeln!(f, "  Heifer Count:         {}", self.general.heifer_count)?;
        writeln!(f, "  Bull Count:           {}", self.general.bull_count)?;
        writeln!(f, "  Total Milk Yield:     {:.1}", self.general.total_milk_yield)?;
        writeln!(f, "  Total Lactation Days: {}", self.general.total_lactation_days)?;
        writeln!(f, "  Abortions:            {}", self.general.abortion_count)?;

        writeln!(f, "\nManagement (Last 3 Months)")?;
        writeln!(f, "  Births:     {} times", self.management.births)?;
        writeln!(f, "  Calf Tags:  {}", format_calf_tags(&self.management.calf_tags))?;
        writeln!(f, "  Cull Count: {}", self.management.cull_count)?;
        writeln!(f, "  Sales:      {}", self.management.sales)?;
        writeln!(f, "  Deaths:     {}", self.management.deaths)?;

        writeln!(f, "\nUsage & Reproduction")?;
        writeln!(f, "  Top Sire (3 Years):     {}", self.reproduction.top_sire)?;
        let usage = format_sire_usage(&self.reproduction.sire_usage);
        if self.reproduction.sire_usage.is_empty() {
            writeln!(f, "  Sire Usage (Top 3):     {usage}")?;
        } else {
            writeln!(f, "  Sire Usage (Top 3):")?;
            for line in usage.lines() {
                writeln!(f, "    {line}")?;
            }
        }
        writeln!(f, "  Average Parity:         {}", self.reproduction.average_parity)?;
        writeln!(f, "  Highest Parity Cow:     {}", self.reproduction.highest_parity_cow)?;
        writeln!(f, "  Frequent Abortion Cow:  {}", self.reproduction.frequent_abortion_cow)?;

        writeln!(f, "\nBreeding Diagnosis")?;
        write_counts(f, &self.charts.breeding_diagnosis, "No Breeding Diagnosis Data")?;
        writeln!(f, "\nAnimal Category")?;
        write_counts(f, &self.charts.animal_category, "No Animal Category Data")?;

        writeln!(f, "\nMilk Yield by Year")?;
        if self.charts.yield_by_year.is_empty() {
            writeln!(f, "  {NO_DATA}")?;
        }
        for (year, total) in &self.charts.yield_by_year {
            writeln!(f, "  {year}: {total:.1}")?;
        }

        writeln!(f, "\nMilk Yield Trend (Past 12 Months)")?;
        for (month, total) in &self.charts.monthly_yield {
            writeln!(f, "  {month}: {total:.1}")?;
        }

        if !self.warnings.is_empty() {
            writeln!(f, "\nWarnings")?;
            for warning in &self.warnings {
                writeln!(f, "  {warning}")?;
            }
        }

        Ok(())
    }
}

fn write_counts(f: &mut fmt::Formatter<'_>, counts: &[(String, u64)], empty: &str) -> fmt::Result {
    if counts.is_empty() {
        return writeln!(f, "  {empty}");
    }
    for (label, count) in counts {
        writeln!(f, "  {label:<10} {count}")?;
    }
    Ok(())
}
