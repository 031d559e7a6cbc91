// Farm Report - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod db;
pub mod dates;
pub mod config;
pub mod scope;
pub mod classify;
pub mod aggregates;
pub mod management;
pub mod reproduction;
pub mod trend;
pub mod report;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use db::{Animal, Gender, ReproRecord, Store};
pub use dates::{DateParseError, LactationPeriod, PeriodParseError, TrailingWindow};
pub use config::{Config, ConfigError};
pub use scope::{list_farms, resolve_scope, EventStatus, Scope, StatusFilter, UnknownStatusError};
pub use classify::{
    classify_breeding, classify_category, AnimalCategory, BreedingDiagnosis,
};
pub use reproduction::{AbortionLeader, ParityLeader, SireUsage};
pub use trend::trailing_12_month_series;
pub use report::{
    assemble_report, FarmReport, FarmStats, GeneralInfo, ManagementInfo, MetricWarning,
    ReportCharts, ReproductionInfo, NO_DATA,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
