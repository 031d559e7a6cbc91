// Filter resolver: which animals of a farm a report covers.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Life-cycle state recorded by an ownership event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    Owned,
    Sell,
    Dead,
    Cull,
}

impl EventStatus {
    pub const ALL: [EventStatus; 4] = [
        EventStatus::Owned,
        EventStatus::Sell,
        EventStatus::Dead,
        EventStatus::Cull,
    ];

    /// Value stored in `issue.event_status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Owned => "owned",
            EventStatus::Sell => "Sell",
            EventStatus::Dead => "Dead",
            EventStatus::Cull => "Cull",
        }
    }
}

/// Status selector of a report: every animal, or only those in one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    Total,
    Only(EventStatus),
}

impl StatusFilter {
    pub const TOTAL: &'static str = "Total";

    /// Selector options in display order.
    pub const OPTIONS: [StatusFilter; 5] = [
        StatusFilter::Only(EventStatus::Owned),
        StatusFilter::Only(EventStatus::Sell),
        StatusFilter::Only(EventStatus::Dead),
        StatusFilter::Only(EventStatus::Cull),
        StatusFilter::Total,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::Total => Self::TOTAL,
            StatusFilter::Only(status) => status.as_str(),
        }
    }

    pub fn next(&self) -> Self {
        let idx = Self::OPTIONS.iter().position(|s| s == self).unwrap_or(0);
        Self::OPTIONS[(idx + 1) % Self::OPTIONS.len()]
    }
}

impl Default for StatusFilter {
    fn default() -> Self {
        StatusFilter::Only(EventStatus::Owned)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StatusFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status '{0}' (expected one of: owned, Sell, Dead, Cull, Total)")]
pub struct UnknownStatusError(pub String);

impl FromStr for StatusFilter {
    type Err = UnknownStatusError;

    /// Case-insensitive; the canonical spelling is what reaches the database.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case(Self::TOTAL) {
            return Ok(StatusFilter::Total);
        }

        EventStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .map(StatusFilter::Only)
            .ok_or_else(|| UnknownStatusError(s.to_string()))
    }
}

/// Ear tags of one farm selected by a status filter, ascending and without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    farm: String,
    status: StatusFilter,
    ear_tags: Vec<String>,
}

impl Scope {
    pub fn new(farm: impl Into<String>, status: StatusFilter, mut ear_tags: Vec<String>) -> Self {
        ear_tags.retain(|tag| !tag.is_empty());
        ear_tags.sort();
        ear_tags.dedup();
        Scope {
            farm: farm.into(),
            status,
            ear_tags,
        }
    }

    pub fn empty(farm: impl Into<String>, status: StatusFilter) -> Self {
        Self::new(farm, status, Vec::new())
    }

    pub fn farm(&self) -> &str {
        &self.farm
    }

    pub fn status(&self) -> StatusFilter {
        self.status
    }

    pub fn ear_tags(&self) -> &[String] {
        &self.ear_tags
    }

    pub fn len(&self) -> usize {
        self.ear_tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ear_tags.is_empty()
    }

    pub fn contains(&self, ear_tag: &str) -> bool {
        self.ear_tags
            .binary_search_by(|tag| tag.as_str().cmp(ear_tag))
            .is_ok()
    }

    pub fn is_subset_of(&self, other: &Scope) -> bool {
        self.ear_tags.iter().all(|tag| other.contains(tag))
    }

    /// Ear tags as a JSON array, bound to `json_each(?)` in scoped queries.
    pub fn tags_json(&self) -> Result<String> {
        serde_json::to_string(&self.ear_tags).context("Failed to encode scope ear tags")
    }
}

/// Resolve the ear tags of `farm` selected by `status`.
///
/// An animal's effective status is the status of its latest ownership event
/// (by event date, then row id), or `owned` when it has none.
pub fn resolve_scope(conn: &Connection, farm: &str, status: StatusFilter) -> Result<Scope> {
    let ear_tags = match status {
        StatusFilter::Total => {
            let mut stmt = conn.prepare(
                "SELECT ear_tag
                   FROM animals
                  WHERE farm_name = ?1
                    AND ear_tag IS NOT NULL AND ear_tag != ''
                  ORDER BY ear_tag",
            )?;
            let tags = stmt
                .query_map(params![farm], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>();
            tags
        }
        StatusFilter::Only(wanted) => {
            let mut stmt = conn.prepare(
                "SELECT a.ear_tag
                   FROM animals a
                  WHERE a.farm_name = ?1
                    AND a.ear_tag IS NOT NULL AND a.ear_tag != ''
                    AND COALESCE((
                            SELECT i.event_status
                              FROM issue i
                             WHERE i.farm_name = a.farm_name AND i.ear_tag = a.ear_tag
                             ORDER BY i.event_date DESC, i.id DESC
                             LIMIT 1
                        ), 'owned') = ?2
                  ORDER BY a.ear_tag",
            )?;
            let tags = stmt
                .query_map(params![farm, wanted.as_str()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>();
            tags
        }
    }
    .with_context(|| format!("Failed to resolve scope for farm {farm} ({status})"))?;

    Ok(Scope::new(farm, status, ear_tags))
}

/// Distinct non-empty farm names, ascending.
pub fn list_farms(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT farm_name
           FROM animals
          WHERE farm_name IS NOT NULL AND farm_name != ''
          ORDER BY farm_name",
    )?;

    let farms = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()
        .context("Failed to list farms")?;

    Ok(farms)
}
