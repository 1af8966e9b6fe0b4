//! Data models for displacement statistics.
//!
//! This module contains the core data structures shared by the client,
//! the aggregation engine and the report renderers.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Field name carried by points of the combined (single-series) line.
pub const AGGREGATE_FIELD: &str = "total";

/// One observation: displacements recorded for a country in a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TimeseriesEntry")]
pub struct StatisticRecord {
    /// Year of the observation.
    pub year: i32,
    /// ISO3 code of the country the figure belongs to.
    pub country_iso3: String,
    /// Number of internal displacements.
    pub total: u64,
}

#[cfg(test)]
impl StatisticRecord {
    pub fn new(year: i32, country_iso3: impl Into<String>, total: u64) -> Self {
        Self {
            year,
            country_iso3: country_iso3.into(),
            total,
        }
    }
}

/// Country node as returned inside a `timeseries` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountryNode {
    iso3: String,
    #[allow(dead_code)] // Returned by the backend, unused by the engine
    #[serde(default)]
    id: Option<String>,
    #[allow(dead_code)] // Names come from the reference tables instead
    #[serde(default)]
    country_name: Option<String>,
}

/// Wire shape of a `timeseries` entry.
#[derive(Debug, Clone, Deserialize)]
struct TimeseriesEntry {
    country: CountryNode,
    year: i32,
    #[serde(default)]
    total: Option<u64>,
}

impl From<TimeseriesEntry> for StatisticRecord {
    fn from(entry: TimeseriesEntry) -> Self {
        Self {
            year: entry.year,
            country_iso3: entry.country.iso3,
            total: entry.total.unwrap_or(0),
        }
    }
}

/// Displacements attributed to one hazard category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CategoryEntry")]
pub struct CategoryTotal {
    /// Category name, unique within a result set.
    pub label: String,
    /// Number of internal displacements.
    pub total: u64,
}

#[cfg(test)]
impl CategoryTotal {
    pub fn new(label: impl Into<String>, total: u64) -> Self {
        Self {
            label: label.into(),
            total,
        }
    }
}

/// Wire shape of a category entry; the backend may send a null total.
#[derive(Debug, Clone, Deserialize)]
struct CategoryEntry {
    label: String,
    #[serde(default)]
    total: Option<u64>,
}

impl From<CategoryEntry> for CategoryTotal {
    fn from(entry: CategoryEntry) -> Self {
        Self {
            label: entry.label,
            total: entry.total.unwrap_or(0),
        }
    }
}

/// Result set of the disaster statistics query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterStatistics {
    /// Headline figure: new displacements over the selection.
    #[serde(default)]
    pub new_displacements: Option<u64>,
    /// Headline figure: number of disaster events reported.
    #[serde(default)]
    pub total_events: Option<u64>,
    /// Displacements per hazard category.
    #[serde(default)]
    pub categories: Vec<CategoryTotal>,
    /// Per-country yearly figures.
    #[serde(default)]
    pub timeseries: Vec<StatisticRecord>,
}

/// Identifies which line a point belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "lowercase")]
pub enum SeriesKey {
    /// The combined total over every effective country.
    Aggregate,
    /// A single explicitly selected country.
    Country(String),
    /// A selected region, summed over its member countries.
    Region(String),
}

impl SeriesKey {
    /// Name of the field that carries this series' value on a point.
    pub fn field_name(&self) -> &str {
        match self {
            SeriesKey::Aggregate => AGGREGATE_FIELD,
            SeriesKey::Country(iso3) => iso3,
            SeriesKey::Region(key) => key,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// One chart-ready value: the total for a series in a year.
///
/// Serializes as `{"year": 2020, "<field>": value}` so that consumers tell
/// series apart by which field is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedSeriesPoint {
    pub year: i32,
    pub key: SeriesKey,
    pub value: u64,
}

impl AggregatedSeriesPoint {
    pub fn new(year: i32, key: SeriesKey, value: u64) -> Self {
        Self { year, key, value }
    }
}

impl Serialize for AggregatedSeriesPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("year", &self.year)?;
        map.serialize_entry(self.key.field_name(), &self.value)?;
        map.end()
    }
}

/// All series values for one year, in the row shape a line chart consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartRow {
    pub year: i32,
    #[serde(flatten)]
    pub values: std::collections::BTreeMap<String, u64>,
}

/// Legend entry for one line of the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesDescriptor {
    pub key: SeriesKey,
    pub label: String,
}

/// Pie-chart segment for one hazard category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySlice {
    pub label: String,
    pub total: u64,
    /// Share of the grand total, in percent.
    pub share: f64,
}
