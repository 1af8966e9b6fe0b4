//! Time-series aggregation and category ordering.
//!
//! Pure functions that turn raw query results into chart-ready series
//! under a filter snapshot. Nothing here performs I/O or keeps state.

use crate::filter::{FilterState, YearRange};
use crate::models::{
    AggregatedSeriesPoint, CategorySlice, CategoryTotal, ChartRow, SeriesDescriptor, SeriesKey,
    StatisticRecord,
};
use crate::reference::{CountryRegionIndex, ReferenceData};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Legend label of the combined line.
pub const AGGREGATE_LABEL: &str = "Internal Displacements";

/// Countries whose figures feed the charts for a filter snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EffectiveCountrySet(Vec<String>);

impl EffectiveCountrySet {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[cfg(test)]
    pub fn contains(&self, iso3: &str) -> bool {
        self.0.iter().any(|c| c == iso3)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Selection-count window within which one line per entity is drawn.
///
/// Defaults to 2..=4: more than one and fewer than five selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSeriesThreshold {
    pub min: usize,
    pub max: usize,
}

impl Default for MultiSeriesThreshold {
    fn default() -> Self {
        Self { min: 2, max: 4 }
    }
}

/// How time series are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// One combined total per year.
    SingleSeries,
    /// One line per selected country or region.
    PerEntity,
}

impl AggregationMode {
    /// Pick the mode for a number of distinct selected entities.
    pub fn for_selection(count: usize, threshold: MultiSeriesThreshold) -> Self {
        if (threshold.min..=threshold.max).contains(&count) {
            AggregationMode::PerEntity
        } else {
            AggregationMode::SingleSeries
        }
    }
}

/// Resolve the set of countries a filter covers.
///
/// No region and no country selected means every known country. Otherwise
/// members of the selected regions come first, then explicit countries,
/// without duplicates. Unknown keys are ignored.
pub fn compute_effective_countries(
    filter: &FilterState,
    reference: &ReferenceData,
) -> EffectiveCountrySet {
    if filter.has_no_location() {
        return EffectiveCountrySet(reference.country_codes().map(String::from).collect());
    }

    let from_regions = reference
        .regions()
        .iter()
        .filter(|region| filter.selected_regions.contains(&region.key))
        .flat_map(|region| region.countries.iter().map(String::as_str));

    let explicit = filter
        .selected_countries
        .iter()
        .map(String::as_str)
        .filter(|iso3| reference.country(iso3).is_some());

    let mut seen = HashSet::new();
    let countries = from_regions
        .chain(explicit)
        .filter(|iso3| seen.insert(*iso3))
        .map(String::from)
        .collect();

    EffectiveCountrySet(countries)
}

/// Number of distinct, known regions and countries selected.
pub fn selection_count(filter: &FilterState, reference: &ReferenceData) -> usize {
    let regions = filter
        .selected_regions
        .iter()
        .filter(|key| reference.region(key).is_some())
        .count();
    let countries = filter
        .selected_countries
        .iter()
        .filter(|iso3| reference.country(iso3).is_some())
        .count();
    regions + countries
}

/// Reduce raw records to chart points.
///
/// Single-series mode sums every record per year. Per-entity mode emits
/// the explicitly selected countries' figures, then each selected region's
/// exact per-year sum over its member countries. Years without records are
/// omitted. Records outside the filter's year range are dropped.
pub fn aggregate_time_series(
    records: &[StatisticRecord],
    filter: &FilterState,
    index: &CountryRegionIndex,
    mode: AggregationMode,
) -> Vec<AggregatedSeriesPoint> {
    let in_range = in_year_range(records, filter.year_range);

    match mode {
        AggregationMode::SingleSeries => {
            let mut by_year: BTreeMap<i32, u64> = BTreeMap::new();
            for record in in_range {
                add_to(by_year.entry(record.year).or_default(), record.total);
            }

            by_year
                .into_iter()
                .map(|(year, total)| AggregatedSeriesPoint::new(year, SeriesKey::Aggregate, total))
                .collect()
        }
        AggregationMode::PerEntity => {
            let mut countries: BTreeMap<(&str, i32), u64> = BTreeMap::new();
            let mut regions: BTreeMap<(&str, i32), u64> = BTreeMap::new();

            for record in in_range {
                let iso3 = record.country_iso3.as_str();
                if filter.selected_countries.contains(iso3) {
                    add_to(countries.entry((iso3, record.year)).or_default(), record.total);
                }
                if let Some(region) = index.region_of(iso3) {
                    if filter.selected_regions.contains(region) {
                        add_to(regions.entry((region, record.year)).or_default(), record.total);
                    }
                }
            }

            let country_points = countries.into_iter().map(|((iso3, year), total)| {
                AggregatedSeriesPoint::new(year, SeriesKey::Country(iso3.to_string()), total)
            });
            let region_points = regions.into_iter().map(|((key, year), total)| {
                AggregatedSeriesPoint::new(year, SeriesKey::Region(key.to_string()), total)
            });

            country_points.chain(region_points).collect()
        }
    }
}

/// Accumulate without overflowing; totals saturate at `u64::MAX`.
fn add_to(total: &mut u64, value: u64) {
    *total = total.saturating_add(value);
}

fn in_year_range(
    records: &[StatisticRecord],
    range: YearRange,
) -> impl Iterator<Item = &StatisticRecord> {
    records.iter().filter(move |record| {
        let keep = range.contains(record.year);
        if !keep {
            debug!(
                "Dropping {} {} outside {}",
                record.country_iso3, record.year, range
            );
        }
        keep
    })
}

/// Merge points into one row per year, ascending.
pub fn pivot_by_year(points: &[AggregatedSeriesPoint]) -> Vec<ChartRow> {
    let mut rows: BTreeMap<i32, BTreeMap<String, u64>> = BTreeMap::new();

    for point in points {
        add_to(
            rows.entry(point.year)
                .or_default()
                .entry(point.key.field_name().to_string())
                .or_default(),
            point.value,
        );
    }

    rows.into_iter()
        .map(|(year, values)| ChartRow { year, values })
        .collect()
}

/// Legend entries for the lines drawn under `mode`.
pub fn series_descriptors(
    filter: &FilterState,
    reference: &ReferenceData,
    mode: AggregationMode,
) -> Vec<SeriesDescriptor> {
    match mode {
        AggregationMode::SingleSeries => vec![SeriesDescriptor {
            key: SeriesKey::Aggregate,
            label: AGGREGATE_LABEL.to_string(),
        }],
        AggregationMode::PerEntity => {
            let countries = filter
                .selected_countries
                .iter()
                .filter_map(|iso3| reference.country(iso3))
                .map(|country| SeriesDescriptor {
                    key: SeriesKey::Country(country.iso3.clone()),
                    label: country.name.clone(),
                });
            let regions = filter
                .selected_regions
                .iter()
                .filter_map(|key| reference.region(key))
                .map(|region| SeriesDescriptor {
                    key: SeriesKey::Region(region.key.clone()),
                    label: region.name.clone(),
                });
            countries.chain(regions).collect()
        }
    }
}

/// Categories in alphabetical order, for filter options.
pub fn sort_categories_by_label(categories: &[CategoryTotal]) -> Vec<CategoryTotal> {
    let mut sorted = categories.to_vec();
    sorted.sort_by(|a, b| a.label.cmp(&b.label));
    sorted
}

/// Categories by ascending total, for pie segments.
pub fn sort_categories_by_total(categories: &[CategoryTotal]) -> Vec<CategoryTotal> {
    let mut sorted = categories.to_vec();
    sorted.sort_by_key(|c| c.total);
    sorted
}

/// Pie segments with percentage shares, smallest first.
pub fn category_slices(categories: &[CategoryTotal]) -> Vec<CategorySlice> {
    let grand_total = categories
        .iter()
        .fold(0u64, |acc, c| acc.saturating_add(c.total));

    sort_categories_by_total(categories)
        .into_iter()
        .map(|c| {
            let share = if grand_total == 0 {
                0.0
            } else {
                c.total as f64 / grand_total as f64 * 100.0
            };
            CategorySlice {
                label: c.label,
                total: c.total,
                share,
            }
        })
        .collect()
}
