//! Filter state owned by the presentation layer.
//!
//! This module holds the user's selections (regions, countries, hazard
//! categories and a year range), the interactive command language used to
//! edit them, and the debouncer that decides when a new snapshot is
//! handed to the aggregation pipeline.

pub mod command;
pub mod debounce;

pub use command::FilterCommand;
pub use debounce::debounce;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Errors raised while editing filter state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("start year {start} is after end year {end}")]
    InvertedRange { start: i32, end: i32 },

    #[error("year {year} is outside the available range {bounds}")]
    OutOfBounds { year: i32, bounds: YearRange },

    #[error("invalid year: {0}")]
    InvalidYear(String),

    #[error("unknown command: {0} (type `help` for a list)")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Inclusive range of years, `start <= end` by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    /// Create a range, rejecting an inverted one.
    pub fn new(start: i32, end: i32) -> Result<Self, FilterError> {
        if start > end {
            return Err(FilterError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Range covering both years, given in either order.
    pub fn spanning(a: i32, b: i32) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    /// Whether `year` lies inside the range.
    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    /// Clamp both ends into `bounds`, the way a range slider does.
    pub fn clamp(self, bounds: YearRange) -> YearRange {
        YearRange {
            start: self.start.clamp(bounds.start, bounds.end),
            end: self.end.clamp(bounds.start, bounds.end),
        }
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Snapshot of the user's current selections.
///
/// Sets collapse duplicate selections; iteration order is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterState {
    pub selected_regions: BTreeSet<String>,
    pub selected_countries: BTreeSet<String>,
    pub selected_categories: BTreeSet<String>,
    pub year_range: YearRange,
}

impl FilterState {
    /// An unfiltered state covering `year_range`.
    pub fn new(year_range: YearRange) -> Self {
        Self {
            selected_regions: BTreeSet::new(),
            selected_countries: BTreeSet::new(),
            selected_categories: BTreeSet::new(),
            year_range,
        }
    }

    /// Builder-style: add several regions.
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for region in regions {
            self.add_region(region);
        }
        self
    }

    /// Builder-style: add several countries.
    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for country in countries {
            self.add_country(country);
        }
        self
    }

    /// Builder-style: add several categories.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for category in categories {
            self.add_category(category);
        }
        self
    }

    pub fn add_region(&mut self, key: impl Into<String>) -> bool {
        self.selected_regions.insert(key.into())
    }

    pub fn remove_region(&mut self, key: &str) -> bool {
        self.selected_regions.remove(key)
    }

    /// Add a country; codes are stored upper-case.
    pub fn add_country(&mut self, iso3: impl Into<String>) -> bool {
        self.selected_countries
            .insert(iso3.into().trim().to_ascii_uppercase())
    }

    pub fn remove_country(&mut self, iso3: &str) -> bool {
        self.selected_countries
            .remove(&iso3.trim().to_ascii_uppercase())
    }

    pub fn add_category(&mut self, label: impl Into<String>) -> bool {
        self.selected_categories.insert(label.into())
    }

    pub fn remove_category(&mut self, label: &str) -> bool {
        self.selected_categories.remove(label)
    }

    /// Replace the year range; returns whether it changed.
    pub fn set_year_range(&mut self, range: YearRange) -> bool {
        let changed = self.year_range != range;
        self.year_range = range;
        changed
    }

    /// Drop every selection, keeping the year range.
    pub fn clear_selections(&mut self) -> bool {
        let changed = !(self.selected_regions.is_empty()
            && self.selected_countries.is_empty()
            && self.selected_categories.is_empty());
        self.selected_regions.clear();
        self.selected_countries.clear();
        self.selected_categories.clear();
        changed
    }

    /// True when neither regions nor countries are selected.
    pub fn has_no_location(&self) -> bool {
        self.selected_regions.is_empty() && self.selected_countries.is_empty()
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(set: &BTreeSet<String>) -> String {
            if set.is_empty() {
                "all".to_string()
            } else {
                set.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        }

        write!(
            f,
            "regions: {} | countries: {} | categories: {} | years: {}",
            list(&self.selected_regions),
            list(&self.selected_countries),
            list(&self.selected_categories),
            self.year_range
        )
    }
}
