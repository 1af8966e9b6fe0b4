//! Country and region reference tables.
//!
//! Tables are read once from a TOML file at start-up, validated, and
//! indexed. Nothing mutates them afterwards.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A country known to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// ISO 3166-1 alpha-3 code.
    pub iso3: String,
    /// Display name.
    pub name: String,
}

/// A region grouping several countries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDefinition {
    /// Region identifier used in filters and series keys.
    pub key: String,
    /// Display name.
    pub name: String,
    /// ISO3 codes of the member countries.
    pub countries: Vec<String>,
}

/// Reasons a reference file is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("reference data defines no countries")]
    NoCountries,

    #[error("country entry {index} has an empty ISO3 code")]
    BlankIso3 { index: usize },

    #[error("country {0} is defined more than once")]
    DuplicateCountry(String),

    #[error("region {0} is defined more than once")]
    DuplicateRegion(String),

    #[error("region {region} references unknown country {iso3}")]
    UnknownMember { region: String, iso3: String },

    #[error("country {iso3} belongs to both {first} and {second}")]
    OverlappingRegions {
        iso3: String,
        first: String,
        second: String,
    },
}

/// Mapping from a country code to the region that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryRegionIndex {
    owners: HashMap<String, String>,
}

impl CountryRegionIndex {
    /// Build the index from validated region definitions.
    fn build(regions: &[RegionDefinition]) -> Self {
        let owners = regions
            .iter()
            .flat_map(|region| {
                region
                    .countries
                    .iter()
                    .map(move |iso3| (iso3.clone(), region.key.clone()))
            })
            .collect();
        Self { owners }
    }

    /// Region key owning the given country, if any.
    pub fn region_of(&self, iso3: &str) -> Option<&str> {
        self.owners.get(iso3).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// On-disk layout of the reference file.
#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(default)]
    countries: Vec<Country>,
    #[serde(default)]
    regions: Vec<RegionDefinition>,
}

/// Validated country and region tables plus the derived index.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    countries: Vec<Country>,
    regions: Vec<RegionDefinition>,
    index: CountryRegionIndex,
}

impl ReferenceData {
    /// Validate tables and build the country → region index.
    pub fn new(
        countries: Vec<Country>,
        regions: Vec<RegionDefinition>,
    ) -> std::result::Result<Self, ReferenceError> {
        validate(&countries, &regions)?;
        let index = CountryRegionIndex::build(&regions);
        Ok(Self {
            countries,
            regions,
            index,
        })
    }

    /// Parse and validate reference data from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ReferenceFile =
            toml::from_str(content).context("Failed to parse reference data")?;
        Ok(Self::new(file.countries, file.regions)?)
    }

    /// Load reference data from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading reference data from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference data: {}", path.display()))?;

        let data = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid reference data in {}", path.display()))?;

        if data.index.is_empty() {
            warn!("No country in {} is assigned to a region", path.display());
        }

        debug!(
            "Loaded {} countries in {} regions ({} assigned)",
            data.countries.len(),
            data.regions.len(),
            data.index.len()
        );
        Ok(data)
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn regions(&self) -> &[RegionDefinition] {
        &self.regions
    }

    pub fn index(&self) -> &CountryRegionIndex {
        &self.index
    }

    /// Look up a country by ISO3 code.
    pub fn country(&self, iso3: &str) -> Option<&Country> {
        self.countries.iter().find(|c| c.iso3 == iso3)
    }

    /// Look up a region by key.
    pub fn region(&self, key: &str) -> Option<&RegionDefinition> {
        self.regions.iter().find(|r| r.key == key)
    }

    /// Iterate over every known ISO3 code in file order.
    pub fn country_codes(&self) -> impl Iterator<Item = &str> {
        self.countries.iter().map(|c| c.iso3.as_str())
    }
}

fn validate(
    countries: &[Country],
    regions: &[RegionDefinition],
) -> std::result::Result<(), ReferenceError> {
    if countries.is_empty() {
        return Err(ReferenceError::NoCountries);
    }

    let mut known = HashSet::new();
    for (index, country) in countries.iter().enumerate() {
        if country.iso3.trim().is_empty() {
            return Err(ReferenceError::BlankIso3 { index });
        }
        if !known.insert(country.iso3.as_str()) {
            return Err(ReferenceError::DuplicateCountry(country.iso3.clone()));
        }
    }

    let mut region_keys = HashSet::new();
    let mut owner: HashMap<&str, &str> = HashMap::new();
    for region in regions {
        if !region_keys.insert(region.key.as_str()) {
            return Err(ReferenceError::DuplicateRegion(region.key.clone()));
        }
        for iso3 in &region.countries {
            if !known.contains(iso3.as_str()) {
                return Err(ReferenceError::UnknownMember {
                    region: region.key.clone(),
                    iso3: iso3.clone(),
                });
            }
            if let Some(first) = owner.insert(iso3.as_str(), region.key.as_str()) {
                // A country listed twice in the same region is harmless.
                if first != region.key {
                    return Err(ReferenceError::OverlappingRegions {
                        iso3: iso3.clone(),
                        first: first.to_string(),
                        second: region.key.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}
