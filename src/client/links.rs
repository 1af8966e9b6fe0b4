//! Links to downloadable data that accompany a dashboard view.

use crate::filter::YearRange;
use anyhow::{Context, Result};
use reqwest::Url;
use std::collections::BTreeSet;

const EXPORT_PATH: &str = "/countries/multiple-countries-disaster-export/";
const FULL_DATABASE_PATH: &str = "/database/displacement-data";

/// Spreadsheet export of the current selection.
///
/// List parameters are comma-joined, as the export endpoint expects.
pub fn disaster_export_url(
    rest_url: &str,
    countries: &[String],
    years: YearRange,
    categories: &BTreeSet<String>,
) -> Result<Url> {
    let base = format!("{}{}", rest_url.trim_end_matches('/'), EXPORT_PATH);
    let mut url =
        Url::parse(&base).with_context(|| format!("Invalid REST endpoint: {}", rest_url))?;

    let hazard_types: Vec<&str> = categories.iter().map(String::as_str).collect();

    url.query_pairs_mut()
        .append_pair("countries_iso3", &countries.join(","))
        .append_pair("start_year", &years.start().to_string())
        .append_pair("end_year", &years.end().to_string())
        .append_pair("hazard_type", &hazard_types.join(","));

    Ok(url)
}

/// Landing page of the full displacement database.
///
/// An empty `drupal_url` yields a site-relative path.
pub fn full_database_url(drupal_url: &str) -> String {
    format!("{}{}", drupal_url.trim_end_matches('/'), FULL_DATABASE_PATH)
}
