//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and the initial filter selection.

use crate::filter::{FilterError, FilterState, YearRange};
use clap::Parser;
use std::path::PathBuf;

/// giddview - disaster displacement dashboard for the terminal
///
/// Query internal displacement statistics by region, country, hazard
/// category and year range, and render them as Markdown or JSON.
///
/// Examples:
///   giddview --region south-asia --country PHL
///   giddview --country BGD,IND,NPL --start-year 2015 --format json
///   giddview --category Flood --output floods.md
///   giddview --interactive
///   giddview --region pacific --dry-run
///   giddview --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Subregion keys to select (repeatable or comma-separated)
    ///
    /// Keys come from the reference table, e.g. south-asia, pacific.
    #[arg(short, long = "region", value_name = "KEY", value_delimiter = ',')]
    pub regions: Vec<String>,

    /// ISO3 country codes to select (repeatable or comma-separated)
    #[arg(short = 'C', long = "country", value_name = "ISO3", value_delimiter = ',')]
    pub countries: Vec<String>,

    /// Hazard categories to filter by (repeatable or comma-separated)
    #[arg(long = "category", value_name = "LABEL", value_delimiter = ',')]
    pub categories: Vec<String>,

    /// First year of the range (defaults to the first slider year)
    #[arg(long, value_name = "YEAR")]
    pub start_year: Option<i32>,

    /// Last year of the range (defaults to the last slider year)
    #[arg(long, value_name = "YEAR")]
    pub end_year: Option<i32>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .giddview.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Country and region table to load
    #[arg(long, value_name = "FILE")]
    pub reference: Option<PathBuf>,

    /// GraphQL endpoint of the statistics backend
    #[arg(long, value_name = "URL", env = "GIDD_GRAPHQL_ENDPOINT")]
    pub graphql_url: Option<String>,

    /// REST endpoint used for data export links
    #[arg(long, value_name = "URL", env = "GIDD_REST_ENDPOINT")]
    pub rest_url: Option<String>,

    /// Site hosting the full database pages
    #[arg(long, value_name = "URL", env = "GIDD_DRUPAL_ENDPOINT")]
    pub drupal_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report
    ///
    /// Defaults to the [general] output setting.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Edit filters interactively; each change re-queries after a pause
    #[arg(short, long, conflicts_with = "dry_run")]
    pub interactive: bool,

    /// Dry run: print query variables and links without contacting the backend
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .giddview.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let (Some(start), Some(end)) = (self.start_year, self.end_year) {
            if start > end {
                return Err(format!(
                    "--start-year ({}) must not be after --end-year ({})",
                    start, end
                ));
            }
        }

        for iso3 in &self.countries {
            let code = iso3.trim();
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(format!("Invalid ISO3 country code: '{}'", iso3));
            }
        }

        for (flag, url) in [
            ("--graphql-url", &self.graphql_url),
            ("--rest-url", &self.rest_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("{} must start with 'http://' or 'https://'", flag));
                }
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Filter selected on the command line.
    ///
    /// Missing years default to the matching end of `bounds`; explicit
    /// years outside `bounds` are rejected.
    pub fn filter(&self, bounds: YearRange) -> Result<FilterState, FilterError> {
        for year in [self.start_year, self.end_year].into_iter().flatten() {
            if !bounds.contains(year) {
                return Err(FilterError::OutOfBounds { year, bounds });
            }
        }

        let start = self.start_year.unwrap_or(bounds.start());
        let end = self.end_year.unwrap_or(bounds.end());
        let years = YearRange::new(start, end)?;

        Ok(FilterState::new(years)
            .with_regions(self.regions.iter().map(|r| r.trim()))
            .with_countries(self.countries.iter().map(|c| c.trim()))
            .with_categories(self.categories.iter().map(|c| c.trim())))
    }
}
