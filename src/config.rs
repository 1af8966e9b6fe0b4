//! Configuration file handling.
//!
//! Settings are read from `.giddview.toml` and then overridden by any
//! explicit command-line arguments. Every field has a default, so a partial
//! file (or none at all) is valid.

use crate::analysis::MultiSeriesThreshold;
use crate::client::ClientConfig;
use crate::dashboard::{DashboardSettings, END_YEAR, START_YEAR};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".giddview.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Backend endpoints.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Dashboard behaviour.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Country and region tables.
    #[serde(default)]
    pub reference: ReferenceConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "giddview_report.md".to_string()
}

/// Statistics backend endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// GraphQL endpoint serving disaster statistics.
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// REST endpoint serving spreadsheet exports.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// Site hosting the full database pages; empty for relative links.
    #[serde(default)]
    pub drupal_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            graphql_url: default_graphql_url(),
            rest_url: default_rest_url(),
            drupal_url: String::new(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_graphql_url() -> String {
    ClientConfig::default().graphql_url
}

fn default_rest_url() -> String {
    ClientConfig::default().rest_url
}

fn default_timeout() -> u64 {
    ClientConfig::default().timeout_seconds
}

impl From<&EndpointsConfig> for ClientConfig {
    fn from(endpoints: &EndpointsConfig) -> Self {
        Self {
            graphql_url: endpoints.graphql_url.clone(),
            rest_url: endpoints.rest_url.clone(),
            drupal_url: endpoints.drupal_url.clone(),
            timeout_seconds: endpoints.timeout_seconds,
        }
    }
}

/// Dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// First year of the year slider.
    #[serde(default = "default_start_year")]
    pub start_year: i32,

    /// Last year of the year slider.
    #[serde(default = "default_end_year")]
    pub end_year: i32,

    /// Fewest selections drawn as separate lines.
    #[serde(default = "default_multi_series_min")]
    pub multi_series_min: usize,

    /// Most selections drawn as separate lines.
    #[serde(default = "default_multi_series_max")]
    pub multi_series_max: usize,

    /// Quiet period before a filter change triggers a query, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            start_year: default_start_year(),
            end_year: default_end_year(),
            multi_series_min: default_multi_series_min(),
            multi_series_max: default_multi_series_max(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_start_year() -> i32 {
    START_YEAR
}

fn default_end_year() -> i32 {
    END_YEAR
}

fn default_multi_series_min() -> usize {
    MultiSeriesThreshold::default().min
}

fn default_multi_series_max() -> usize {
    MultiSeriesThreshold::default().max
}

fn default_debounce_ms() -> u64 {
    300
}

impl DashboardConfig {
    /// Validated dashboard settings.
    pub fn settings(&self) -> Result<DashboardSettings> {
        if self.multi_series_min > self.multi_series_max {
            anyhow::bail!(
                "multi_series_min ({}) must not exceed multi_series_max ({})",
                self.multi_series_min,
                self.multi_series_max
            );
        }

        let threshold = MultiSeriesThreshold {
            min: self.multi_series_min,
            max: self.multi_series_max,
        };

        DashboardSettings::new(
            self.start_year,
            self.end_year,
            threshold,
            Duration::from_millis(self.debounce_ms),
        )
        .context("Invalid [dashboard] year bounds")
    }
}

/// Reference data settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Path of the country and region table.
    #[serde(default = "default_reference_path")]
    pub path: PathBuf,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            path: default_reference_path(),
        }
    }
}

fn default_reference_path() -> PathBuf {
    PathBuf::from("data/reference.toml")
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report title.
    #[serde(default = "default_title")]
    pub title: String,

    /// List the hazard categories available as filters.
    #[serde(default = "default_true")]
    pub include_category_options: bool,

    /// Include download links.
    #[serde(default = "default_true")]
    pub include_links: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            include_category_options: true,
            include_links: true,
        }
    }
}

fn default_title() -> String {
    "Disaster Displacement Dashboard".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_if_exists(Path::new(CONFIG_FILE))
    }

    fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given explicitly on the command line (or through their
    /// environment variables) override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.graphql_url {
            self.endpoints.graphql_url = url.clone();
        }
        if let Some(ref url) = args.rest_url {
            self.endpoints.rest_url = url.clone();
        }
        if let Some(ref url) = args.drupal_url {
            self.endpoints.drupal_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.endpoints.timeout_seconds = timeout;
        }

        if let Some(ref path) = args.reference {
            self.reference.path = path.clone();
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level: `quiet` wins, then `verbose` from file or CLI.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Client settings for the configured endpoints.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::from(&self.endpoints)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.dashboard.start_year, 2010);
        assert_eq!(config.dashboard.end_year, 2021);
        assert_eq!(config.dashboard.multi_series_min, 2);
        assert_eq!(config.dashboard.multi_series_max, 4);
        assert_eq!(config.reference.path, PathBuf::from("data/reference.toml"));
        assert!(config.endpoints.drupal_url.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "asia.md"

[endpoints]
graphql_url = "https://backend.example.org/graphql/"
timeout_seconds = 10

[dashboard]
start_year = 2015
multi_series_max = 6
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "asia.md");
        assert_eq!(config.endpoints.graphql_url, "https://backend.example.org/graphql/");
        assert_eq!(config.endpoints.timeout_seconds, 10);
        assert_eq!(config.endpoints.rest_url, default_rest_url());
        assert_eq!(config.dashboard.start_year, 2015);
        assert_eq!(config.dashboard.end_year, 2021);
        assert_eq!(config.dashboard.multi_series_max, 6);
        assert!(config.report.include_links);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[report]\ntitle = \"Pacific\"\ninclude_links = false").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.report.title, "Pacific");
        assert!(!config.report.include_links);
        assert!(config.report.include_category_options);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dashboard]\nstart_year = \"soon\"").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_if_exists(&dir.path().join(CONFIG_FILE)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config: Config = toml::from_str(
            r#"
[endpoints]
graphql_url = "https://file.example.org/graphql/"
rest_url = "https://file.example.org/api"
timeout_seconds = 10
"#,
        )
        .unwrap();

        let mut args = make_args();
        args.graphql_url = Some("https://cli.example.org/graphql/".to_string());
        args.timeout = Some(60);
        args.reference = Some(PathBuf::from("tables.toml"));

        config.merge_with_args(&args);

        assert_eq!(config.endpoints.graphql_url, "https://cli.example.org/graphql/");
        assert_eq!(config.endpoints.rest_url, "https://file.example.org/api");
        assert_eq!(config.endpoints.timeout_seconds, 60);
        assert_eq!(config.reference.path, PathBuf::from("tables.toml"));

        let client = config.client_config();
        assert_eq!(client.graphql_url, "https://cli.example.org/graphql/");
        assert_eq!(client.timeout_seconds, 60);
    }

    #[test]
    fn test_log_level_honours_file_verbose() {
        let mut config: Config = toml::from_str("[general]\nverbose = true").unwrap();
        config.merge_with_args(&make_args());

        assert_eq!(config.log_level(false), tracing::Level::DEBUG);
        assert_eq!(config.log_level(true), tracing::Level::ERROR);
    }

    #[test]
    fn test_log_level_from_cli_verbose() {
        let mut config = Config::default();
        assert_eq!(config.log_level(false), tracing::Level::INFO);

        let mut args = make_args();
        args.verbose = true;
        config.merge_with_args(&args);
        assert_eq!(config.log_level(false), tracing::Level::DEBUG);
    }

    #[test]
    fn test_dashboard_settings_validation() {
        let settings = DashboardConfig::default().settings().unwrap();
        assert_eq!(settings.year_bounds.start(), 2010);
        assert_eq!(settings.debounce, Duration::from_millis(300));

        let inverted = DashboardConfig {
            start_year: 2020,
            end_year: 2012,
            ..DashboardConfig::default()
        };
        assert!(inverted.settings().is_err());

        let bad_threshold = DashboardConfig {
            multi_series_min: 5,
            multi_series_max: 3,
            ..DashboardConfig::default()
        };
        assert!(bad_threshold.settings().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[endpoints]"));
        assert!(toml_str.contains("[dashboard]"));
        assert!(toml_str.contains("[reference]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.dashboard.debounce_ms, 300);
    }
}
