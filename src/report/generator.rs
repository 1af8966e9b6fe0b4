//! Markdown and JSON dashboard reports.
//!
//! A report is a [`DashboardView`] plus the metadata of the run that
//! produced it. Sections without data are left out.

use crate::config::ReportConfig;
use crate::dashboard::{DashboardLinks, DashboardView, Headline};
use crate::models::{CategorySlice, CategoryTotal, ChartRow, SeriesDescriptor};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Run metadata printed at the top of a report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub endpoint: String,
    pub duration_seconds: f64,
}

/// A complete report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub view: DashboardView,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let mut output = String::new();
    let view = &report.view;

    output.push_str(&format!("# {}\n\n", options.title));

    output.push_str(&generate_metadata_section(&report.metadata, view));

    if !view.errors.is_empty() {
        output.push_str(&generate_warnings_section(view));
    }

    if view.has_data() {
        output.push_str(&generate_headline_section(&view.headline));
        output.push_str(&generate_timeseries_section(&view.chart, &view.legend));
        output.push_str(&generate_breakdown_section(&view.category_breakdown));
    } else {
        output.push_str("*No statistics are available for this selection yet.*\n\n");
    }

    if options.include_category_options {
        output.push_str(&generate_category_options_section(&view.category_options));
    }

    if options.include_links {
        if let Some(ref links) = view.links {
            output.push_str(&generate_links_section(links));
        }
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, view: &DashboardView) -> String {
    let mut section = String::new();
    let filter = &view.filter;

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Endpoint:** {}\n", metadata.endpoint));
    section.push_str(&format!("- **Years:** {}\n", filter.year_range));
    section.push_str(&format!("- **Regions:** {}\n", list_or_all(&filter.selected_regions)));
    section.push_str(&format!(
        "- **Countries:** {}\n",
        list_or_all(&filter.selected_countries)
    ));
    section.push_str(&format!(
        "- **Hazard categories:** {}\n",
        list_or_all(&filter.selected_categories)
    ));
    section.push_str(&format!(
        "- **Countries covered:** {}\n",
        view.effective_countries.len()
    ));
    section.push_str(&format!("- **Series mode:** {}\n", mode_label(view)));
    if view.stale {
        section.push_str("- **Note:** figures are from an earlier selection\n");
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn mode_label(view: &DashboardView) -> &'static str {
    match view.mode {
        crate::analysis::AggregationMode::SingleSeries => "combined total",
        crate::analysis::AggregationMode::PerEntity => "one line per selection",
    }
}

fn list_or_all<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    let values: Vec<&str> = values.into_iter().map(String::as_str).collect();
    if values.is_empty() {
        "all".to_string()
    } else {
        values.join(", ")
    }
}

/// Generate the warnings section for failed queries.
fn generate_warnings_section(view: &DashboardView) -> String {
    let mut section = String::new();

    section.push_str("## Warnings\n\n");
    for error in &view.errors {
        section.push_str(&format!("- {}\n", error));
    }
    section.push('\n');

    section
}

/// Generate the headline figures.
fn generate_headline_section(headline: &Headline) -> String {
    let mut section = String::new();

    section.push_str("## Headline Figures\n\n");
    section.push_str("| Internal displacements | Disaster events |\n");
    section.push_str("|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} |\n\n",
        format_count(headline.new_displacements),
        format_count(headline.total_events)
    ));

    section
}

/// Generate the year-by-series table.
fn generate_timeseries_section(rows: &[ChartRow], legend: &[SeriesDescriptor]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Displacement Over Time\n\n");

    section.push_str("| Year |");
    for series in legend {
        section.push_str(&format!(" {} |", series.label));
    }
    section.push('\n');

    section.push_str("|:---|");
    for _ in legend {
        section.push_str("---:|");
    }
    section.push('\n');

    for row in rows {
        section.push_str(&format!("| {} |", row.year));
        for series in legend {
            let cell = row
                .values
                .get(series.key.field_name())
                .map(|v| format_count(*v))
                .unwrap_or_else(|| "-".to_string());
            section.push_str(&format!(" {} |", cell));
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

/// Generate the per-category breakdown.
fn generate_breakdown_section(slices: &[CategorySlice]) -> String {
    if slices.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Breakdown by Hazard Category\n\n");
    section.push_str("| Category | Displacements | Share |\n");
    section.push_str("|:---|---:|---:|\n");

    for slice in slices {
        section.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            slice.label,
            format_count(slice.total),
            slice.share
        ));
    }
    section.push('\n');

    section
}

/// Generate the list of categories a user can filter by.
fn generate_category_options_section(options: &[CategoryTotal]) -> String {
    if options.is_empty() {
        return String::new();
    }

    let labels: Vec<&str> = options.iter().map(|c| c.label.as_str()).collect();
    format!(
        "## Available Hazard Categories\n\n{}\n\n",
        labels.join(", ")
    )
}

/// Generate the download links.
fn generate_links_section(links: &DashboardLinks) -> String {
    let mut section = String::new();

    section.push_str("## Data\n\n");
    section.push_str(&format!("- [Download data for this selection]({})\n", links.export));
    section.push_str(&format!("- [Full displacement database]({})\n", links.full_database));
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by giddview v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Group digits in thousands: `1234567` becomes `1,234,567`.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::{build_view, DashboardSettings};
    use crate::models::{DisasterStatistics, StatisticRecord};
    use crate::reference::tests::sample_reference;

    fn create_test_report(with_data: bool) -> Report {
        let reference = sample_reference();
        let settings = DashboardSettings::default();
        let filter = settings
            .initial_filter()
            .with_regions(["south-asia"])
            .with_countries(["PHL"]);

        let stats = DisasterStatistics {
            new_displacements: Some(1_234_567),
            total_events: Some(42),
            categories: vec![CategoryTotal::new("Storm", 30), CategoryTotal::new("Flood", 10)],
            timeseries: vec![
                StatisticRecord::new(2019, "PHL", 4_094_000),
                StatisticRecord::new(2019, "BGD", 4_086_000),
                StatisticRecord::new(2020, "IND", 3_856_000),
            ],
        };
        let options = vec![CategoryTotal::new("Storm", 30), CategoryTotal::new("Flood", 10)];

        let mut view = build_view(
            with_data.then_some(&stats),
            Some(&options),
            &filter,
            &reference,
            &settings,
        );
        view.links = Some(DashboardLinks {
            export: "http://localhost/export/?countries_iso3=PHL".to_string(),
            full_database: "/database/displacement-data".to_string(),
        });

        Report {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                endpoint: "http://localhost:8000/graphql/".to_string(),
                duration_seconds: 0.4,
            },
            view,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report(true);
        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        assert!(markdown.starts_with("# "));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Headline Figures"));
        assert!(markdown.contains("| 1,234,567 | 42 |"));
        assert!(markdown.contains("## Displacement Over Time"));
        assert!(markdown.contains("## Breakdown by Hazard Category"));
        assert!(markdown.contains("## Available Hazard Categories"));
        assert!(markdown.contains("Flood, Storm"));
        assert!(markdown.contains("## Data"));
        assert!(!markdown.contains("## Warnings"));
    }

    #[test]
    fn test_timeseries_table_per_entity() {
        let report = create_test_report(true);
        let section = generate_timeseries_section(&report.view.chart, &report.view.legend);

        assert!(section.contains("| Year | Philippines | South Asia |"));
        assert!(section.contains("| 2019 | 4,094,000 | 4,086,000 |"));
        assert!(section.contains("| 2020 | - | 3,856,000 |"));
    }

    #[test]
    fn test_breakdown_is_ascending_with_shares() {
        let report = create_test_report(true);
        let section = generate_breakdown_section(&report.view.category_breakdown);

        let flood = section.find("| Flood | 10 | 25.0% |").unwrap();
        let storm = section.find("| Storm | 30 | 75.0% |").unwrap();
        assert!(flood < storm);
    }

    #[test]
    fn test_report_without_data_omits_charts() {
        let mut report = create_test_report(false);
        report.view.errors.push("DisasterData timed out after 30s".to_string());

        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        assert!(markdown.contains("No statistics are available"));
        assert!(markdown.contains("## Warnings"));
        assert!(markdown.contains("timed out"));
        assert!(!markdown.contains("## Headline Figures"));
        assert!(!markdown.contains("## Displacement Over Time"));
    }

    #[test]
    fn test_optional_sections_follow_config() {
        let report = create_test_report(true);
        let options = ReportConfig {
            include_category_options: false,
            include_links: false,
            ..ReportConfig::default()
        };

        let markdown = generate_markdown_report(&report, &options);

        assert!(!markdown.contains("## Available Hazard Categories"));
        assert!(!markdown.contains("## Data"));
    }

    #[test]
    fn test_metadata_lists_filters() {
        let report = create_test_report(true);
        let section = generate_metadata_section(&report.metadata, &report.view);

        assert!(section.contains("**Years:** 2010 - 2021"));
        assert!(section.contains("**Regions:** south-asia"));
        assert!(section.contains("**Hazard categories:** all"));
        assert!(section.contains("one line per selection"));
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(4_094_000), "4,094,000");
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report(true);
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"generatedAt\""));
        assert!(json.contains("\"effectiveCountries\""));
        assert!(json.contains("\"categoryBreakdown\""));
    }
}
