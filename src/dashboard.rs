//! Dashboard orchestration.
//!
//! A [`Dashboard`] owns the reference tables, the statistics client and the
//! state of both queries. Each refresh fetches categories and statistics
//! concurrently and assembles a [`DashboardView`] through the pure
//! [`build_view`].

use crate::analysis::{
    aggregate_time_series, category_slices, compute_effective_countries, pivot_by_year,
    selection_count, series_descriptors, sort_categories_by_label, AggregationMode,
    EffectiveCountrySet, MultiSeriesThreshold,
};
use crate::client::{
    disaster_export_url, full_database_url, ClientConfig, DisasterDataVariables, QueryState,
    StatisticsClient,
};
use crate::filter::{FilterError, FilterState, YearRange};
use crate::models::{
    AggregatedSeriesPoint, CategorySlice, CategoryTotal, ChartRow, DisasterStatistics,
    SeriesDescriptor,
};
use crate::reference::ReferenceData;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// First year offered by the year slider.
pub const START_YEAR: i32 = 2010;

/// Last year offered by the year slider.
pub const END_YEAR: i32 = 2021;

/// Knobs that shape a dashboard independent of the current filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardSettings {
    pub year_bounds: YearRange,
    pub threshold: MultiSeriesThreshold,
    pub debounce: Duration,
}

impl DashboardSettings {
    pub fn new(
        start_year: i32,
        end_year: i32,
        threshold: MultiSeriesThreshold,
        debounce: Duration,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            year_bounds: YearRange::new(start_year, end_year)?,
            threshold,
            debounce,
        })
    }
}

#[cfg(test)]
impl DashboardSettings {
    /// A filter with nothing selected, spanning the full slider range.
    pub fn initial_filter(&self) -> FilterState {
        FilterState::new(self.year_bounds)
    }
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            year_bounds: YearRange::spanning(START_YEAR, END_YEAR),
            threshold: MultiSeriesThreshold::default(),
            debounce: Duration::from_millis(300),
        }
    }
}

/// Headline figures; absent values read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Headline {
    pub new_displacements: u64,
    pub total_events: u64,
}

/// Download links for the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardLinks {
    pub export: String,
    pub full_database: String,
}

impl DashboardLinks {
    pub fn new(
        config: &ClientConfig,
        countries: &EffectiveCountrySet,
        filter: &FilterState,
    ) -> Result<Self> {
        let export = disaster_export_url(
            &config.rest_url,
            countries.as_slice(),
            filter.year_range,
            &filter.selected_categories,
        )?;

        Ok(Self {
            export: export.to_string(),
            full_database: full_database_url(&config.drupal_url),
        })
    }
}

/// Everything a renderer needs for one filter snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub filter: FilterState,
    pub effective_countries: EffectiveCountrySet,
    pub mode: AggregationMode,
    pub headline: Headline,
    /// `None` until statistics have been received at least once.
    pub series: Option<Vec<AggregatedSeriesPoint>>,
    pub chart: Vec<ChartRow>,
    pub legend: Vec<SeriesDescriptor>,
    /// Pie segments, smallest first.
    pub category_breakdown: Vec<CategorySlice>,
    /// Hazard categories offered as filters, alphabetical.
    pub category_options: Vec<CategoryTotal>,
    pub links: Option<DashboardLinks>,
    /// True when the figures shown belong to an earlier filter.
    pub stale: bool,
    pub errors: Vec<String>,
}

impl DashboardView {
    pub fn has_data(&self) -> bool {
        self.series.is_some()
    }
}

/// Assemble a view from query results.
///
/// Missing statistics produce an empty view rather than an error.
pub fn build_view(
    stats: Option<&DisasterStatistics>,
    category_options: Option<&[CategoryTotal]>,
    filter: &FilterState,
    reference: &ReferenceData,
    settings: &DashboardSettings,
) -> DashboardView {
    let effective_countries = compute_effective_countries(filter, reference);
    let mode = AggregationMode::for_selection(selection_count(filter, reference), settings.threshold);

    let mut view = DashboardView {
        filter: filter.clone(),
        effective_countries,
        mode,
        headline: Headline::default(),
        series: None,
        chart: Vec::new(),
        legend: Vec::new(),
        category_breakdown: Vec::new(),
        category_options: category_options
            .map(sort_categories_by_label)
            .unwrap_or_default(),
        links: None,
        stale: false,
        errors: Vec::new(),
    };

    if let Some(stats) = stats {
        let points = aggregate_time_series(&stats.timeseries, filter, reference.index(), mode);

        view.headline = Headline {
            new_displacements: stats.new_displacements.unwrap_or(0),
            total_events: stats.total_events.unwrap_or(0),
        };
        view.chart = pivot_by_year(&points);
        view.legend = series_descriptors(filter, reference, mode);
        view.category_breakdown = category_slices(&stats.categories);
        view.series = Some(points);
    }

    view
}

/// Stateful dashboard bound to one backend.
pub struct Dashboard {
    reference: Arc<ReferenceData>,
    client: StatisticsClient,
    settings: DashboardSettings,
    statistics: QueryState<DisasterStatistics>,
    categories: QueryState<Vec<CategoryTotal>>,
}

impl Dashboard {
    pub fn new(
        reference: Arc<ReferenceData>,
        client: StatisticsClient,
        settings: DashboardSettings,
    ) -> Self {
        Self {
            reference,
            client,
            settings,
            statistics: QueryState::new(),
            categories: QueryState::new(),
        }
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Re-query the backend for `filter` and rebuild the view.
    ///
    /// Failed queries fall back to the last successful result; their
    /// messages are carried on the view.
    pub async fn refresh(&mut self, filter: &FilterState) -> DashboardView {
        let effective = compute_effective_countries(filter, &self.reference);
        let variables = DisasterDataVariables::from_filter(filter, &effective);

        if effective.is_empty() {
            warn!("No known country matches the selection; the query will return nothing");
        }

        info!(
            "Refreshing dashboard for {} countries ({})",
            effective.len(),
            filter.year_range
        );

        self.statistics.begin();
        self.categories.begin();

        let (statistics, categories) = futures::join!(
            self.client.disaster_data(&variables),
            self.client.disaster_categories(effective.as_slice())
        );

        self.statistics.finish(statistics);
        self.categories.finish(categories);

        let mut view = build_view(
            self.statistics.displayable(),
            self.categories.displayable().map(Vec::as_slice),
            filter,
            &self.reference,
            &self.settings,
        );

        view.stale = self.statistics.is_stale();
        view.errors = [self.statistics.status().error(), self.categories.status().error()]
            .into_iter()
            .flatten()
            .map(String::from)
            .collect();

        match DashboardLinks::new(self.client.config(), &view.effective_countries, filter) {
            Ok(links) => view.links = Some(links),
            Err(e) => warn!("Could not build download links: {:#}", e),
        }

        debug!(
            "View ready: mode {:?}, {} chart rows, {} errors",
            view.mode,
            view.chart.len(),
            view.errors.len()
        );

        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SeriesKey, StatisticRecord};
    use crate::reference::tests::sample_reference;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sample_stats() -> DisasterStatistics {
        DisasterStatistics {
            new_displacements: Some(27),
            total_events: None,
            categories: vec![
                CategoryTotal::new("Storm", 20),
                CategoryTotal::new("Flood", 5),
                CategoryTotal::new("Earthquake", 2),
            ],
            timeseries: vec![
                StatisticRecord::new(2020, "BGD", 5),
                StatisticRecord::new(2020, "IND", 7),
                StatisticRecord::new(2021, "BGD", 1),
                StatisticRecord::new(2020, "PHL", 14),
            ],
        }
    }

    #[test]
    fn test_build_view_without_data() {
        let reference = sample_reference();
        let settings = DashboardSettings::default();
        let filter = settings.initial_filter();

        let view = build_view(None, None, &filter, &reference, &settings);

        assert!(!view.has_data());
        assert!(view.chart.is_empty());
        assert!(view.legend.is_empty());
        assert_eq!(view.headline, Headline::default());
        assert_eq!(view.effective_countries.len(), 5);
        assert_eq!(view.mode, AggregationMode::SingleSeries);
    }

    #[test]
    fn test_build_view_single_series() {
        let reference = sample_reference();
        let settings = DashboardSettings::default();
        let filter = settings.initial_filter();
        let stats = sample_stats();

        let view = build_view(Some(&stats), None, &filter, &reference, &settings);

        assert_eq!(view.headline.new_displacements, 27);
        assert_eq!(view.headline.total_events, 0);
        assert_eq!(
            view.series,
            Some(vec![
                AggregatedSeriesPoint::new(2020, SeriesKey::Aggregate, 26),
                AggregatedSeriesPoint::new(2021, SeriesKey::Aggregate, 1),
            ])
        );
        assert_eq!(view.legend.len(), 1);

        let labels: Vec<&str> = view
            .category_breakdown
            .iter()
            .map(|s| s.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Earthquake", "Flood", "Storm"]);
    }

    #[test]
    fn test_build_view_per_entity() {
        let reference = sample_reference();
        let settings = DashboardSettings::default();
        let filter = settings
            .initial_filter()
            .with_regions(["south-asia"])
            .with_countries(["PHL"]);
        let stats = sample_stats();

        let view = build_view(Some(&stats), None, &filter, &reference, &settings);

        assert_eq!(view.mode, AggregationMode::PerEntity);
        assert_eq!(view.chart.len(), 2);
        assert_eq!(view.chart[0].values.get("PHL"), Some(&14));
        assert_eq!(view.chart[0].values.get("south-asia"), Some(&12));
        assert_eq!(view.chart[1].values.get("south-asia"), Some(&1));
        assert_eq!(view.legend.len(), 2);
    }

    #[test]
    fn test_build_view_sorts_category_options() {
        let reference = sample_reference();
        let settings = DashboardSettings::default();
        let filter = settings.initial_filter();
        let options = vec![CategoryTotal::new("Storm", 1), CategoryTotal::new("Drought", 9)];

        let view = build_view(None, Some(&options), &filter, &reference, &settings);

        assert_eq!(view.category_options[0].label, "Drought");
        assert_eq!(view.category_options[1].label, "Storm");
    }

    #[test]
    fn test_view_json_shape() {
        let reference = sample_reference();
        let settings = DashboardSettings::default();
        let filter = settings.initial_filter();
        let stats = sample_stats();

        let view = build_view(Some(&stats), None, &filter, &reference, &settings);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["mode"], "single_series");
        assert_eq!(json["headline"]["newDisplacements"], 27);
        assert_eq!(json["series"][0], serde_json::json!({"year": 2020, "total": 26}));
        assert_eq!(json["chart"][1], serde_json::json!({"year": 2021, "total": 1}));
    }

    #[test]
    fn test_settings_reject_inverted_bounds() {
        let result = DashboardSettings::new(
            2021,
            2010,
            MultiSeriesThreshold::default(),
            Duration::from_millis(300),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_links_follow_selection() {
        let reference = sample_reference();
        let settings = DashboardSettings::default();
        let filter = settings.initial_filter().with_countries(["FJI"]);
        let effective = compute_effective_countries(&filter, &reference);

        let links = DashboardLinks::new(&ClientConfig::default(), &effective, &filter).unwrap();

        assert!(links.export.contains("countries_iso3=FJI"));
        assert!(links.export.contains("start_year=2010"));
        assert_eq!(links.full_database, "/database/displacement-data");
    }

    /// Serve canned GraphQL answers, one request per connection.
    async fn serve_canned(listener: TcpListener) {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    if request_complete(&request) {
                        break;
                    }
                }

                let text = String::from_utf8_lossy(&request);
                let body = if text.contains("DisasterCategories") {
                    r#"{"data": {"disasterStatistics": {"categories": [{"label": "Storm", "total": 3}, {"label": "Flood", "total": 2}]}}}"#
                } else {
                    r#"{"data": {"disasterStatistics": {"newDisplacements": 5, "totalEvents": 1, "categories": [{"label": "Flood", "total": 5}], "timeseries": [{"country": {"iso3": "BGD"}, "year": 2015, "total": 5}]}}}"#
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn test_refresh_against_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_canned(listener));

        let config = ClientConfig {
            graphql_url: format!("http://{}/graphql/", addr),
            timeout_seconds: 5,
            ..ClientConfig::default()
        };
        let client = StatisticsClient::new(config).unwrap();
        let settings = DashboardSettings::default();
        let mut dashboard = Dashboard::new(Arc::new(sample_reference()), client, settings);

        let filter = settings.initial_filter().with_countries(["BGD"]);
        let view = dashboard.refresh(&filter).await;

        assert!(view.errors.is_empty(), "errors: {:?}", view.errors);
        assert!(!view.stale);
        assert_eq!(view.headline.new_displacements, 5);
        assert_eq!(
            view.series,
            Some(vec![AggregatedSeriesPoint::new(2015, SeriesKey::Aggregate, 5)])
        );
        assert_eq!(view.category_options[0].label, "Flood");
        assert!(view.links.is_some());
    }

    #[test]
    fn test_refresh_with_unreachable_backend() {
        let config = ClientConfig {
            graphql_url: "http://127.0.0.1:9/graphql/".to_string(),
            timeout_seconds: 2,
            ..ClientConfig::default()
        };
        let client = StatisticsClient::new(config).unwrap();
        let settings = DashboardSettings::default();
        let mut dashboard = Dashboard::new(Arc::new(sample_reference()), client, settings);
        let filter = settings.initial_filter();

        let view = tokio_test::block_on(dashboard.refresh(&filter));

        assert!(!view.has_data());
        assert_eq!(view.errors.len(), 2);
        assert!(!view.stale);
    }
}
