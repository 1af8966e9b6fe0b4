//! GraphQL client for the displacement statistics backend.
//!
//! Each query is a typed request with typed variables and a typed result.
//! Partial responses follow an "all" error policy: data that arrives
//! alongside errors is still used, and the errors are logged.

use super::ClientConfig;
use crate::analysis::EffectiveCountrySet;
use crate::filter::FilterState;
use crate::models::{CategoryTotal, DisasterStatistics};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Statistics for a country selection, year range and hazard categories.
pub const DISASTER_DATA_QUERY: &str = r#"
    query DisasterData(
        $countryIso3: [String!],
        $startYear: Int,
        $endYear: Int,
        $categories: [String!],
    ) {
        disasterStatistics(filters: {
            countriesIso3: $countryIso3,
            endYear: $endYear,
            startYear: $startYear,
            categories: $categories,
        }) {
            newDisplacements
            totalEvents
            categories {
                label
                total
            }
            timeseries {
                country {
                    id
                    iso3
                    countryName
                }
                total
                year
            }
        }
    }
"#;

/// Hazard categories available for a country selection.
pub const DISASTER_CATEGORIES_QUERY: &str = r#"
    query DisasterCategories(
        $countryIso3: [String!],
    ) {
        disasterStatistics(filters: { countriesIso3: $countryIso3 }) {
            categories {
                label
                total
            }
        }
    }
"#;

/// Variables of the `DisasterData` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterDataVariables {
    pub country_iso3: Vec<String>,
    pub start_year: i32,
    pub end_year: i32,
    pub categories: Vec<String>,
}

impl DisasterDataVariables {
    /// Build query variables from a filter snapshot.
    pub fn from_filter(filter: &FilterState, countries: &EffectiveCountrySet) -> Self {
        Self {
            country_iso3: countries.as_slice().to_vec(),
            start_year: filter.year_range.start(),
            end_year: filter.year_range.end(),
            categories: filter.selected_categories.iter().cloned().collect(),
        }
    }
}

/// Variables of the `DisasterCategories` query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DisasterCategoriesVariables<'a> {
    country_iso3: &'a [String],
}

/// GraphQL request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlRequest<'a, V> {
    operation_name: &'a str,
    query: &'a str,
    variables: V,
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisasterStatisticsData {
    disaster_statistics: DisasterStatistics,
}

/// Client for the statistics GraphQL endpoint.
pub struct StatisticsClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl StatisticsClient {
    /// Create a client for the configured endpoint.
    pub fn new(config: ClientConfig) -> Result<Self> {
        info!("Initializing statistics client for {}", config.graphql_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch headline figures, categories and time series.
    pub async fn disaster_data(
        &self,
        variables: &DisasterDataVariables,
    ) -> Result<DisasterStatistics> {
        debug!(
            "Querying disaster data for {} countries, {}-{}",
            variables.country_iso3.len(),
            variables.start_year,
            variables.end_year
        );

        let data: DisasterStatisticsData = self
            .execute("DisasterData", DISASTER_DATA_QUERY, variables)
            .await?;

        Ok(data.disaster_statistics)
    }

    /// Fetch the hazard categories available for a country selection.
    pub async fn disaster_categories(&self, country_iso3: &[String]) -> Result<Vec<CategoryTotal>> {
        debug!("Querying categories for {} countries", country_iso3.len());

        let data: DisasterStatisticsData = self
            .execute(
                "DisasterCategories",
                DISASTER_CATEGORIES_QUERY,
                DisasterCategoriesVariables { country_iso3 },
            )
            .await?;

        Ok(data.disaster_statistics.categories)
    }

    /// Send a GraphQL operation and decode its `data`.
    async fn execute<V, T>(&self, operation_name: &str, query: &str, variables: V) -> Result<T>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let request = GraphQlRequest {
            operation_name,
            query,
            variables,
        };

        let response = self
            .http_client
            .post(&self.config.graphql_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!(
                        "{} timed out after {}s",
                        operation_name,
                        self.config.timeout_seconds
                    )
                } else if e.is_connect() {
                    anyhow::anyhow!(
                        "Cannot connect to statistics backend at {}",
                        self.config.graphql_url
                    )
                } else {
                    anyhow::anyhow!("Failed to send {}: {}", operation_name, e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Backend error {}: {}", status, body));
        }

        let envelope: GraphQlResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", operation_name))?;

        interpret(operation_name, envelope)
    }
}

/// Apply the "all" error policy to a decoded envelope.
fn interpret<T>(operation_name: &str, envelope: GraphQlResponse<T>) -> Result<T> {
    for error in &envelope.errors {
        warn!("{} reported an error: {}", operation_name, error.message);
    }

    match envelope.data {
        Some(data) => Ok(data),
        None if envelope.errors.is_empty() => {
            Err(anyhow::anyhow!("{} returned no data", operation_name))
        }
        None => {
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            Err(anyhow::anyhow!(
                "{} failed: {}",
                operation_name,
                messages.join("; ")
            ))
        }
    }
}
