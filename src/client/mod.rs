//! Statistics backend client.

pub mod graphql;
pub mod links;
pub mod status;

pub use graphql::{DisasterDataVariables, StatisticsClient};
pub use links::{disaster_export_url, full_database_url};
pub use status::QueryState;

use serde::{Deserialize, Serialize};

/// Endpoints and transport settings, fixed at client construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub graphql_url: String,
    pub rest_url: String,
    pub drupal_url: String,
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            graphql_url: "http://localhost:8000/graphql/".to_string(),
            rest_url: "http://localhost:8000/api".to_string(),
            drupal_url: String::new(),
            timeout_seconds: 30,
        }
    }
}
