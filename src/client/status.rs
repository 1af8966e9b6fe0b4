//! Fetch status of a query, with the previous result kept for display.

use serde::Serialize;

/// Outcome of the latest request for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "lowercase")]
pub enum QueryStatus<T> {
    Pending,
    Ready(T),
    Failed(String),
}

impl<T> QueryStatus<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            QueryStatus::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            QueryStatus::Failed(message) => Some(message),
            _ => None,
        }
    }
}

impl<T> From<anyhow::Result<T>> for QueryStatus<T> {
    fn from(result: anyhow::Result<T>) -> Self {
        match result {
            Ok(data) => QueryStatus::Ready(data),
            Err(e) => QueryStatus::Failed(format!("{:#}", e)),
        }
    }
}

/// Current status of a query plus its last successful result.
///
/// While a new request is in flight, or after it failed, the previous
/// result remains displayable so views never flash empty.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    status: QueryStatus<T>,
    previous: Option<T>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueryState<T> {
    pub fn new() -> Self {
        Self {
            status: QueryStatus::Pending,
            previous: None,
        }
    }

    /// Mark a new request as started.
    pub fn begin(&mut self) {
        if let QueryStatus::Ready(data) = std::mem::replace(&mut self.status, QueryStatus::Pending)
        {
            self.previous = Some(data);
        }
    }

    /// Record the outcome of the request started by [`QueryState::begin`].
    pub fn finish(&mut self, result: anyhow::Result<T>) {
        if let QueryStatus::Ready(data) = std::mem::replace(&mut self.status, result.into()) {
            self.previous = Some(data);
        }
    }

    pub fn status(&self) -> &QueryStatus<T> {
        &self.status
    }

    /// Current data, else the previous result, else nothing.
    pub fn displayable(&self) -> Option<&T> {
        self.status.data().or(self.previous.as_ref())
    }

    /// True when [`QueryState::displayable`] is serving an older result.
    pub fn is_stale(&self) -> bool {
        self.status.data().is_none() && self.previous.is_some()
    }
}
