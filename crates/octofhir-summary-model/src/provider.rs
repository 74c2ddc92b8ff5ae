//! Provider traits at the engine boundary
//!
//! Three collaborators: a query client fetching raw resources, a terminology
//! client expanding value sets for categorical variables, and a store
//! accepting finished summary records. All of them are async; the engine
//! never calls them mid-aggregation.

use async_trait::async_trait;
use serde_json::Value;

use octofhir_summary_types::{Coding, SummaryRecord};

/// The outcome of one search against the source server.
///
/// An unsuccessful outcome means "no data available for this domain" and is
/// handled by proceeding with an empty ingestion set, never by failing.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub success: bool,
    pub entries: Vec<Value>,
}

impl QueryOutcome {
    /// A successful outcome carrying the given resources
    pub fn of(entries: Vec<Value>) -> Self {
        Self {
            success: true,
            entries,
        }
    }

    /// An unsuccessful outcome; callers treat this as an empty set
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// The resources to ingest: empty when the search was unsuccessful
    pub fn resources(self) -> Vec<Value> {
        if self.success { self.entries } else { Vec::new() }
    }
}

/// Searches the source server for raw resources
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Run a search, e.g. `Patient?_tag=SD001`. The filter expression is the
    /// path-and-query part of a FHIR search URL.
    async fn query(&self, filter: &str) -> Result<QueryOutcome, ClientError>;
}

/// Expands value sets for categorical variables
#[async_trait]
pub trait TerminologyClient: Send + Sync {
    /// Expand the referenced value set into its member codings.
    ///
    /// A failed expansion degrades the corresponding categorical accumulator
    /// to non-exhaustive mode; it is not fatal.
    async fn expand(&self, value_set_ref: &str) -> Result<Vec<Coding>, ClientError>;
}

/// Accepts finished summary records, one at a time
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Upsert one record, keyed by its first identifier
    /// (identifier system, identifier value, identifier-kind `"identifier"`).
    async fn upsert(&self, record: &SummaryRecord) -> Result<(), ClientError>;
}

/// Errors reported by provider implementations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response payload: {0}")]
    Payload(String),

    #[error("Store rejected '{identifier}' with status {status}")]
    Rejected { identifier: String, status: u16 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::Payload(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unsuccessful_outcome_yields_no_resources() {
        let outcome = QueryOutcome {
            success: false,
            entries: vec![json!({"resourceType": "Patient"})],
        };
        assert!(outcome.resources().is_empty());
    }

    #[test]
    fn successful_outcome_yields_entries() {
        let outcome = QueryOutcome::of(vec![json!({"resourceType": "Patient"})]);
        assert_eq!(outcome.resources().len(), 1);
    }
}
