//! In-memory provider implementations
//!
//! Useful for tests and dry runs; mirrors the shape of the real REST-backed
//! providers without any network dependency.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use octofhir_summary_types::{Coding, SummaryRecord};

use crate::provider::{ClientError, QueryClient, QueryOutcome, SummaryStore, TerminologyClient};

/// Query client that reports every search as unavailable
pub struct NoOpQueryClient;

#[async_trait]
impl QueryClient for NoOpQueryClient {
    async fn query(&self, _filter: &str) -> Result<QueryOutcome, ClientError> {
        Ok(QueryOutcome::unavailable())
    }
}

/// Terminology client that can expand nothing
pub struct NoOpTerminologyClient;

#[async_trait]
impl TerminologyClient for NoOpTerminologyClient {
    async fn expand(&self, value_set_ref: &str) -> Result<Vec<Coding>, ClientError> {
        Err(ClientError::request(format!(
            "no terminology source for {value_set_ref}"
        )))
    }
}

/// Query client answering from a fixed filter → resources table
#[derive(Default)]
pub struct StaticQueryClient {
    responses: HashMap<String, Vec<Value>>,
}

impl StaticQueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the resources returned for an exact filter expression
    pub fn with_response(mut self, filter: impl Into<String>, entries: Vec<Value>) -> Self {
        self.responses.insert(filter.into(), entries);
        self
    }
}

#[async_trait]
impl QueryClient for StaticQueryClient {
    async fn query(&self, filter: &str) -> Result<QueryOutcome, ClientError> {
        Ok(match self.responses.get(filter) {
            Some(entries) => QueryOutcome::of(entries.clone()),
            None => QueryOutcome::unavailable(),
        })
    }
}

/// Terminology client answering from a fixed reference → codings table
#[derive(Default)]
pub struct StaticTerminologyClient {
    expansions: HashMap<String, Vec<Coding>>,
}

impl StaticTerminologyClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expansion(mut self, reference: impl Into<String>, codes: Vec<Coding>) -> Self {
        self.expansions.insert(reference.into(), codes);
        self
    }
}

#[async_trait]
impl TerminologyClient for StaticTerminologyClient {
    async fn expand(&self, value_set_ref: &str) -> Result<Vec<Coding>, ClientError> {
        self.expansions
            .get(value_set_ref)
            .cloned()
            .ok_or_else(|| ClientError::request(format!("unknown value set {value_set_ref}")))
    }
}

/// Store that collects upserted records in memory
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<SummaryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything upserted so far, in arrival order
    pub fn records(&self) -> Vec<SummaryRecord> {
        self.records.lock().expect("store poisoned").clone()
    }
}

#[async_trait]
impl SummaryStore for MemoryStore {
    async fn upsert(&self, record: &SummaryRecord) -> Result<(), ClientError> {
        self.records
            .lock()
            .expect("store poisoned")
            .push(record.clone());
        Ok(())
    }
}
