//! The research population a run summarizes
//!
//! Backed by a FHIR Group resource. The population itself is read-only for
//! the engine; it only accumulates the finished domain summaries as
//! aggregation proceeds.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use octofhir_summary_types::Identifier;

use crate::domain::DomainSummary;
use crate::error::{EngineError, EngineResult};
use crate::resolver::official_identifier;

/// One defined group of research subjects
#[derive(Debug, Clone)]
pub struct Population {
    pub id: String,
    /// Study tag code; scopes every query this population runs
    pub tag: String,
    /// Declared membership size; informational, the engine accounts against
    /// the number of records actually ingested
    pub quantity: u64,
    members: HashSet<String>,
    /// The official identifier naming this population
    pub identifier: Identifier,
    /// domain name → finished aggregation result
    pub summaries: IndexMap<String, DomainSummary>,
}

impl Population {
    /// Build a population from a Group resource
    pub fn from_resource(resource: &Value) -> EngineResult<Self> {
        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::malformed("Group", "id"))?
            .to_string();

        let tag = resource
            .get("meta")
            .and_then(|meta| meta.get("tag"))
            .and_then(Value::as_array)
            .and_then(|tags| tags.first())
            .and_then(|tag| tag.get("code"))
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::malformed("Group", "meta.tag"))?
            .to_string();

        let identifiers: Vec<Identifier> = resource
            .get("identifier")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Identifier::from_resource).collect())
            .unwrap_or_default();
        let identifier = official_identifier(&identifiers)
            .ok_or_else(|| EngineError::malformed("Group", "identifier"))?
            .clone();

        let members = resource
            .get("member")
            .and_then(Value::as_array)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|member| member.get("entity"))
                    .filter_map(|entity| entity.get("reference"))
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            id,
            tag,
            quantity: resource
                .get("quantity")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            members,
            identifier,
            summaries: IndexMap::new(),
        })
    }

    /// Whether a resource reference (`Patient/p1`) belongs to this population
    pub fn is_member(&self, reference: &str) -> bool {
        self.members.contains(reference)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Attach a finished domain result
    pub fn add_summary(&mut self, name: impl Into<String>, summary: DomainSummary) {
        self.summaries.insert(name.into(), summary);
    }

    /// The newline-formatted text report over every finished domain
    pub fn text_report(&self) -> String {
        let mut report = String::new();
        for (header, summary) in &self.summaries {
            report.push_str(&format!("{header}: \n"));
            report.push_str(&summary.text_summary());
        }
        report
    }
}
