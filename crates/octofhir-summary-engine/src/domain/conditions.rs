//! Condition aggregation
//!
//! Counts condition occurrences per canonical condition code, bucketed by
//! verification status. Every status is tallied; only the confirmed bucket
//! reaches the summary output.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Value;

use octofhir_summary_types::{CodeableConcept, Coding};

use crate::error::EngineResult;
use crate::resolver::resolve_concept_code;

const CONFIRMED: &str = "confirmed";

/// Tally for one condition code
#[derive(Debug, Clone)]
pub struct ConditionTally {
    /// The full observed code element, carried into summary output
    pub concept: CodeableConcept,
    /// verification status → occurrences
    pub by_status: BTreeMap<String, u64>,
}

impl ConditionTally {
    /// Occurrences with confirmed verification status
    pub fn confirmed(&self) -> u64 {
        self.by_status.get(CONFIRMED).copied().unwrap_or(0)
    }
}

/// Aggregates the conditions recorded for one population
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    /// Summary identifier namespace, captured from the first ingested
    /// resource that carries an identifier
    identifier_system: Option<String>,
    entries: IndexMap<String, ConditionTally>,
    ingested: u64,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one Condition resource.
    ///
    /// Fails only when every candidate coding of the condition belongs to the
    /// excluded dictionary system ([`crate::error::EngineError::NoValidCode`]);
    /// that is a schema defect and is surfaced, not skipped.
    pub fn ingest(&mut self, resource: &Value) -> EngineResult<()> {
        self.ingested += 1;

        if self.identifier_system.is_none() {
            self.identifier_system = summary_identifier_system(resource);
        }

        let status = verification_status(resource);

        let codings: Vec<Coding> = resource
            .get("code")
            .and_then(|code| code.get("coding"))
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(Coding::from_resource).collect())
            .unwrap_or_default();
        let chosen = resolve_concept_code(&codings)?.clone();

        let concept = resource
            .get("code")
            .and_then(CodeableConcept::from_resource)
            .unwrap_or_else(|| CodeableConcept::from_coding(chosen.clone()));

        let entry = self
            .entries
            .entry(chosen.code.clone())
            .or_insert_with(|| ConditionTally {
                concept,
                by_status: BTreeMap::new(),
            });
        *entry.by_status.entry(status).or_insert(0) += 1;
        Ok(())
    }

    pub fn ingested(&self) -> u64 {
        self.ingested
    }

    pub fn identifier_system(&self) -> Option<&str> {
        self.identifier_system.as_deref()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ConditionTally)> {
        self.entries.iter()
    }

    pub fn text_summary(&self) -> String {
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();

        let mut result = String::new();
        for code in keys {
            let tally = &self.entries[code];
            let display = tally
                .concept
                .primary()
                .map(Coding::display)
                .unwrap_or(code.as_str());
            result.push_str(&format!("  {code}: {} ({display})\n", tally.confirmed()));
        }
        result
    }
}

/// A condition without a verification status counts as confirmed
fn verification_status(resource: &Value) -> String {
    resource
        .get("verificationStatus")
        .and_then(|status| status.get("coding"))
        .and_then(Value::as_array)
        .and_then(|codings| codings.first())
        .and_then(|coding| coding.get("code"))
        .and_then(Value::as_str)
        .unwrap_or(CONFIRMED)
        .to_string()
}

fn summary_identifier_system(resource: &Value) -> Option<String> {
    let system = resource
        .get("identifier")?
        .as_array()?
        .first()?
        .get("system")?
        .as_str()?;
    Some(format!("{system}/summary"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn condition(code_entries: Vec<Value>, status: Option<&str>) -> Value {
        let mut resource = json!({
            "resourceType": "Condition",
            "identifier": [{"system": "https://example.org/study-x/condition", "value": "c1"}],
            "code": {"coding": code_entries, "text": "observed condition"},
            "subject": {"reference": "Patient/p1"}
        });
        if let Some(status) = status {
            resource["verificationStatus"] =
                json!({"coding": [{"system": "http://terminology.hl7.org/CodeSystem/condition-ver-status", "code": status}]});
        }
        resource
    }

    fn hp_coding(code: &str) -> Value {
        json!({"system": "https://hpo.jax.org", "code": code, "display": code})
    }

    #[test]
    fn absent_verification_status_counts_as_confirmed() {
        let mut conditions = Conditions::new();
        conditions
            .ingest(&condition(vec![hp_coding("HP:0001250")], None))
            .unwrap();

        let (_, tally) = conditions.entries().next().unwrap();
        assert_eq!(tally.confirmed(), 1);
    }

    #[test]
    fn unconfirmed_statuses_are_bucketed_but_not_confirmed() {
        let mut conditions = Conditions::new();
        let coding = vec![hp_coding("HP:0001250")];
        conditions.ingest(&condition(coding.clone(), Some("confirmed"))).unwrap();
        conditions.ingest(&condition(coding.clone(), Some("provisional"))).unwrap();
        conditions.ingest(&condition(coding, Some("refuted"))).unwrap();

        assert_eq!(conditions.ingested(), 3);
        let (_, tally) = conditions.entries().next().unwrap();
        assert_eq!(tally.confirmed(), 1);
        assert_eq!(tally.by_status.get("provisional"), Some(&1));
        assert_eq!(tally.by_status.get("refuted"), Some(&1));
    }

    #[test]
    fn condition_code_goes_through_resolution() {
        let mut conditions = Conditions::new();
        conditions
            .ingest(&condition(
                vec![
                    json!({"system": "https://example.org/dict/data-dictionary/cond", "code": "9"}),
                    hp_coding("HP:0004322"),
                ],
                None,
            ))
            .unwrap();

        let (code, _) = conditions.entries().next().unwrap();
        assert_eq!(code, "HP:0004322");
    }

    #[test]
    fn dictionary_only_codings_surface_no_valid_code() {
        let mut conditions = Conditions::new();
        let err = conditions
            .ingest(&condition(
                vec![
                    json!({"system": "https://a/data-dictionary/x", "code": "1"}),
                    json!({"system": "https://b/data-dictionary/y", "code": "2"}),
                ],
                None,
            ))
            .unwrap_err();
        assert_eq!(err, crate::error::EngineError::no_valid_code(2));
    }

    #[test]
    fn identifier_system_gains_summary_suffix() {
        let mut conditions = Conditions::new();
        conditions
            .ingest(&condition(vec![hp_coding("HP:0001250")], None))
            .unwrap();
        assert_eq!(
            conditions.identifier_system(),
            Some("https://example.org/study-x/condition/summary")
        );
    }

    #[test]
    fn text_summary_shows_confirmed_counts() {
        let mut conditions = Conditions::new();
        conditions
            .ingest(&condition(vec![hp_coding("HP:0001250")], Some("provisional")))
            .unwrap();
        assert_eq!(conditions.text_summary(), "  HP:0001250: 0 (HP:0001250)\n");
    }
}
