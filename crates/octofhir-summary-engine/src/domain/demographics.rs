//! Demographic aggregation
//!
//! Race, ethnicity and sex are tracked as three independent sub-domains read
//! from distinct parts of the Patient resource. Race and ethnicity come from
//! the US Core extensions, preferring the structured `ombCategory` coding
//! over the free-text fallback extension; sex comes from the `gender` field.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use octofhir_summary_types::terms;
use octofhir_summary_types::{CodeableConcept, Coding};

/// Sub-domain names, in report order
pub const SUBDOMAINS: [&str; 3] = ["race", "ethnicity", "gender"];

/// Counts of one demographic sub-domain, keyed by display value
#[derive(Debug, Clone, Default)]
pub struct CategoryTally {
    /// display value → the concept observed for it
    observed: IndexMap<String, CodeableConcept>,
    counts: IndexMap<String, u64>,
}

impl CategoryTally {
    fn note(&mut self, key: String, concept: CodeableConcept) {
        self.observed.entry(key.clone()).or_insert(concept);
        *self.counts.entry(key).or_insert(0) += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// (display value, concept, count) in ascending display-value order
    pub fn sorted(&self) -> Vec<(&str, &CodeableConcept, u64)> {
        let mut keys: Vec<&String> = self.counts.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| (key.as_str(), &self.observed[key], self.counts[key]))
            .collect()
    }
}

/// Aggregates the demographics of one population's Patient resources
#[derive(Debug, Clone, Default)]
pub struct Demographics {
    identifier_system: Option<String>,
    race: CategoryTally,
    ethnicity: CategoryTally,
    sex: CategoryTally,
    ingested: u64,
}

impl Demographics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one Patient resource. Patients missing an extension or the
    /// gender field simply contribute to that sub-domain's missing count.
    pub fn ingest(&mut self, resource: &Value) {
        self.ingested += 1;

        if self.identifier_system.is_none() {
            self.identifier_system = summary_identifier_system(resource);
        }

        let extensions = resource
            .get("extension")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for extension in extensions {
            match extension.get("url").and_then(Value::as_str) {
                Some(terms::US_CORE_RACE) => {
                    if let Some((key, concept)) = omb_category(extension) {
                        self.race.note(key, concept);
                    }
                }
                Some(terms::US_CORE_ETHNICITY) => {
                    if let Some((key, concept)) = omb_category(extension) {
                        self.ethnicity.note(key, concept);
                    }
                }
                _ => {}
            }
        }

        if let Some(gender) = resource.get("gender").and_then(Value::as_str) {
            let coding = Coding::new(gender, capitalize(gender), terms::ADMINISTRATIVE_GENDER);
            self.sex
                .note(gender.to_string(), CodeableConcept::from_coding(coding));
        } else {
            debug!("patient without gender field");
        }
    }

    pub fn ingested(&self) -> u64 {
        self.ingested
    }

    pub fn identifier_system(&self) -> Option<&str> {
        self.identifier_system.as_deref()
    }

    /// The named sub-domain's tally
    pub fn subdomain(&self, name: &str) -> Option<&CategoryTally> {
        match name {
            "race" => Some(&self.race),
            "ethnicity" => Some(&self.ethnicity),
            "gender" => Some(&self.sex),
            _ => None,
        }
    }

    /// The coded identity a sub-domain's summary record reports under
    pub fn subdomain_coding(name: &str) -> Option<&'static Coding> {
        match name {
            "race" => Some(&terms::RACE),
            "ethnicity" => Some(&terms::ETHNICITY),
            "gender" => Some(&terms::SEX),
            _ => None,
        }
        .map(|coding| &**coding)
    }

    pub fn text_summary(&self) -> String {
        let mut result = String::new();
        for name in SUBDOMAINS {
            let tally = self.subdomain(name).expect("known subdomain");
            result.push_str(&format!("  {name}:\n"));
            for (value, concept, count) in tally.sorted() {
                let code = concept.primary().map(|coding| coding.code.as_str());
                match code {
                    Some(code) if code != value => {
                        result.push_str(&format!("    {value} ({code}): {count}\n"));
                    }
                    _ => result.push_str(&format!("    {value}: {count}\n")),
                }
            }
            result.push_str(&format!(
                "    missing: {}\n",
                self.ingested as i64 - tally.total() as i64
            ));
        }
        result
    }
}

/// Resolve the `ombCategory` sub-extension, falling back to the `text`
/// sub-extension when no structured category is present. Returns the display
/// key and the concept to report it under.
fn omb_category(extension: &Value) -> Option<(String, CodeableConcept)> {
    let children = extension.get("extension")?.as_array()?;
    let chosen = children
        .iter()
        .find(|child| child.get("url").and_then(Value::as_str) == Some("ombCategory"))
        .or_else(|| {
            children
                .iter()
                .find(|child| child.get("url").and_then(Value::as_str) == Some("text"))
        })?;

    if let Some(coding) = chosen.get("valueCoding").and_then(Coding::from_resource) {
        let key = coding.display().to_string();
        return Some((key, CodeableConcept::from_coding(coding)));
    }
    let text = chosen.get("valueString").and_then(Value::as_str)?;
    Some((text.to_string(), CodeableConcept::text_only(text)))
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

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
