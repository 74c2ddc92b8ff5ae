//! Coded concepts, identifiers and references
//!
//! These types mirror the FHIR datatypes of the same names, restricted to the
//! fields the summary engine actually reads and writes. Source resources are
//! handled as raw `serde_json::Value`; these types are used wherever the
//! engine owns the data.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A (code, display, system) triple naming a controlled vocabulary term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    /// Coding system URI
    pub system: String,
    /// Code value within the system
    pub code: String,
    /// Human-readable display; falls back to the code when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Optional version of the coding system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Coding {
    /// Create a coding with an explicit display
    pub fn new(
        code: impl Into<String>,
        display: impl Into<String>,
        system: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            display: Some(display.into()),
            version: None,
        }
    }

    /// Read a coding out of a raw resource fragment.
    ///
    /// Returns `None` unless both `system` and `code` are present.
    pub fn from_resource(value: &Value) -> Option<Self> {
        Some(Self {
            system: value.get("system")?.as_str()?.to_string(),
            code: value.get("code")?.as_str()?.to_string(),
            display: value
                .get("display")
                .and_then(Value::as_str)
                .map(str::to_string),
            version: value
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// The display text, falling back to the code itself when none was given
    pub fn display(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.code)
    }

    /// Wrap this coding in a single-entry `CodeableConcept`
    pub fn to_concept(&self) -> CodeableConcept {
        CodeableConcept {
            coding: vec![self.clone()],
            text: None,
        }
    }
}

/// A concept carrying one or more codings and optional free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// Concept with a single coding and no text
    pub fn from_coding(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            text: None,
        }
    }

    /// Concept carrying only free text, no codings
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            coding: Vec::new(),
            text: Some(text.into()),
        }
    }

    /// Read a concept out of a raw resource fragment.
    ///
    /// Codings missing `system` or `code` are dropped; a concept with
    /// neither codings nor text yields `None`.
    pub fn from_resource(value: &Value) -> Option<Self> {
        let coding = value
            .get("coding")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(Coding::from_resource).collect())
            .unwrap_or_default();
        let text = value
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string);

        let concept = Self { coding, text };
        if concept.coding.is_empty() && concept.text.is_none() {
            return None;
        }
        Some(concept)
    }

    /// The primary (first) coding, if any
    pub fn primary(&self) -> Option<&Coding> {
        self.coding.first()
    }

    /// Return this concept with its text replaced
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A business identifier attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    /// Identifier use, e.g. `"official"` or `"secondary"`
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub r#use: Option<String>,
    pub system: String,
    pub value: String,
}

impl Identifier {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            r#use: None,
            system: system.into(),
            value: value.into(),
        }
    }

    /// Read an identifier out of a raw resource fragment
    pub fn from_resource(value: &Value) -> Option<Self> {
        Some(Self {
            r#use: value
                .get("use")
                .and_then(Value::as_str)
                .map(str::to_string),
            system: value.get("system")?.as_str()?.to_string(),
            value: value.get("value")?.as_str()?.to_string(),
        })
    }
}

/// A literal reference to another resource, e.g. `Group/phs002921-c1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub reference: String,
}

impl Reference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }
}

/// Resource metadata; only the tag list matters for summaries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<Coding>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn display_falls_back_to_code() {
        let coding = Coding {
            system: "https://loinc.org".to_string(),
            code: "32624-9".to_string(),
            display: None,
            version: None,
        };
        assert_eq!(coding.display(), "32624-9");

        let named = Coding::new("32624-9", "Race", "https://loinc.org");
        assert_eq!(named.display(), "Race");
    }

    #[test]
    fn coding_from_resource_requires_system_and_code() {
        let ok = json!({"system": "https://loinc.org", "code": "5", "display": "Five"});
        let coding = Coding::from_resource(&ok).unwrap();
        assert_eq!(coding.code, "5");
        assert_eq!(coding.display(), "Five");

        let missing_system = json!({"code": "5"});
        assert!(Coding::from_resource(&missing_system).is_none());
    }

    #[test]
    fn concept_from_resource_drops_incomplete_codings() {
        let value = json!({
            "coding": [
                {"system": "https://loinc.org", "code": "5"},
                {"code": "orphan"}
            ],
            "text": "example"
        });
        let concept = CodeableConcept::from_resource(&value).unwrap();
        assert_eq!(concept.coding.len(), 1);
        assert_eq!(concept.text.as_deref(), Some("example"));
    }

    #[test]
    fn empty_concept_is_none() {
        assert!(CodeableConcept::from_resource(&json!({})).is_none());
        // text alone is enough
        assert!(CodeableConcept::from_resource(&json!({"text": "x"})).is_some());
    }

    #[test]
    fn identifier_round_trip() {
        let value = json!({"use": "official", "system": "https://example.org/ids", "value": "X1"});
        let identifier = Identifier::from_resource(&value).unwrap();
        assert_eq!(identifier.r#use.as_deref(), Some("official"));

        let serialized = serde_json::to_value(&identifier).unwrap();
        assert_eq!(serialized, value);
    }
}
