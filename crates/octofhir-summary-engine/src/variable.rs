//! Variable definitions
//!
//! One `VariableDefinition` is built per ObservationDefinition discovered in a
//! table's schema and lives for the duration of that table's aggregation pass.

use std::fmt;

use serde_json::Value;

use octofhir_summary_types::{CodeableConcept, Identifier};

use crate::error::{EngineError, EngineResult};
use crate::resolver::canonical_key;

/// The declared value kind of a variable; decides which accumulator variant
/// observes its values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Categorical,
    FreeText,
    Quantitative,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::Categorical => write!(f, "categorical"),
            VariableKind::FreeText => write!(f, "free-text"),
            VariableKind::Quantitative => write!(f, "quantitative"),
        }
    }
}

/// Declared numeric range and units of a quantitative variable.
/// Informational only; the engine never enforces the range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericDetails {
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub unit: Option<String>,
}

/// One measured property of a subject: its canonical coded identity, output
/// identifier and declared value kind
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    /// Canonical join key between schema coding and observed-data coding
    pub key: String,
    /// The full declared code element, carried into summary output
    pub concept: CodeableConcept,
    /// Output identifier; the schema's identifier system rewritten to the
    /// summary namespace
    pub identifier: Identifier,
    pub kind: VariableKind,
    /// Value set backing a categorical variable's closed value set
    pub value_set_ref: Option<String>,
    pub numeric: NumericDetails,
}

impl VariableDefinition {
    /// Build a definition from an ObservationDefinition resource.
    ///
    /// Fails with [`EngineError::UnrecognizedVariableKind`] when the declared
    /// permitted data types match none of the three known kinds; this is a
    /// configuration defect, not a per-record condition.
    pub fn from_resource(resource: &Value) -> EngineResult<Self> {
        let concept = resource
            .get("code")
            .and_then(CodeableConcept::from_resource)
            .ok_or_else(|| EngineError::malformed("ObservationDefinition", "code"))?;
        let key = canonical_key(&concept)
            .ok_or_else(|| EngineError::malformed("ObservationDefinition", "code.coding"))?;

        let mut identifier = resource
            .get("identifier")
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(Identifier::from_resource)
            .ok_or_else(|| EngineError::malformed("ObservationDefinition", "identifier"))?;
        identifier.system = identifier
            .system
            .replace("/observationdefinition", "/summary/observation");

        let kind = declared_kind(resource, &key)?;

        let value_set_ref = resource
            .get("validCodedValueSet")
            .and_then(|vs| vs.get("reference"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            key,
            concept,
            identifier,
            kind,
            value_set_ref,
            numeric: numeric_details(resource),
        })
    }
}

fn declared_kind(resource: &Value, key: &str) -> EngineResult<VariableKind> {
    let declared: Vec<&str> = resource
        .get("permittedDataType")
        .and_then(Value::as_array)
        .map(|kinds| kinds.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if declared.contains(&"CodeableConcept") {
        Ok(VariableKind::Categorical)
    } else if declared.contains(&"string") {
        Ok(VariableKind::FreeText)
    } else if declared.contains(&"Quantity") {
        Ok(VariableKind::Quantitative)
    } else {
        Err(EngineError::unrecognized_kind(key, declared.join(",")))
    }
}

fn numeric_details(resource: &Value) -> NumericDetails {
    let range = resource
        .get("qualifiedInterval")
        .and_then(|interval| interval.get("range"));

    NumericDetails {
        low: range.and_then(|r| bound_value(r.get("low"))),
        high: range.and_then(|r| bound_value(r.get("high"))),
        unit: resource
            .get("quantitativeDetails")
            .and_then(|details| details.get("unit"))
            .and_then(unit_code),
    }
}

// Range bounds appear both as bare numbers and as SimpleQuantity objects
fn bound_value(bound: Option<&Value>) -> Option<f64> {
    let bound = bound?;
    bound
        .as_f64()
        .or_else(|| bound.get("value").and_then(Value::as_f64))
}

fn unit_code(unit: &Value) -> Option<String> {
    unit.get("code")
        .and_then(Value::as_str)
        .or_else(|| {
            unit.get("coding")
                .and_then(Value::as_array)
                .and_then(|codings| codings.first())
                .and_then(|coding| coding.get("code"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}
