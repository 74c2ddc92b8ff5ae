//! The Observation-shaped summary output model
//!
//! One `SummaryRecord` captures the finalized statistics of one variable for
//! one population. Records are immutable once built; the engine's builder is
//! the only intended constructor.

use serde::{Deserialize, Serialize};

use crate::coding::{CodeableConcept, Coding, Identifier, Meta, Reference};

/// A numeric quantity component value, `{ "value": 15.0 }` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantityValue {
    pub value: f64,
}

/// The value carried by one summary component.
///
/// Serialized as the FHIR choice element it corresponds to: `valueInteger`,
/// `valueQuantity` or `valueString`. The string variant exists for the
/// `"NaN"` sentinel emitted when a mean has no observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentValue {
    #[serde(rename = "valueInteger")]
    Integer(i64),
    #[serde(rename = "valueQuantity")]
    Quantity(QuantityValue),
    #[serde(rename = "valueString")]
    Text(String),
}

impl ComponentValue {
    pub fn integer(value: i64) -> Self {
        Self::Integer(value)
    }

    pub fn quantity(value: f64) -> Self {
        Self::Quantity(QuantityValue { value })
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_quantity(&self) -> Option<f64> {
        match self {
            Self::Quantity(q) => Some(q.value),
            _ => None,
        }
    }
}

/// One named statistic inside a summary record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryComponent {
    pub code: CodeableConcept,
    #[serde(flatten)]
    pub value: ComponentValue,
}

impl SummaryComponent {
    pub fn new(code: CodeableConcept, value: ComponentValue) -> Self {
        Self { code, value }
    }
}

/// One variable's finalized statistics for one population.
///
/// The (population id, variable canonical key) pair is encoded into the
/// single identifier and uniquely names a record within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    pub meta: Meta,
    pub identifier: Vec<Identifier>,
    pub status: String,
    pub code: CodeableConcept,
    pub subject: Reference,
    #[serde(rename = "valueCodeableConcept")]
    pub value_codeable_concept: CodeableConcept,
    pub component: Vec<SummaryComponent>,
}

impl SummaryRecord {
    /// Assemble a final-status Observation summary record
    pub fn new(
        tag: Coding,
        identifier: Identifier,
        code: CodeableConcept,
        subject: Reference,
        value: CodeableConcept,
        component: Vec<SummaryComponent>,
    ) -> Self {
        Self {
            resource_type: "Observation".to_string(),
            meta: Meta { tag: vec![tag] },
            identifier: vec![identifier],
            status: "final".to_string(),
            code,
            subject,
            value_codeable_concept: value,
            component,
        }
    }

    /// The upsert key: (identifier system, identifier value)
    pub fn identifier_key(&self) -> Option<(&str, &str)> {
        self.identifier
            .first()
            .map(|id| (id.system.as_str(), id.value.as_str()))
    }
}
