//! Per-variable accumulators
//!
//! Three variants share one contract: `observe` consumes one raw component
//! fragment and never fails (unexpected shapes are tallied as mismatched, not
//! rejected), and `finalize` is a pure function of the final state and the
//! caller-supplied expected population size. The variant is chosen once per
//! variable from its declared value kind.

mod categorical;
mod freetext;
mod quantity;

pub use categorical::CategoricalAccumulator;
pub use freetext::FreeTextAccumulator;
pub use quantity::QuantityAccumulator;

use std::collections::BTreeMap;

use serde_json::Value;

use octofhir_summary_types::{CodeableConcept, Coding, ComponentValue, SummaryComponent};

use crate::variable::{VariableDefinition, VariableKind};

/// A per-variable accumulator, dispatched over the variable's declared kind
#[derive(Debug, Clone)]
pub enum Accumulator {
    Categorical(CategoricalAccumulator),
    FreeText(FreeTextAccumulator),
    Quantity(QuantityAccumulator),
}

impl Accumulator {
    /// Construct the accumulator variant matching the variable's declared
    /// kind. Unrecognized kinds were already rejected when the definition was
    /// parsed, so this cannot fail.
    pub fn for_definition(definition: &VariableDefinition) -> Self {
        match definition.kind {
            VariableKind::Categorical => Self::Categorical(CategoricalAccumulator::new()),
            VariableKind::FreeText => Self::FreeText(FreeTextAccumulator::new()),
            VariableKind::Quantitative => {
                Self::Quantity(QuantityAccumulator::new(definition.numeric.clone()))
            }
        }
    }

    /// Consume one observed component fragment
    pub fn observe(&mut self, component: &Value) {
        match self {
            Self::Categorical(acc) => acc.observe(component),
            Self::FreeText(acc) => acc.observe(component),
            Self::Quantity(acc) => acc.observe(component),
        }
    }

    /// Project final state into named components for `expected_n` subjects
    pub fn finalize(&self, expected_n: u64) -> Vec<SummaryComponent> {
        match self {
            Self::Categorical(acc) => acc.finalize(expected_n),
            Self::FreeText(acc) => acc.finalize(expected_n),
            Self::Quantity(acc) => acc.finalize(expected_n),
        }
    }

    /// Number of fragments this accumulator has seen
    pub fn observed(&self) -> u64 {
        match self {
            Self::Categorical(acc) => acc.observed(),
            Self::FreeText(acc) => acc.observed(),
            Self::Quantity(acc) => acc.observed(),
        }
    }

    /// Indented text-report block for this variable
    pub fn text_summary(&self, expected_n: u64) -> String {
        match self {
            Self::Categorical(acc) => acc.text_summary(expected_n),
            Self::FreeText(acc) => acc.text_summary(expected_n),
            Self::Quantity(acc) => acc.text_summary(expected_n),
        }
    }

    /// The categorical variant, for value-set seeding
    pub fn as_categorical_mut(&mut self) -> Option<&mut CategoricalAccumulator> {
        match self {
            Self::Categorical(acc) => Some(acc),
            _ => None,
        }
    }
}

/// Tally of observed values that did not conform to the variable's expected
/// shape. Never fatal; surfaced in the final output instead of being hidden.
#[derive(Debug, Clone, Default)]
pub struct MismatchTally {
    counts: BTreeMap<String, u64>,
}

impl MismatchTally {
    pub fn note(&mut self, value: impl Into<String>) {
        *self.counts.entry(value.into()).or_insert(0) += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(value, count)| (value.as_str(), *count))
    }

    /// One text-only component per mismatched value. Registered categories
    /// always carry a full coding; the absence of one marks a mismatch.
    pub fn components(&self) -> Vec<SummaryComponent> {
        self.iter()
            .map(|(value, count)| {
                SummaryComponent::new(
                    CodeableConcept::text_only(value),
                    ComponentValue::integer(count as i64),
                )
            })
            .collect()
    }

    /// The `Not in DD:` block of a text report; empty string when clean
    pub fn text_block(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut block = String::from("      Not in DD:\n");
        for (value, count) in self.iter() {
            block.push_str(&format!("        {value}: {count}\n"));
        }
        block
    }
}

/// Missing counts are reported signed: a negative value means more
/// observations than expected subjects, which is a data-quality signal the
/// output must not mask.
pub(crate) fn missing(expected_n: u64, observed: u64) -> i64 {
    expected_n as i64 - observed as i64
}

/// Literal rendering of a fragment that matched no expected shape; the
/// `code` element is dropped so the tally keys on the value alone
pub(crate) fn literal_value(component: &Value) -> String {
    let mut fragment = component.clone();
    if let Some(object) = fragment.as_object_mut() {
        object.remove("code");
    }
    fragment.to_string()
}

/// Match one observed coding against a registered code set: the code must be
/// known and its system must agree with the registered coding's system
pub(crate) fn matching_code<'a>(
    concept: &Value,
    registered: &'a indexmap::IndexMap<String, Coding>,
) -> Option<&'a str> {
    let codings = concept.get("coding")?.as_array()?;
    for coding in codings {
        let Some(code) = coding.get("code").and_then(Value::as_str) else {
            continue;
        };
        let system = coding.get("system").and_then(Value::as_str);
        if let Some(known) = registered.get(code) {
            if system == Some(known.system.as_str()) {
                return Some(known.code.as_str());
            }
        }
    }
    None
}
