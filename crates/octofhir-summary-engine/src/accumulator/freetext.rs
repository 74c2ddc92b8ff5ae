//! Free-text variable accumulator

use std::collections::BTreeSet;

use serde_json::Value;

use octofhir_summary_types::terms;
use octofhir_summary_types::{ComponentValue, SummaryComponent};

use super::{literal_value, missing};

/// Tracks the distinct values of a free-text variable.
///
/// Individual values are never emitted; only the distinct-value count and the
/// missing count appear in output.
#[derive(Debug, Clone, Default)]
pub struct FreeTextAccumulator {
    distinct: BTreeSet<String>,
    observed: u64,
}

impl FreeTextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, component: &Value) {
        let text = component
            .get("valueString")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                component
                    .get("valueCodeableConcept")
                    .and_then(|concept| concept.get("text"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| literal_value(component));

        self.distinct.insert(text);
        self.observed += 1;
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }

    pub fn distinct_count(&self) -> usize {
        self.distinct.len()
    }

    pub fn finalize(&self, expected_n: u64) -> Vec<SummaryComponent> {
        vec![
            SummaryComponent::new(
                terms::COUNT.to_concept().with_text("Unique Values"),
                ComponentValue::integer(self.distinct.len() as i64),
            ),
            SummaryComponent::new(
                terms::MISSING.to_concept(),
                ComponentValue::integer(missing(expected_n, self.observed)),
            ),
        ]
    }

    pub fn text_summary(&self, expected_n: u64) -> String {
        format!(
            "      Unique Values: {}\n      missing: {}\n",
            self.distinct.len(),
            missing(expected_n, self.observed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn repeated_values_collapse_to_one() {
        let mut acc = FreeTextAccumulator::new();
        acc.observe(&json!({"valueString": "asthma"}));
        acc.observe(&json!({"valueString": "asthma"}));
        acc.observe(&json!({"valueString": "copd"}));

        let components = acc.finalize(4);
        assert_eq!(components[0].value.as_integer(), Some(2));
        assert_eq!(components[0].code.text.as_deref(), Some("Unique Values"));
        assert_eq!(components[1].value.as_integer(), Some(1));
    }

    #[test]
    fn observed_plus_missing_covers_expected() {
        let mut acc = FreeTextAccumulator::new();
        for i in 0..3 {
            acc.observe(&json!({"valueString": format!("v{i}")}));
        }
        let components = acc.finalize(10);
        let missing = components[1].value.as_integer().unwrap();
        assert_eq!(acc.observed() as i64 + missing, 10);
    }

    #[test]
    fn non_string_fragments_still_count_as_observed() {
        let mut acc = FreeTextAccumulator::new();
        acc.observe(&json!({"valueInteger": 4}));
        acc.observe(&json!({"valueCodeableConcept": {"text": "as text"}}));

        assert_eq!(acc.observed(), 2);
        assert_eq!(acc.distinct_count(), 2);
    }
}
