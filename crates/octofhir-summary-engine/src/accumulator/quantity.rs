//! Quantitative variable accumulator

use serde_json::Value;

use octofhir_summary_types::terms;
use octofhir_summary_types::{ComponentValue, SummaryComponent};

use super::{MismatchTally, literal_value, missing};
use crate::variable::NumericDetails;

/// Running sum and count for a numeric variable, producing an arithmetic
/// mean. The declared range and units travel along as metadata but are never
/// enforced.
#[derive(Debug, Clone, Default)]
pub struct QuantityAccumulator {
    sum: f64,
    /// Observations carrying a well-formed numeric value; the mean denominator
    numeric: u64,
    /// Every observe call, conforming or not
    observed: u64,
    mismatched: MismatchTally,
    details: NumericDetails,
}

impl QuantityAccumulator {
    pub fn new(details: NumericDetails) -> Self {
        Self {
            details,
            ..Self::default()
        }
    }

    /// Declared range and units of the underlying variable
    pub fn details(&self) -> &NumericDetails {
        &self.details
    }

    pub fn observe(&mut self, component: &Value) {
        self.observed += 1;

        if let Some(value) = component
            .get("valueQuantity")
            .and_then(|quantity| quantity.get("value"))
            .and_then(Value::as_f64)
        {
            self.sum += value;
            self.numeric += 1;
        } else if let Some(text) = component.get("valueString").and_then(Value::as_str) {
            self.mismatched.note(text);
        } else {
            self.mismatched.note(literal_value(component));
        }
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }

    fn mean(&self) -> Option<f64> {
        (self.numeric > 0).then(|| self.sum / self.numeric as f64)
    }

    pub fn finalize(&self, expected_n: u64) -> Vec<SummaryComponent> {
        let mean = match self.mean() {
            Some(mean) => ComponentValue::quantity(mean),
            None => ComponentValue::text("NaN"),
        };

        let mut components = vec![
            SummaryComponent::new(
                terms::COUNT.to_concept(),
                ComponentValue::integer(self.numeric as i64),
            ),
            SummaryComponent::new(terms::MEAN.to_concept(), mean),
        ];
        components.extend(self.mismatched.components());
        components.push(SummaryComponent::new(
            terms::MISSING.to_concept(),
            ComponentValue::integer(missing(expected_n, self.observed)),
        ));
        components
    }

    pub fn text_summary(&self, expected_n: u64) -> String {
        let mean = match self.mean() {
            Some(mean) => mean.to_string(),
            None => "NaN".to_string(),
        };
        format!(
            "      N: {}\n{}      mean: {mean}\n      missing: {}\n",
            self.numeric,
            self.mismatched.text_block(),
            missing(expected_n, self.observed)
        )
    }
}
