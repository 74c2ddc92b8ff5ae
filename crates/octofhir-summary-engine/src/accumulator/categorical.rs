//! Categorical variable accumulator

use indexmap::IndexMap;
use serde_json::Value;

use octofhir_summary_types::{Coding, ComponentValue, SummaryComponent};
use octofhir_summary_types::terms;

use super::{MismatchTally, literal_value, matching_code, missing};

/// Counts observations of a closed coded value set.
///
/// Seeding the value set up front (from a value-set expansion) registers
/// every possible category at zero, so codes that are never observed still
/// appear in the output. Without seeding the accumulator runs in
/// non-exhaustive mode: codings are registered as they are first observed and
/// no zero-filled set can be reported.
#[derive(Debug, Clone, Default)]
pub struct CategoricalAccumulator {
    /// code → registered coding; registration is the only place keys enter
    valid: IndexMap<String, Coding>,
    /// code → observed count, zero-initialized at registration
    counts: IndexMap<String, u64>,
    mismatched: MismatchTally,
    observed: u64,
    exhaustive: bool,
}

impl CategoricalAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the closed value set ahead of ingestion, every code at zero
    pub fn seed_categories(&mut self, codes: Vec<Coding>) {
        for coding in codes {
            self.counts.entry(coding.code.clone()).or_insert(0);
            self.valid.insert(coding.code.clone(), coding);
        }
        self.exhaustive = true;
    }

    /// Whether the value set was seeded from an expansion
    pub fn is_exhaustive(&self) -> bool {
        self.exhaustive
    }

    pub fn observe(&mut self, component: &Value) {
        self.observed += 1;

        if let Some(text) = component.get("valueString").and_then(Value::as_str) {
            self.mismatched.note(text);
            return;
        }

        let Some(concept) = component.get("valueCodeableConcept") else {
            self.mismatched.note(literal_value(component));
            return;
        };

        if let Some(code) = matching_code(concept, &self.valid) {
            let code = code.to_string();
            *self.counts.get_mut(&code).expect("registered code") += 1;
            return;
        }

        // Unseeded accumulators learn their categories from the data itself
        if !self.exhaustive {
            if let Some(coding) = first_coding(concept) {
                let code = coding.code.clone();
                self.valid.insert(code.clone(), coding);
                *self.counts.entry(code).or_insert(0) += 1;
                return;
            }
        }

        match concept.get("text").and_then(Value::as_str) {
            Some(text) => self.mismatched.note(text),
            None => self.mismatched.note(literal_value(component)),
        }
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// One component per registered code (sorted, zeros included), the
    /// mismatched breakdown, total observed and missing
    pub fn finalize(&self, expected_n: u64) -> Vec<SummaryComponent> {
        let mut components = Vec::new();

        for code in self.sorted_codes() {
            components.push(SummaryComponent::new(
                self.valid[code].to_concept(),
                ComponentValue::integer(self.counts[code] as i64),
            ));
        }
        components.extend(self.mismatched.components());
        components.push(SummaryComponent::new(
            terms::COUNT.to_concept(),
            ComponentValue::integer(self.observed as i64),
        ));
        components.push(SummaryComponent::new(
            terms::MISSING.to_concept(),
            ComponentValue::integer(missing(expected_n, self.observed)),
        ));
        components
    }

    pub fn text_summary(&self, expected_n: u64) -> String {
        let mut lines = String::new();
        for code in self.sorted_codes() {
            lines.push_str(&format!("      {code}: {}\n", self.counts[code]));
        }
        lines.push_str(&self.mismatched.text_block());
        lines.push_str(&format!(
            "      missing: {}\n",
            missing(expected_n, self.observed)
        ));
        lines
    }

    fn sorted_codes(&self) -> Vec<&String> {
        let mut codes: Vec<&String> = self.counts.keys().collect();
        codes.sort();
        codes
    }
}

fn first_coding(concept: &Value) -> Option<Coding> {
    concept
        .get("coding")?
        .as_array()?
        .iter()
        .find_map(Coding::from_resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const SYSTEM: &str = "https://example.org/CS/study-x/dataset/demo";

    fn seeded() -> CategoricalAccumulator {
        let mut acc = CategoricalAccumulator::new();
        acc.seed_categories(vec![
            Coding::new("A", "Alpha", SYSTEM),
            Coding::new("B", "Beta", SYSTEM),
        ]);
        acc
    }

    fn coded(code: &str) -> Value {
        json!({"valueCodeableConcept": {"coding": [{"system": SYSTEM, "code": code}]}})
    }

    #[test]
    fn counts_valid_codes_and_accounts_for_missing() {
        let mut acc = seeded();
        acc.observe(&coded("A"));
        acc.observe(&coded("A"));
        acc.observe(&coded("B"));

        let components = acc.finalize(5);
        // A, B, COUNT, MISSING
        assert_eq!(components.len(), 4);
        assert_eq!(components[0].code.primary().unwrap().code, "A");
        assert_eq!(components[0].value.as_integer(), Some(2));
        assert_eq!(components[1].code.primary().unwrap().code, "B");
        assert_eq!(components[1].value.as_integer(), Some(1));
        assert_eq!(components[2].value.as_integer(), Some(3));
        assert_eq!(components[3].value.as_integer(), Some(2));
    }

    #[test]
    fn unobserved_categories_are_reported_at_zero() {
        let acc = seeded();
        let components = acc.finalize(0);
        assert_eq!(components[0].value.as_integer(), Some(0));
        assert_eq!(components[1].value.as_integer(), Some(0));
    }

    #[test]
    fn same_code_under_other_system_is_mismatched() {
        let mut acc = seeded();
        acc.observe(&json!({
            "valueCodeableConcept": {
                "coding": [{"system": "https://elsewhere.org", "code": "A"}],
                "text": "alpha-ish"
            }
        }));

        let components = acc.finalize(1);
        // A:0, B:0, mismatched text, COUNT, MISSING
        assert_eq!(components.len(), 5);
        assert_eq!(components[2].code.text.as_deref(), Some("alpha-ish"));
        assert_eq!(components[2].value.as_integer(), Some(1));
    }

    #[test]
    fn free_text_and_unknown_shapes_are_tallied_not_rejected() {
        let mut acc = seeded();
        acc.observe(&json!({"valueString": "not applicable"}));
        acc.observe(&json!({"valueBoolean": true}));

        assert_eq!(acc.observed(), 2);
        let components = acc.finalize(2);
        let texts: Vec<_> = components
            .iter()
            .filter_map(|c| c.code.text.as_deref())
            .collect();
        assert!(texts.contains(&"not applicable"));
        assert!(texts.contains(&r#"{"valueBoolean":true}"#));
    }

    #[test]
    fn accounting_invariant_holds() {
        let mut acc = seeded();
        for fragment in [
            coded("A"),
            coded("B"),
            coded("nope"),
            json!({"valueString": "free"}),
        ] {
            acc.observe(&fragment);
        }

        let n = 7u64;
        let components = acc.finalize(n);
        let categories: i64 = components[..2]
            .iter()
            .map(|c| c.value.as_integer().unwrap())
            .sum();
        let mismatched: i64 = components[2..components.len() - 2]
            .iter()
            .map(|c| c.value.as_integer().unwrap())
            .sum();
        let missing = components.last().unwrap().value.as_integer().unwrap();
        assert_eq!(categories + mismatched + missing, n as i64);
    }

    #[test]
    fn unseeded_accumulator_learns_categories_from_data() {
        let mut acc = CategoricalAccumulator::new();
        assert!(!acc.is_exhaustive());

        acc.observe(&coded("X"));
        acc.observe(&coded("X"));

        let components = acc.finalize(2);
        assert_eq!(components[0].code.primary().unwrap().code, "X");
        assert_eq!(components[0].value.as_integer(), Some(2));
        assert_eq!(components.last().unwrap().value.as_integer(), Some(0));
    }

    #[test]
    fn negative_missing_is_preserved() {
        let mut acc = seeded();
        acc.observe(&coded("A"));
        acc.observe(&coded("A"));
        let components = acc.finalize(1);
        assert_eq!(components.last().unwrap().value.as_integer(), Some(-1));
    }
}
