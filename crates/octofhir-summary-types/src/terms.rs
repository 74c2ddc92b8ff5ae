//! Well-known codings used in summary output
//!
//! Statistic concepts come from NCIT (via the UMLS browser URI); the
//! demographic variable codes are LOINC.

use std::sync::LazyLock;

use crate::coding::{CodeableConcept, Coding};

/// NCI Thesaurus, addressed through the UMLS browser
pub const NCIT: &str = "https://uts.nlm.nih.gov/uts/umls";
/// LOINC
pub const LOINC: &str = "https://loinc.org";
/// UCUM, the unit system quantitative variables declare their units in
pub const UCUM: &str = "https://unitsofmeasure.org";

/// Count of observed values
pub static COUNT: LazyLock<Coding> = LazyLock::new(|| Coding::new("C0750480", "Count", NCIT));
/// Arithmetic mean of observed values
pub static MEAN: LazyLock<Coding> =
    LazyLock::new(|| Coding::new("C0444504", "Statistical Mean", NCIT));
/// Number of expected values never observed
pub static MISSING: LazyLock<Coding> =
    LazyLock::new(|| Coding::new("C142610", "Missing Data", NCIT));
/// The kind of every summary record
pub static SUMMARY_REPORT: LazyLock<Coding> =
    LazyLock::new(|| Coding::new("C0242482", "Summary Report", NCIT));

/// Race, OMB category
pub static RACE: LazyLock<Coding> = LazyLock::new(|| Coding::new("32624-9", "Race", LOINC));
/// Ethnicity, OMB 1997
pub static ETHNICITY: LazyLock<Coding> =
    LazyLock::new(|| Coding::new("69490-1", "Ethnicity OMB.1997", LOINC));
/// Sex
pub static SEX: LazyLock<Coding> = LazyLock::new(|| Coding::new("46098-0", "sex", LOINC));

/// US Core race extension URL
pub const US_CORE_RACE: &str = "http://hl7.org/fhir/us/core/StructureDefinition/us-core-race";
/// US Core ethnicity extension URL
pub const US_CORE_ETHNICITY: &str =
    "http://hl7.org/fhir/us/core/StructureDefinition/us-core-ethnicity";
/// System for codings synthesized from the Patient.gender field
pub const ADMINISTRATIVE_GENDER: &str = "http://hl7.org/fhir/administrative-gender";

/// The `code` element shared by every variable summary record
pub fn variable_summary_concept() -> CodeableConcept {
    SUMMARY_REPORT
        .to_concept()
        .with_text("Variable Summary Report")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistic_codings_are_ncit() {
        assert_eq!(COUNT.system, NCIT);
        assert_eq!(MEAN.system, NCIT);
        assert_eq!(MISSING.system, NCIT);
        assert_eq!(UCUM, "https://unitsofmeasure.org");
    }

    #[test]
    fn summary_concept_carries_text() {
        let concept = variable_summary_concept();
        assert_eq!(concept.text.as_deref(), Some("Variable Summary Report"));
        assert_eq!(concept.primary().unwrap().code, "C0242482");
    }
}
