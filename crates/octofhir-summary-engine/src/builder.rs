//! Summary record assembly
//!
//! The builder is a read-only projection of finalized domain state: it never
//! mutates accumulators, and building the same domain twice yields identical
//! records. Each record combines immutable inputs with two per-record
//! overrides (identifier value, subject reference); there is no shared
//! mutable template.

use octofhir_summary_model::{ConfigError, RunContext};
use octofhir_summary_types::terms;
use octofhir_summary_types::{
    CodeableConcept, Coding, ComponentValue, Identifier, Reference, SummaryComponent,
    SummaryRecord,
};

use crate::domain::{Conditions, Demographics, DomainSummary, SUBDOMAINS, SourceTable};
use crate::population::Population;

/// Builds one summary record per variable key, in ascending key order
#[derive(Debug, Clone)]
pub struct SummaryRecordBuilder {
    tag: Coding,
}

impl SummaryRecordBuilder {
    /// The builder needs the run's meta tag; an unset tag is a configuration
    /// error caught here, before any record is produced
    pub fn new(context: &RunContext) -> Result<Self, ConfigError> {
        Ok(Self {
            tag: context.meta_tag()?.clone(),
        })
    }

    /// Project one finished domain into its summary records for a population
    pub fn build(&self, domain: &DomainSummary, population: &Population) -> Vec<SummaryRecord> {
        match domain {
            DomainSummary::Demographics(demographics) => {
                self.build_demographics(demographics, population)
            }
            DomainSummary::Conditions(conditions) => self.build_conditions(conditions, population),
            DomainSummary::SourceTable(table) => self.build_source_table(table, population),
        }
    }

    fn record(
        &self,
        identifier: Identifier,
        population: &Population,
        value: CodeableConcept,
        component: Vec<SummaryComponent>,
    ) -> SummaryRecord {
        SummaryRecord::new(
            self.tag.clone(),
            identifier,
            terms::variable_summary_concept(),
            Reference::new(format!("Group/{}", population.id)),
            value,
            component,
        )
    }

    fn build_demographics(
        &self,
        domain: &Demographics,
        population: &Population,
    ) -> Vec<SummaryRecord> {
        let system = domain
            .identifier_system()
            .map(str::to_string)
            .unwrap_or_else(|| fallback_identifier_system(population));

        let mut names = SUBDOMAINS.to_vec();
        names.sort_unstable();

        let mut records = Vec::new();
        for name in names {
            let tally = domain.subdomain(name).expect("known subdomain");
            let coding = Demographics::subdomain_coding(name).expect("known subdomain");

            let mut component = Vec::new();
            for (value, concept, count) in tally.sorted() {
                component.push(SummaryComponent::new(
                    concept.clone().with_text(value),
                    ComponentValue::integer(count as i64),
                ));
            }
            component.push(SummaryComponent::new(
                terms::MISSING.to_concept(),
                ComponentValue::integer(domain.ingested() as i64 - tally.total() as i64),
            ));

            records.push(self.record(
                Identifier::new(system.clone(), format!("{}.{name}", population.id)),
                population,
                coding.to_concept().with_text(name),
                component,
            ));
        }
        records
    }

    fn build_conditions(&self, domain: &Conditions, population: &Population) -> Vec<SummaryRecord> {
        let system = domain
            .identifier_system()
            .map(str::to_string)
            .unwrap_or_else(|| fallback_identifier_system(population));

        let mut entries: Vec<_> = domain.entries().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        entries
            .into_iter()
            .map(|(code, tally)| {
                self.record(
                    Identifier::new(system.clone(), format!("{}.{code}", population.id)),
                    population,
                    tally.concept.clone(),
                    vec![SummaryComponent::new(
                        terms::COUNT.to_concept(),
                        ComponentValue::integer(tally.confirmed() as i64),
                    )],
                )
            })
            .collect()
    }

    fn build_source_table(&self, table: &SourceTable, population: &Population) -> Vec<SummaryRecord> {
        let mut variables: Vec<_> = table.variables().collect();
        variables.sort_by(|(a, _), (b, _)| a.cmp(b));

        variables
            .into_iter()
            .map(|(key, variable)| {
                let definition = &variable.definition;
                self.record(
                    Identifier::new(
                        definition.identifier.system.clone(),
                        format!("{}.{}", population.id, definition.identifier.value),
                    ),
                    population,
                    definition.concept.clone().with_text(key),
                    variable.accumulator.finalize(table.ingested()),
                )
            })
            .collect()
    }
}

/// Populations whose domains never saw an identifier still need a summary
/// namespace; derive one from the population's own identifier
fn fallback_identifier_system(population: &Population) -> String {
    format!("{}/summary", population.identifier.system)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn population() -> Population {
        Population::from_resource(&json!({
            "resourceType": "Group",
            "id": "pop1",
            "meta": {"tag": [{"system": "https://example.org/study-tags", "code": "SD001"}]},
            "identifier": [{
                "use": "official",
                "system": "https://example.org/study-x/group",
                "value": "SD001-C1"
            }],
            "quantity": 2,
            "member": [{"entity": {"reference": "Patient/p1"}}]
        }))
        .unwrap()
    }

    fn builder() -> SummaryRecordBuilder {
        let context =
            RunContext::new().with_meta_tag("https://example.org/study-tags", "SD001");
        SummaryRecordBuilder::new(&context).unwrap()
    }

    fn demographics_domain() -> DomainSummary {
        let mut domain = Demographics::new();
        domain.ingest(&json!({
            "resourceType": "Patient",
            "id": "p1",
            "identifier": [{"system": "https://example.org/study-x/patient", "value": "p1"}],
            "gender": "female"
        }));
        DomainSummary::Demographics(domain)
    }

    #[test]
    fn builder_requires_a_meta_tag() {
        assert!(SummaryRecordBuilder::new(&RunContext::new()).is_err());
    }

    #[test]
    fn demographics_records_are_sorted_and_population_scoped() {
        let records = builder().build(&demographics_domain(), &population());

        let values: Vec<&str> = records
            .iter()
            .map(|record| record.identifier[0].value.as_str())
            .collect();
        assert_eq!(values, vec!["pop1.ethnicity", "pop1.gender", "pop1.race"]);

        for record in &records {
            assert_eq!(record.subject.reference, "Group/pop1");
            assert_eq!(record.meta.tag[0].code, "SD001");
            assert_eq!(record.status, "final");
            assert_eq!(
                record.identifier[0].system,
                "https://example.org/study-x/patient/summary"
            );
        }

        // gender: one observed female + missing
        let gender = &records[1];
        assert_eq!(gender.value_codeable_concept.text.as_deref(), Some("gender"));
        assert_eq!(gender.component.len(), 2);
        assert_eq!(gender.component[0].code.text.as_deref(), Some("female"));
        assert_eq!(gender.component[0].value.as_integer(), Some(1));
        assert_eq!(gender.component[1].value.as_integer(), Some(0));
    }

    #[test]
    fn building_twice_yields_identical_output() {
        let domain = demographics_domain();
        let population = population();
        let builder = builder();

        let first = builder.build(&domain, &population);
        let second = builder.build(&domain, &population);
        assert_eq!(first, second);
    }

    #[test]
    fn conditions_records_count_confirmed_only() {
        let mut conditions = Conditions::new();
        for status in ["confirmed", "confirmed", "provisional"] {
            conditions
                .ingest(&json!({
                    "resourceType": "Condition",
                    "identifier": [{"system": "https://example.org/study-x/condition", "value": "c"}],
                    "verificationStatus": {"coding": [{"system": "vs", "code": status}]},
                    "code": {"coding": [{"system": "https://hpo.jax.org", "code": "HP:0001250", "display": "Seizure"}]}
                }))
                .unwrap();
        }

        let records = builder().build(&DomainSummary::Conditions(conditions), &population());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier[0].value, "pop1.HP:0001250");
        assert_eq!(records[0].component[0].value.as_integer(), Some(2));
        assert_eq!(
            records[0].value_codeable_concept.primary().unwrap().display(),
            "Seizure"
        );
    }

    #[test]
    fn identifier_falls_back_to_population_namespace() {
        // a domain that never saw a resource identifier
        let records = builder().build(
            &DomainSummary::Conditions({
                let mut conditions = Conditions::new();
                conditions
                    .ingest(&json!({
                        "resourceType": "Condition",
                        "code": {"coding": [{"system": "https://hpo.jax.org", "code": "HP:0000001"}]}
                    }))
                    .unwrap();
                conditions
            }),
            &population(),
        );
        assert_eq!(
            records[0].identifier[0].system,
            "https://example.org/study-x/group/summary"
        );
    }
}
