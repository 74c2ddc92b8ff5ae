//! Study orchestration
//!
//! A study is a ResearchStudy resource whose enrollment references name the
//! populations to summarize. Each selected domain runs one fetch-then-ingest
//! pass per population; record building only happens after every domain has
//! finished (strict ingest-then-finalize barrier).

use anyhow::{Context, bail};
use serde_json::Value;
use tracing::{info, warn};

use octofhir_summary_engine::domain::DomainSummary;
use octofhir_summary_engine::{
    Conditions, Demographics, Population, SourceTable, SummaryRecordBuilder,
};
use octofhir_summary_model::RunContext;
use octofhir_summary_types::SummaryRecord;

/// Which domains a run summarizes. When no flag is given, all of them.
#[derive(Debug, Clone, Copy)]
pub struct DomainSelection {
    pub demographics: bool,
    pub conditions: bool,
    pub source: bool,
}

impl DomainSelection {
    pub fn from_flags(patient: bool, condition: bool, source: bool) -> Self {
        let any = patient || condition || source;
        Self {
            demographics: !any || patient,
            conditions: !any || condition,
            source: !any || source,
        }
    }
}

/// All summarization state of one study
pub struct StudySummary {
    pub id: String,
    pub tag: String,
    pub title: String,
    pub populations: Vec<Population>,
    context: RunContext,
}

impl StudySummary {
    /// Build a study from its ResearchStudy resource and fetch its
    /// enrollment populations. The study's meta tag becomes the run tag on
    /// every emitted record.
    pub async fn load(context: &RunContext, resource: &Value) -> anyhow::Result<Self> {
        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .context("ResearchStudy without id")?
            .to_string();
        let title = resource
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let meta_tag = resource
            .get("meta")
            .and_then(|meta| meta.get("tag"))
            .and_then(Value::as_array)
            .and_then(|tags| tags.first())
            .context("ResearchStudy without meta tag")?;
        let tag_system = meta_tag
            .get("system")
            .and_then(Value::as_str)
            .context("study meta tag without system")?;
        let tag_code = meta_tag
            .get("code")
            .and_then(Value::as_str)
            .context("study meta tag without code")?;

        let context = context.clone().with_meta_tag(tag_system, tag_code);

        let mut populations = Vec::new();
        let enrollment = resource
            .get("enrollment")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for group in enrollment {
            let Some(reference) = group.get("reference").and_then(Value::as_str) else {
                continue;
            };
            let outcome = context.input()?.query(reference).await?;
            match outcome.resources().first() {
                Some(group) => populations.push(Population::from_resource(group)?),
                None => warn!(reference, "enrollment group unavailable"),
            }
        }

        info!(study = %id, populations = populations.len(), "study loaded");
        Ok(Self {
            id,
            tag: tag_code.to_string(),
            title,
            populations,
            context,
        })
    }

    /// Run every selected domain over every population
    pub async fn summarize(&mut self, selection: DomainSelection) -> anyhow::Result<()> {
        let context = self.context.clone();
        for population in &mut self.populations {
            if selection.demographics {
                summarize_demographics(&context, population).await?;
            }
            if selection.conditions {
                summarize_conditions(&context, population).await?;
            }
            if selection.source {
                summarize_source(&context, population).await?;
            }
        }
        Ok(())
    }

    /// Project every finished domain into summary records
    pub fn build_records(&self) -> anyhow::Result<Vec<SummaryRecord>> {
        let builder = SummaryRecordBuilder::new(&self.context)?;
        let mut records = Vec::new();
        for population in &self.populations {
            let mut local = Vec::new();
            for summary in population.summaries.values() {
                local.extend(builder.build(summary, population));
            }
            info!(population = %population.tag, count = local.len(), "summaries built");
            records.extend(local);
        }
        Ok(records)
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }
}

/// Fetch every study carrying the tag
pub async fn load_studies(context: &RunContext, tag: &str) -> anyhow::Result<Vec<StudySummary>> {
    let outcome = context
        .input()?
        .query(&format!("ResearchStudy?_tag={tag}"))
        .await?;

    let mut studies = Vec::new();
    for resource in outcome.resources() {
        studies.push(StudySummary::load(context, &resource).await?);
    }
    if studies.is_empty() {
        warn!(tag, "no studies found for tag");
    }
    Ok(studies)
}

async fn summarize_demographics(
    context: &RunContext,
    population: &mut Population,
) -> anyhow::Result<()> {
    let outcome = context
        .input()?
        .query(&format!("Patient?_tag={}", population.tag))
        .await?;

    let mut domain = Demographics::new();
    for resource in outcome.resources() {
        let Some(id) = resource.get("id").and_then(Value::as_str) else {
            continue;
        };
        if population.is_member(&format!("Patient/{id}")) {
            domain.ingest(&resource);
        }
    }

    population.add_summary("Demographics", DomainSummary::Demographics(domain));
    Ok(())
}

async fn summarize_conditions(
    context: &RunContext,
    population: &mut Population,
) -> anyhow::Result<()> {
    let outcome = context
        .input()?
        .query(&format!("Condition?_tag={}", population.tag))
        .await?;

    let mut domain = Conditions::new();
    for resource in outcome.resources() {
        let Some(subject) = resource
            .get("subject")
            .and_then(|subject| subject.get("reference"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        if population.is_member(subject) {
            domain.ingest(&resource)?;
        }
    }

    population.add_summary("Conditions", DomainSummary::Conditions(domain));
    Ok(())
}

async fn summarize_source(
    context: &RunContext,
    population: &mut Population,
) -> anyhow::Result<()> {
    let input = context.input()?;
    let activity_defs = input
        .query(&format!("ActivityDefinition?_tag={}", population.tag))
        .await?
        .resources();
    let observation_defs = input
        .query(&format!("ObservationDefinition?_tag={}", population.tag))
        .await?
        .resources();

    if activity_defs.is_empty() || observation_defs.is_empty() {
        bail!(
            "{} activity definitions and {} observation definitions, unable to proceed with summarization",
            activity_defs.len(),
            observation_defs.len()
        );
    }

    for activity_def in &activity_defs {
        let mut table = SourceTable::from_definitions(activity_def, &observation_defs)?;

        for (key, reference) in table.categorical_value_sets() {
            match context.terminology()?.expand(&reference).await {
                Ok(codes) => table.seed_categories(&key, codes),
                Err(err) => warn!(
                    key,
                    reference,
                    %err,
                    "value set expansion unavailable, reporting observed values only"
                ),
            }
        }

        let outcome = input.query(&table.source_query()).await?;
        for resource in outcome.resources() {
            table.ingest(&resource);
        }

        population.add_summary(
            table.table_name().to_string(),
            DomainSummary::SourceTable(table),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_summary_model::{MemoryStore, StaticQueryClient, StaticTerminologyClient};
    use octofhir_summary_types::Coding;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    const TAG_SYSTEM: &str = "https://example.org/study-tags";
    const DICT: &str = "https://example.org/CS/study-x/data-dictionary/enroll";
    const DATASET: &str = "https://example.org/CodeSystem/study-x/dataset";

    fn study_resource() -> Value {
        json!({
            "resourceType": "ResearchStudy",
            "id": "study-x",
            "title": "Study X",
            "meta": {"tag": [{"system": TAG_SYSTEM, "code": "SD001"}]},
            "enrollment": [{"reference": "Group/sd001-c1"}]
        })
    }

    fn group_resource() -> Value {
        json!({
            "resourceType": "Group",
            "id": "sd001-c1",
            "meta": {"tag": [{"system": TAG_SYSTEM, "code": "SD001"}]},
            "identifier": [{"use": "official", "system": "https://example.org/study-x/group", "value": "SD001-C1"}],
            "quantity": 2,
            "member": [
                {"entity": {"reference": "Patient/p1"}},
                {"entity": {"reference": "Patient/p2"}}
            ]
        })
    }

    fn patients() -> Vec<Value> {
        vec![
            json!({
                "resourceType": "Patient", "id": "p1",
                "identifier": [{"system": "https://example.org/study-x/patient", "value": "p1"}],
                "gender": "female"
            }),
            json!({
                "resourceType": "Patient", "id": "p2",
                "identifier": [{"system": "https://example.org/study-x/patient", "value": "p2"}],
                "gender": "male"
            }),
            // not a member, must be filtered out
            json!({"resourceType": "Patient", "id": "p9", "gender": "female"}),
        ]
    }

    fn conditions() -> Vec<Value> {
        vec![
            json!({
                "resourceType": "Condition",
                "identifier": [{"system": "https://example.org/study-x/condition", "value": "c1"}],
                "subject": {"reference": "Patient/p1"},
                "code": {"coding": [{"system": "https://hpo.jax.org", "code": "HP:0001250", "display": "Seizure"}]}
            }),
            json!({
                "resourceType": "Condition",
                "subject": {"reference": "Patient/p9"},
                "code": {"coding": [{"system": "https://hpo.jax.org", "code": "HP:0001250"}]}
            }),
        ]
    }

    fn activity_definition() -> Value {
        json!({
            "resourceType": "ActivityDefinition",
            "id": "ad-enroll",
            "meta": {"tag": [{"system": TAG_SYSTEM, "code": "SD001"}]},
            "identifier": [{"use": "official", "system": "https://example.org/study-x/activitydefinition", "value": "enroll"}],
            "observationResultRequirement": [{"reference": "ObservationDefinition/od-status"}]
        })
    }

    fn observation_definition() -> Value {
        json!({
            "resourceType": "ObservationDefinition",
            "id": "od-status",
            "code": {"coding": [{"system": DICT, "code": "status"}]},
            "identifier": [{"system": "https://example.org/study-x/observationdefinition", "value": "enroll.status"}],
            "permittedDataType": ["CodeableConcept"],
            "validCodedValueSet": {"reference": "ValueSet/vs-status"}
        })
    }

    fn source_row(code: &str) -> Value {
        json!({
            "resourceType": "Observation",
            "code": {"coding": [
                {"system": "https://loinc.org", "code": "74468-0"},
                {"system": DATASET, "code": "enroll"}
            ]},
            "component": [{
                "code": {"coding": [{"system": DICT, "code": "status"}]},
                "valueCodeableConcept": {"coding": [{"system": DATASET, "code": code}]}
            }]
        })
    }

    fn test_context() -> RunContext {
        let query = StaticQueryClient::new()
            .with_response("ResearchStudy?_tag=SD001", vec![study_resource()])
            .with_response("Group/sd001-c1", vec![group_resource()])
            .with_response("Patient?_tag=SD001", patients())
            .with_response("Condition?_tag=SD001", conditions())
            .with_response("ActivityDefinition?_tag=SD001", vec![activity_definition()])
            .with_response(
                "ObservationDefinition?_tag=SD001",
                vec![observation_definition()],
            )
            .with_response(
                format!("Observation?_tag={TAG_SYSTEM}|SD001&code=74468-0"),
                vec![source_row("A"), source_row("A"), source_row("B")],
            );
        let terminology = StaticTerminologyClient::new().with_expansion(
            "ValueSet/vs-status",
            vec![
                Coding::new("A", "Active", DATASET),
                Coding::new("B", "Withdrawn", DATASET),
            ],
        );

        RunContext::new()
            .with_input(Arc::new(query))
            .with_terminology(Arc::new(terminology))
            .with_output(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn full_study_run_produces_all_domain_records() {
        let context = test_context();
        let mut studies = load_studies(&context, "SD001").await.unwrap();
        assert_eq!(studies.len(), 1);

        let study = &mut studies[0];
        assert_eq!(study.tag, "SD001");
        assert_eq!(study.populations.len(), 1);

        study
            .summarize(DomainSelection::from_flags(false, false, false))
            .await
            .unwrap();

        let population = &study.populations[0];
        assert_eq!(population.summaries.len(), 3);
        assert_eq!(population.summaries["Demographics"].ingested(), 2);
        assert_eq!(population.summaries["Conditions"].ingested(), 1);
        assert_eq!(population.summaries["enroll"].ingested(), 3);

        let records = study.build_records().unwrap();
        // race, ethnicity, gender + one condition + one table variable
        assert_eq!(records.len(), 5);

        let status = records
            .iter()
            .find(|record| record.value_codeable_concept.text.as_deref() == Some("enroll|status"))
            .unwrap();
        assert_eq!(status.component[0].value.as_integer(), Some(2));
        assert_eq!(status.component[1].value.as_integer(), Some(1));

        let report = population.text_report();
        assert!(report.contains("Demographics: \n"));
        assert!(report.contains("  gender:\n"));
    }

    #[tokio::test]
    async fn selection_flags_limit_the_domains() {
        let context = test_context();
        let mut studies = load_studies(&context, "SD001").await.unwrap();
        let study = &mut studies[0];

        study
            .summarize(DomainSelection::from_flags(true, false, false))
            .await
            .unwrap();

        let population = &study.populations[0];
        assert_eq!(population.summaries.len(), 1);
        assert!(population.summaries.contains_key("Demographics"));
    }

    #[test]
    fn no_flags_means_everything() {
        let all = DomainSelection::from_flags(false, false, false);
        assert!(all.demographics && all.conditions && all.source);

        let only_source = DomainSelection::from_flags(false, false, true);
        assert!(!only_source.demographics && !only_source.conditions && only_source.source);
    }

    #[tokio::test]
    async fn missing_definitions_abort_source_summarization() {
        let query = StaticQueryClient::new()
            .with_response("ResearchStudy?_tag=SD001", vec![study_resource()])
            .with_response("Group/sd001-c1", vec![group_resource()])
            .with_response("ActivityDefinition?_tag=SD001", vec![activity_definition()]);
        let context = RunContext::new()
            .with_input(Arc::new(query))
            .with_output(Arc::new(MemoryStore::new()));

        let mut studies = load_studies(&context, "SD001").await.unwrap();
        let err = studies[0]
            .summarize(DomainSelection::from_flags(false, false, true))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unable to proceed"));
    }
}
