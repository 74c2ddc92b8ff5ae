//! Source table aggregation
//!
//! One `SourceTable` summarizes the variables of one dataset table. The
//! table's schema arrives as an ActivityDefinition referencing one
//! ObservationDefinition per variable; the data arrives as row Observations
//! whose components each carry one variable's value.

use std::collections::HashSet;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use octofhir_summary_types::{CodeableConcept, Coding, Identifier};

use crate::accumulator::Accumulator;
use crate::error::{EngineError, EngineResult};
use crate::resolver::{canonical_key, official_identifier};
use crate::variable::VariableDefinition;

/// LOINC marker distinguishing source-data row Observations
pub const SOURCE_DATA_CODE: &str = "74468-0";

/// Dataset table code systems look like `.../CodeSystem/<study>/dataset`;
/// the coding under such a system names the table a row belongs to
static DATASET_SYSTEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CodeSystem/[\w\-/]*/dataset").expect("dataset system pattern"));

/// One variable of the table: its definition and its accumulator
#[derive(Debug, Clone)]
pub struct TableVariable {
    pub definition: VariableDefinition,
    pub accumulator: Accumulator,
}

/// Aggregates every variable of one dataset table over its row Observations
#[derive(Debug, Clone)]
pub struct SourceTable {
    table_name: String,
    title: String,
    /// `system|code` search token of the study tag
    meta_tag: String,
    variables: IndexMap<String, TableVariable>,
    ingested: u64,
}

impl SourceTable {
    /// Build the table from its schema: the ActivityDefinition and the pool
    /// of ObservationDefinitions the dataset declares. Definitions not
    /// referenced by this table are ignored.
    pub fn from_definitions(
        activity_def: &Value,
        observation_defs: &[Value],
    ) -> EngineResult<Self> {
        let tag = activity_def
            .get("meta")
            .and_then(|meta| meta.get("tag"))
            .and_then(Value::as_array)
            .and_then(|tags| tags.first())
            .and_then(Coding::from_resource)
            .ok_or_else(|| EngineError::malformed("ActivityDefinition", "meta.tag"))?;

        let identifiers = parse_identifiers(activity_def);
        let table_name = official_identifier(&identifiers)
            .ok_or_else(|| EngineError::malformed("ActivityDefinition", "identifier"))?
            .value
            .clone();

        let title = activity_def
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let required = referenced_definition_ids(activity_def);
        let mut variables = IndexMap::new();
        for resource in observation_defs {
            let id = resource.get("id").and_then(Value::as_str).unwrap_or_default();
            if !required.contains(id) {
                continue;
            }
            let definition = VariableDefinition::from_resource(resource)?;
            let accumulator = Accumulator::for_definition(&definition);
            variables.insert(
                definition.key.clone(),
                TableVariable {
                    definition,
                    accumulator,
                },
            );
        }

        info!(
            table = %table_name,
            loaded = variables.len(),
            declared = required.len(),
            "activity definition loaded"
        );

        Ok(Self {
            table_name,
            title,
            meta_tag: format!("{}|{}", tag.system, tag.code),
            variables,
            ingested: 0,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The search that fetches this table's row Observations
    pub fn source_query(&self) -> String {
        format!(
            "Observation?_tag={}&code={SOURCE_DATA_CODE}",
            self.meta_tag
        )
    }

    /// Value set references of the categorical variables, for seeding
    pub fn categorical_value_sets(&self) -> Vec<(String, String)> {
        self.variables
            .iter()
            .filter_map(|(key, variable)| {
                variable
                    .definition
                    .value_set_ref
                    .as_ref()
                    .map(|reference| (key.clone(), reference.clone()))
            })
            .collect()
    }

    /// Register an expanded value set on the named categorical variable
    pub fn seed_categories(&mut self, key: &str, codes: Vec<Coding>) {
        if let Some(categorical) = self
            .variables
            .get_mut(key)
            .and_then(|variable| variable.accumulator.as_categorical_mut())
        {
            categorical.seed_categories(codes);
        } else {
            debug!(key, "no categorical variable to seed");
        }
    }

    /// Ingest one row Observation. Rows belonging to other tables in the
    /// same dataset are ignored without penalty; components referencing an
    /// unknown variable key are skipped with a diagnostic.
    pub fn ingest(&mut self, resource: &Value) {
        let Some(table) = dataset_table_code(resource) else {
            debug!(table = %self.table_name, "row carries no dataset table coding, skipped");
            return;
        };
        if table != self.table_name {
            return;
        }
        self.ingested += 1;

        let components = resource
            .get("component")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for component in components {
            let key = component
                .get("code")
                .and_then(CodeableConcept::from_resource)
                .as_ref()
                .and_then(canonical_key);
            let Some(key) = key else {
                warn!(table = %self.table_name, "component without a coded key, skipped");
                continue;
            };

            match self.variables.get_mut(&key) {
                Some(variable) => variable.accumulator.observe(component),
                // A dataset with several tables shares one dictionary; rows
                // may legitimately carry keys this table never declared.
                None => warn!(table = %self.table_name, key, "unknown variable key, skipped"),
            }
        }
    }

    pub fn ingested(&self) -> u64 {
        self.ingested
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &TableVariable)> {
        self.variables.iter()
    }

    pub fn text_summary(&self) -> String {
        let mut result = format!("  {}:\n", self.table_name);
        let mut keys: Vec<&String> = self.variables.keys().collect();
        keys.sort();
        for key in keys {
            result.push_str(&format!("    {key}:\n"));
            result.push_str(&self.variables[key].accumulator.text_summary(self.ingested));
        }
        result
    }
}

fn parse_identifiers(resource: &Value) -> Vec<Identifier> {
    resource
        .get("identifier")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Identifier::from_resource).collect())
        .unwrap_or_default()
}

fn referenced_definition_ids(activity_def: &Value) -> HashSet<String> {
    activity_def
        .get("observationResultRequirement")
        .and_then(Value::as_array)
        .map(|requirements| {
            requirements
                .iter()
                .filter_map(|requirement| requirement.get("reference"))
                .filter_map(Value::as_str)
                .filter_map(|reference| reference.rsplit('/').next())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// The table a row Observation belongs to: the code of the coding whose
/// system matches the dataset code-system pattern
fn dataset_table_code(resource: &Value) -> Option<String> {
    let codings = resource.get("code")?.get("coding")?.as_array()?;
    codings
        .iter()
        .find(|coding| {
            coding
                .get("system")
                .and_then(Value::as_str)
                .is_some_and(|system| DATASET_SYSTEM.is_match(system))
        })
        .and_then(|coding| coding.get("code"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
