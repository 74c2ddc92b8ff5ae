//! Aggregation domains
//!
//! Three domains share one orchestration pattern: a deterministic loop over
//! the population's resources, routing each record (or record component) to
//! the matching accumulator by canonical key. Records referencing unknown
//! variable keys are skipped with a diagnostic, never fatally. Each domain
//! tracks `N` as the number of resources it actually ingested, not the
//! nominal population size.

mod conditions;
mod demographics;
mod source_table;

pub use conditions::{ConditionTally, Conditions};
pub use demographics::{CategoryTally, Demographics, SUBDOMAINS};
pub use source_table::{SOURCE_DATA_CODE, SourceTable, TableVariable};

/// Finalized state of one aggregation domain, ready for record building
#[derive(Debug, Clone)]
pub enum DomainSummary {
    Demographics(Demographics),
    Conditions(Conditions),
    SourceTable(SourceTable),
}

impl DomainSummary {
    /// Section body of the population text report for this domain
    pub fn text_summary(&self) -> String {
        match self {
            Self::Demographics(domain) => domain.text_summary(),
            Self::Conditions(domain) => domain.text_summary(),
            Self::SourceTable(domain) => domain.text_summary(),
        }
    }

    /// Number of resources the domain ingested
    pub fn ingested(&self) -> u64 {
        match self {
            Self::Demographics(domain) => domain.ingested(),
            Self::Conditions(domain) => domain.ingested(),
            Self::SourceTable(domain) => domain.ingested(),
        }
    }
}
