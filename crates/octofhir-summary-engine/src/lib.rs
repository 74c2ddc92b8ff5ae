//! Variable summary aggregation engine
//!
//! Computes descriptive statistics over the clinical resources of one research
//! population and assembles them into immutable, Observation-shaped summary
//! records. The engine runs strictly sequentially: one linear pass ingests all
//! records for a domain, then the record builder projects the finalized state.
//!
//! Layout:
//! - `resolver`: canonical code selection and canonical variable keys
//! - `accumulator`: the three per-variable accumulators and their factory
//! - `domain`: the Demographics, Conditions and SourceTable aggregation domains
//! - `population`: the Group-backed population a run summarizes
//! - `builder`: projection of finalized domain state into summary records

pub mod accumulator;
pub mod builder;
pub mod domain;
pub mod error;
pub mod population;
pub mod resolver;
pub mod variable;

pub use accumulator::Accumulator;
pub use builder::SummaryRecordBuilder;
pub use domain::{Conditions, Demographics, DomainSummary, SourceTable};
pub use error::{EngineError, EngineResult};
pub use population::Population;
pub use variable::{VariableDefinition, VariableKind};
