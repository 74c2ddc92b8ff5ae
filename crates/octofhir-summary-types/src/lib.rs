//! FHIR data model for study summary generation
//!
//! This crate defines the small slice of the FHIR data model the summary
//! engine works with:
//! - Coded concepts (`Coding`, `CodeableConcept`) and identifiers
//! - The Observation-shaped `SummaryRecord` output model
//! - Well-known statistic codings (`terms`)

pub mod coding;
pub mod record;
pub mod terms;

pub use coding::{CodeableConcept, Coding, Identifier, Meta, Reference};
pub use record::{ComponentValue, QuantityValue, SummaryComponent, SummaryRecord};
