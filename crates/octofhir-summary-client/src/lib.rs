//! FHIR REST client and store loader
//!
//! `RestClient` implements the three provider traits against a FHIR REST
//! endpoint; `StoreLoader` publishes finished records with the retry policy
//! the engine itself deliberately does not carry.

pub mod loader;
pub mod rest;

pub use loader::{LoadReport, StoreLoader};
pub use rest::RestClient;
