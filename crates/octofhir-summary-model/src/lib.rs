//! Provider traits and run context for the summary engine
//!
//! The aggregation engine itself is synchronous and pure; everything that
//! touches a FHIR server is reached through the async provider traits defined
//! here. The `RunContext` carries the configured providers and run-wide
//! settings down to every component that needs them.

pub mod context;
pub mod provider;
pub mod providers;

pub use context::{ClientRole, ConfigError, RunContext};
pub use provider::{ClientError, QueryClient, QueryOutcome, SummaryStore, TerminologyClient};
pub use providers::{
    MemoryStore, NoOpQueryClient, NoOpTerminologyClient, StaticQueryClient, StaticTerminologyClient,
};
