//! Per-run configuration context
//!
//! One `RunContext` is constructed per summarization run and passed down to
//! every component that needs a provider or the run-wide output settings.
//! Accessors for required fields fail with a configuration error instead of
//! exposing partially-configured state.

use std::fmt;
use std::sync::Arc;

use octofhir_summary_types::Coding;
use thiserror::Error;

use crate::provider::{QueryClient, SummaryStore, TerminologyClient};

/// Which configured client a component asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRole {
    Input,
    Output,
    Terminology,
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientRole::Input => write!(f, "input"),
            ClientRole::Output => write!(f, "output"),
            ClientRole::Terminology => write!(f, "terminology"),
        }
    }
}

/// Configuration errors; all of these abort the run
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("The {role} FHIR client is not configured, unable to proceed")]
    InvalidClientConfiguration { role: ClientRole },

    #[error("A study meta tag (system and code) must be configured before building summaries")]
    MissingMetaTag,
}

/// Run-wide configuration: providers plus output tagging.
///
/// Built once per run with the `with_*` methods; components read required
/// fields through the failing accessors.
#[derive(Default, Clone)]
pub struct RunContext {
    input: Option<Arc<dyn QueryClient>>,
    terminology: Option<Arc<dyn TerminologyClient>>,
    output: Option<Arc<dyn SummaryStore>>,
    meta_tag: Option<Coding>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source server client
    pub fn with_input(mut self, client: Arc<dyn QueryClient>) -> Self {
        self.input = Some(client);
        self
    }

    /// Set the terminology client used for value set expansion
    pub fn with_terminology(mut self, client: Arc<dyn TerminologyClient>) -> Self {
        self.terminology = Some(client);
        self
    }

    /// Set the destination store for finished records
    pub fn with_output(mut self, store: Arc<dyn SummaryStore>) -> Self {
        self.output = Some(store);
        self
    }

    /// Set the meta tag applied to every emitted record. The tag is
    /// discovered from the study resource, so it is attached after the
    /// context is first built.
    pub fn with_meta_tag(mut self, system: impl Into<String>, code: impl Into<String>) -> Self {
        self.meta_tag = Some(Coding {
            system: system.into(),
            code: code.into(),
            display: None,
            version: None,
        });
        self
    }

    pub fn input(&self) -> Result<&Arc<dyn QueryClient>, ConfigError> {
        self.input
            .as_ref()
            .ok_or(ConfigError::InvalidClientConfiguration {
                role: ClientRole::Input,
            })
    }

    pub fn terminology(&self) -> Result<&Arc<dyn TerminologyClient>, ConfigError> {
        self.terminology
            .as_ref()
            .ok_or(ConfigError::InvalidClientConfiguration {
                role: ClientRole::Terminology,
            })
    }

    pub fn output(&self) -> Result<&Arc<dyn SummaryStore>, ConfigError> {
        self.output
            .as_ref()
            .ok_or(ConfigError::InvalidClientConfiguration {
                role: ClientRole::Output,
            })
    }

    /// The meta tag applied to every emitted record
    pub fn meta_tag(&self) -> Result<&Coding, ConfigError> {
        self.meta_tag.as_ref().ok_or(ConfigError::MissingMetaTag)
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("input", &self.input.is_some())
            .field("terminology", &self.terminology.is_some())
            .field("output", &self.output.is_some())
            .field("meta_tag", &self.meta_tag)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MemoryStore, NoOpQueryClient};

    #[test]
    fn unconfigured_clients_fail_with_role() {
        let ctx = RunContext::new();

        let err = ctx.input().err().unwrap();
        assert!(err.to_string().contains("input"));

        let err = ctx.output().err().unwrap();
        assert!(err.to_string().contains("output"));

        assert!(ctx.meta_tag().is_err());
    }

    #[test]
    fn configured_context_hands_out_clients() {
        let ctx = RunContext::new()
            .with_input(Arc::new(NoOpQueryClient))
            .with_output(Arc::new(MemoryStore::new()))
            .with_meta_tag("https://example.org/study-tags", "SD001");

        assert!(ctx.input().is_ok());
        assert!(ctx.output().is_ok());

        let tag = ctx.meta_tag().unwrap();
        assert_eq!(tag.code, "SD001");
        assert_eq!(tag.system, "https://example.org/study-tags");
    }
}
