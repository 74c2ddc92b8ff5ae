//! Engine error taxonomy
//!
//! Only conditions that abort a processing path live here. Mismatched values
//! and unroutable records are recovered locally: the former are tallied into
//! accumulator state, the latter skipped with a diagnostic.

use thiserror::Error;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that abort a processing path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Every candidate coding belonged to the excluded internal-dictionary
    /// system; a schema defect, surfaced rather than skipped
    #[error("No valid code found among {candidates} candidate codings")]
    NoValidCode { candidates: usize },

    /// A variable declares a permitted data kind the engine does not know
    #[error("Variable '{variable}' declares no recognized data kind: {declared}")]
    UnrecognizedVariableKind { variable: String, declared: String },

    /// A resource is missing an element construction cannot proceed without
    #[error("{resource} is missing required element '{element}'")]
    MalformedResource { resource: String, element: String },
}

impl EngineError {
    pub fn no_valid_code(candidates: usize) -> Self {
        Self::NoValidCode { candidates }
    }

    pub fn unrecognized_kind(variable: impl Into<String>, declared: impl Into<String>) -> Self {
        Self::UnrecognizedVariableKind {
            variable: variable.into(),
            declared: declared.into(),
        }
    }

    pub fn malformed(resource: impl Into<String>, element: impl Into<String>) -> Self {
        Self::MalformedResource {
            resource: resource.into(),
            element: element.into(),
        }
    }
}
