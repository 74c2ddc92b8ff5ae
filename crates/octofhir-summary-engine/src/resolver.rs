//! Canonical code selection
//!
//! Source schemas may attach several codings to one concept, including
//! internal data-dictionary placeholders that must never surface as the
//! canonical code. Resolution here is order-independent: callers cannot
//! guarantee the order codings arrive in.

use std::sync::LazyLock;

use regex::Regex;

use octofhir_summary_types::{CodeableConcept, Coding, Identifier};

use crate::error::{EngineError, EngineResult};

/// Marker for internal data-dictionary coding systems; these are excluded
/// from canonical code selection unless nothing else is available
static DICTIONARY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/data-dictionary/").expect("dictionary marker pattern"));

/// Select the canonical coding among candidates for one concept.
///
/// A single candidate is returned as-is. Otherwise codings from
/// data-dictionary systems are excluded and the lexicographically smallest
/// code among the survivors wins; ties on code break on system so no input
/// permutation can change the result. An empty survivor set is a schema
/// defect and fails with [`EngineError::NoValidCode`].
pub fn resolve_concept_code(candidates: &[Coding]) -> EngineResult<&Coding> {
    if let [only] = candidates {
        return Ok(only);
    }

    candidates
        .iter()
        .filter(|coding| !DICTIONARY_MARKER.is_match(&coding.system))
        .min_by(|a, b| (&a.code, &a.system).cmp(&(&b.code, &b.system)))
        .ok_or_else(|| EngineError::no_valid_code(candidates.len()))
}

/// The stable join key between a variable's schema coding and its
/// observed-data coding: `"<last path segment of system>|<code>"`.
///
/// Schema and data may namespace the same system URI differently; keeping
/// only the last path segment makes the two sides meet. Returns `None` when
/// the concept carries no coding at all (the caller treats the fragment as
/// unroutable).
pub fn canonical_key(concept: &CodeableConcept) -> Option<String> {
    let primary = concept.primary()?;
    let tail = primary
        .system
        .rsplit('/')
        .next()
        .unwrap_or(primary.system.as_str());
    Some(format!("{tail}|{}", primary.code))
}

/// First identifier tagged `official`, falling back to the first identifier
/// when none is tagged. `None` only for an empty slice.
pub fn official_identifier(identifiers: &[Identifier]) -> Option<&Identifier> {
    identifiers
        .iter()
        .find(|id| id.r#use.as_deref() == Some("official"))
        .or_else(|| identifiers.first())
}
