//! Typed error values for merge, validation and workspace operations.
//!
//! Structural failures (merge, validation) are data, never thrown, per the
//! error-handling design in the specification: every variant carries the
//! offending [`ElemId`] and a pre-formatted message.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::elem_id::ElemId;

/// Severity assigned to a unified workspace error (§7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single merge failure, keyed by the `ElemId` it concerns.
///
/// `Display` always renders as `"Error merging <full_name>: <reason>"`; this
/// template is fixed because downstream tests compare merge error messages
/// verbatim.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("Error merging {0}: no base definition for update(s)")]
    NoBaseDefinition(ElemId),

    #[error("Error merging {0}: multiple base definitions")]
    MultipleBaseDefinitions(ElemId),

    #[error("Error merging {0}: duplicate annotation field definition for '{key}'")]
    DuplicateAnnotationFieldDefinition { elem_id: ElemId, key: String },

    #[error("Error merging {0}: duplicate annotation type '{key}'")]
    DuplicateAnnotationType { elem_id: ElemId, key: String },

    #[error("Error merging {0}: duplicate annotation '{key}'")]
    DuplicateAnnotation { elem_id: ElemId, key: String },

    #[error("Error merging {0}: duplicate instance key '{key}'")]
    DuplicateInstanceKey { elem_id: ElemId, key: String },

    #[error("Error merging {0}: multiple primitive types are not supported")]
    MultiplePrimitiveTypesUnsupported(ElemId),

    #[error("Error merging {0}: duplicate variable name")]
    DuplicateVariableName(ElemId),
}

impl MergeError {
    /// The `ElemId` this failure concerns, used to look up source fragments
    /// (I7: `source_map[error.elem_id.full_name]` must be non-empty whenever
    /// at least one declaration contributed to that identifier).
    #[must_use]
    pub fn elem_id(&self) -> &ElemId {
        match self {
            Self::NoBaseDefinition(id)
            | Self::MultipleBaseDefinitions(id)
            | Self::MultiplePrimitiveTypesUnsupported(id)
            | Self::DuplicateVariableName(id) => id,
            Self::DuplicateAnnotationFieldDefinition { elem_id, .. }
            | Self::DuplicateAnnotationType { elem_id, .. }
            | Self::DuplicateAnnotation { elem_id, .. }
            | Self::DuplicateInstanceKey { elem_id, .. } => elem_id,
        }
    }
}

// `#[error("...{0}")]` above relies on `ElemId: Display`, which only prints
// the full name; the fixed template wraps it with the `Error merging` prefix
// via thiserror's generated `Display` impl, so no separate formatter is
// needed here.

/// Severity classification, validator error kinds and their offending `ElemId`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unresolved reference in {elem_id}: {message}")]
    UnresolvedReference { elem_id: ElemId, message: String },

    #[error("invalid value type in {elem_id}: {message}")]
    InvalidValueType { elem_id: ElemId, message: String },

    #[error("circular reference in {elem_id}: {message}")]
    CircularReference { elem_id: ElemId, message: String },

    #[error("missing required field in {elem_id}: {message}")]
    MissingRequiredField { elem_id: ElemId, message: String },
}

impl ValidationError {
    #[must_use]
    pub fn elem_id(&self) -> &ElemId {
        match self {
            Self::UnresolvedReference { elem_id, .. }
            | Self::InvalidValueType { elem_id, .. }
            | Self::CircularReference { elem_id, .. }
            | Self::MissingRequiredField { elem_id, .. } => elem_id,
        }
    }

    /// Only unresolved references are errors; everything else is a warning (§4.3, §7).
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::UnresolvedReference { .. } => Severity::Error,
            Self::InvalidValueType { .. }
            | Self::CircularReference { .. }
            | Self::MissingRequiredField { .. } => Severity::Warning,
        }
    }
}

/// Which pipeline stage produced a unified [`WorkspaceError`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkspaceErrorCause {
    Parse(crate::source::ParseError),
    Merge(MergeError),
    Validation(ValidationError),
}

impl WorkspaceErrorCause {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Parse(_) | Self::Merge(_) => Severity::Error,
            Self::Validation(v) => v.severity(),
        }
    }
}

impl fmt::Display for WorkspaceErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{}", e.detail),
            Self::Merge(e) => write!(f, "{e}"),
            Self::Validation(e) => write!(f, "{e}"),
        }
    }
}

/// A parse/merge/validation error unified with its source fragments, for
/// display to a user (§4.4.2 `get_workspace_errors`, §7).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceError {
    pub source_fragments: Vec<String>,
    pub error: String,
    pub severity: Severity,
    pub cause: WorkspaceErrorCause,
}

/// Operational (I/O) failure, surfaced with the originating path (§7 tier 2).
#[derive(Debug, Error)]
pub enum WorkspaceIoError {
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: camino::Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Programmer failures: invalid preconditions for workspace bootstrapping (§7 tier 3).
#[derive(Debug, Error)]
pub enum WorkspaceInitError {
    #[error("a workspace already exists at or above '{base_dir}'")]
    ExistingWorkspace { base_dir: camino::Utf8PathBuf },

    #[error("'{base_dir}' is not an empty workspace: {reason}")]
    NotAnEmptyWorkspace {
        base_dir: camino::Utf8PathBuf,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] WorkspaceIoError),
}

/// Collects multiple same-kind errors produced during a single operation,
/// mirroring how I/O-bound fan-out (parallel reads/writes) surfaces partial
/// failures without discarding the rest.
#[derive(Debug, Default)]
pub struct AggregatedErrors<E>(Vec<Arc<E>>);

impl<E> AggregatedErrors<E> {
    #[must_use]
    pub const fn new(errors: Vec<Arc<E>>) -> Self {
        Self(errors)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.0.iter().map(Arc::as_ref)
    }
}

impl<E: fmt::Display> fmt::Display for AggregatedErrors<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {e}", i + 1)?;
        }
        Ok(())
    }
}

impl<E> FromIterator<E> for AggregatedErrors<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self(iter.into_iter().map(Arc::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_error_message_matches_fixed_template() {
        let elem_id = ElemId::for_type("salesforce", "Account");
        let err = MergeError::MultipleBaseDefinitions(elem_id);
        assert_eq!(
            err.to_string(),
            "Error merging salesforce.Account: multiple base definitions"
        );
    }

    #[test]
    fn validation_severity_classification() {
        let elem_id = ElemId::for_type("salesforce", "Account");
        let unresolved = ValidationError::UnresolvedReference {
            elem_id: elem_id.clone(),
            message: "x".into(),
        };
        assert_eq!(unresolved.severity(), Severity::Error);
        let missing = ValidationError::MissingRequiredField {
            elem_id,
            message: "x".into(),
        };
        assert_eq!(missing.severity(), Severity::Warning);
    }

    #[test]
    fn aggregated_errors_numbers_entries() {
        let agg: AggregatedErrors<String> =
            ["a".to_string(), "b".to_string()].into_iter().collect();
        assert_eq!(agg.to_string(), "1: a\n2: b");
    }
}
