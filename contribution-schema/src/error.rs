//! Error types for schema resolution and validation.

use serde::Serialize;

use crate::types::{ClaimExcerpt, FieldError, ValidationWarning};

/// Failure to find a schema for a contribution type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SchemaError {
    /// No schema is registered for the tag
    #[error("Unknown contribution type: {contribution_type}")]
    #[serde(rename_all = "camelCase")]
    UnknownType { contribution_type: String },
}

/// Outcome of a failed payload validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The type tag could not be resolved; nothing was validated
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Every field violation found in one pass
    #[error("{} field error(s)", .0.len())]
    Fields(Vec<FieldError>),
}

impl ValidationError {
    /// Field errors, empty for schema failures.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Schema(_) => &[],
            Self::Fields(errors) => errors,
        }
    }
}

/// A whole claim that failed validation.
///
/// Envelope and payload errors are collected together, and a schema failure
/// does not stop the envelope from being checked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("claim rejected with {} field error(s)", .errors.len())]
pub struct ClaimRejection {
    /// Identity fields as submitted
    pub excerpt: ClaimExcerpt,
    /// Set when the type tag has no registered schema
    pub schema_error: Option<SchemaError>,
    /// Every field violation found
    pub errors: Vec<FieldError>,
    /// Non-fatal findings gathered before rejection
    pub warnings: Vec<ValidationWarning>,
}
