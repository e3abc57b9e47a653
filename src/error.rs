//! Error types
//!
//! Mapping and identity errors are raised before any remote call is made.
//! Remote failures are carried opaquely in [`RemoteError`].

use crate::remote::RemoteError;
use thiserror::Error;

/// Mapping, identity and remote errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unrecognized {family} variant {value:?}")]
    UnrecognizedVariant { family: &'static str, value: String },

    #[error("missing required field `{field}` in {shape}")]
    MissingRequiredField { shape: &'static str, field: String },

    #[error("unknown field `{field}` in {shape}")]
    UnknownField { shape: &'static str, field: String },

    #[error("field `{field}` expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("identity part {part:?} is empty or contains the separator '{separator}'")]
    InvalidIdentityPart { part: String, separator: char },

    #[error("identity {identity:?} does not split into {expected} non-empty parts")]
    MalformedIdentity { identity: String, expected: usize },

    #[error(
        "field `{field}` cannot be changed in place; the resource must be destroyed and re-created"
    )]
    ImmutableFieldChanged { field: String },

    #[error("remote call failed: {0}")]
    RemoteCallFailed(#[from] RemoteError),

    #[error("resource not found")]
    NotFound,

    #[error("resource already exists as {identity:?}; import or delete it instead")]
    AlreadyExists { identity: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Prefix the field path of a mapping error with the enclosing field, so
    /// errors from nested nodes read `trigger.worker.id`.
    pub fn within(self, parent: &str) -> Self {
        let join = |field: String| {
            if field.starts_with('[') {
                format!("{}{}", parent, field)
            } else {
                format!("{}.{}", parent, field)
            }
        };
        match self {
            Error::MissingRequiredField { shape, field } => Error::MissingRequiredField {
                shape,
                field: join(field),
            },
            Error::UnknownField { shape, field } => Error::UnknownField {
                shape,
                field: join(field),
            },
            Error::TypeMismatch {
                field,
                expected,
                found,
            } => Error::TypeMismatch {
                field: join(field),
                expected,
                found,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Lifecycle operation a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::Import => write!(f, "import"),
        }
    }
}

/// Failure returned to the orchestration caller: which resource kind, which
/// operation, and the underlying cause.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{operation} {kind}: {source}")]
pub struct ReconcileError {
    pub kind: &'static str,
    pub operation: Operation,
    #[source]
    pub source: Error,
}

impl ReconcileError {
    pub fn new(kind: &'static str, operation: Operation, source: Error) -> Self {
        Self {
            kind,
            operation,
            source,
        }
    }
}
