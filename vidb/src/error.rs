use crate::schema::TypeTag;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VidbError {
    #[error("Schema violation in table '{table}': {violation}")]
    SchemaViolation {
        table: String,
        violation: Violation,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Row not found: {table}/{id}")]
    RowNotFound { table: String, id: usize },

    #[error("Config load error: {0}")]
    ConfigLoad(String),

    #[error("Data load error: {0}")]
    DataLoad(String),

    #[error("Persist error: {path}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Poll cycle error: {0}")]
    PollCycle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VidbError {
    /// The offending column, when this is a schema violation.
    pub fn column(&self) -> Option<&str> {
        match self {
            VidbError::SchemaViolation { violation, .. } => Some(violation.column()),
            _ => None,
        }
    }
}

/// How a row failed its table's schema check.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    TypeMismatch {
        column: String,
        expected: TypeTag,
        actual: TypeTag,
    },
    MissingColumn { column: String, expected: TypeTag },
    UnknownColumn { column: String, actual: TypeTag },
    /// The reserved derived-id column appeared in stored fields.
    ReservedColumn { column: String },
    /// A float that JSON cannot represent (NaN or infinite).
    NonFiniteFloat { column: String },
}

impl Violation {
    pub fn column(&self) -> &str {
        match self {
            Violation::TypeMismatch { column, .. }
            | Violation::MissingColumn { column, .. }
            | Violation::UnknownColumn { column, .. }
            | Violation::ReservedColumn { column }
            | Violation::NonFiniteFloat { column } => column,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::TypeMismatch {
                column,
                expected,
                actual,
            } => write!(f, "column '{column}' expected {expected}, got {actual}"),
            Violation::MissingColumn { column, expected } => {
                write!(f, "column '{column}' expected {expected}, got nothing")
            }
            Violation::UnknownColumn { column, actual } => {
                write!(f, "column '{column}' is not declared (got {actual})")
            }
            Violation::ReservedColumn { column } => {
                write!(f, "column '{column}' is reserved for the derived row id")
            }
            Violation::NonFiniteFloat { column } => {
                write!(f, "column '{column}' holds a NaN or infinite float")
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, VidbError>;
