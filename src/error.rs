//! Domain error taxonomy shared by all workflow modules.
//!
//! Validation and authorization failures carry a human-readable
//! message with field-level detail; the API layer maps each variant
//! to an HTTP status without losing the distinction.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Triage service unavailable: {0}")]
    TriageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl From<rusqlite::Error> for WorkflowError {
    fn from(err: rusqlite::Error) -> Self {
        WorkflowError::Storage(DatabaseError::Sqlite(err))
    }
}

impl WorkflowError {
    pub fn not_found(entity: &str) -> Self {
        WorkflowError::NotFound(format!("{entity} not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_helper_formats_entity() {
        let err = WorkflowError::not_found("Patient");
        assert_eq!(err.to_string(), "Patient not found");
    }

    #[test]
    fn validation_prefixes_message() {
        let err = WorkflowError::Validation("medications[0].dosage is required".into());
        assert!(err.to_string().starts_with("Validation failed:"));
    }

    #[test]
    fn sqlite_errors_become_storage() {
        let err: WorkflowError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, WorkflowError::Storage(_)));
    }
}
