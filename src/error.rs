use thiserror::Error;

use crate::db::DatabaseError;
use crate::integrations::IntegrationError;

/// Failure of a back-office workflow.
///
/// `Validation` is raised before any collaborator is called. `Store` and
/// `Integration` are collaborator failures; nothing is retried.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Record store error: {0}")]
    Store(DatabaseError),

    #[error("{0}")]
    Integration(#[from] IntegrationError),

    #[error("Report rendering failed: {0}")]
    Render(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not permitted for this role")]
    Forbidden,
}

impl From<DatabaseError> for WorkflowError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity_type, id } => {
                Self::NotFound(format!("{entity_type} {id}"))
            }
            e @ DatabaseError::OrderRedeemed(_) => Self::Validation(e.to_string()),
            other => Self::Store(other),
        }
    }
}

impl WorkflowError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_row_becomes_not_found() {
        let err: WorkflowError = DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: "7".into(),
        }
        .into();
        assert!(matches!(err, WorkflowError::NotFound(ref m) if m == "Appointment 7"));
    }

    #[test]
    fn reused_order_is_a_validation_error() {
        let err: WorkflowError = DatabaseError::OrderRedeemed("5O1".into()).into();
        assert!(matches!(err, WorkflowError::Validation(ref m) if m == "Payment order 5O1 was already used"));
    }

    #[test]
    fn other_store_errors_stay_store() {
        let err: WorkflowError = DatabaseError::LockPoisoned.into();
        assert!(matches!(err, WorkflowError::Store(_)));
    }
}
