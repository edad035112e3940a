//! Append-only audit trail of every mutating workflow.

use crate::db::repository;
use crate::db::RecordStore;
use crate::error::WorkflowError;
use crate::models::{Actor, AuditEntry};

/// Action labels written to the audit sheet.
pub mod actions {
    pub const BOOKING_SUBMITTED: &str = "Booking Submitted";
    pub const UPDATED_STATUS: &str = "Updated Appointment Status";
    pub const UPDATED_DEPOSIT: &str = "Updated Deposit Status";
    pub const UPDATED_PATIENT: &str = "Updated Patient Details";
    pub const UPDATED_NOTES: &str = "Updated Visit Notes";
    pub const SAVED_REPORT: &str = "Saved Visit Report";
    pub const GENERATED_REPORT: &str = "Generated Report";
    pub const SENT_RESULTS: &str = "Sent Results";
}

/// Append one entry stamped with the current UTC time.
pub fn record(
    store: &dyn RecordStore,
    user_email: &str,
    action: &str,
    details: impl Into<String>,
) -> Result<(), WorkflowError> {
    let entry = AuditEntry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        user_email: user_email.to_string(),
        action: action.to_string(),
        details: details.into(),
    };
    repository::insert_audit_entry(store, &entry)?;
    tracing::debug!(actor = %user_email, action, "Audit entry recorded");
    Ok(())
}

/// The full trail, most recent first. Admins only.
pub fn list_audit_log(store: &dyn RecordStore, actor: &Actor) -> Result<Vec<AuditEntry>, WorkflowError> {
    if !actor.is_admin() {
        tracing::warn!(actor = %actor.email, "Audit log requested without Admin role");
        return Err(WorkflowError::Forbidden);
    }
    Ok(repository::list_audit_entries(store)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteRecordStore;
    use crate::models::UserRole;

    fn actor(role: UserRole) -> Actor {
        Actor {
            email: "someone@clinic.com".into(),
            role,
        }
    }

    #[test]
    fn admin_sees_newest_first() {
        let store = SqliteRecordStore::in_memory().unwrap();
        record(&store, "a@clinic.com", actions::UPDATED_STATUS, "first").unwrap();
        record(&store, "a@clinic.com", actions::UPDATED_DEPOSIT, "second").unwrap();

        let log = list_audit_log(&store, &actor(UserRole::Admin)).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].action, "Updated Deposit Status");
        assert_eq!(log[1].details, "first");
        assert!(chrono::DateTime::parse_from_rfc3339(&log[0].timestamp).is_ok());
    }

    #[test]
    fn staff_is_forbidden() {
        let store = SqliteRecordStore::in_memory().unwrap();
        assert!(matches!(
            list_audit_log(&store, &actor(UserRole::Staff)),
            Err(WorkflowError::Forbidden)
        ));
    }
}
