//! Appointment status and deposit transitions, each followed by one audit entry.

use crate::audit::{self, actions};
use crate::db::repository;
use crate::db::RecordStore;
use crate::error::WorkflowError;
use crate::models::{Actor, Appointment, AppointmentStatus, DepositStatus};

/// Set an appointment to Confirmed or Declined.
///
/// Any target may overwrite any current value. Re-applying the current
/// status leaves the row as is but is still audited. A decline needs a
/// reason, which lives only in the audit entry.
pub fn update_status(
    store: &dyn RecordStore,
    actor: &Actor,
    position: u32,
    target: AppointmentStatus,
    reason: Option<&str>,
) -> Result<Appointment, WorkflowError> {
    if target == AppointmentStatus::Pending {
        return Err(WorkflowError::validation(
            "Status can only be set to Confirmed or Declined",
        ));
    }
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    if target == AppointmentStatus::Declined && reason.is_none() {
        return Err(WorkflowError::validation("A reason is required to decline"));
    }

    let mut appointment = repository::get_appointment(store, position)?;
    if appointment.status != target {
        repository::update_status(store, position, target)?;
        tracing::info!(position, from = %appointment.status, to = %target, actor = %actor.email, "Status updated");
        appointment.status = target;
    } else {
        tracing::debug!(position, status = %target, "Status unchanged");
    }

    let mut details = format!("Set status to {target} for appointment row {position}.");
    if target == AppointmentStatus::Declined {
        if let Some(reason) = reason {
            details.push_str(&format!(" Reason: {reason}"));
        }
    }
    audit::record(store, &actor.email, actions::UPDATED_STATUS, details)?;

    Ok(appointment)
}

/// Record a deposit as Paid or Unpaid. The value is written for any row;
/// views show "N/A" where no deposit is required.
pub fn update_deposit(
    store: &dyn RecordStore,
    actor: &Actor,
    position: u32,
    deposit: DepositStatus,
) -> Result<Appointment, WorkflowError> {
    let mut appointment = repository::get_appointment(store, position)?;
    if !appointment.requires_deposit() {
        tracing::debug!(position, payment = %appointment.payment_status, "Deposit set on a row without a deposit requirement");
    }

    repository::update_deposit_status(store, position, deposit)?;
    appointment.deposit_status = Some(deposit);
    tracing::info!(position, deposit = %deposit, actor = %actor.email, "Deposit status updated");

    audit::record(
        store,
        &actor.email,
        actions::UPDATED_DEPOSIT,
        format!("Set deposit status to {deposit} for appointment row {position}."),
    )?;
    Ok(appointment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_appointment, list_audit_entries, sample_new_appointment};
    use crate::db::SqliteRecordStore;
    use crate::models::{UserRole, NOT_APPLICABLE, PAID_ONLINE};

    fn staff() -> Actor {
        Actor {
            email: "staff@clinic.com".into(),
            role: UserRole::Staff,
        }
    }

    fn store_with_row() -> (SqliteRecordStore, u32) {
        let store = SqliteRecordStore::in_memory().unwrap();
        let pos = insert_appointment(
            &store,
            &sample_new_appointment("Jane Doe", "jane@example.com"),
            "2025-08-01T10:00:00+00:00",
        )
        .unwrap();
        (store, pos)
    }

    #[test]
    fn confirm_pending_row() {
        let (store, pos) = store_with_row();
        let appt = update_status(&store, &staff(), pos, AppointmentStatus::Confirmed, None).unwrap();
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert_eq!(
            repository::get_appointment(&store, pos).unwrap().status,
            AppointmentStatus::Confirmed
        );

        let log = list_audit_entries(&store).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "Updated Appointment Status");
        assert_eq!(log[0].user_email, "staff@clinic.com");
        assert_eq!(log[0].details, format!("Set status to Confirmed for appointment row {pos}."));
    }

    #[test]
    fn reconfirming_keeps_status_and_still_audits() {
        let (store, pos) = store_with_row();
        update_status(&store, &staff(), pos, AppointmentStatus::Confirmed, None).unwrap();
        update_status(&store, &staff(), pos, AppointmentStatus::Confirmed, None).unwrap();

        assert_eq!(
            repository::get_appointment(&store, pos).unwrap().status,
            AppointmentStatus::Confirmed
        );
        assert_eq!(list_audit_entries(&store).unwrap().len(), 2);
    }

    #[test]
    fn decline_requires_reason_and_records_it() {
        let (store, pos) = store_with_row();
        assert!(matches!(
            update_status(&store, &staff(), pos, AppointmentStatus::Declined, Some("  ")),
            Err(WorkflowError::Validation(_))
        ));
        assert!(list_audit_entries(&store).unwrap().is_empty());

        update_status(&store, &staff(), pos, AppointmentStatus::Declined, Some("No slot")).unwrap();
        let log = list_audit_entries(&store).unwrap();
        assert_eq!(
            log[0].details,
            format!("Set status to Declined for appointment row {pos}. Reason: No slot")
        );
    }

    #[test]
    fn confirmed_can_be_declined_later() {
        let (store, pos) = store_with_row();
        update_status(&store, &staff(), pos, AppointmentStatus::Confirmed, None).unwrap();
        let appt =
            update_status(&store, &staff(), pos, AppointmentStatus::Declined, Some("Cancelled")).unwrap();
        assert_eq!(appt.status, AppointmentStatus::Declined);
    }

    #[test]
    fn pending_is_not_a_target() {
        let (store, pos) = store_with_row();
        assert!(update_status(&store, &staff(), pos, AppointmentStatus::Pending, None).is_err());
    }

    #[test]
    fn missing_row_is_not_found() {
        let (store, _) = store_with_row();
        assert!(matches!(
            update_status(&store, &staff(), 99, AppointmentStatus::Confirmed, None),
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[test]
    fn deposit_paid_is_written_and_audited() {
        let (store, pos) = store_with_row();
        let appt = update_deposit(&store, &staff(), pos, DepositStatus::Paid).unwrap();
        assert_eq!(appt.deposit_display(), "Paid");
        let log = list_audit_entries(&store).unwrap();
        assert_eq!(log[0].action, "Updated Deposit Status");
        assert_eq!(log[0].details, format!("Set deposit status to Paid for appointment row {pos}."));
    }

    #[test]
    fn deposit_on_paid_online_row_shows_not_applicable() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let mut new = sample_new_appointment("Jane Doe", "jane@example.com");
        new.payment_status = PAID_ONLINE.into();
        let pos = insert_appointment(&store, &new, "ts").unwrap();

        let appt = update_deposit(&store, &staff(), pos, DepositStatus::Paid).unwrap();
        assert_eq!(appt.deposit_status, Some(DepositStatus::Paid));
        assert_eq!(appt.deposit_display(), NOT_APPLICABLE);
    }
}
