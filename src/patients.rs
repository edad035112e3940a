//! Patients derived from appointment rows, plus edits that write back onto
//! a single appointment row.

use std::collections::HashMap;

use crate::audit::{self, actions};
use crate::db::repository;
use crate::db::RecordStore;
use crate::error::WorkflowError;
use crate::models::{Actor, Appointment, Patient, PatientDetails, NOT_APPLICABLE};

/// Identity key: email when present, otherwise name plus phone.
fn patient_key(appt: &Appointment) -> String {
    let email = appt.email.trim().to_lowercase();
    if !email.is_empty() {
        return format!("email:{email}");
    }
    format!(
        "name:{}|{}",
        appt.name.trim().to_lowercase(),
        appt.phone.trim()
    )
}

fn or_placeholder(value: &str) -> String {
    if value.trim().is_empty() {
        NOT_APPLICABLE.to_string()
    } else {
        value.trim().to_string()
    }
}

fn patient_from(appt: &Appointment) -> Patient {
    Patient {
        name: appt.name.trim().to_string(),
        phone: or_placeholder(&appt.phone),
        email: or_placeholder(&appt.email),
        address: or_placeholder(&appt.address),
        date_of_birth: or_placeholder(&appt.date_of_birth),
        national_insurance: or_placeholder(&appt.national_insurance),
        marital_status: or_placeholder(&appt.marital_status),
        occupation: or_placeholder(&appt.occupation),
        latest_position: appt.position,
        appointment_count: 0,
    }
}

/// Fold appointments into unique patients.
///
/// Order is first-seen key order; demographics come from the row with the
/// greatest position. Rows without a name are skipped.
pub fn aggregate_patients(appointments: &[Appointment]) -> Vec<Patient> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut patients: Vec<Patient> = Vec::new();

    for appt in appointments {
        if appt.name.trim().is_empty() {
            continue;
        }
        let key = patient_key(appt);
        match index.get(&key) {
            Some(&slot) => {
                let existing = &mut patients[slot];
                let count = existing.appointment_count + 1;
                if appt.position >= existing.latest_position {
                    *existing = patient_from(appt);
                }
                existing.appointment_count = count;
            }
            None => {
                let mut patient = patient_from(appt);
                patient.appointment_count = 1;
                index.insert(key, patients.len());
                patients.push(patient);
            }
        }
    }
    patients
}

pub fn list_patients(store: &dyn RecordStore) -> Result<Vec<Patient>, WorkflowError> {
    let appointments = repository::list_appointments(store)?;
    Ok(aggregate_patients(&appointments))
}

/// Rewrite the editable demographics on one appointment row.
pub fn update_patient_details(
    store: &dyn RecordStore,
    actor: &Actor,
    position: u32,
    details: &PatientDetails,
) -> Result<(), WorkflowError> {
    if details.phone.trim().is_empty() || details.address.trim().is_empty() {
        return Err(WorkflowError::validation("Phone and address are required"));
    }
    let appointment = repository::get_appointment(store, position)?;

    let cleaned = PatientDetails {
        phone: details.phone.trim().to_string(),
        address: details.address.trim().to_string(),
        date_of_birth: details.date_of_birth.trim().to_string(),
        national_insurance: details.national_insurance.trim().to_string(),
        marital_status: details.marital_status.trim().to_string(),
        occupation: details.occupation.trim().to_string(),
    };
    repository::update_patient_details(store, position, &cleaned)?;
    tracing::info!(position, actor = %actor.email, "Patient details updated");

    audit::record(
        store,
        &actor.email,
        actions::UPDATED_PATIENT,
        format!(
            "Updated details for {} on appointment row {position}.",
            appointment.name
        ),
    )
}

/// Write physician info and free-text visit notes.
pub fn update_visit_notes(
    store: &dyn RecordStore,
    actor: &Actor,
    position: u32,
    physician_info: &str,
    visit_notes: &str,
) -> Result<(), WorkflowError> {
    repository::get_appointment(store, position)?;
    repository::update_notes(store, position, physician_info.trim(), visit_notes)?;
    tracing::info!(position, actor = %actor.email, "Visit notes updated");

    audit::record(
        store,
        &actor.email,
        actions::UPDATED_NOTES,
        format!("Updated visit notes for appointment row {position}."),
    )
}
