use std::str::FromStr;

use crate::db::{CellRange, DatabaseError, RecordStore, Sheet, SheetRow};
use crate::models::{Appointment, AppointmentStatus, DepositStatus, NewAppointment, PatientDetails};

/// Column layout of the appointments sheet (A–S).
pub mod col {
    pub const TIMESTAMP: usize = 0;
    pub const NAME: usize = 1;
    pub const PHONE: usize = 2;
    pub const EMAIL: usize = 3;
    pub const ADDRESS: usize = 4;
    pub const SERVICE: usize = 5;
    pub const REQUESTED_DATE: usize = 6;
    pub const STATUS: usize = 7;
    pub const SPECIAL_INSTRUCTIONS: usize = 8;
    pub const PHYSICIAN_INFO: usize = 9;
    pub const VISIT_NOTES: usize = 10;
    pub const DATE_OF_BIRTH: usize = 11;
    pub const NATIONAL_INSURANCE: usize = 12;
    pub const MARITAL_STATUS: usize = 13;
    pub const OCCUPATION: usize = 14;
    pub const REQUISITION_LINK: usize = 15;
    pub const PAYMENT_STATUS: usize = 16;
    pub const DEPOSIT_STATUS: usize = 17;
    pub const REPORT_LINK: usize = 18;

    pub const COUNT: usize = 19;
}

/// Append a new booking. Status starts as Pending and the deposit column blank.
pub fn insert_appointment(
    store: &dyn RecordStore,
    new: &NewAppointment,
    timestamp: &str,
) -> Result<u32, DatabaseError> {
    store.append_row(Sheet::Appointments, &new_row(new, timestamp))
}

/// Append a booking paid through `order_id`. An order pays for one row only.
pub fn insert_paid_appointment(
    store: &dyn RecordStore,
    new: &NewAppointment,
    timestamp: &str,
    order_id: &str,
) -> Result<u32, DatabaseError> {
    store.append_row_redeeming(Sheet::Appointments, &new_row(new, timestamp), order_id)
}

fn new_row(new: &NewAppointment, timestamp: &str) -> Vec<String> {
    let mut cells = vec![String::new(); col::COUNT];
    cells[col::TIMESTAMP] = timestamp.to_string();
    cells[col::NAME] = new.name.clone();
    cells[col::PHONE] = new.phone.clone();
    cells[col::EMAIL] = new.email.clone();
    cells[col::ADDRESS] = new.address.clone();
    cells[col::SERVICE] = new.service.clone();
    cells[col::REQUESTED_DATE] = new.requested_date.clone();
    cells[col::STATUS] = AppointmentStatus::Pending.as_str().to_string();
    cells[col::SPECIAL_INSTRUCTIONS] = new.special_instructions.clone();
    cells[col::DATE_OF_BIRTH] = new.date_of_birth.clone();
    cells[col::NATIONAL_INSURANCE] = new.national_insurance.clone();
    cells[col::MARITAL_STATUS] = new.marital_status.clone();
    cells[col::OCCUPATION] = new.occupation.clone();
    cells[col::PAYMENT_STATUS] = new.payment_status.clone();
    cells
}

/// Every appointment row in position order.
pub fn list_appointments(store: &dyn RecordStore) -> Result<Vec<Appointment>, DatabaseError> {
    Ok(store
        .read_rows(Sheet::Appointments)?
        .iter()
        .map(row_to_appointment)
        .collect())
}

pub fn get_appointment(store: &dyn RecordStore, position: u32) -> Result<Appointment, DatabaseError> {
    store
        .read_row(Sheet::Appointments, position)?
        .map(|row| row_to_appointment(&row))
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "Appointment".into(),
            id: position.to_string(),
        })
}

pub fn update_status(
    store: &dyn RecordStore,
    position: u32,
    status: AppointmentStatus,
) -> Result<(), DatabaseError> {
    write_one(store, position, col::STATUS, status.as_str())
}

pub fn update_deposit_status(
    store: &dyn RecordStore,
    position: u32,
    deposit: DepositStatus,
) -> Result<(), DatabaseError> {
    write_one(store, position, col::DEPOSIT_STATUS, deposit.as_str())
}

/// Physician info and visit notes (J–K) in one write.
pub fn update_notes(
    store: &dyn RecordStore,
    position: u32,
    physician_info: &str,
    visit_notes: &str,
) -> Result<(), DatabaseError> {
    store.update_cells(
        Sheet::Appointments,
        position,
        col::PHYSICIAN_INFO,
        &[physician_info.to_string(), visit_notes.to_string()],
    )
}

pub fn update_visit_notes(
    store: &dyn RecordStore,
    position: u32,
    visit_notes: &str,
) -> Result<(), DatabaseError> {
    write_one(store, position, col::VISIT_NOTES, visit_notes)
}

pub fn update_requisition_link(
    store: &dyn RecordStore,
    position: u32,
    link: &str,
) -> Result<(), DatabaseError> {
    write_one(store, position, col::REQUISITION_LINK, link)
}

/// Report PDF link (S) and the report JSON in visit notes (K) in one write.
pub fn update_report(
    store: &dyn RecordStore,
    position: u32,
    link: &str,
    visit_notes: &str,
) -> Result<(), DatabaseError> {
    store.update_row(
        Sheet::Appointments,
        position,
        &[
            CellRange::single(col::VISIT_NOTES, visit_notes),
            CellRange::single(col::REPORT_LINK, link),
        ],
    )
}

/// Rewrite the editable demographics (C, E, L–O) in one write. Name and
/// email stay untouched.
pub fn update_patient_details(
    store: &dyn RecordStore,
    position: u32,
    details: &PatientDetails,
) -> Result<(), DatabaseError> {
    store.update_row(
        Sheet::Appointments,
        position,
        &[
            CellRange::single(col::PHONE, &details.phone),
            CellRange::single(col::ADDRESS, &details.address),
            CellRange::new(
                col::DATE_OF_BIRTH,
                vec![
                    details.date_of_birth.clone(),
                    details.national_insurance.clone(),
                    details.marital_status.clone(),
                    details.occupation.clone(),
                ],
            ),
        ],
    )
}

fn write_one(
    store: &dyn RecordStore,
    position: u32,
    column: usize,
    value: &str,
) -> Result<(), DatabaseError> {
    store.update_cells(Sheet::Appointments, position, column, &[value.to_string()])
}

/// Map a positional row to an `Appointment`. Unknown status values read as
/// Pending and unknown deposit values as blank, with a warning.
fn row_to_appointment(row: &SheetRow) -> Appointment {
    let text = |idx: usize| row.cell(idx).trim().to_string();

    let status = match AppointmentStatus::from_str(row.cell(col::STATUS)) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(position = row.position, error = %e, "Unreadable status, showing Pending");
            AppointmentStatus::Pending
        }
    };

    let raw_deposit = row.cell(col::DEPOSIT_STATUS).trim();
    let deposit_status = if raw_deposit.is_empty() {
        None
    } else {
        match DepositStatus::from_str(raw_deposit) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(position = row.position, error = %e, "Unreadable deposit status");
                None
            }
        }
    };

    Appointment {
        position: row.position,
        timestamp: text(col::TIMESTAMP),
        name: text(col::NAME),
        phone: text(col::PHONE),
        email: text(col::EMAIL),
        address: text(col::ADDRESS),
        service: text(col::SERVICE),
        requested_date: text(col::REQUESTED_DATE),
        status,
        special_instructions: text(col::SPECIAL_INSTRUCTIONS),
        physician_info: text(col::PHYSICIAN_INFO),
        // Visit notes may hold JSON; keep them verbatim.
        visit_notes: row.cell(col::VISIT_NOTES).to_string(),
        date_of_birth: text(col::DATE_OF_BIRTH),
        national_insurance: text(col::NATIONAL_INSURANCE),
        marital_status: text(col::MARITAL_STATUS),
        occupation: text(col::OCCUPATION),
        requisition_link: text(col::REQUISITION_LINK),
        payment_status: text(col::PAYMENT_STATUS),
        deposit_status,
        report_link: text(col::REPORT_LINK),
    }
}

#[cfg(test)]
pub(crate) fn sample_new_appointment(name: &str, email: &str) -> NewAppointment {
    NewAppointment {
        name: name.into(),
        phone: "242-555-0101".into(),
        email: email.into(),
        address: "1 Bay St, Nassau".into(),
        service: "Routine Annual Blood Draw".into(),
        requested_date: "August 7, 2025 at 09:00 AM".into(),
        special_instructions: String::new(),
        date_of_birth: String::new(),
        national_insurance: String::new(),
        marital_status: String::new(),
        occupation: String::new(),
        payment_status: crate::models::DEPOSIT_REQUIRED.into(),
    }
}
