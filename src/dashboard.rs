//! Back-office dashboard summary.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::booking::parse_requested_date;
use crate::db::repository;
use crate::db::RecordStore;
use crate::error::WorkflowError;
use crate::models::{Appointment, AppointmentView};
use crate::patients::aggregate_patients;

/// Window of "upcoming" visits, starting today.
const UPCOMING_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_patients: usize,
    pub total_appointments: usize,
    pub outstanding_deposits: usize,
    pub upcoming: Vec<AppointmentView>,
}

pub fn summarize(appointments: Vec<Appointment>, today: NaiveDate) -> DashboardSummary {
    let total_patients = aggregate_patients(&appointments).len();
    let total_appointments = appointments.len();
    let outstanding_deposits = appointments.iter().filter(|a| a.deposit_outstanding()).count();

    let end = today + Duration::days(UPCOMING_DAYS);
    let mut upcoming: Vec<(NaiveDateTime, Appointment)> = appointments
        .into_iter()
        .filter_map(|a| parse_requested_date(&a.requested_date).map(|at| (at, a)))
        .filter(|(at, _)| at.date() >= today && at.date() < end)
        .collect();
    upcoming.sort_by(|(a, x), (b, y)| a.cmp(b).then(x.position.cmp(&y.position)));

    DashboardSummary {
        total_patients,
        total_appointments,
        outstanding_deposits,
        upcoming: upcoming.into_iter().map(|(_, a)| a.into()).collect(),
    }
}

pub fn dashboard(store: &dyn RecordStore, today: NaiveDate) -> Result<DashboardSummary, WorkflowError> {
    Ok(summarize(repository::list_appointments(store)?, today))
}
