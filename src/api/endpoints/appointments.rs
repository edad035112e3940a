//! Appointment endpoints for the admin console.
//!
//! - `GET /api/appointments`: every row with its derived deposit column
//! - `GET /api/appointments/:position`: one row
//! - `POST /api/appointments/:position/status`: confirm or decline
//! - `POST /api/appointments/:position/deposit`: mark deposit paid/unpaid
//! - `POST /api/appointments/:position/notes`: physician info and visit notes
//! - `POST /api/appointments/:position/patient-details`: edit demographics
//! - `GET|POST /api/appointments/:position/report`: read or save the visit report
//! - `POST /api/appointments/:position/report/pdf`: render and store the PDF

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::db::{repository, RecordStore};
use crate::error::WorkflowError;
use crate::models::{AppointmentStatus, AppointmentView, DepositStatus, PatientDetails, VisitReport};
use crate::report::{self, ReportView};
use crate::{patients, status};

/// `GET /api/appointments`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<AppointmentView>>, ApiError> {
    let rows = ctx
        .run_blocking(|core| repository::list_appointments(core.store()).map_err(WorkflowError::from))
        .await?;
    Ok(Json(rows.into_iter().map(AppointmentView::from).collect()))
}

/// `GET /api/appointments/:position`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(position): Path<u32>,
) -> Result<Json<AppointmentView>, ApiError> {
    let appointment = ctx
        .run_blocking(move |core| refreshed(core.store(), position))
        .await?;
    Ok(Json(appointment))
}

fn refreshed(store: &dyn RecordStore, position: u32) -> Result<AppointmentView, WorkflowError> {
    Ok(repository::get_appointment(store, position)?.into())
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /api/appointments/:position/status`
pub async fn set_status(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(position): Path<u32>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<AppointmentView>, ApiError> {
    let target: AppointmentStatus = request
        .status
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown status: {}", request.status)))?;

    let appointment = ctx
        .run_blocking(move |core| {
            status::update_status(
                core.store(),
                &session.actor,
                position,
                target,
                request.reason.as_deref(),
            )
        })
        .await?;
    Ok(Json(appointment.into()))
}

#[derive(Deserialize)]
pub struct DepositRequest {
    pub deposit: String,
}

/// `POST /api/appointments/:position/deposit`
pub async fn set_deposit(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(position): Path<u32>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<AppointmentView>, ApiError> {
    let deposit: DepositStatus = request
        .deposit
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Unknown deposit status: {}", request.deposit)))?;

    let appointment = ctx
        .run_blocking(move |core| {
            status::update_deposit(core.store(), &session.actor, position, deposit)
        })
        .await?;
    Ok(Json(appointment.into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesRequest {
    #[serde(default)]
    pub physician_info: String,
    #[serde(default)]
    pub visit_notes: String,
}

/// `POST /api/appointments/:position/notes`
pub async fn set_notes(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(position): Path<u32>,
    Json(request): Json<NotesRequest>,
) -> Result<Json<AppointmentView>, ApiError> {
    let appointment = ctx
        .run_blocking(move |core| {
            patients::update_visit_notes(
                core.store(),
                &session.actor,
                position,
                &request.physician_info,
                &request.visit_notes,
            )?;
            refreshed(core.store(), position)
        })
        .await?;
    Ok(Json(appointment))
}

/// `POST /api/appointments/:position/patient-details`
pub async fn set_patient_details(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(position): Path<u32>,
    Json(details): Json<PatientDetails>,
) -> Result<Json<AppointmentView>, ApiError> {
    let appointment = ctx
        .run_blocking(move |core| {
            patients::update_patient_details(core.store(), &session.actor, position, &details)?;
            refreshed(core.store(), position)
        })
        .await?;
    Ok(Json(appointment))
}

/// `GET /api/appointments/:position/report`
pub async fn get_report(
    State(ctx): State<ApiContext>,
    Path(position): Path<u32>,
) -> Result<Json<ReportView>, ApiError> {
    let view = ctx
        .run_blocking(move |core| report::get_report(core.store(), position))
        .await?;
    Ok(Json(view))
}

/// `POST /api/appointments/:position/report`: save without rendering.
pub async fn save_report(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(position): Path<u32>,
    Json(visit_report): Json<VisitReport>,
) -> Result<Json<ReportView>, ApiError> {
    let view = ctx
        .run_blocking(move |core| {
            report::save_report(core.store(), &session.actor, position, &visit_report)?;
            report::get_report(core.store(), position)
        })
        .await?;
    Ok(Json(view))
}

#[derive(Serialize)]
pub struct GeneratedReport {
    pub id: String,
    pub link: String,
}

/// `POST /api/appointments/:position/report/pdf`
pub async fn generate_report(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Path(position): Path<u32>,
    Json(visit_report): Json<VisitReport>,
) -> Result<Json<GeneratedReport>, ApiError> {
    let stored = ctx
        .run_blocking(move |core| {
            report::generate_report(
                core.store(),
                core.attachments(),
                &session.actor,
                &core.config.business_name,
                position,
                &visit_report,
            )
        })
        .await?;
    Ok(Json(GeneratedReport {
        id: stored.id,
        link: stored.link,
    }))
}
