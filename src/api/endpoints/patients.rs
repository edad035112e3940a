//! `GET /api/patients`: patients aggregated from appointment rows.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::Patient;
use crate::patients;

pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Patient>>, ApiError> {
    let patients = ctx
        .run_blocking(|core| patients::list_patients(core.store()))
        .await?;
    Ok(Json(patients))
}
