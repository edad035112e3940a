//! `POST /api/results`: email lab results to a patient.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::results::{self, ResultsRequest};

#[derive(Serialize)]
pub struct ResultsResponse {
    pub sent: bool,
}

pub async fn send(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<ResultsRequest>,
) -> Result<Json<ResultsResponse>, ApiError> {
    ctx.run_blocking(move |core| {
        results::send_results(core.store(), core.notifier(), &session.actor, &request)
    })
    .await?;
    Ok(Json(ResultsResponse { sent: true }))
}
