//! `GET /api/dashboard`: console landing summary.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::dashboard::{self, DashboardSummary};

pub async fn summary(State(ctx): State<ApiContext>) -> Result<Json<DashboardSummary>, ApiError> {
    let summary = ctx
        .run_blocking(|core| dashboard::dashboard(core.store(), core.today()))
        .await?;
    Ok(Json(summary))
}
