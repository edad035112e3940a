//! `GET /api/audit-log`: Admin only, most recent first.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::audit;
use crate::models::AuditEntry;

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let entries = ctx
        .run_blocking(move |core| audit::list_audit_log(core.store(), &session.actor))
        .await?;
    Ok(Json(entries))
}
