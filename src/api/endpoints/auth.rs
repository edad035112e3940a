//! Back-office session endpoints.
//!
//! `POST /api/auth/login`: Unprotected: exchange credentials for a bearer token
//! `POST /api/auth/logout`: Protected: revoke the current token

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::models::UserRole;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
    pub role: UserRole,
    pub idle_timeout_secs: u64,
}

/// `POST /api/auth/login`: password hashing runs on the blocking pool.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let idle_timeout_secs = ctx.core.config.session_idle_secs;
    let (token, actor) = ctx
        .run_blocking(move |core| core.login(&request.email, &request.password))
        .await?;

    Ok(Json(LoginResponse {
        token,
        email: actor.email,
        role: actor.role,
        idle_timeout_secs,
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub revoked: bool,
}

/// `POST /api/auth/logout`
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let revoked = ctx.core.logout(&session.token)?;
    tracing::info!(actor = %session.actor.email, "Back-office logout");
    Ok(Json(LogoutResponse { revoked }))
}
