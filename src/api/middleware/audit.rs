//! Access logging middleware.
//!
//! Logs every API request with method, path, response status, latency and
//! the acting back-office user when the auth layer resolved one. Writes to
//! `tracing` only; the audit sheet records workflow actions, not requests.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::SessionContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let actor = response
        .extensions()
        .get::<SessionContext>()
        .map(|s| s.actor.email.as_str())
        .unwrap_or("-");

    if response.status().is_server_error() {
        tracing::warn!(%method, path = %path, status, elapsed_ms, actor, "API request failed");
    } else {
        tracing::info!(%method, path = %path, status, elapsed_ms, actor, "API request");
    }

    response
}
