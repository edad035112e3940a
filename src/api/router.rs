//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Security headers → 2. Access log → 3. Body limit → 4. CORS (public) or
//! session validator (back office)

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// A 10 MB attachment grows by a third as a base64 data URL, plus the form.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected outside the session layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Back-office routes: every request needs a live session.
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/appointments", get(endpoints::appointments::list))
        .route("/appointments/:position", get(endpoints::appointments::detail))
        .route(
            "/appointments/:position/status",
            post(endpoints::appointments::set_status),
        )
        .route(
            "/appointments/:position/deposit",
            post(endpoints::appointments::set_deposit),
        )
        .route(
            "/appointments/:position/notes",
            post(endpoints::appointments::set_notes),
        )
        .route(
            "/appointments/:position/patient-details",
            post(endpoints::appointments::set_patient_details),
        )
        .route(
            "/appointments/:position/report",
            get(endpoints::appointments::get_report).post(endpoints::appointments::save_report),
        )
        .route(
            "/appointments/:position/report/pdf",
            post(endpoints::appointments::generate_report),
        )
        .route("/patients", get(endpoints::patients::list))
        .route("/dashboard", get(endpoints::dashboard::summary))
        .route("/audit-log", get(endpoints::audit_log::list))
        .route("/results", post(endpoints::results::send))
        .route("/files/:folder/:name", get(endpoints::files::download))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_session))
        // Extension must sit outside the session layer so it can extract ApiContext
        .layer(Extension(ctx.clone()));

    // Public routes used by the booking form and the login screen.
    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/booking/options", get(endpoints::booking::options))
        .route("/bookings", post(endpoints::booking::submit))
        .route("/payments/orders", post(endpoints::payments::create_order))
        .route(
            "/payments/orders/:id/capture",
            post(endpoints::payments::capture_order),
        )
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx.clone())
        .layer(booking_cors(ctx.core.config.booking_origin.as_deref()));

    Router::new()
        .nest("/api", public.merge(protected))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}

/// CORS for the public routes. Without a configured origin no
/// cross-origin headers are sent.
fn booking_cors(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::new();
    };
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
        Err(_) => {
            tracing::warn!(origin, "Ignoring invalid LABVISIT_BOOKING_ORIGIN");
            CorsLayer::new()
        }
    }
}
