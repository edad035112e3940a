//! Public booking endpoints used by the booking form.
//!
//! - `GET /api/booking/options`: services, time slots and deposit amount
//! - `POST /api/bookings`: submit a booking request

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::booking::{self, BookingOptions, BookingReceipt, BookingRequest};

/// `GET /api/booking/options`
pub async fn options(State(ctx): State<ApiContext>) -> Json<BookingOptions> {
    Json(booking::booking_options(&ctx.core.booking_settings()))
}

/// `POST /api/bookings`: appends the row, then best-effort upload, audit and email.
pub async fn submit(
    State(ctx): State<ApiContext>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingReceipt>), ApiError> {
    let receipt = ctx
        .run_blocking(move |core| {
            booking::submit_booking(
                core.store(),
                core.attachments(),
                core.notifier(),
                core.payments(),
                &core.booking_settings(),
                &request,
                core.today(),
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
