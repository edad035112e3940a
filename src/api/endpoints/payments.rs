//! Online checkout endpoints.
//!
//! - `POST /api/payments/orders`: create an order for a priced service
//! - `POST /api/payments/orders/:id/capture`: capture an approved order

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::payments::{self, CheckoutCapture, CheckoutOrder};

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub service: String,
}

/// `POST /api/payments/orders`: the amount comes from the price schedule.
pub async fn create_order(
    State(ctx): State<ApiContext>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<CheckoutOrder>, ApiError> {
    if ctx.core.payments().is_none() {
        return Err(ApiError::PaymentsUnavailable);
    }
    let order = ctx
        .run_blocking(move |core| match core.payments() {
            Some(gateway) => {
                payments::create_service_order(gateway, &core.config.business_name, &request.service)
                    .map_err(ApiError::from)
            }
            None => Err(ApiError::PaymentsUnavailable),
        })
        .await?;
    Ok(Json(order))
}

/// `POST /api/payments/orders/:id/capture`
pub async fn capture_order(
    State(ctx): State<ApiContext>,
    Path(order_id): Path<String>,
) -> Result<Json<CheckoutCapture>, ApiError> {
    if ctx.core.payments().is_none() {
        return Err(ApiError::PaymentsUnavailable);
    }
    let capture = ctx
        .run_blocking(move |core| match core.payments() {
            Some(gateway) => payments::capture_service_order(gateway, &order_id).map_err(ApiError::from),
            None => Err(ApiError::PaymentsUnavailable),
        })
        .await?;
    Ok(Json(capture))
}
