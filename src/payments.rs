//! Online checkout for a booked service. The amount always comes from the
//! price schedule, never from the caller.

use serde::Serialize;

use crate::error::WorkflowError;
use crate::integrations::{format_cents, service_price_cents, IntegrationError, PaymentGateway, CURRENCY};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOrder {
    pub order_id: String,
    pub status: String,
    pub approve_url: Option<String>,
    pub amount: String,
    pub currency: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCapture {
    pub order_id: String,
    pub status: String,
    pub completed: bool,
}

pub fn create_service_order(
    gateway: &dyn PaymentGateway,
    business_name: &str,
    service: &str,
) -> Result<CheckoutOrder, WorkflowError> {
    let service = service.trim();
    let cents = service_price_cents(service).ok_or_else(|| {
        WorkflowError::validation(format!("{service} has no online price; book with a deposit instead"))
    })?;
    let order = gateway.create_order(cents, &format!("{business_name}: {service}"))?;
    Ok(CheckoutOrder {
        order_id: order.id,
        status: order.status,
        approve_url: order.approve_url,
        amount: format_cents(cents),
        currency: CURRENCY,
    })
}

pub fn capture_service_order(
    gateway: &dyn PaymentGateway,
    order_id: &str,
) -> Result<CheckoutCapture, WorkflowError> {
    let order_id = order_id.trim();
    if order_id.is_empty() {
        return Err(WorkflowError::validation("Missing order id"));
    }
    let capture = gateway.capture_order(order_id)?;
    if !capture.is_completed() {
        tracing::warn!(order_id, status = %capture.status, "Capture did not complete");
    }
    Ok(CheckoutCapture {
        completed: capture.is_completed(),
        order_id: capture.order_id,
        status: capture.status,
    })
}

/// Confirm with the processor that `order_id` was captured for the full
/// scheduled price of `service`. Client-reported payment is never trusted.
pub fn verify_paid_order(
    gateway: Option<&dyn PaymentGateway>,
    order_id: &str,
    service: &str,
) -> Result<(), WorkflowError> {
    let gateway = gateway.ok_or_else(|| WorkflowError::validation("Online payment is not available"))?;
    let expected = service_price_cents(service)
        .ok_or_else(|| WorkflowError::validation(format!("{service} cannot be paid online")))?;

    let order = match gateway.order_details(order_id) {
        Ok(order) => order,
        Err(IntegrationError::Status { status: 404, .. }) => {
            tracing::warn!(order_id, "Booking referenced an unknown payment order");
            return Err(WorkflowError::validation("Unknown payment order"));
        }
        Err(e) => return Err(e.into()),
    };

    if !order.is_completed() {
        tracing::warn!(order_id, status = %order.status, "Booking referenced an uncaptured order");
        return Err(WorkflowError::validation("Payment has not been completed"));
    }
    let currency_ok = order.currency.as_deref().map_or(true, |c| c == CURRENCY);
    if order.amount_cents != Some(expected) || !currency_ok {
        tracing::warn!(
            order_id,
            expected = %format_cents(expected),
            paid = ?order.amount_cents,
            "Payment amount does not match the service"
        );
        return Err(WorkflowError::validation("Payment amount does not match the service price"));
    }
    Ok(())
}
