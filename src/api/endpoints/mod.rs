//! API endpoint handlers.
//!
//! Public handlers serve the booking form; the rest back the admin console.
//! Handlers delegate to the workflow modules through `ApiContext::run_blocking`.

pub mod appointments;
pub mod audit_log;
pub mod auth;
pub mod booking;
pub mod dashboard;
pub mod files;
pub mod health;
pub mod patients;
pub mod payments;
pub mod results;
