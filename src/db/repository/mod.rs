//! Repository layer: typed access to the positional record store.
//!
//! This is the only place that knows which column holds which field.
//! Workflows work with `Appointment`, `AuditEntry` and `User` values.

mod appointment;
mod audit;
mod user;

pub use appointment::*;
pub use audit::*;
pub use user::*;
