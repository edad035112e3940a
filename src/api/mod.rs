//! HTTP API.
//!
//! Exposes the booking and back-office workflows as JSON endpoints.
//! Public routes serve the booking form; back-office routes are nested
//! under the same `/api/` prefix and require a bearer session.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve_until_ctrl_c, start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
