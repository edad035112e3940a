//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Access log, wraps every route
//! 2. Session validator, back-office routes only

pub mod audit;
pub mod auth;
