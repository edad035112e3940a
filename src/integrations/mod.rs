//! Outbound collaborators: mail relay, attachment storage, payment processor.
//!
//! Each concern is a `Send + Sync` trait so workflows can be driven by test
//! doubles. The HTTP adapters use `reqwest::blocking` and are only ever
//! called from blocking threads.

pub mod attachments;
pub mod mailer;
pub mod payments;

#[cfg(test)]
pub(crate) mod fakes;

pub use attachments::*;
pub use mailer::*;
pub use payments::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Cannot reach {service} at {url}")]
    Connection { service: &'static str, url: String },

    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("File storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Integration not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Default timeout for outbound HTTP calls.
pub(crate) const HTTP_TIMEOUT_SECS: u64 = 30;

/// Build a blocking client. Created per call so it never lives on an async thread.
pub(crate) fn http_client() -> Result<reqwest::blocking::Client, IntegrationError> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| IntegrationError::Http(e.to_string()))
}

/// Classify a transport failure the way callers report it.
pub(crate) fn transport_error(service: &'static str, url: &str, e: reqwest::Error) -> IntegrationError {
    if e.is_connect() {
        IntegrationError::Connection {
            service,
            url: url.to_string(),
        }
    } else if e.is_timeout() {
        IntegrationError::Http(format!("{service} timed out after {HTTP_TIMEOUT_SECS}s"))
    } else {
        IntegrationError::Http(e.to_string())
    }
}

/// Turn a non-success response into `IntegrationError::Status`.
pub(crate) fn check_status(
    service: &'static str,
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(IntegrationError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}
