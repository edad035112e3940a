use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Labvisit";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default inactivity timeout for admin sessions: 15 minutes.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 900;

/// Deposit charged on bookings that are not paid online, in cents.
pub const DEFAULT_DEPOSIT_CENTS: u32 = 3_000;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:8080";
const DEFAULT_BUSINESS_NAME: &str = "Health Wise Mobile Phlebotomy";
const DEFAULT_PAYPAL_BASE_URL: &str = "https://api-m.sandbox.paypal.com";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Cannot determine a data directory; set LABVISIT_DATA_DIR")]
    NoDataDir,

    #[error("Set {0} to the new user's password")]
    MissingPassword(&'static str),
}

/// Password for the `hash-password` and `add-user` commands. Read from the
/// environment only, never from command-line arguments.
pub const NEW_USER_PASSWORD_VAR: &str = "LABVISIT_NEW_USER_PASSWORD";

pub fn new_user_password<F>(lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(NEW_USER_PASSWORD_VAR)
        .filter(|p| !p.is_empty())
        .ok_or(ConfigError::MissingPassword(NEW_USER_PASSWORD_VAR))
}

/// Mail relay settings. Absent when `LABVISIT_MAIL_API_URL` is unset.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
}

/// PayPal REST credentials. Absent unless both id and secret are set.
#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Runtime configuration, read once at startup from `LABVISIT_*` variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    /// Base URL used to build file links and PayPal return URLs.
    pub public_url: String,
    pub business_name: String,
    pub mail_from: String,
    pub mail: Option<MailConfig>,
    pub paypal: Option<PayPalConfig>,
    pub session_idle_secs: u64,
    pub deposit_cents: u32,
    /// Origin allowed to call the public booking endpoints cross-site.
    pub booking_origin: Option<String>,
}

impl AppConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("LABVISIT_BIND").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "LABVISIT_BIND",
            value: bind_raw.clone(),
        })?;

        let data_dir = match get("LABVISIT_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir().ok_or(ConfigError::NoDataDir)?,
        };

        let session_idle_secs = parse_number(
            "LABVISIT_SESSION_IDLE_SECS",
            get("LABVISIT_SESSION_IDLE_SECS"),
            DEFAULT_SESSION_IDLE_SECS,
        )?;
        let deposit_cents = parse_number(
            "LABVISIT_DEPOSIT_CENTS",
            get("LABVISIT_DEPOSIT_CENTS"),
            DEFAULT_DEPOSIT_CENTS,
        )?;

        let mail = get("LABVISIT_MAIL_API_URL").map(|api_url| MailConfig {
            api_url,
            api_key: get("LABVISIT_MAIL_API_KEY"),
        });

        let paypal = match (get("LABVISIT_PAYPAL_CLIENT_ID"), get("LABVISIT_PAYPAL_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(PayPalConfig {
                base_url: get("LABVISIT_PAYPAL_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_PAYPAL_BASE_URL.into()),
                client_id,
                client_secret,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            data_dir,
            public_url: get("LABVISIT_PUBLIC_URL")
                .unwrap_or_else(|| DEFAULT_PUBLIC_URL.into())
                .trim_end_matches('/')
                .to_string(),
            business_name: get("LABVISIT_BUSINESS_NAME")
                .unwrap_or_else(|| DEFAULT_BUSINESS_NAME.into()),
            mail_from: get("LABVISIT_MAIL_FROM")
                .unwrap_or_else(|| "bookings@localhost".into()),
            mail,
            paypal,
            session_idle_secs,
            deposit_cents,
            booking_origin: get("LABVISIT_BOOKING_ORIGIN"),
        })
    }

    /// SQLite file backing the record store.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("labvisit.db")
    }

    /// Root directory of the attachment store.
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join("files")
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

/// Platform data directory, e.g. ~/.local/share/labvisit on Linux.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("labvisit"))
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,labvisit_lib=debug"
    } else {
        "info"
    }
}
