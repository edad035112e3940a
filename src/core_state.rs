//! Transport-agnostic application state.
//!
//! `CoreState` owns the record store, the outbound collaborators and the
//! back-office session registry. It is wrapped in `Arc` at startup and
//! shared by every request handler.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;

use crate::auth::{self, SessionRegistry};
use crate::booking::BookingSettings;
use crate::config::{AppConfig, ConfigError};
use crate::db::{self, RecordStore, SqliteRecordStore};
use crate::error::WorkflowError;
use crate::integrations::{
    AttachmentStore, HttpMailer, LocalAttachmentStore, LogNotifier, Notifier, PayPalClient,
    PaymentGateway,
};
use crate::models::Actor;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    store: Arc<dyn RecordStore>,
    attachments: Arc<dyn AttachmentStore>,
    notifier: Arc<dyn Notifier>,
    /// `None` when PayPal credentials are not configured.
    payments: Option<Arc<dyn PaymentGateway>>,
    sessions: Mutex<SessionRegistry>,
}

impl CoreState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RecordStore>,
        attachments: Arc<dyn AttachmentStore>,
        notifier: Arc<dyn Notifier>,
        payments: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let idle = Duration::from_secs(config.session_idle_secs);
        Self {
            config,
            store,
            attachments,
            notifier,
            payments,
            sessions: Mutex::new(SessionRegistry::new(idle)),
        }
    }

    /// Wire the production adapters described by `config`.
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = SqliteRecordStore::open(&config.database_path())?;
        let attachments = LocalAttachmentStore::new(&config.files_dir(), &config.public_url);

        let notifier: Arc<dyn Notifier> = match &config.mail {
            Some(mail) => Arc::new(HttpMailer::new(mail, &config.mail_from)),
            None => {
                tracing::warn!("LABVISIT_MAIL_API_URL not set, emails will only be logged");
                Arc::new(LogNotifier)
            }
        };
        let payments: Option<Arc<dyn PaymentGateway>> = match &config.paypal {
            Some(paypal) => Some(Arc::new(PayPalClient::new(
                paypal,
                &config.public_url,
                &config.business_name,
            ))),
            None => {
                tracing::warn!("PayPal credentials not set, online payment is disabled");
                None
            }
        };

        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(attachments),
            notifier,
            payments,
        ))
    }

    // ── Collaborators ───────────────────────────────────────

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn attachments(&self) -> &dyn AttachmentStore {
        self.attachments.as_ref()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn payments(&self) -> Option<&dyn PaymentGateway> {
        self.payments.as_deref()
    }

    pub fn booking_settings(&self) -> BookingSettings {
        BookingSettings {
            business_name: self.config.business_name.clone(),
            deposit_cents: self.config.deposit_cents,
        }
    }

    /// The clinic's calendar date, used for booking and dashboard windows.
    pub fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    // ── Sessions ────────────────────────────────────────────

    fn lock_sessions(&self) -> Result<MutexGuard<'_, SessionRegistry>, CoreError> {
        self.sessions.lock().map_err(|_| CoreError::LockPoisoned)
    }

    /// Check credentials and open a session. Returns the bearer token.
    pub fn login(&self, email: &str, password: &str) -> Result<(String, Actor), CoreError> {
        let actor = auth::authenticate(self.store(), email, password)?;
        let token = self.lock_sessions()?.issue(actor.clone());
        Ok((token, actor))
    }

    /// Resolve a bearer token to its actor, refreshing the idle timer.
    pub fn authorize(&self, token: &str) -> Result<Actor, CoreError> {
        self.lock_sessions()?
            .validate(token)
            .ok_or(CoreError::InvalidSession)
    }

    pub fn logout(&self, token: &str) -> Result<bool, CoreError> {
        Ok(self.lock_sessions()?.revoke(token))
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Session is missing or has expired")]
    InvalidSession,
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Cannot prepare data directory: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

// ═══════════════════════════════════════════════════════════
// Test helpers
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
pub(crate) struct TestHarness {
    pub core: Arc<CoreState>,
    pub store: Arc<SqliteRecordStore>,
    pub files: Arc<crate::integrations::fakes::MemoryAttachmentStore>,
    pub mail: Arc<crate::integrations::fakes::RecordingNotifier>,
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "LABVISIT_DATA_DIR" => Some("/tmp/labvisit-test".into()),
        "LABVISIT_BUSINESS_NAME" => Some("Health Wise".into()),
        _ => None,
    })
    .unwrap()
}

#[cfg(test)]
pub(crate) fn test_harness(with_payments: bool) -> TestHarness {
    use crate::integrations::fakes::{FakeGateway, MemoryAttachmentStore, RecordingNotifier};

    let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
    let files = Arc::new(MemoryAttachmentStore::default());
    let mail = Arc::new(RecordingNotifier::default());
    let payments: Option<Arc<dyn PaymentGateway>> = if with_payments {
        Some(Arc::new(FakeGateway::default()))
    } else {
        None
    };
    let core = Arc::new(CoreState::new(
        test_config(),
        store.clone(),
        files.clone(),
        mail.clone(),
        payments,
    ));
    TestHarness {
        core,
        store,
        files,
        mail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    #[test]
    fn login_authorize_logout() {
        let h = test_harness(false);
        auth::seed_user(h.store.as_ref(), "admin@clinic.com", "pw", UserRole::Admin);

        let (token, actor) = h.core.login("admin@clinic.com", "pw").unwrap();
        assert_eq!(actor.role, UserRole::Admin);
        assert_eq!(h.core.authorize(&token).unwrap(), actor);

        assert!(h.core.logout(&token).unwrap());
        assert!(matches!(h.core.authorize(&token), Err(CoreError::InvalidSession)));
    }

    #[test]
    fn bad_login_issues_no_session() {
        let h = test_harness(false);
        assert!(matches!(
            h.core.login("nobody@clinic.com", "pw"),
            Err(CoreError::Workflow(WorkflowError::InvalidCredentials))
        ));
    }

    #[test]
    fn payments_absent_without_gateway() {
        assert!(test_harness(false).core.payments().is_none());
        assert!(test_harness(true).core.payments().is_some());
    }

    #[test]
    fn from_config_opens_store_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        let config = AppConfig::from_lookup(|key| match key {
            "LABVISIT_DATA_DIR" => Some(data_dir.to_string_lossy().into_owned()),
            _ => None,
        })
        .unwrap();

        let core = CoreState::from_config(config).unwrap();
        assert!(data_dir.join("labvisit.db").exists());
        assert!(core.payments().is_none());
        assert!(core.store().read_rows(db::Sheet::Users).unwrap().is_empty());
    }

    #[test]
    fn booking_settings_follow_config() {
        let h = test_harness(false);
        let settings = h.core.booking_settings();
        assert_eq!(settings.business_name, "Health Wise");
        assert_eq!(settings.deposit_cents, 3_000);
    }
}
