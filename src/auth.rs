//! Back-office authentication: salted password hashes in the users sheet and
//! opaque bearer sessions held in memory.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::db::repository;
use crate::db::{DatabaseError, RecordStore};
use crate::error::WorkflowError;
use crate::models::{Actor, User, UserRole};

pub const PASSWORD_ITERATIONS: u32 = 600_000;
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;
const HASH_SCHEME: &str = "pbkdf2-sha256";
const MIN_PASSWORD_CHARS: usize = 8;

/// Hash of a random throwaway password at full cost. Unknown emails are
/// checked against it so both login failures take the same time.
const DUMMY_PASSWORD_HASH: &str =
    "pbkdf2-sha256$600000$LYcqBSZ6F/na0WVk0irR7Q$ZLrTQjKeB+LtbprtHSWfVSPvhB47gZRyMiNG3Z+xSPs";

/// Hash a password for storage: `pbkdf2-sha256$<iterations>$<salt>$<hash>`.
pub fn hash_password(password: &str) -> String {
    hash_password_with(password, PASSWORD_ITERATIONS)
}

pub(crate) fn hash_password_with(password: &str, iterations: u32) -> String {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut derived = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived);

    let b64 = base64::engine::general_purpose::STANDARD_NO_PAD;
    let encoded = format!(
        "{HASH_SCHEME}${iterations}${}${}",
        b64.encode(salt),
        b64.encode(derived)
    );
    derived.zeroize();
    encoded
}

/// Constant-time check of `password` against a stored hash. Malformed
/// hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((iterations, salt, expected)) = parse_stored_hash(stored) else {
        tracing::warn!("Stored password hash is malformed");
        return false;
    };

    let mut derived = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived);
    let matches = derived.ct_eq(&expected).into();
    derived.zeroize();
    matches
}

fn parse_stored_hash(stored: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = stored.trim().split('$');
    if parts.next()? != HASH_SCHEME {
        return None;
    }
    let iterations: u32 = parts.next()?.parse().ok().filter(|n| *n > 0)?;
    let b64 = base64::engine::general_purpose::STANDARD_NO_PAD;
    let salt = b64.decode(parts.next()?).ok()?;
    let hash = b64.decode(parts.next()?).ok()?;
    if parts.next().is_some() || hash.is_empty() {
        return None;
    }
    Some((iterations, salt, hash))
}

/// Check an email/password pair against the users sheet.
///
/// Email matching is case-insensitive. Unknown users and wrong passwords
/// produce the same error.
pub fn authenticate(store: &dyn RecordStore, email: &str, password: &str) -> Result<Actor, WorkflowError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(WorkflowError::validation("Email and password are required"));
    }

    let user = repository::find_user_by_email(store, email)?;
    match user {
        Some(user) if verify_password(password, &user.password_hash) => {
            tracing::info!(actor = %user.email, role = %user.role, "Login succeeded");
            Ok(Actor {
                email: user.email,
                role: user.role,
            })
        }
        Some(_) => {
            tracing::warn!("Login rejected");
            Err(WorkflowError::InvalidCredentials)
        }
        None => {
            verify_password(password, DUMMY_PASSWORD_HASH);
            tracing::warn!("Login rejected");
            Err(WorkflowError::InvalidCredentials)
        }
    }
}

// ── Sessions ────────────────────────────────────────────────

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

struct SessionEntry {
    actor: Actor,
    last_seen: Instant,
}

/// Logged-in back-office users. Only token hashes are kept; a session
/// expires after `idle_timeout` without use.
pub struct SessionRegistry {
    sessions: HashMap<[u8; 32], SessionEntry>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            idle_timeout,
        }
    }

    /// Start a session and return its bearer token.
    pub fn issue(&mut self, actor: Actor) -> String {
        self.prune();
        let token = generate_token();
        self.sessions.insert(
            hash_token(&token),
            SessionEntry {
                actor,
                last_seen: Instant::now(),
            },
        );
        token
    }

    /// Resolve a token to its actor and refresh its idle timer.
    pub fn validate(&mut self, token: &str) -> Option<Actor> {
        let key = hash_token(token);
        let now = Instant::now();
        let expired = match self.sessions.get_mut(&key) {
            None => return None,
            Some(entry) if now.duration_since(entry.last_seen) >= self.idle_timeout => true,
            Some(entry) => {
                entry.last_seen = now;
                return Some(entry.actor.clone());
            }
        };
        if expired {
            self.sessions.remove(&key);
            tracing::debug!("Session expired after inactivity");
        }
        None
    }

    /// End a session. Returns whether it existed.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(&hash_token(token)).is_some()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    fn prune(&mut self) {
        let now = Instant::now();
        let idle = self.idle_timeout;
        self.sessions
            .retain(|_, entry| now.duration_since(entry.last_seen) < idle);
    }
}

/// Add a back-office account. Used by the `add-user` command.
pub fn create_user(
    store: &dyn RecordStore,
    email: &str,
    password: &str,
    role: UserRole,
) -> Result<Actor, WorkflowError> {
    create_user_with(store, email, password, role, PASSWORD_ITERATIONS)
}

fn create_user_with(
    store: &dyn RecordStore,
    email: &str,
    password: &str,
    role: UserRole,
    iterations: u32,
) -> Result<Actor, WorkflowError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(WorkflowError::validation("A valid email address is required"));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(WorkflowError::validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    let user = User {
        email: email.to_string(),
        password_hash: hash_password_with(password, iterations),
        role,
    };
    repository::insert_user(store, &user).map_err(|e| match e {
        DatabaseError::ConstraintViolation(msg) => WorkflowError::Validation(msg),
        other => other.into(),
    })?;
    tracing::info!(actor = %user.email, role = %role, "User added");
    Ok(Actor {
        email: user.email,
        role,
    })
}

#[cfg(test)]
pub(crate) const TEST_ITERATIONS: u32 = 10;

#[cfg(test)]
pub(crate) fn seed_user(store: &dyn RecordStore, email: &str, password: &str, role: UserRole) {
    repository::insert_user(
        store,
        &User {
            email: email.into(),
            password_hash: hash_password_with(password, TEST_ITERATIONS),
            role,
        },
    )
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Sheet, SqliteRecordStore};
    use crate::models::UserRole;

    #[test]
    fn hash_then_verify() {
        let stored = hash_password_with("correct horse", TEST_ITERATIONS);
        assert!(stored.starts_with("pbkdf2-sha256$10$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password_with("pw", TEST_ITERATIONS);
        let b = hash_password_with("pw", TEST_ITERATIONS);
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_or_plaintext_hash_never_matches() {
        assert!(!verify_password("secret", "secret"));
        assert!(!verify_password("secret", "pbkdf2-sha256$0$AAAA$AAAA"));
        assert!(!verify_password("secret", "bcrypt$10$AAAA$AAAA"));
        assert!(!verify_password("secret", ""));
    }

    #[test]
    fn authenticate_matches_email_case_insensitively() {
        let store = SqliteRecordStore::in_memory().unwrap();
        seed_user(&store, "Admin@Clinic.com", "pw123", UserRole::Admin);

        let actor = authenticate(&store, "admin@clinic.COM", "pw123").unwrap();
        assert_eq!(actor.role, UserRole::Admin);
        assert!(actor.is_admin());
    }

    #[test]
    fn authenticate_rejects_wrong_password_and_unknown_user() {
        let store = SqliteRecordStore::in_memory().unwrap();
        seed_user(&store, "staff@clinic.com", "pw123", UserRole::Staff);

        assert!(matches!(
            authenticate(&store, "staff@clinic.com", "nope"),
            Err(WorkflowError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&store, "ghost@clinic.com", "pw123"),
            Err(WorkflowError::InvalidCredentials)
        ));
    }

    #[test]
    fn unknown_email_check_costs_a_full_hash() {
        let (iterations, salt, hash) = parse_stored_hash(DUMMY_PASSWORD_HASH).unwrap();
        assert_eq!(iterations, PASSWORD_ITERATIONS);
        assert_eq!(salt.len(), SALT_LENGTH);
        assert_eq!(hash.len(), HASH_LENGTH);
        assert!(!verify_password("", DUMMY_PASSWORD_HASH));
    }

    #[test]
    fn authenticate_rejects_unknown_role() {
        let store = SqliteRecordStore::in_memory().unwrap();
        store
            .append_row(
                Sheet::Users,
                &[
                    "owner@clinic.com".to_string(),
                    hash_password_with("pw", TEST_ITERATIONS),
                    "Owner".to_string(),
                ],
            )
            .unwrap();
        assert!(matches!(
            authenticate(&store, "owner@clinic.com", "pw"),
            Err(WorkflowError::InvalidCredentials)
        ));
    }

    #[test]
    fn authenticate_requires_both_fields() {
        let store = SqliteRecordStore::in_memory().unwrap();
        assert!(matches!(
            authenticate(&store, " ", "pw"),
            Err(WorkflowError::Validation(_))
        ));
    }

    fn actor() -> Actor {
        Actor {
            email: "staff@clinic.com".into(),
            role: UserRole::Staff,
        }
    }

    #[test]
    fn token_is_url_safe() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn session_issue_validate_revoke() {
        let mut registry = SessionRegistry::new(Duration::from_secs(900));
        let token = registry.issue(actor());

        assert_eq!(registry.validate(&token), Some(actor()));
        assert!(registry.validate("forged").is_none());
        assert!(registry.revoke(&token));
        assert!(registry.validate(&token).is_none());
        assert!(!registry.revoke(&token));
    }

    #[test]
    fn idle_session_expires() {
        let mut registry = SessionRegistry::new(Duration::ZERO);
        let token = registry.issue(actor());
        assert!(registry.validate(&token).is_none());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn create_user_then_authenticate() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let actor = create_user_with(&store, " new@clinic.com ", "long enough", UserRole::Staff, TEST_ITERATIONS)
            .unwrap();
        assert_eq!(actor.email, "new@clinic.com");
        assert_eq!(authenticate(&store, "NEW@clinic.com", "long enough").unwrap(), actor);
    }

    #[test]
    fn create_user_rejects_short_password_and_duplicates() {
        let store = SqliteRecordStore::in_memory().unwrap();
        assert!(matches!(
            create_user_with(&store, "a@clinic.com", "short", UserRole::Admin, TEST_ITERATIONS),
            Err(WorkflowError::Validation(_))
        ));
        create_user_with(&store, "a@clinic.com", "long enough", UserRole::Admin, TEST_ITERATIONS).unwrap();
        assert!(matches!(
            create_user_with(&store, "a@clinic.com", "long enough", UserRole::Staff, TEST_ITERATIONS),
            Err(WorkflowError::Validation(_))
        ));
    }
}
