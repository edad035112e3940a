use std::str::FromStr;

use crate::db::{DatabaseError, RecordStore, Sheet};
use crate::models::{User, UserRole};

const EMAIL: usize = 0;
const PASSWORD_HASH: usize = 1;
const ROLE: usize = 2;

/// Find a user by email, case-insensitively. Rows with an unknown role are
/// skipped with a warning so they can never authenticate.
pub fn find_user_by_email(store: &dyn RecordStore, email: &str) -> Result<Option<User>, DatabaseError> {
    let wanted = email.trim().to_lowercase();
    for row in store.read_rows(Sheet::Users)? {
        if row.cell(EMAIL).trim().to_lowercase() != wanted {
            continue;
        }
        match UserRole::from_str(row.cell(ROLE)) {
            Ok(role) => {
                return Ok(Some(User {
                    email: row.cell(EMAIL).trim().to_string(),
                    password_hash: row.cell(PASSWORD_HASH).trim().to_string(),
                    role,
                }))
            }
            Err(e) => {
                tracing::warn!(position = row.position, error = %e, "Skipping user row with unknown role");
            }
        }
    }
    Ok(None)
}

/// Append a user row. Used by the `add-user` admin command only.
pub fn insert_user(store: &dyn RecordStore, user: &User) -> Result<u32, DatabaseError> {
    if find_user_by_email(store, &user.email)?.is_some() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "User already exists: {}",
            user.email
        )));
    }
    let cells = vec![
        user.email.trim().to_string(),
        user.password_hash.clone(),
        user.role.as_str().to_string(),
    ];
    store.append_row(Sheet::Users, &cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteRecordStore;

    fn user(email: &str, role: UserRole) -> User {
        User {
            email: email.into(),
            password_hash: "pbkdf2-sha256$1$c2FsdA$aGFzaA".into(),
            role,
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let store = SqliteRecordStore::in_memory().unwrap();
        insert_user(&store, &user("Admin@Example.com", UserRole::Admin)).unwrap();

        let found = find_user_by_email(&store, "  admin@example.COM ").unwrap().unwrap();
        assert_eq!(found.email, "Admin@Example.com");
        assert_eq!(found.role, UserRole::Admin);
    }

    #[test]
    fn unknown_email_is_none() {
        let store = SqliteRecordStore::in_memory().unwrap();
        assert!(find_user_by_email(&store, "nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn unknown_role_row_is_skipped() {
        let store = SqliteRecordStore::in_memory().unwrap();
        store
            .append_row(
                Sheet::Users,
                &["owner@example.com".to_string(), "hash".to_string(), "Owner".to_string()],
            )
            .unwrap();
        assert!(find_user_by_email(&store, "owner@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_user_rejected() {
        let store = SqliteRecordStore::in_memory().unwrap();
        insert_user(&store, &user("staff@example.com", UserRole::Staff)).unwrap();
        let err = insert_user(&store, &user("STAFF@example.com", UserRole::Staff)).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }
}
