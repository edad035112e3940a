use serde::{Deserialize, Serialize};

/// One line of the append-only audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: String,
    pub user_email: String,
    pub action: String,
    pub details: String,
}
