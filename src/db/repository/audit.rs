use crate::db::{DatabaseError, RecordStore, Sheet, SheetRow};
use crate::models::AuditEntry;

const TIMESTAMP: usize = 0;
const USER_EMAIL: usize = 1;
const ACTION: usize = 2;
const DETAILS: usize = 3;

/// Append one entry to the audit sheet.
pub fn insert_audit_entry(store: &dyn RecordStore, entry: &AuditEntry) -> Result<u32, DatabaseError> {
    let cells = vec![
        entry.timestamp.clone(),
        entry.user_email.clone(),
        entry.action.clone(),
        entry.details.clone(),
    ];
    store.append_row(Sheet::AuditLog, &cells)
}

/// All audit entries, most recent first.
pub fn list_audit_entries(store: &dyn RecordStore) -> Result<Vec<AuditEntry>, DatabaseError> {
    let mut entries: Vec<AuditEntry> = store
        .read_rows(Sheet::AuditLog)?
        .iter()
        .map(row_to_entry)
        .collect();
    entries.reverse();
    Ok(entries)
}

fn row_to_entry(row: &SheetRow) -> AuditEntry {
    AuditEntry {
        timestamp: row.cell(TIMESTAMP).to_string(),
        user_email: row.cell(USER_EMAIL).to_string(),
        action: row.cell(ACTION).to_string(),
        details: row.cell(DETAILS).to_string(),
    }
}
