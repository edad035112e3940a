pub mod repository;
pub mod sheet_store;
pub mod sqlite;

pub use sheet_store::SqliteRecordStore;
pub use sqlite::*;

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Payment order {0} was already used")]
    OrderRedeemed(String),

    #[error("Record store lock poisoned")]
    LockPoisoned,
}

/// A named table in the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sheet {
    Appointments,
    AuditLog,
    Users,
}

impl Sheet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appointments => "appointments",
            Self::AuditLog => "audit_log",
            Self::Users => "users",
        }
    }
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One positional row. `position` is 1-based and never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub position: u32,
    pub cells: Vec<String>,
}

impl SheetRow {
    /// Cell at `index`, or "" when the row is shorter (trailing blanks are not stored).
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }
}

/// A run of cells to overwrite, starting at `first_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRange {
    pub first_column: usize,
    pub values: Vec<String>,
}

impl CellRange {
    pub fn new(first_column: usize, values: Vec<String>) -> Self {
        Self { first_column, values }
    }

    pub fn single(column: usize, value: &str) -> Self {
        Self::new(column, vec![value.to_string()])
    }
}

/// Tabular system of record. Rows are positional string arrays.
///
/// `append_row` must allocate the new position and write the row as one
/// atomic step; callers never compute positions themselves.
pub trait RecordStore: Send + Sync {
    /// All rows of a sheet in position order.
    fn read_rows(&self, sheet: Sheet) -> Result<Vec<SheetRow>, DatabaseError>;

    /// A single row, or `None` if the position was never written.
    fn read_row(&self, sheet: Sheet, position: u32) -> Result<Option<SheetRow>, DatabaseError>;

    /// Append a row and return its position.
    fn append_row(&self, sheet: Sheet, cells: &[String]) -> Result<u32, DatabaseError>;

    /// Append a row and mark `order_id` as used by it, atomically. Fails with
    /// `OrderRedeemed` and writes nothing when the order was used before.
    fn append_row_redeeming(
        &self,
        sheet: Sheet,
        cells: &[String],
        order_id: &str,
    ) -> Result<u32, DatabaseError>;

    /// Apply every range to an existing row in one write: either all ranges
    /// land or none do.
    fn update_row(&self, sheet: Sheet, position: u32, ranges: &[CellRange]) -> Result<(), DatabaseError>;

    /// Overwrite `values.len()` cells starting at `first_column` on an existing row.
    fn update_cells(
        &self,
        sheet: Sheet,
        position: u32,
        first_column: usize,
        values: &[String],
    ) -> Result<(), DatabaseError> {
        self.update_row(sheet, position, &[CellRange::new(first_column, values.to_vec())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_row_reads_blank_cells() {
        let row = SheetRow {
            position: 3,
            cells: vec!["a".into(), "b".into()],
        };
        assert_eq!(row.cell(1), "b");
        assert_eq!(row.cell(7), "");
    }

    #[test]
    fn sheet_names_match_schema() {
        assert_eq!(Sheet::Appointments.as_str(), "appointments");
        assert_eq!(Sheet::AuditLog.to_string(), "audit_log");
        assert_eq!(Sheet::Users.as_str(), "users");
    }
}
