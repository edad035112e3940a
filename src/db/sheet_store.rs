//! SQLite-backed record store.
//!
//! Each sheet row is stored as a JSON array of cells keyed by
//! `(sheet, position)`. All access goes through one connection behind a
//! mutex, so writes are serialized and `append_row` allocates its position
//! inside the same transaction that inserts the row.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::sqlite::{open_database, open_memory_database};
use super::{CellRange, DatabaseError, RecordStore, Sheet, SheetRow};

pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (and migrate) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    /// Fresh in-memory store (tests, dry runs).
    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

fn encode_cells(cells: &[String]) -> Result<String, DatabaseError> {
    serde_json::to_string(cells)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Cell encoding: {e}")))
}

fn decode_cells(raw: &str) -> Result<Vec<String>, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Cell decoding: {e}")))
}

fn row_from_parts(position: i64, raw: &str) -> Result<SheetRow, DatabaseError> {
    let position = u32::try_from(position)
        .map_err(|_| DatabaseError::ConstraintViolation(format!("Position out of range: {position}")))?;
    Ok(SheetRow {
        position,
        cells: decode_cells(raw)?,
    })
}

impl RecordStore for SqliteRecordStore {
    fn read_rows(&self, sheet: Sheet) -> Result<Vec<SheetRow>, DatabaseError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT position, cells FROM sheet_rows WHERE sheet = ?1 ORDER BY position ASC",
        )?;
        let raw = stmt
            .query_map(params![sheet.as_str()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.iter()
            .map(|(position, cells)| row_from_parts(*position, cells))
            .collect()
    }

    fn read_row(&self, sheet: Sheet, position: u32) -> Result<Option<SheetRow>, DatabaseError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT cells FROM sheet_rows WHERE sheet = ?1 AND position = ?2",
                params![sheet.as_str(), position],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|cells| row_from_parts(i64::from(position), &cells))
            .transpose()
    }

    fn append_row(&self, sheet: Sheet, cells: &[String]) -> Result<u32, DatabaseError> {
        let encoded = encode_cells(cells)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let position = insert_next_row(&tx, sheet, &encoded)?;
        tx.commit()?;
        Ok(position)
    }

    fn append_row_redeeming(
        &self,
        sheet: Sheet,
        cells: &[String],
        order_id: &str,
    ) -> Result<u32, DatabaseError> {
        let encoded = encode_cells(cells)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let already: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM redeemed_orders WHERE order_id = ?1)",
            params![order_id],
            |row| row.get(0),
        )?;
        if already {
            return Err(DatabaseError::OrderRedeemed(order_id.to_string()));
        }

        let position = insert_next_row(&tx, sheet, &encoded)?;
        tx.execute(
            "INSERT INTO redeemed_orders (order_id, sheet, position) VALUES (?1, ?2, ?3)",
            params![order_id, sheet.as_str(), position],
        )?;
        tx.commit()?;
        Ok(position)
    }

    fn update_row(&self, sheet: Sheet, position: u32, ranges: &[CellRange]) -> Result<(), DatabaseError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw: Option<String> = tx
            .query_row(
                "SELECT cells FROM sheet_rows WHERE sheet = ?1 AND position = ?2",
                params![sheet.as_str(), position],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or_else(|| DatabaseError::NotFound {
            entity_type: format!("{sheet} row"),
            id: position.to_string(),
        })?;

        let mut cells = decode_cells(&raw)?;
        for range in ranges {
            let end = range.first_column + range.values.len();
            if cells.len() < end {
                cells.resize(end, String::new());
            }
            cells[range.first_column..end].clone_from_slice(&range.values);
        }

        tx.execute(
            "UPDATE sheet_rows SET cells = ?1, updated_at = datetime('now')
             WHERE sheet = ?2 AND position = ?3",
            params![encode_cells(&cells)?, sheet.as_str(), position],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Allocate the next position of `sheet` and insert the row inside `tx`.
fn insert_next_row(tx: &Transaction<'_>, sheet: Sheet, encoded: &str) -> Result<u32, DatabaseError> {
    let next: i64 = tx.query_row(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM sheet_rows WHERE sheet = ?1",
        params![sheet.as_str()],
        |row| row.get(0),
    )?;
    tx.execute(
        "INSERT INTO sheet_rows (sheet, position, cells) VALUES (?1, ?2, ?3)",
        params![sheet.as_str(), next, encoded],
    )?;
    u32::try_from(next)
        .map_err(|_| DatabaseError::ConstraintViolation(format!("Position out of range: {next}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn append_assigns_sequential_positions() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let first = store.append_row(Sheet::Appointments, &cells(&["a"])).unwrap();
        let second = store.append_row(Sheet::Appointments, &cells(&["b"])).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn positions_are_per_sheet() {
        let store = SqliteRecordStore::in_memory().unwrap();
        store.append_row(Sheet::Appointments, &cells(&["a"])).unwrap();
        store.append_row(Sheet::Appointments, &cells(&["b"])).unwrap();
        let audit = store.append_row(Sheet::AuditLog, &cells(&["x"])).unwrap();
        assert_eq!(audit, 1);
    }

    #[test]
    fn read_rows_in_position_order() {
        let store = SqliteRecordStore::in_memory().unwrap();
        for name in ["one", "two", "three"] {
            store.append_row(Sheet::Users, &cells(&[name])).unwrap();
        }
        let rows = store.read_rows(Sheet::Users).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.cell(0)).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
        assert_eq!(rows[2].position, 3);
    }

    #[test]
    fn read_missing_row_is_none() {
        let store = SqliteRecordStore::in_memory().unwrap();
        assert!(store.read_row(Sheet::Appointments, 9).unwrap().is_none());
    }

    #[test]
    fn update_overwrites_only_targeted_cells() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let pos = store
            .append_row(Sheet::Appointments, &cells(&["a", "b", "c", "d"]))
            .unwrap();
        store
            .update_cells(Sheet::Appointments, pos, 1, &cells(&["B", "C"]))
            .unwrap();
        let row = store.read_row(Sheet::Appointments, pos).unwrap().unwrap();
        assert_eq!(row.cells, cells(&["a", "B", "C", "d"]));
    }

    #[test]
    fn update_pads_short_rows() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let pos = store.append_row(Sheet::Appointments, &cells(&["a"])).unwrap();
        store
            .update_cells(Sheet::Appointments, pos, 4, &cells(&["e"]))
            .unwrap();
        let row = store.read_row(Sheet::Appointments, pos).unwrap().unwrap();
        assert_eq!(row.cells, cells(&["a", "", "", "", "e"]));
    }

    #[test]
    fn update_missing_row_is_not_found() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let err = store
            .update_cells(Sheet::Appointments, 42, 0, &cells(&["x"]))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn update_row_applies_every_range() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let pos = store
            .append_row(Sheet::Appointments, &cells(&["a", "b", "c", "d", "e"]))
            .unwrap();
        store
            .update_row(
                Sheet::Appointments,
                pos,
                &[CellRange::single(1, "B"), CellRange::new(3, cells(&["D", "E", "F"]))],
            )
            .unwrap();
        let row = store.read_row(Sheet::Appointments, pos).unwrap().unwrap();
        assert_eq!(row.cells, cells(&["a", "B", "c", "D", "E", "F"]));
    }

    #[test]
    fn update_row_on_missing_row_writes_nothing() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let err = store
            .update_row(Sheet::Appointments, 3, &[CellRange::single(0, "x"), CellRange::single(2, "y")])
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
        assert!(store.read_rows(Sheet::Appointments).unwrap().is_empty());
    }

    #[test]
    fn redeeming_append_rejects_reused_order() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let first = store
            .append_row_redeeming(Sheet::Appointments, &cells(&["paid"]), "5O1")
            .unwrap();
        assert_eq!(first, 1);

        let err = store
            .append_row_redeeming(Sheet::Appointments, &cells(&["again"]), "5O1")
            .unwrap_err();
        assert!(matches!(err, DatabaseError::OrderRedeemed(ref id) if id == "5O1"));
        assert_eq!(store.read_rows(Sheet::Appointments).unwrap().len(), 1);

        let other = store
            .append_row_redeeming(Sheet::Appointments, &cells(&["other"]), "5O2")
            .unwrap();
        assert_eq!(other, 2);
    }

    #[test]
    fn concurrent_appends_never_share_a_position() {
        use std::sync::Arc;

        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .append_row(Sheet::Appointments, &[format!("row-{i}")])
                        .unwrap()
                })
            })
            .collect();

        let mut positions: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        positions.sort_unstable();
        assert_eq!(positions, (1..=8).collect::<Vec<u32>>());
    }
}
