//! DuckDB import path for the ground-truth CSV.
//!
//! The review workflow maintains `ground_truth.csv` with one row per comment:
//! `id, comment_text, patient_prioritized, patient_ready, patient_short_notice,
//! availability_periods`. Label cells are `true`/`false`/`null` strings and
//! `availability_periods` is a JSON list (or `null`). Every column is read as
//! VARCHAR and interpreted by the core model types.

use std::path::Path;

use commentbench_core::{Availability, FieldValue, GroundTruthRecord, Labels, RecordId};
use duckdb::Connection;
use serde_json::Value;
use tracing::info;

use crate::StoreError;

/// In-memory DuckDB database holding one imported ground-truth CSV.
pub struct DuckTruthStore {
    conn: Connection,
}

struct RawRow {
    id: Option<String>,
    comment_text: Option<String>,
    patient_prioritized: Option<String>,
    patient_ready: Option<String>,
    patient_short_notice: Option<String>,
    availability_periods: Option<String>,
}

impl DuckTruthStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Import a ground-truth CSV into the `ground_truth` table, replacing any
    /// previous import. Returns the number of rows loaded.
    pub fn load_csv(&self, path: &Path) -> Result<usize, StoreError> {
        if !path.exists() {
            return Err(StoreError::GroundTruthNotFound(path.to_path_buf()));
        }
        let sql = format!(
            "CREATE OR REPLACE TABLE ground_truth AS \
             SELECT * FROM read_csv('{}', header = true, all_varchar = true)",
            sql_escape(&path.display().to_string())
        );
        self.conn.execute_batch(&sql)?;
        let count = self.ground_truth_count()?;
        info!(count, path = %path.display(), "imported ground truth csv");
        Ok(count)
    }

    /// Number of rows in the `ground_truth` table.
    fn ground_truth_count(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.conn
                .query_row("SELECT count(*)::BIGINT FROM ground_truth", [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }

    /// All imported records, in file order.
    pub fn records(&self) -> Result<Vec<GroundTruthRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, comment_text, patient_prioritized, patient_ready, \
             patient_short_notice, availability_periods FROM ground_truth",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RawRow {
                id: row.get(0)?,
                comment_text: row.get(1)?,
                patient_prioritized: row.get(2)?,
                patient_ready: row.get(3)?,
                patient_short_notice: row.get(4)?,
                availability_periods: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for (i, row) in rows.enumerate() {
            records.push(to_record(row?, i + 1)?);
        }
        Ok(records)
    }
}

fn to_record(raw: RawRow, row_number: usize) -> Result<GroundTruthRecord, StoreError> {
    let id = raw
        .id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StoreError::InvalidCell {
            id: format!("row {row_number}"),
            column: "id",
            message: "missing id".to_string(),
        })?;

    let availability_periods = raw
        .availability_periods
        .map_or(Availability::Absent, |cell| Availability::from(Value::String(cell)));

    Ok(GroundTruthRecord {
        id: RecordId::new(id),
        comment_text: raw.comment_text.unwrap_or_default(),
        truth: Labels {
            patient_prioritized: label_cell(raw.patient_prioritized),
            patient_ready: label_cell(raw.patient_ready),
            patient_short_notice: label_cell(raw.patient_short_notice),
            availability_periods,
        },
    })
}

/// CSV label cells are strings; the normalizer reads `"true"` as true.
fn label_cell(cell: Option<String>) -> FieldValue {
    cell.map_or(FieldValue::Absent, |s| FieldValue::from(Value::String(s)))
}

/// Escape a string for use in SQL single-quoted literals.
fn sql_escape(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use commentbench_core::{Symbol, TrackedField};

    const CSV: &str = "\
id,comment_text,patient_prioritized,patient_ready,patient_short_notice,availability_periods
1,\"PRIO, kort varsel.\",true,null,true,null
2,Disponibel fra oktober.,false,false,false,\"[{\"\"type\"\": \"\"available\"\", \"\"start_date\"\": \"\"2025-10-01\"\", \"\"end_date\"\": null}]\"
3,Ikke kort varsel.,false,,false,[]
";

    fn write_csv(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("ground_truth.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn records_before_import_error() {
        let store = DuckTruthStore::open().unwrap();
        assert!(matches!(store.records(), Err(StoreError::DuckDb(_))));
    }

    #[test]
    fn load_missing_file_errors() {
        let store = DuckTruthStore::open().unwrap();
        let result = store.load_csv(Path::new("/nonexistent/ground_truth.csv"));
        assert!(matches!(result, Err(StoreError::GroundTruthNotFound(_))));
    }

    #[test]
    fn load_csv_reads_labels_and_periods() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_csv(tmp.path(), CSV);
        let store = DuckTruthStore::open().unwrap();

        assert_eq!(store.load_csv(&path).unwrap(), 3);
        let records = store.records().unwrap();
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.id.as_str(), "1");
        assert_eq!(first.comment_text, "PRIO, kort varsel.");
        assert_eq!(first.truth.symbol(TrackedField::PatientPrioritized), Symbol::True);
        assert_eq!(first.truth.symbol(TrackedField::PatientReady), Symbol::Null);
        assert_eq!(first.truth.symbol(TrackedField::Availability), Symbol::Null);

        let second = &records[1];
        assert_eq!(second.truth.symbol(TrackedField::Availability), Symbol::List);

        let third = &records[2];
        assert_eq!(third.truth.symbol(TrackedField::PatientReady), Symbol::Null);
        assert_eq!(third.truth.symbol(TrackedField::Availability), Symbol::Null);
    }

    #[test]
    fn irregular_availability_cells_keep_presence() {
        let tmp = tempfile::TempDir::new().unwrap();
        let body = "\
id,comment_text,patient_prioritized,patient_ready,patient_short_notice,availability_periods
8,x,true,true,true,\"[{\"\"type\"\": \"\"available\"\", \"\"start_date\"\": \"\"mid-October\"\"}]\"
9,y,true,true,true,not-json
10,z,true,true,true,None
";
        let path = write_csv(tmp.path(), body);
        let store = DuckTruthStore::open().unwrap();
        store.load_csv(&path).unwrap();
        let records = store.records().unwrap();

        assert_eq!(records[0].truth.symbol(TrackedField::Availability), Symbol::List);
        assert_eq!(records[1].truth.symbol(TrackedField::Availability), Symbol::List);
        assert_eq!(records[2].truth.symbol(TrackedField::Availability), Symbol::Null);
    }

    #[test]
    fn missing_id_names_the_row() {
        let tmp = tempfile::TempDir::new().unwrap();
        let body = "\
id,comment_text,patient_prioritized,patient_ready,patient_short_notice,availability_periods
1,a,true,true,true,null
,b,true,true,true,null
";
        let path = write_csv(tmp.path(), body);
        let store = DuckTruthStore::open().unwrap();
        store.load_csv(&path).unwrap();
        assert!(matches!(
            store.records(),
            Err(StoreError::InvalidCell { ref id, column: "id", .. }) if id == "row 2"
        ));
    }

    #[test]
    fn table_load_dispatches_csv_to_duckdb() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_csv(tmp.path(), CSV);
        let table = crate::GroundTruthTable::load(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("2").unwrap().comment_text, "Disponibel fra oktober.");
    }
}
