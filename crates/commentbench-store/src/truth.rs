//! The ground-truth table: human-reviewed records, keyed by id.
//!
//! Loaded once per session and read-only afterwards. Corrections made by the
//! review workflow are picked up on the next load.

use std::collections::HashMap;
use std::path::Path;

use commentbench_core::{GroundTruthRecord, RecordId};
use tracing::info;

use crate::StoreError;

/// Ground-truth records in file order, with an id index.
#[derive(Debug, Default)]
pub struct GroundTruthTable {
    records: Vec<GroundTruthRecord>,
    index: HashMap<RecordId, usize>,
}

impl GroundTruthTable {
    /// Build a table, rejecting duplicate ids.
    pub fn new(records: Vec<GroundTruthRecord>) -> Result<Self, StoreError> {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if index.insert(record.id.clone(), i).is_some() {
                return Err(StoreError::DuplicateRecord(record.id.clone()));
            }
        }
        Ok(Self { records, index })
    }

    /// Load a ground-truth file, choosing the reader by extension.
    ///
    /// `.json` holds an array of records. `.csv` is imported through DuckDB and
    /// needs the `duckdb` feature.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::GroundTruthNotFound(path.to_path_buf()));
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let table = match extension.as_deref() {
            Some("json") => Self::load_json(path)?,
            Some("csv") => Self::load_csv(path)?,
            _ => return Err(StoreError::UnsupportedFormat(path.to_path_buf())),
        };
        info!(path = %path.display(), records = table.len(), "loaded ground truth");
        Ok(table)
    }

    /// Load a JSON array of records.
    pub fn load_json(path: &Path) -> Result<Self, StoreError> {
        let bytes = std::fs::read(path)?;
        let records: Vec<GroundTruthRecord> = serde_json::from_slice(&bytes)?;
        Self::new(records)
    }

    #[cfg(feature = "duckdb")]
    fn load_csv(path: &Path) -> Result<Self, StoreError> {
        let duck = crate::DuckTruthStore::open()?;
        duck.load_csv(path)?;
        Self::new(duck.records()?)
    }

    #[cfg(not(feature = "duckdb"))]
    fn load_csv(path: &Path) -> Result<Self, StoreError> {
        Err(StoreError::CsvImportDisabled(path.to_path_buf()))
    }

    pub fn get(&self, id: &str) -> Option<&GroundTruthRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    /// Records in file order.
    pub fn records(&self) -> &[GroundTruthRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroundTruthRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
