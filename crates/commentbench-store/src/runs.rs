//! Append-only run history, one slice per record.
//!
//! Each record owns a slice: the runs recorded so far plus a single-writer
//! lock. Attempt numbers are assigned only while holding that lock, so they
//! stay gapless and strictly increasing per record no matter how many batches
//! are in flight. Unrelated records never share a lock beyond the brief map
//! lookup.
//!
//! Persistent stores keep one JSON-lines journal per record under the runs
//! directory. Journals are replayed by [`RunStore::open`]; each append is
//! flushed before the run becomes visible to readers. A failed append is
//! rolled back to the last complete line, and a torn final line left by a
//! crash is cut off on replay.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use commentbench_core::{Prediction, RecordId, Run};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::{GroundTruthTable, StoreError};

const JOURNAL_EXTENSION: &str = "jsonl";

/// Outcome of one successful invocation, before it gets an attempt number.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub prediction: Prediction,
    pub latency_ms: Option<f64>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status_code: Option<u16>,
}

#[derive(Debug)]
struct Journal {
    path: Option<PathBuf>,
    file: Option<File>,
}

impl Journal {
    async fn append(&mut self, line: &[u8]) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                self.file.insert(file)
            }
        };

        let len = file.metadata().await?.len();
        let written = async {
            file.write_all(line).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            let rollback = file.set_len(len).await;
            self.file = None;
            if let Err(rollback) = rollback {
                warn!(path = %path.display(), error = %rollback, "could not roll back partial journal line");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

#[derive(Debug)]
struct RecordSlice {
    writer: Arc<Mutex<Journal>>,
    runs: RwLock<Vec<Run>>,
}

impl RecordSlice {
    fn new(journal: Option<PathBuf>, runs: Vec<Run>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Journal {
                path: journal,
                file: None,
            })),
            runs: RwLock::new(runs),
        }
    }

    fn snapshot(&self) -> Vec<Run> {
        self.runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Exclusive append handle for one record's history.
///
/// Hold it for the duration of a batch: other writers for the same record
/// wait, readers keep seeing every run appended so far.
pub struct RecordWriter {
    record_id: RecordId,
    slice: Arc<RecordSlice>,
    journal: OwnedMutexGuard<Journal>,
}

impl RecordWriter {
    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    /// Attempt number the next append will receive.
    pub fn next_attempt(&self) -> u32 {
        self.slice
            .runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map_or(1, |run| run.attempt + 1)
    }

    /// Persist one run under the next attempt number and return it.
    pub async fn append(&mut self, new: NewRun) -> Result<Run, StoreError> {
        let run = Run {
            record_id: self.record_id.clone(),
            attempt: self.next_attempt(),
            prediction: new.prediction,
            latency_ms: new.latency_ms,
            start_time: new.start_time,
            end_time: new.end_time,
            status_code: new.status_code,
        };

        let mut line = serde_json::to_vec(&run)?;
        line.push(b'\n');
        self.journal.append(&line).await?;

        self.slice
            .runs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(run.clone());
        debug!(record_id = %run.record_id, attempt = run.attempt, "run persisted");
        Ok(run)
    }
}

/// Append-only store of every run, keyed by record id.
#[derive(Debug)]
pub struct RunStore {
    dir: Option<PathBuf>,
    slices: RwLock<HashMap<RecordId, Arc<RecordSlice>>>,
}

impl RunStore {
    /// A store that keeps runs in memory only.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            slices: RwLock::new(HashMap::new()),
        }
    }

    /// Open (or create) a journal directory and replay every record journal.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;

        let mut slices = HashMap::new();
        let mut total_runs = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(JOURNAL_EXTENSION) {
                continue;
            }
            let runs = replay_journal(&path)?;
            let Some(first) = runs.first() else {
                continue;
            };
            let record_id = first.record_id.clone();
            let expected = journal_file_name(&record_id);
            if path.file_name().and_then(|n| n.to_str()) != Some(expected.as_str()) {
                return Err(StoreError::MisnamedJournal {
                    path,
                    record_id,
                    expected,
                });
            }
            total_runs += runs.len();
            match slices.entry(record_id) {
                Entry::Occupied(entry) => {
                    return Err(StoreError::DuplicateJournal {
                        path,
                        record_id: entry.key().clone(),
                    });
                }
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(RecordSlice::new(Some(path), runs)));
                }
            }
        }

        info!(
            dir = %dir.display(),
            records = slices.len(),
            runs = total_runs,
            "replayed run journals"
        );
        Ok(Self {
            dir: Some(dir.to_path_buf()),
            slices: RwLock::new(slices),
        })
    }

    fn slice(&self, id: &RecordId) -> Option<Arc<RecordSlice>> {
        self.slices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn slice_or_insert(&self, id: &RecordId) -> Arc<RecordSlice> {
        if let Some(slice) = self.slice(id) {
            return slice;
        }
        let journal = self
            .dir
            .as_ref()
            .map(|dir| dir.join(journal_file_name(id)));
        self.slices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_insert_with(|| Arc::new(RecordSlice::new(journal, Vec::new())))
            .clone()
    }

    /// Take the single-writer handle for a record, waiting for any batch
    /// already writing to it.
    pub async fn writer(&self, id: &RecordId) -> RecordWriter {
        let slice = self.slice_or_insert(id);
        let journal = Arc::clone(&slice.writer).lock_owned().await;
        RecordWriter {
            record_id: id.clone(),
            slice,
            journal,
        }
    }

    /// Every run for a record, in attempt order.
    pub fn runs(&self, id: &RecordId) -> Vec<Run> {
        self.slice(id).map(|s| s.snapshot()).unwrap_or_default()
    }

    /// The most recent `limit` runs (all when `None`), plus the full count.
    pub fn recent_runs(&self, id: &RecordId, limit: Option<usize>) -> (Vec<Run>, usize) {
        let mut runs = self.runs(id);
        let total = runs.len();
        if let Some(limit) = limit
            && limit < total
        {
            runs.drain(..total - limit);
        }
        (runs, total)
    }

    pub fn latest_run(&self, id: &RecordId) -> Option<Run> {
        let slice = self.slice(id)?;
        let runs = slice.runs.read().unwrap_or_else(PoisonError::into_inner);
        runs.last().cloned()
    }

    pub fn run_count(&self, id: &RecordId) -> usize {
        self.slice(id).map_or(0, |s| {
            s.runs.read().unwrap_or_else(PoisonError::into_inner).len()
        })
    }

    /// Records that have runs but no ground-truth row, sorted.
    pub fn orphans(&self, truth: &GroundTruthTable) -> Vec<RecordId> {
        let slices = self.slices.read().unwrap_or_else(PoisonError::into_inner);
        let mut orphans: Vec<RecordId> = slices
            .iter()
            .filter(|(id, slice)| {
                truth.get(id.as_str()).is_none()
                    && !slice
                        .runs
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .is_empty()
            })
            .map(|(id, _)| id.clone())
            .collect();
        orphans.sort();
        orphans
    }
}

/// Journal file name for a record id. Characters outside `[A-Za-z0-9_-]` are
/// percent-escaped byte by byte so any id maps to a distinct, safe name.
pub fn journal_file_name(id: &RecordId) -> String {
    let mut name = String::with_capacity(id.as_str().len() + 6);
    for byte in id.as_str().bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name.push('.');
    name.push_str(JOURNAL_EXTENSION);
    name
}

fn replay_journal(path: &Path) -> Result<Vec<Run>, StoreError> {
    let contents = std::fs::read_to_string(path)?;
    let mut runs: Vec<Run> = Vec::new();
    let mut offset = 0;
    for (i, raw) in contents.split_inclusive('\n').enumerate() {
        let start = offset;
        offset += raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        let run: Run = match serde_json::from_str(line) {
            Ok(run) => run,
            // Unterminated last line: an append that never finished.
            Err(_) if !raw.ends_with('\n') => {
                warn!(
                    path = %path.display(),
                    line = i + 1,
                    bytes = raw.len(),
                    "dropping torn journal line"
                );
                std::fs::OpenOptions::new()
                    .write(true)
                    .open(path)?
                    .set_len(start as u64)?;
                break;
            }
            Err(source) => {
                return Err(StoreError::CorruptJournal {
                    path: path.to_path_buf(),
                    line: i + 1,
                    source,
                });
            }
        };
        if let Some(first) = runs.first()
            && first.record_id != run.record_id
        {
            return Err(StoreError::MixedJournal {
                path: path.to_path_buf(),
                first: first.record_id.clone(),
                other: run.record_id,
            });
        }
        let expected = runs.last().map_or(1, |r| r.attempt + 1);
        if run.attempt != expected {
            return Err(StoreError::AttemptOutOfSequence {
                path: path.to_path_buf(),
                expected,
                found: run.attempt,
            });
        }
        runs.push(run);
    }
    Ok(runs)
}
