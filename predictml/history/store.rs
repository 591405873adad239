use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use shared_telemetry::{LogLevel, Telemetry};

use crate::{error::HistoryError, records::PredictionRecord};

/// Append-only storage for prediction records.
///
/// Implementations must make concurrent `append` calls safe; no ordering is promised
/// between records appended concurrently.
pub trait PredictionStore: Send + Sync {
    /// Appends one record.
    fn append(&self, record: &PredictionRecord) -> Result<(), HistoryError>;

    /// Every record in append order.
    fn load_all(&self) -> Result<Vec<PredictionRecord>, HistoryError>;

    /// Newest `limit` records, newest first, optionally restricted to one model.
    fn recent(
        &self,
        model: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PredictionRecord>, HistoryError> {
        Ok(self
            .load_all()?
            .into_iter()
            .rev()
            .filter(|record| model.map_or(true, |name| record.model_name == name))
            .take(limit)
            .collect())
    }
}

/// JSON-lines file store. One line per record; writes are serialized by a mutex.
///
/// Lines that fail to decode (a torn write, a hand edit) are skipped on read and logged
/// at WARN with their line number, so one bad line never hides the rest of the history.
#[derive(Debug)]
pub struct JsonlPredictionStore {
    path: PathBuf,
    writer: Mutex<File>,
    telemetry: Telemetry,
}

impl JsonlPredictionStore {
    /// Opens or creates the store file, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
            telemetry: Telemetry::disabled("history"),
        })
    }

    /// Routes skipped-line warnings to `telemetry`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Store file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PredictionStore for JsonlPredictionStore {
    fn append(&self, record: &PredictionRecord) -> Result<(), HistoryError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<PredictionRecord>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PredictionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    let corrupt = HistoryError::Corrupt {
                        path: self.path.clone(),
                        line: idx + 1,
                        reason: err.to_string(),
                    };
                    let _ = self.telemetry.log(
                        LogLevel::Warn,
                        "history.line_skipped",
                        json!({ "line": idx + 1, "error": corrupt.to_string() }),
                    );
                }
            }
        }
        Ok(records)
    }
}

/// In-process store used by tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryPredictionStore {
    records: RwLock<Vec<PredictionRecord>>,
}

impl MemoryPredictionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True when nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl PredictionStore for MemoryPredictionStore {
    fn append(&self, record: &PredictionRecord) -> Result<(), HistoryError> {
        self.records.write().push(record.clone());
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<PredictionRecord>, HistoryError> {
        Ok(self.records.read().clone())
    }
}
