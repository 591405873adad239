use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted by the history subsystem.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Filesystem I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A stored line could not be decoded.
    #[error("corrupt history line {line} in {}: {reason}", path.display())]
    Corrupt {
        /// File being read.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Decoder message.
        reason: String,
    },
    /// The recorder worker is gone.
    #[error("prediction recorder is closed")]
    RecorderClosed,
}
