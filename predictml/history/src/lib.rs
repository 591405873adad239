#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Prediction history: append-only records, the per-model version registry, the
//! fire-and-forget recorder and reporting aggregates.

/// Storage errors.
#[path = "../error.rs"]
pub mod error;

/// Record types.
#[path = "../records.rs"]
pub mod records;

/// Append-only record stores.
#[path = "../store.rs"]
pub mod store;

/// Model version descriptors.
#[path = "../registry.rs"]
pub mod registry;

/// Background recorder.
#[path = "../recorder.rs"]
pub mod recorder;

/// Reporting aggregates.
#[path = "../stats.rs"]
pub mod stats;

pub use error::HistoryError;
pub use records::{ModelVersionDescriptor, NewPrediction, PredictionRecord, VersionSeed};
pub use recorder::{PredictionRecorder, PredictionSink, RecorderHandle, RecorderSummary};
pub use registry::ModelVersionRegistry;
pub use stats::{HistoryStats, ModelStats};
pub use store::{JsonlPredictionStore, MemoryPredictionStore, PredictionStore};
