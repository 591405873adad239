#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Prediction pipeline: artifact bundle, scoring models, per-family post-processing
//! and the request pipeline that ties them to the recorder.

/// Pipeline and artifact errors.
#[path = "../error.rs"]
pub mod error;

/// Scoring model contract and implementations.
#[path = "../scoring.rs"]
pub mod scoring;

/// Post-processing rules.
#[path = "../postprocess.rs"]
pub mod postprocess;

/// Artifact documents and the loaded bundle.
#[path = "../artifacts.rs"]
pub mod artifacts;

/// Static model catalogue.
#[path = "../catalogue.rs"]
pub mod catalogue;

/// Request pipeline.
#[path = "../pipeline.rs"]
pub mod pipeline;

pub use artifacts::{ArtifactBundle, FamilyArtifacts, FamilyHealth, ModelArtifact, ModelSpec};
pub use catalogue::{CatalogueEntry, Metrics};
pub use error::{ArtifactError, ErrorClass, PredictError};
pub use pipeline::{PredictionPipeline, PredictionResult};
pub use postprocess::{PostProcess, PredictionDetail, WeatherCondition};
pub use scoring::{ModelKind, Score, ScoringModel};
