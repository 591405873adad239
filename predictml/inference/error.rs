use std::{io, path::PathBuf};

use predictml_features::{FeatureError, ModelFamily};
use serde::Serialize;
use thiserror::Error;

/// Who is responsible for a failed request.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// The request itself was invalid.
    Client,
    /// The service or its artifacts are at fault.
    Internal,
}

/// Per-request pipeline failure. None of these stop the process.
#[derive(Debug, Error)]
pub enum PredictError {
    /// Encoding, validation, scaling or shape failure.
    #[error(transparent)]
    Feature(#[from] FeatureError),
    /// No artifacts were loaded for the family.
    #[error("model '{0}' is not loaded")]
    FamilyUnavailable(ModelFamily),
}

impl PredictError {
    /// Client or internal.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Feature(err) if err.is_client_error() => ErrorClass::Client,
            Self::Feature(_) | Self::FamilyUnavailable(_) => ErrorClass::Internal,
        }
    }
}

/// A model artifact could not be loaded or failed its startup checks.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// File missing or unreadable.
    #[error("artifact {} is unavailable: {source}", path.display())]
    Io {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// File is not a valid artifact document.
    #[error("artifact {} could not be parsed: {source}", path.display())]
    Parse {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The document declares another family than the one requested.
    #[error("artifact {} declares family {found}, expected {expected}", path.display())]
    WrongFamily {
        /// Artifact path.
        path: PathBuf,
        /// Family the file was loaded for.
        expected: ModelFamily,
        /// Family written in the file.
        found: ModelFamily,
    },
    /// Feature names differ from the family schema.
    #[error("{family} artifact was fitted on [{}], expected [{}]", found.join(", "), expected.join(", "))]
    Schema {
        /// Family.
        family: ModelFamily,
        /// Schema order.
        expected: Vec<String>,
        /// Order recorded in the artifact.
        found: Vec<String>,
    },
    /// Scaler or model dimension differs from the schema.
    #[error("{family} {component} expects {actual} features, schema has {expected}")]
    Dimension {
        /// Family.
        family: ModelFamily,
        /// `scaler` or `model`.
        component: &'static str,
        /// Schema dimension.
        expected: usize,
        /// Component dimension.
        actual: usize,
    },
    /// The scoring model is structurally invalid.
    #[error("{family} model is invalid: {reason}")]
    InvalidModel {
        /// Family.
        family: ModelFamily,
        /// What is wrong.
        reason: String,
    },
    /// A vocabulary override could not be applied.
    #[error("{family} vocabulary override rejected: {reason}")]
    Vocabulary {
        /// Family.
        family: ModelFamily,
        /// What is wrong.
        reason: String,
    },
}
