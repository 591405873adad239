use thiserror::Error;

use crate::family::{CategoricalField, ModelFamily};

/// Errors raised while turning a validated input into a scaled feature vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// A closed-vocabulary field received a value outside its accepted set.
    #[error("invalid {field} '{value}'. Must be one of: {}", accepted.join(", "))]
    InvalidCategory {
        /// Offending field.
        field: CategoricalField,
        /// Value as supplied by the caller.
        value: String,
        /// Accepted keys in code order.
        accepted: Vec<String>,
    },
    /// A numeric field was NaN or infinite.
    #[error("field '{field}' must be a finite number")]
    NonFinite {
        /// Offending field.
        field: &'static str,
    },
    /// The vector length disagrees with the fitted artifact.
    #[error("{family} feature vector has {actual} values but the fitted artifact expects {expected}")]
    ShapeMismatch {
        /// Family being scored.
        family: ModelFamily,
        /// Fitted dimensionality.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },
    /// No vocabulary is registered for the family field.
    #[error("no vocabulary registered for {family}.{field}")]
    MissingVocabulary {
        /// Family being encoded.
        family: ModelFamily,
        /// Field without a vocabulary.
        field: CategoricalField,
    },
    /// Scaler parameters are unusable.
    #[error("invalid scaler: {0}")]
    InvalidScaler(String),
}

impl FeatureError {
    /// Whether the caller caused the error (as opposed to a deployment defect).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidCategory { .. } | Self::NonFinite { .. })
    }
}
