use serde::{Deserialize, Serialize};

use crate::{builder::FeatureVector, error::FeatureError};

/// Per-feature standardisation fitted offline: `(x - mean) / scale`.
///
/// Parameters are fixed after load, so applying the transform is a pure function of the
/// input vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ScalerDocument")]
pub struct ScalingTransform {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

#[derive(Deserialize)]
struct ScalerDocument {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl TryFrom<ScalerDocument> for ScalingTransform {
    type Error = FeatureError;

    fn try_from(document: ScalerDocument) -> Result<Self, Self::Error> {
        Self::new(document.mean, document.scale)
    }
}

impl ScalingTransform {
    /// Validates and wraps fitted parameters. A zero scale marks a constant feature and
    /// is treated as 1.
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, FeatureError> {
        if mean.len() != scale.len() {
            return Err(FeatureError::InvalidScaler(format!(
                "{} means but {} scales",
                mean.len(),
                scale.len()
            )));
        }
        if mean.is_empty() {
            return Err(FeatureError::InvalidScaler("no features".into()));
        }
        if mean.iter().chain(scale.iter()).any(|value| !value.is_finite()) {
            return Err(FeatureError::InvalidScaler("non-finite parameter".into()));
        }
        if scale.iter().any(|value| *value < 0.0) {
            return Err(FeatureError::InvalidScaler("negative scale".into()));
        }
        let scale = scale
            .into_iter()
            .map(|value| if value == 0.0 { 1.0 } else { value })
            .collect();
        Ok(Self { mean, scale })
    }

    /// Pass-through transform for families scored on raw values.
    #[must_use]
    pub fn identity(dimension: usize) -> Self {
        Self {
            mean: vec![0.0; dimension],
            scale: vec![1.0; dimension],
        }
    }

    /// Number of features the transform was fitted on.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Scales a vector. A length mismatch is a deployment defect, never silently truncated.
    pub fn apply(&self, vector: &FeatureVector) -> Result<Vec<f64>, FeatureError> {
        if vector.len() != self.dimension() {
            return Err(FeatureError::ShapeMismatch {
                family: vector.family(),
                expected: self.dimension(),
                actual: vector.len(),
            });
        }
        Ok(vector
            .values()
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect())
    }
}
