use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One recorded pipeline invocation. Never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Family name (`house_price`, `salary`, ...).
    pub model_name: String,
    /// Version tag of the artifact that produced the prediction.
    pub model_version: String,
    /// Caller-supplied fields.
    pub input_data: Map<String, Value>,
    /// Final post-processed prediction.
    pub prediction: f64,
    /// Present only for the simulated families.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Content handed to the recorder by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    /// Family name.
    pub model_name: String,
    /// Artifact version tag.
    pub model_version: String,
    /// Caller-supplied fields.
    pub input_data: Map<String, Value>,
    /// Final prediction.
    pub prediction: f64,
    /// Optional confidence.
    pub confidence: Option<f64>,
}

impl NewPrediction {
    /// Stamps id and creation time.
    #[must_use]
    pub fn into_record(self) -> PredictionRecord {
        PredictionRecord {
            id: Uuid::new_v4(),
            model_name: self.model_name,
            model_version: self.model_version,
            input_data: self.input_data,
            prediction: self.prediction,
            confidence: self.confidence,
            created_at: Utc::now(),
        }
    }
}

/// Current version metadata for one model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelVersionDescriptor {
    /// Unique model name.
    pub model_name: String,
    /// Version tag, e.g. `v1.0`.
    pub current_version: String,
    /// Human-readable description of the backing model.
    #[serde(default)]
    pub description: Option<String>,
    /// Offline accuracy score.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// First registration time.
    pub created_at: DateTime<Utc>,
    /// Last change time.
    pub updated_at: DateTime<Utc>,
}

/// Values used to create a descriptor when none exists yet.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSeed {
    /// Model name.
    pub model_name: String,
    /// Version tag.
    pub version: String,
    /// Description.
    pub description: Option<String>,
    /// Accuracy.
    pub accuracy: Option<f64>,
}

impl VersionSeed {
    /// Descriptor stamped with the current time.
    #[must_use]
    pub fn into_descriptor(self) -> ModelVersionDescriptor {
        let now = Utc::now();
        ModelVersionDescriptor {
            model_name: self.model_name,
            current_version: self.version,
            description: self.description,
            accuracy: self.accuracy,
            created_at: now,
            updated_at: now,
        }
    }
}
