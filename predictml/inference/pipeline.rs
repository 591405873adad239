use std::sync::Arc;

use predictml_features::{CategoricalField, FeatureError, ModelFamily, PredictionInput};
use predictml_history::{NewPrediction, PredictionSink};
use serde::Serialize;
use serde_json::json;
use shared_telemetry::{LogLevel, Telemetry};

use crate::{
    artifacts::ArtifactBundle,
    catalogue,
    error::{ErrorClass, PredictError},
    postprocess::{PredictionDetail, RequestFacts},
};

/// Packaged prediction returned to the caller.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PredictionResult {
    /// Family that produced the prediction.
    pub model: ModelFamily,
    /// Artifact version tag.
    pub model_version: String,
    /// Post-processed prediction.
    pub prediction: f64,
    /// Model output before post-processing.
    pub raw_score: f64,
    /// Unit of `prediction`.
    pub unit: &'static str,
    /// Present for simulated families.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Family extras.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<PredictionDetail>,
}

/// One parametrised pipeline for every family.
///
/// Holds only immutable state, so a single instance serves concurrent requests.
pub struct PredictionPipeline {
    bundle: Arc<ArtifactBundle>,
    sink: Option<Arc<dyn PredictionSink>>,
    telemetry: Telemetry,
}

impl PredictionPipeline {
    /// Pipeline over a loaded bundle. Without a sink nothing is recorded.
    #[must_use]
    pub fn new(
        bundle: Arc<ArtifactBundle>,
        sink: Option<Arc<dyn PredictionSink>>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            bundle,
            sink,
            telemetry,
        }
    }

    /// Shared artifact bundle.
    #[must_use]
    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// validate, encode, build, scale, score, post-process, package, record.
    pub fn run(&self, input: &PredictionInput) -> Result<PredictionResult, PredictError> {
        let family = input.family();
        match self.evaluate(input) {
            Ok(result) => {
                self.record(input, &result);
                let _ = self.telemetry.event(
                    "prediction.completed",
                    json!({
                        "model": family,
                        "version": result.model_version,
                        "prediction": result.prediction,
                    }),
                );
                Ok(result)
            }
            Err(err) => {
                let level = match err.class() {
                    ErrorClass::Client => LogLevel::Warn,
                    ErrorClass::Internal => LogLevel::Error,
                };
                let _ = self.telemetry.log(
                    level,
                    "prediction.failed",
                    json!({ "model": family, "class": err.class(), "error": err.to_string() }),
                );
                Err(err)
            }
        }
    }

    fn evaluate(&self, input: &PredictionInput) -> Result<PredictionResult, PredictError> {
        input.validate()?;
        let family = input.family();
        let artifacts = self.bundle.family(family)?;
        let built = self.bundle.builder().build(input)?;
        for field in built.defaulted() {
            let _ = self.telemetry.log(
                LogLevel::Debug,
                "category.defaulted",
                json!({ "model": family, "field": field, "value": raw_category(input, field) }),
            );
        }
        let scaled = artifacts.scaler.apply(&built.vector)?;
        if scaled.len() != artifacts.model.input_dim() {
            return Err(FeatureError::ShapeMismatch {
                family,
                expected: artifacts.model.input_dim(),
                actual: scaled.len(),
            }
            .into());
        }
        let score = artifacts.model.score(&scaled);
        let facts = request_facts(input, built.code(CategoricalField::Location));
        let outcome = artifacts.postprocess.apply(score, &facts);
        Ok(PredictionResult {
            model: family,
            model_version: artifacts.version.clone(),
            prediction: outcome.prediction,
            raw_score: score.value,
            unit: catalogue::unit(family),
            confidence: outcome.confidence,
            details: outcome.detail,
        })
    }

    fn record(&self, input: &PredictionInput, result: &PredictionResult) {
        if let Some(sink) = &self.sink {
            sink.submit(NewPrediction {
                model_name: result.model.as_str().to_string(),
                model_version: result.model_version.clone(),
                input_data: input.echo(),
                prediction: result.prediction,
                confidence: result.confidence,
            });
        }
    }
}

fn request_facts(input: &PredictionInput, location_code: Option<u32>) -> RequestFacts {
    match input {
        PredictionInput::HousePrice(_) => RequestFacts {
            location_code,
            ..RequestFacts::default()
        },
        PredictionInput::Salary(salary) => RequestFacts {
            skill_count: salary.skills.len(),
            ..RequestFacts::default()
        },
        PredictionInput::CropYield(_) => RequestFacts::default(),
        PredictionInput::Stock(stock) => RequestFacts {
            current_price: stock.current_price,
            days_ahead: stock.days_ahead,
            ..RequestFacts::default()
        },
        PredictionInput::Weather(weather) => RequestFacts {
            days_ahead: weather.days_ahead,
            ..RequestFacts::default()
        },
    }
}

fn raw_category(input: &PredictionInput, field: CategoricalField) -> Option<&str> {
    match (input, field) {
        (PredictionInput::HousePrice(house), CategoricalField::City) => Some(house.city.as_str()),
        (PredictionInput::HousePrice(house), CategoricalField::Location) => {
            house.location.as_deref()
        }
        (PredictionInput::Salary(salary), CategoricalField::EducationLevel) => {
            Some(salary.education_level.as_str())
        }
        (PredictionInput::Salary(salary), CategoricalField::JobType) => Some(salary.job_type.as_str()),
        (PredictionInput::CropYield(crop), CategoricalField::CropType) => Some(crop.crop_type.as_str()),
        (PredictionInput::CropYield(crop), CategoricalField::State) => Some(crop.state.as_str()),
        _ => None,
    }
}
