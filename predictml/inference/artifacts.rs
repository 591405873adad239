use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use predictml_features::{
    CategoricalEncoder, CategoricalField, FeatureVectorBuilder, ModelFamily, ScalingTransform,
};
use predictml_history::VersionSeed;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ArtifactError, PredictError},
    postprocess::PostProcess,
    scoring::{
        LinearModel, ModelKind, ScoringModel, StockSimulator, TreeEnsemble, WeatherSimulator,
    },
};

/// Scoring model section of an artifact, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Linear regression.
    Linear(LinearModel),
    /// Tree ensemble.
    TreeEnsemble(TreeEnsemble),
    /// Stock simulator.
    StockSimulation(StockSimulator),
    /// Weather simulator.
    WeatherSimulation(WeatherSimulator),
}

impl ModelSpec {
    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Linear(model) => model.validate(),
            Self::TreeEnsemble(model) => model.validate(),
            Self::StockSimulation(model) => model.validate(),
            Self::WeatherSimulation(model) => model.validate(),
        }
    }

    fn volatility(&self) -> f64 {
        match self {
            Self::StockSimulation(model) => model.volatility(),
            _ => 0.0,
        }
    }

    fn into_scoring(self) -> Arc<dyn ScoringModel> {
        match self {
            Self::Linear(model) => Arc::new(model),
            Self::TreeEnsemble(model) => Arc::new(model),
            Self::StockSimulation(model) => Arc::new(model),
            Self::WeatherSimulation(model) => Arc::new(model),
        }
    }
}

/// On-disk artifact document, `<family>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    /// Family the artifact was fitted for.
    pub family: ModelFamily,
    /// Version tag recorded with every prediction.
    pub version: String,
    /// Human-readable model description.
    #[serde(default)]
    pub description: Option<String>,
    /// Offline accuracy.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Feature order the scaler and model were fitted on.
    pub feature_names: Vec<String>,
    /// Fitted scaler; simulated families may omit it to get the identity transform.
    #[serde(default)]
    pub scaler: Option<ScalingTransform>,
    /// Scoring model.
    pub model: ModelSpec,
    /// Vocabulary overrides keyed by request field name.
    #[serde(default)]
    pub vocabulary: IndexMap<String, IndexMap<String, u32>>,
}

impl ModelArtifact {
    /// Reads one artifact file.
    pub fn read(path: &Path) -> Result<Self, ArtifactError> {
        let data = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| ArtifactError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Loaded, validated components for one family.
#[derive(Debug, Clone)]
pub struct FamilyArtifacts {
    /// Version tag.
    pub version: String,
    /// Description.
    pub description: Option<String>,
    /// Offline accuracy.
    pub accuracy: Option<f64>,
    /// Fitted scaler.
    pub scaler: ScalingTransform,
    /// Scoring model.
    pub model: Arc<dyn ScoringModel>,
    /// Post-processing rule.
    pub postprocess: PostProcess,
}

/// Loaded family summary for health output.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FamilyHealth {
    /// Family.
    pub model: ModelFamily,
    /// Version tag.
    pub version: String,
    /// Scoring implementation.
    pub kind: ModelKind,
    /// Vector length.
    pub features: usize,
}

/// Immutable set of everything the pipeline needs, shared across requests.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    builder: FeatureVectorBuilder,
    families: IndexMap<ModelFamily, FamilyArtifacts>,
}

impl ArtifactBundle {
    /// Loads `<family>.json` for every family from `dir`. Any failure is fatal.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref();
        let artifacts = ModelFamily::ALL
            .into_iter()
            .map(|family| {
                let path = artifact_path(dir, family);
                let artifact = ModelArtifact::read(&path)?;
                if artifact.family != family {
                    return Err(ArtifactError::WrongFamily {
                        path,
                        expected: family,
                        found: artifact.family,
                    });
                }
                Ok(artifact)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_artifacts(artifacts)
    }

    /// Validates artifact documents against the family schemas and assembles a bundle.
    pub fn from_artifacts(
        artifacts: impl IntoIterator<Item = ModelArtifact>,
    ) -> Result<Self, ArtifactError> {
        let mut encoder = CategoricalEncoder::standard();
        let mut families = IndexMap::new();
        for artifact in artifacts {
            let family = artifact.family;
            let expected = family.feature_names();
            if artifact.feature_names != expected {
                return Err(ArtifactError::Schema {
                    family,
                    expected: expected.iter().map(ToString::to_string).collect(),
                    found: artifact.feature_names,
                });
            }
            let scaler = artifact
                .scaler
                .unwrap_or_else(|| ScalingTransform::identity(family.dimension()));
            check_dimension(family, "scaler", scaler.dimension())?;
            artifact
                .model
                .validate()
                .map_err(|reason| ArtifactError::InvalidModel { family, reason })?;
            for (field_name, codes) in &artifact.vocabulary {
                let field = family
                    .categorical_fields()
                    .iter()
                    .copied()
                    .find(|field| field.as_str() == field_name)
                    .ok_or_else(|| ArtifactError::Vocabulary {
                        family,
                        reason: format!("{family} has no categorical field '{field_name}'"),
                    })?;
                apply_override(&mut encoder, family, field, codes)?;
            }
            let postprocess = PostProcess::for_family(family, artifact.model.volatility());
            let model = artifact.model.into_scoring();
            check_dimension(family, "model", model.input_dim())?;
            families.insert(
                family,
                FamilyArtifacts {
                    version: artifact.version,
                    description: artifact.description,
                    accuracy: artifact.accuracy,
                    scaler,
                    model,
                    postprocess,
                },
            );
        }
        Ok(Self::from_parts(FeatureVectorBuilder::new(encoder), families))
    }

    /// Assembles a bundle without schema checks.
    #[must_use]
    pub fn from_parts(
        builder: FeatureVectorBuilder,
        families: IndexMap<ModelFamily, FamilyArtifacts>,
    ) -> Self {
        Self { builder, families }
    }

    /// Feature builder carrying the effective vocabularies.
    #[must_use]
    pub const fn builder(&self) -> &FeatureVectorBuilder {
        &self.builder
    }

    /// Components for one family.
    pub fn family(&self, family: ModelFamily) -> Result<&FamilyArtifacts, PredictError> {
        self.families
            .get(&family)
            .ok_or(PredictError::FamilyUnavailable(family))
    }

    /// Loaded families in load order.
    pub fn families(&self) -> impl Iterator<Item = ModelFamily> + '_ {
        self.families.keys().copied()
    }

    /// Registry seeds derived from the loaded artifacts.
    #[must_use]
    pub fn version_seeds(&self) -> Vec<VersionSeed> {
        self.families
            .iter()
            .map(|(family, artifacts)| VersionSeed {
                model_name: family.as_str().to_string(),
                version: artifacts.version.clone(),
                description: artifacts.description.clone(),
                accuracy: artifacts.accuracy,
            })
            .collect()
    }

    /// Loaded family summaries.
    #[must_use]
    pub fn health(&self) -> Vec<FamilyHealth> {
        self.families
            .iter()
            .map(|(family, artifacts)| FamilyHealth {
                model: *family,
                version: artifacts.version.clone(),
                kind: artifacts.model.kind(),
                features: artifacts.model.input_dim(),
            })
            .collect()
    }
}

/// Conventional artifact location for a family.
#[must_use]
pub fn artifact_path(dir: &Path, family: ModelFamily) -> PathBuf {
    dir.join(format!("{}.json", family.as_str()))
}

fn check_dimension(
    family: ModelFamily,
    component: &'static str,
    actual: usize,
) -> Result<(), ArtifactError> {
    if actual == family.dimension() {
        Ok(())
    } else {
        Err(ArtifactError::Dimension {
            family,
            component,
            expected: family.dimension(),
            actual,
        })
    }
}

fn apply_override(
    encoder: &mut CategoricalEncoder,
    family: ModelFamily,
    field: CategoricalField,
    codes: &IndexMap<String, u32>,
) -> Result<(), ArtifactError> {
    if codes.is_empty() {
        return Err(ArtifactError::Vocabulary {
            family,
            reason: format!("{field} override is empty"),
        });
    }
    encoder
        .replace_codes(family, field, codes)
        .map_err(|err| ArtifactError::Vocabulary {
            family,
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn shipped_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("artifacts")
    }

    fn stock_artifact() -> serde_json::Value {
        json!({
            "family": "stock",
            "version": "v1.0",
            "feature_names": ["current_price", "days_ahead"],
            "model": { "kind": "stock_simulation" }
        })
    }

    #[test]
    fn shipped_artifacts_load() {
        let bundle = ArtifactBundle::load_dir(shipped_dir()).unwrap();
        assert_eq!(bundle.families().count(), 5);
        for family in ModelFamily::ALL {
            let artifacts = bundle.family(family).unwrap();
            assert_eq!(artifacts.scaler.dimension(), family.dimension());
            assert_eq!(artifacts.model.input_dim(), family.dimension());
        }
        let seeds = bundle.version_seeds();
        assert_eq!(seeds[0].model_name, "house_price");
        assert!(seeds.iter().all(|seed| seed.version == "v1.0"));
        assert_eq!(
            bundle.family(ModelFamily::Stock).unwrap().postprocess,
            PostProcess::StockBand { volatility: 0.02 }
        );
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let err = ArtifactBundle::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }

    #[test]
    fn wrong_family_tag_is_rejected() {
        let dir = tempdir().unwrap();
        for family in ModelFamily::ALL {
            fs::copy(
                artifact_path(&shipped_dir(), family),
                artifact_path(dir.path(), family),
            )
            .unwrap();
        }
        fs::write(
            artifact_path(dir.path(), ModelFamily::Weather),
            serde_json::to_vec(&stock_artifact()).unwrap(),
        )
        .unwrap();
        let err = ArtifactBundle::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::WrongFamily { .. }));
    }

    #[test]
    fn reordered_features_are_rejected() {
        let mut doc = stock_artifact();
        doc["feature_names"] = json!(["days_ahead", "current_price"]);
        let artifact: ModelArtifact = serde_json::from_value(doc).unwrap();
        let err = ArtifactBundle::from_artifacts([artifact]).unwrap_err();
        assert!(matches!(err, ArtifactError::Schema { .. }));
    }

    #[test]
    fn scaler_dimension_must_match_schema() {
        let mut doc = stock_artifact();
        doc["scaler"] = json!({ "mean": [0.0, 0.0, 0.0], "scale": [1.0, 1.0, 1.0] });
        let artifact: ModelArtifact = serde_json::from_value(doc).unwrap();
        match ArtifactBundle::from_artifacts([artifact]).unwrap_err() {
            ArtifactError::Dimension {
                component,
                expected,
                actual,
                ..
            } => {
                assert_eq!(component, "scaler");
                assert_eq!((expected, actual), (2, 3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn model_dimension_must_match_schema() {
        let artifact: ModelArtifact = serde_json::from_value(json!({
            "family": "salary",
            "version": "v1.0",
            "feature_names": ["experience_years", "education_code", "job_code", "city_tier", "skill_count"],
            "model": { "kind": "linear", "weights": [1.0, 2.0], "bias": 0.0 }
        }))
        .unwrap();
        assert!(matches!(
            ArtifactBundle::from_artifacts([artifact]).unwrap_err(),
            ArtifactError::Dimension { component: "model", .. }
        ));
    }

    #[test]
    fn location_override_replaces_codes() {
        let mut house = ModelArtifact::read(&artifact_path(&shipped_dir(), ModelFamily::HousePrice))
            .unwrap();
        house.vocabulary.insert(
            "location".into(),
            [("metro".to_string(), 0), ("village".to_string(), 1)]
                .into_iter()
                .collect(),
        );
        let bundle = ArtifactBundle::from_artifacts([house.clone()]).unwrap();
        let encoder = bundle.builder().encoder();
        assert_eq!(
            encoder
                .encode(ModelFamily::HousePrice, CategoricalField::Location, "Village")
                .unwrap()
                .code,
            1
        );
        assert!(encoder
            .encode(ModelFamily::HousePrice, CategoricalField::Location, "urban")
            .is_err());

        house.vocabulary.clear();
        house.vocabulary.insert("job_type".into(), IndexMap::new());
        assert!(matches!(
            ArtifactBundle::from_artifacts([house]).unwrap_err(),
            ArtifactError::Vocabulary { .. }
        ));
    }
}
