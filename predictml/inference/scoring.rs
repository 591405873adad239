use std::{f64::consts::PI, fmt};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Output of one scoring call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Primary raw prediction.
    pub value: f64,
    /// Secondary output travelling with the primary one (weather humidity).
    pub secondary: Option<f64>,
}

impl Score {
    /// Score without a secondary output.
    #[must_use]
    pub const fn single(value: f64) -> Self {
        Self {
            value,
            secondary: None,
        }
    }
}

/// Which implementation backs a family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Weighted sum plus bias.
    Linear,
    /// Regression trees, averaged or boosted.
    TreeEnsemble,
    /// Drift plus Gaussian noise on a price.
    StockSimulation,
    /// Mean reversion plus Gaussian noise on temperature and humidity.
    WeatherSimulation,
}

impl ModelKind {
    /// Artifact tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::TreeEnsemble => "tree_ensemble",
            Self::StockSimulation => "stock_simulation",
            Self::WeatherSimulation => "weather_simulation",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scaled feature vector in, raw prediction out.
///
/// Callers check `features.len() == input_dim()` before scoring; implementations may
/// assume it.
pub trait ScoringModel: Send + Sync + fmt::Debug {
    /// Implementation kind.
    fn kind(&self) -> ModelKind;

    /// Expected vector length.
    fn input_dim(&self) -> usize;

    /// Scores one vector.
    fn score(&self, features: &[f64]) -> Score;
}

/// Linear regression with bias, fitted offline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearModel {
    weights: Vec<f64>,
    bias: f64,
}

impl LinearModel {
    /// Wraps fitted parameters.
    pub fn new(weights: Vec<f64>, bias: f64) -> Result<Self, String> {
        let model = Self { weights, bias };
        model.validate()?;
        Ok(model)
    }

    /// Checks that parameters are usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.weights.is_empty() {
            return Err("linear model has no weights".into());
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err("linear model has non-finite parameters".into());
        }
        Ok(())
    }
}

impl ScoringModel for LinearModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Linear
    }

    fn input_dim(&self) -> usize {
        self.weights.len()
    }

    fn score(&self, features: &[f64]) -> Score {
        let dot: f64 = features
            .iter()
            .zip(self.weights.iter())
            .map(|(feature, weight)| feature * weight)
            .sum();
        Score::single(dot + self.bias)
    }
}

/// One node of a regression tree. Splits go left when `feature <= threshold`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TreeNode {
    /// Terminal value.
    Leaf {
        /// Prediction contributed by the tree.
        leaf: f64,
    },
    /// Internal split.
    Split {
        /// Index into the feature vector.
        feature_idx: usize,
        /// Split threshold in scaled units.
        threshold: f64,
        /// Child index taken when `feature <= threshold`.
        left: usize,
        /// Child index taken otherwise.
        right: usize,
    },
}

/// Regression tree stored as a flat node list; node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Wraps a node list.
    #[must_use]
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// Walks the tree. Validation guarantees termination because every child index is
    /// greater than its parent's.
    #[must_use]
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { leaf }) => return *leaf,
                Some(TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                }) => {
                    let Some(value) = features.get(*feature_idx) else {
                        return 0.0;
                    };
                    let next = if *value <= *threshold { *left } else { *right };
                    if next <= idx {
                        return 0.0;
                    }
                    idx = next;
                }
                None => return 0.0,
            }
        }
    }

    /// Checks node references, feature indices and leaf values.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { leaf } if !leaf.is_finite() => {
                    return Err(format!("leaf {i} is not finite"));
                }
                TreeNode::Leaf { .. } => {}
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature_idx >= n_features {
                        return Err(format!(
                            "node {i} splits on feature {feature_idx} of {n_features}"
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i} has a non-finite threshold"));
                    }
                    for child in [left, right] {
                        if *child <= i || *child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// How tree outputs are combined.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Random-forest style average.
    #[default]
    Mean,
    /// Boosting style `base_score + learning_rate * sum`.
    Sum,
}

/// Random forest or gradient boosted trees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeEnsemble {
    n_features: usize,
    trees: Vec<RegressionTree>,
    #[serde(default)]
    aggregation: Aggregation,
    #[serde(default)]
    base_score: f64,
    #[serde(default = "unit_rate")]
    learning_rate: f64,
}

const fn unit_rate() -> f64 {
    1.0
}

impl TreeEnsemble {
    /// Builds and validates an ensemble.
    pub fn new(
        n_features: usize,
        trees: Vec<RegressionTree>,
        aggregation: Aggregation,
        base_score: f64,
        learning_rate: f64,
    ) -> Result<Self, String> {
        let ensemble = Self {
            n_features,
            trees,
            aggregation,
            base_score,
            learning_rate,
        };
        ensemble.validate()?;
        Ok(ensemble)
    }

    /// Validates every tree against the declared feature count.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("ensemble has no trees".into());
        }
        if !self.base_score.is_finite() || !self.learning_rate.is_finite() {
            return Err("ensemble has non-finite parameters".into());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|reason| format!("tree {i}: {reason}"))?;
        }
        Ok(())
    }
}

impl ScoringModel for TreeEnsemble {
    fn kind(&self) -> ModelKind {
        ModelKind::TreeEnsemble
    }

    fn input_dim(&self) -> usize {
        self.n_features
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, features: &[f64]) -> Score {
        let total: f64 = self.trees.iter().map(|tree| tree.evaluate(features)).sum();
        let value = match self.aggregation {
            Aggregation::Mean => self.base_score + total / self.trees.len() as f64,
            Aggregation::Sum => self.learning_rate.mul_add(total, self.base_score),
        };
        Score::single(value)
    }
}

/// Zero-mean normal sample via Box-Muller.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}

/// Price drift with noise growing with the square root of the horizon.
///
/// Features are raw `[current_price, days_ahead]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockSimulator {
    #[serde(default = "default_trend_weight")]
    trend_weight: f64,
    #[serde(default = "default_volatility")]
    volatility: f64,
}

const fn default_trend_weight() -> f64 {
    0.05
}

const fn default_volatility() -> f64 {
    0.02
}

impl Default for StockSimulator {
    fn default() -> Self {
        Self {
            trend_weight: default_trend_weight(),
            volatility: default_volatility(),
        }
    }
}

impl StockSimulator {
    /// Simulator with explicit parameters.
    #[must_use]
    pub const fn new(trend_weight: f64, volatility: f64) -> Self {
        Self {
            trend_weight,
            volatility,
        }
    }

    /// Daily volatility used for noise and the confidence band.
    #[must_use]
    pub const fn volatility(&self) -> f64 {
        self.volatility
    }

    /// Rejects negative or non-finite parameters.
    pub fn validate(&self) -> Result<(), String> {
        if !self.trend_weight.is_finite() || !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err("stock simulation needs finite parameters and volatility >= 0".into());
        }
        Ok(())
    }

    /// Scores with a caller-supplied generator.
    pub fn score_with<R: Rng + ?Sized>(&self, features: &[f64], rng: &mut R) -> Score {
        let price = features.first().copied().unwrap_or_default();
        let days = features.get(1).copied().unwrap_or_default().max(0.0);
        let drift = price * self.trend_weight * days;
        let noise = gaussian(rng, (price * self.volatility * days.sqrt()).abs());
        Score::single(price + drift + noise)
    }
}

impl ScoringModel for StockSimulator {
    fn kind(&self) -> ModelKind {
        ModelKind::StockSimulation
    }

    fn input_dim(&self) -> usize {
        2
    }

    fn score(&self, features: &[f64]) -> Score {
        self.score_with(features, &mut rand::thread_rng())
    }
}

/// Temperature reverting toward a seasonal mean, humidity as a noisy walk.
///
/// Features are raw `[current_temperature, current_humidity, days_ahead]`. The primary
/// score is temperature and the secondary is humidity clamped to `0..=100`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherSimulator {
    #[serde(default = "default_mean_temperature")]
    mean_temperature: f64,
    #[serde(default = "default_reversion_rate")]
    reversion_rate: f64,
    #[serde(default = "default_temperature_noise")]
    temperature_noise: f64,
    #[serde(default = "default_humidity_noise")]
    humidity_noise: f64,
}

const fn default_mean_temperature() -> f64 {
    20.0
}

const fn default_reversion_rate() -> f64 {
    0.1
}

const fn default_temperature_noise() -> f64 {
    2.0
}

const fn default_humidity_noise() -> f64 {
    5.0
}

impl Default for WeatherSimulator {
    fn default() -> Self {
        Self {
            mean_temperature: default_mean_temperature(),
            reversion_rate: default_reversion_rate(),
            temperature_noise: default_temperature_noise(),
            humidity_noise: default_humidity_noise(),
        }
    }
}

impl WeatherSimulator {
    /// Rejects negative noise and non-finite parameters.
    pub fn validate(&self) -> Result<(), String> {
        let params = [
            self.mean_temperature,
            self.reversion_rate,
            self.temperature_noise,
            self.humidity_noise,
        ];
        if params.iter().any(|p| !p.is_finite())
            || self.temperature_noise < 0.0
            || self.humidity_noise < 0.0
        {
            return Err("weather simulation needs finite parameters and noise >= 0".into());
        }
        Ok(())
    }

    /// Scores with a caller-supplied generator.
    pub fn score_with<R: Rng + ?Sized>(&self, features: &[f64], rng: &mut R) -> Score {
        let temperature = features.first().copied().unwrap_or_default();
        let humidity = features.get(1).copied().unwrap_or_default();
        let days = features.get(2).copied().unwrap_or_default().max(0.0);
        let spread = days.sqrt();
        let reversion = (self.mean_temperature - temperature) * self.reversion_rate * days;
        let predicted_temperature =
            temperature + reversion + gaussian(rng, self.temperature_noise * spread);
        let predicted_humidity =
            (humidity + gaussian(rng, self.humidity_noise * spread)).clamp(0.0, 100.0);
        Score {
            value: predicted_temperature,
            secondary: Some(predicted_humidity),
        }
    }
}

impl ScoringModel for WeatherSimulator {
    fn kind(&self) -> ModelKind {
        ModelKind::WeatherSimulation
    }

    fn input_dim(&self) -> usize {
        3
    }

    fn score(&self, features: &[f64]) -> Score {
        self.score_with(features, &mut rand::thread_rng())
    }
}
