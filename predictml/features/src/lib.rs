#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Feature layer of the prediction pipeline: model families and their schemas,
//! categorical vocabularies, validated inputs, ordered feature vectors and fitted scaling.

/// Model families and their fixed feature schemas.
#[path = "../family.rs"]
pub mod family;

/// Errors raised while turning inputs into scaled vectors.
#[path = "../error.rs"]
pub mod error;

/// Categorical vocabularies and the encoder.
#[path = "../encoder.rs"]
pub mod encoder;

/// Typed request payloads for every family.
#[path = "../input.rs"]
pub mod input;

/// Ordered feature vector assembly.
#[path = "../builder.rs"]
pub mod builder;

/// Fitted per-feature standardisation.
#[path = "../scaling.rs"]
pub mod scaling;

pub use builder::{BuiltFeatures, FeatureVector, FeatureVectorBuilder};
pub use encoder::{CategoricalEncoder, Encoding, UnknownPolicy, Vocabulary};
pub use error::FeatureError;
pub use family::{CategoricalField, ModelFamily};
pub use input::{
    CropYieldInput, HousePriceInput, PredictionInput, SalaryInput, StockInput, WeatherInput,
};
pub use scaling::ScalingTransform;
