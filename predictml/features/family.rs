use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The five prediction families served by the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// House prices in Indian cities (INR).
    HousePrice,
    /// Annual salary estimate (INR).
    Salary,
    /// Crop yield in kilograms.
    CropYield,
    /// Simulated stock price forecast.
    Stock,
    /// Simulated weather forecast.
    Weather,
}

const HOUSE_PRICE_FEATURES: [&str; 6] = [
    "city_code",
    "area_sqft",
    "bedrooms",
    "bathrooms",
    "age",
    "location_rating",
];

const SALARY_FEATURES: [&str; 5] = [
    "experience_years",
    "education_code",
    "job_code",
    "city_tier",
    "skill_count",
];

const CROP_YIELD_FEATURES: [&str; 7] = [
    "crop_code",
    "state_code",
    "area_hectares",
    "rainfall_mm",
    "temperature_celsius",
    "fertilizer_kg",
    "pesticide_kg",
];

const STOCK_FEATURES: [&str; 2] = ["current_price", "days_ahead"];

const WEATHER_FEATURES: [&str; 3] = ["current_temperature", "current_humidity", "days_ahead"];

impl ModelFamily {
    /// Every family, in catalogue order.
    pub const ALL: [Self; 5] = [
        Self::HousePrice,
        Self::Salary,
        Self::CropYield,
        Self::Stock,
        Self::Weather,
    ];

    /// Stable identifier used in artifacts, records and the CLI.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HousePrice => "house_price",
            Self::Salary => "salary",
            Self::CropYield => "crop_yield",
            Self::Stock => "stock",
            Self::Weather => "weather",
        }
    }

    /// Ordered feature names. The scaler and the model were fitted on exactly this order.
    #[must_use]
    pub const fn feature_names(self) -> &'static [&'static str] {
        match self {
            Self::HousePrice => &HOUSE_PRICE_FEATURES,
            Self::Salary => &SALARY_FEATURES,
            Self::CropYield => &CROP_YIELD_FEATURES,
            Self::Stock => &STOCK_FEATURES,
            Self::Weather => &WEATHER_FEATURES,
        }
    }

    /// Length of the family's feature vector.
    #[must_use]
    pub const fn dimension(self) -> usize {
        self.feature_names().len()
    }

    /// Families whose scoring injects random noise on every call.
    #[must_use]
    pub const fn is_stochastic(self) -> bool {
        matches!(self, Self::Stock | Self::Weather)
    }

    /// Categorical fields consumed by the family.
    #[must_use]
    pub const fn categorical_fields(self) -> &'static [CategoricalField] {
        match self {
            Self::HousePrice => &[CategoricalField::City, CategoricalField::Location],
            Self::Salary => &[CategoricalField::EducationLevel, CategoricalField::JobType],
            Self::CropYield => &[CategoricalField::CropType, CategoricalField::State],
            Self::Stock | Self::Weather => &[],
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a family name cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model '{0}'")]
pub struct UnknownFamily(pub String);

impl FromStr for ModelFamily {
    type Err = UnknownFamily;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim().to_ascii_lowercase().replace('-', "_");
        match key.as_str() {
            "house_price" | "house" => Ok(Self::HousePrice),
            "salary" => Ok(Self::Salary),
            "crop_yield" | "crop" => Ok(Self::CropYield),
            "stock" => Ok(Self::Stock),
            "weather" => Ok(Self::Weather),
            _ => Err(UnknownFamily(raw.to_string())),
        }
    }
}

/// Categorical request fields that go through a vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    /// House-price city.
    City,
    /// House-price location tier (closed vocabulary).
    Location,
    /// Salary education level.
    EducationLevel,
    /// Salary job type.
    JobType,
    /// Crop-yield crop.
    CropType,
    /// Crop-yield state.
    State,
}

impl CategoricalField {
    /// Request field name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Location => "location",
            Self::EducationLevel => "education_level",
            Self::JobType => "job_type",
            Self::CropType => "crop_type",
            Self::State => "state",
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
