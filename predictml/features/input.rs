use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::FeatureError, family::ModelFamily};

/// House-price request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HousePriceInput {
    /// City name; unknown cities use the fallback code.
    pub city: String,
    /// Built-up area in square feet.
    pub area_sqft: f64,
    /// Number of bedrooms.
    pub bedrooms: i64,
    /// Number of bathrooms.
    pub bathrooms: i64,
    /// Age of the property in years.
    pub age: i64,
    /// Neighbourhood rating, nominally 1 to 5.
    pub location_rating: f64,
    /// Optional location tier (rural, suburban, urban). Validated against a closed set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Salary request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalaryInput {
    /// Years of professional experience.
    pub experience_years: f64,
    /// high_school, bachelor, master or phd.
    pub education_level: String,
    /// Free-form skill names; only the count is used.
    #[serde(default)]
    pub skills: Vec<String>,
    /// it, healthcare, finance, engineering, sales or marketing.
    pub job_type: String,
    /// City tier 1, 2 or 3.
    pub city_tier: i64,
}

/// Crop-yield request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CropYieldInput {
    /// Crop name.
    pub crop_type: String,
    /// State short name.
    pub state: String,
    /// Cultivated area.
    pub area_hectares: f64,
    /// Seasonal rainfall.
    pub rainfall_mm: f64,
    /// Mean temperature.
    pub temperature_celsius: f64,
    /// Fertilizer applied.
    pub fertilizer_kg: f64,
    /// Pesticide applied.
    pub pesticide_kg: f64,
}

/// Stock forecast request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockInput {
    /// Latest observed price.
    pub current_price: f64,
    /// Forecast horizon in days.
    #[serde(default = "default_horizon")]
    pub days_ahead: u32,
    /// Ticker, echoed into history only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Weather forecast request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherInput {
    /// Current temperature in Celsius.
    #[serde(alias = "current_temp")]
    pub current_temperature: f64,
    /// Current relative humidity, 0 to 100.
    pub current_humidity: f64,
    /// Forecast horizon in days.
    #[serde(default = "default_horizon")]
    pub days_ahead: u32,
    /// Place name, echoed into history only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

const fn default_horizon() -> u32 {
    1
}

/// A typed request for any family, tagged by `model` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PredictionInput {
    /// House price.
    HousePrice(HousePriceInput),
    /// Salary.
    Salary(SalaryInput),
    /// Crop yield.
    CropYield(CropYieldInput),
    /// Stock forecast.
    Stock(StockInput),
    /// Weather forecast.
    Weather(WeatherInput),
}

impl PredictionInput {
    /// Family selected by the request.
    #[must_use]
    pub const fn family(&self) -> ModelFamily {
        match self {
            Self::HousePrice(_) => ModelFamily::HousePrice,
            Self::Salary(_) => ModelFamily::Salary,
            Self::CropYield(_) => ModelFamily::CropYield,
            Self::Stock(_) => ModelFamily::Stock,
            Self::Weather(_) => ModelFamily::Weather,
        }
    }

    /// Parses an untagged payload as the given family.
    pub fn from_value(family: ModelFamily, payload: Value) -> serde_json::Result<Self> {
        Ok(match family {
            ModelFamily::HousePrice => Self::HousePrice(serde_json::from_value(payload)?),
            ModelFamily::Salary => Self::Salary(serde_json::from_value(payload)?),
            ModelFamily::CropYield => Self::CropYield(serde_json::from_value(payload)?),
            ModelFamily::Stock => Self::Stock(serde_json::from_value(payload)?),
            ModelFamily::Weather => Self::Weather(serde_json::from_value(payload)?),
        })
    }

    /// Rejects NaN and infinite numbers. Range checks are left to the models.
    pub fn validate(&self) -> Result<(), FeatureError> {
        let numbers: Vec<(&'static str, f64)> = match self {
            Self::HousePrice(input) => vec![
                ("area_sqft", input.area_sqft),
                ("location_rating", input.location_rating),
            ],
            Self::Salary(input) => vec![("experience_years", input.experience_years)],
            Self::CropYield(input) => vec![
                ("area_hectares", input.area_hectares),
                ("rainfall_mm", input.rainfall_mm),
                ("temperature_celsius", input.temperature_celsius),
                ("fertilizer_kg", input.fertilizer_kg),
                ("pesticide_kg", input.pesticide_kg),
            ],
            Self::Stock(input) => vec![("current_price", input.current_price)],
            Self::Weather(input) => vec![
                ("current_temperature", input.current_temperature),
                ("current_humidity", input.current_humidity),
            ],
        };
        match numbers.into_iter().find(|(_, value)| !value.is_finite()) {
            Some((field, _)) => Err(FeatureError::NonFinite { field }),
            None => Ok(()),
        }
    }

    /// Caller-supplied fields as a JSON object, without the `model` tag.
    #[must_use]
    pub fn echo(&self) -> Map<String, Value> {
        let value = match self {
            Self::HousePrice(input) => serde_json::to_value(input),
            Self::Salary(input) => serde_json::to_value(input),
            Self::CropYield(input) => serde_json::to_value(input),
            Self::Stock(input) => serde_json::to_value(input),
            Self::Weather(input) => serde_json::to_value(input),
        };
        match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tagged_payload_selects_family() {
        let input: PredictionInput = serde_json::from_value(json!({
            "model": "stock",
            "current_price": 120.5
        }))
        .unwrap();
        assert_eq!(input.family(), ModelFamily::Stock);
        match input {
            PredictionInput::Stock(stock) => assert_eq!(stock.days_ahead, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn untagged_payload_parses_for_family() {
        let input = PredictionInput::from_value(
            ModelFamily::Weather,
            json!({ "current_temp": 18.0, "current_humidity": 65.0, "days_ahead": 3 }),
        )
        .unwrap();
        assert_eq!(input.family(), ModelFamily::Weather);
    }

    #[test]
    fn echo_omits_tag_and_keeps_fields() {
        let input = PredictionInput::Salary(SalaryInput {
            experience_years: 4.0,
            education_level: "master".into(),
            skills: vec!["rust".into()],
            job_type: "it".into(),
            city_tier: 1,
        });
        let echo = input.echo();
        assert!(!echo.contains_key("model"));
        assert_eq!(echo["skills"], json!(["rust"]));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let input = PredictionInput::Stock(StockInput {
            current_price: f64::NAN,
            days_ahead: 1,
            symbol: None,
        });
        assert_eq!(
            input.validate(),
            Err(FeatureError::NonFinite {
                field: "current_price"
            })
        );
    }
}
