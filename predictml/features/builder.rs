use serde::Serialize;

use crate::{
    encoder::{CategoricalEncoder, Encoding},
    error::FeatureError,
    family::{CategoricalField, ModelFamily},
    input::PredictionInput,
};

/// Ordered feature values for one request, tagged with the family that defines the order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeatureVector {
    family: ModelFamily,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Wraps values in family order. Length is checked when the vector is scaled.
    #[must_use]
    pub fn new(family: ModelFamily, values: Vec<f64>) -> Self {
        Self { family, values }
    }

    /// Owning family.
    #[must_use]
    pub const fn family(&self) -> ModelFamily {
        self.family
    }

    /// Raw values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the vector holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named feature from the family schema.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.family
            .feature_names()
            .iter()
            .position(|feature| *feature == name)
            .and_then(|idx| self.values.get(idx).copied())
    }
}

/// Vector plus the categorical encodings that went into it.
#[derive(Debug, Clone)]
pub struct BuiltFeatures {
    /// Assembled vector.
    pub vector: FeatureVector,
    /// Encodings in the order the fields were read.
    pub encodings: Vec<(CategoricalField, Encoding)>,
}

impl BuiltFeatures {
    /// Fields whose value was unknown and resolved to the default code.
    #[must_use]
    pub fn defaulted(&self) -> Vec<CategoricalField> {
        self.encodings
            .iter()
            .filter(|(_, encoding)| !encoding.recognized)
            .map(|(field, _)| *field)
            .collect()
    }

    /// Code assigned to a field, if the field was encoded.
    #[must_use]
    pub fn code(&self, field: CategoricalField) -> Option<u32> {
        self.encodings
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, encoding)| encoding.code)
    }
}

/// Turns validated inputs into family-ordered vectors.
#[derive(Debug, Clone, Default)]
pub struct FeatureVectorBuilder {
    encoder: CategoricalEncoder,
}

impl FeatureVectorBuilder {
    /// Creates a builder around an encoder.
    #[must_use]
    pub const fn new(encoder: CategoricalEncoder) -> Self {
        Self { encoder }
    }

    /// Encoder used for categorical fields.
    #[must_use]
    pub const fn encoder(&self) -> &CategoricalEncoder {
        &self.encoder
    }

    /// Builds the vector in the order returned by [`ModelFamily::feature_names`].
    #[allow(clippy::cast_precision_loss)]
    pub fn build(&self, input: &PredictionInput) -> Result<BuiltFeatures, FeatureError> {
        let family = input.family();
        let mut encodings = Vec::new();
        let mut encode = |field: CategoricalField, raw: &str| -> Result<f64, FeatureError> {
            let encoding = self.encoder.encode(family, field, raw)?;
            encodings.push((field, encoding));
            Ok(f64::from(encoding.code))
        };
        let values = match input {
            PredictionInput::HousePrice(house) => {
                let city = encode(CategoricalField::City, &house.city)?;
                if let Some(location) = &house.location {
                    encode(CategoricalField::Location, location)?;
                }
                vec![
                    city,
                    house.area_sqft,
                    house.bedrooms as f64,
                    house.bathrooms as f64,
                    house.age as f64,
                    house.location_rating,
                ]
            }
            PredictionInput::Salary(salary) => {
                let education = encode(CategoricalField::EducationLevel, &salary.education_level)?;
                let job = encode(CategoricalField::JobType, &salary.job_type)?;
                vec![
                    salary.experience_years,
                    education,
                    job,
                    salary.city_tier as f64,
                    salary.skills.len() as f64,
                ]
            }
            PredictionInput::CropYield(crop) => {
                let crop_code = encode(CategoricalField::CropType, &crop.crop_type)?;
                let state = encode(CategoricalField::State, &crop.state)?;
                vec![
                    crop_code,
                    state,
                    crop.area_hectares,
                    crop.rainfall_mm,
                    crop.temperature_celsius,
                    crop.fertilizer_kg,
                    crop.pesticide_kg,
                ]
            }
            PredictionInput::Stock(stock) => {
                vec![stock.current_price, f64::from(stock.days_ahead)]
            }
            PredictionInput::Weather(weather) => vec![
                weather.current_temperature,
                weather.current_humidity,
                f64::from(weather.days_ahead),
            ],
        };
        Ok(BuiltFeatures {
            vector: FeatureVector::new(family, values),
            encodings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{CropYieldInput, HousePriceInput, SalaryInput, WeatherInput};

    fn mumbai() -> HousePriceInput {
        HousePriceInput {
            city: "Mumbai".into(),
            area_sqft: 1000.0,
            bedrooms: 2,
            bathrooms: 2,
            age: 5,
            location_rating: 4.0,
            location: None,
        }
    }

    #[test]
    fn house_vector_matches_schema_order() {
        let builder = FeatureVectorBuilder::default();
        let built = builder.build(&PredictionInput::HousePrice(mumbai())).unwrap();
        assert_eq!(built.vector.values(), &[0.0, 1000.0, 2.0, 2.0, 5.0, 4.0]);
        assert_eq!(built.vector.get("area_sqft"), Some(1000.0));
        assert!(built.defaulted().is_empty());
    }

    #[test]
    fn salary_vector_counts_skills() {
        let builder = FeatureVectorBuilder::default();
        let input = PredictionInput::Salary(SalaryInput {
            experience_years: 6.5,
            education_level: "bachelor".into(),
            skills: vec!["python".into(), "sql".into(), "excel".into()],
            job_type: "it".into(),
            city_tier: 2,
        });
        let built = builder.build(&input).unwrap();
        assert_eq!(built.vector.values(), &[6.5, 1.0, 0.0, 2.0, 3.0]);
    }

    #[test]
    fn unknown_crop_defaults_and_is_reported() {
        let builder = FeatureVectorBuilder::default();
        let input = PredictionInput::CropYield(CropYieldInput {
            crop_type: "quinoa".into(),
            state: "karnataka".into(),
            area_hectares: 10.0,
            rainfall_mm: 800.0,
            temperature_celsius: 25.0,
            fertilizer_kg: 100.0,
            pesticide_kg: 10.0,
        });
        let built = builder.build(&input).unwrap();
        assert_eq!(built.vector.values()[..2], [0.0, 5.0]);
        assert_eq!(built.defaulted(), vec![CategoricalField::CropType]);
    }

    #[test]
    fn invalid_house_location_fails_the_build() {
        let builder = FeatureVectorBuilder::default();
        let mut house = mumbai();
        house.location = Some("moon".into());
        let err = builder.build(&PredictionInput::HousePrice(house)).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn valid_house_location_is_encoded_but_not_in_vector() {
        let builder = FeatureVectorBuilder::default();
        let mut house = mumbai();
        house.location = Some("Urban".into());
        let built = builder.build(&PredictionInput::HousePrice(house)).unwrap();
        assert_eq!(built.code(CategoricalField::Location), Some(2));
        assert_eq!(built.vector.len(), ModelFamily::HousePrice.dimension());
    }

    #[test]
    fn every_family_builds_its_declared_dimension() {
        let builder = FeatureVectorBuilder::default();
        let weather = PredictionInput::Weather(WeatherInput {
            current_temperature: 21.0,
            current_humidity: 55.0,
            days_ahead: 2,
            location: None,
        });
        let built = builder.build(&weather).unwrap();
        assert_eq!(built.vector.len(), ModelFamily::Weather.dimension());
        assert_eq!(built.vector.get("days_ahead"), Some(2.0));
    }
}
