use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    error::FeatureError,
    family::{CategoricalField, ModelFamily},
};

/// What a vocabulary does with a key it has never seen.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "policy", content = "code", rename_all = "snake_case")]
pub enum UnknownPolicy {
    /// Resolve to this code.
    Default(u32),
    /// Refuse the request with `InvalidCategory`.
    Reject,
}

/// Outcome of one successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding {
    /// Integer code fed to the model.
    pub code: u32,
    /// False when the key was unknown and the default code was used.
    pub recognized: bool,
}

/// Lower-cased key to code mapping with an unknown-key policy.
#[derive(Debug, Clone, Serialize)]
pub struct Vocabulary {
    field: CategoricalField,
    codes: IndexMap<String, u32>,
    unknown: UnknownPolicy,
}

impl Vocabulary {
    /// Builds a vocabulary; keys are normalised the same way lookups are.
    #[must_use]
    pub fn new<K: AsRef<str>>(
        field: CategoricalField,
        entries: impl IntoIterator<Item = (K, u32)>,
        unknown: UnknownPolicy,
    ) -> Self {
        let codes = entries
            .into_iter()
            .map(|(key, code)| (normalize(key.as_ref()), code))
            .collect();
        Self {
            field,
            codes,
            unknown,
        }
    }

    /// Builds a vocabulary whose codes follow the order of `keys`.
    #[must_use]
    pub fn enumerated(field: CategoricalField, keys: &[&str], unknown: UnknownPolicy) -> Self {
        Self::new(field, keys.iter().copied().zip(0_u32..), unknown)
    }

    /// Field served by this vocabulary.
    #[must_use]
    pub const fn field(&self) -> CategoricalField {
        self.field
    }

    /// Unknown-key policy.
    #[must_use]
    pub const fn unknown_policy(&self) -> UnknownPolicy {
        self.unknown
    }

    /// Known keys in code order.
    #[must_use]
    pub fn accepted(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.codes.iter().collect();
        keys.sort_by_key(|(_, code)| **code);
        keys.into_iter().map(|(key, _)| key.clone()).collect()
    }

    /// Looks up a key without applying the unknown policy.
    #[must_use]
    pub fn lookup(&self, raw: &str) -> Option<u32> {
        self.codes.get(&normalize(raw)).copied()
    }

    /// Encodes a raw value, applying the unknown policy on a miss.
    pub fn encode(&self, raw: &str) -> Result<Encoding, FeatureError> {
        if let Some(code) = self.lookup(raw) {
            return Ok(Encoding {
                code,
                recognized: true,
            });
        }
        match self.unknown {
            UnknownPolicy::Default(code) => Ok(Encoding {
                code,
                recognized: false,
            }),
            UnknownPolicy::Reject => Err(FeatureError::InvalidCategory {
                field: self.field,
                value: raw.to_string(),
                accepted: self.accepted(),
            }),
        }
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Every vocabulary used by the pipeline, keyed by family and field.
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    vocabularies: IndexMap<(ModelFamily, CategoricalField), Vocabulary>,
}

impl CategoricalEncoder {
    /// Vocabularies the shipped models were fitted with.
    ///
    /// Unknown city falls back to kolkata (6), unknown education to bachelor (1), unknown
    /// job type to it (0), unknown crop to rice (0) and unknown state to punjab (0).
    /// House-price `location` is the only closed vocabulary.
    #[must_use]
    pub fn standard() -> Self {
        let vocabularies = [
            (
                ModelFamily::HousePrice,
                Vocabulary::enumerated(
                    CategoricalField::City,
                    &[
                        "mumbai",
                        "delhi",
                        "bangalore",
                        "chennai",
                        "hyderabad",
                        "pune",
                        "kolkata",
                        "ahmedabad",
                    ],
                    UnknownPolicy::Default(6),
                ),
            ),
            (
                ModelFamily::HousePrice,
                Vocabulary::enumerated(
                    CategoricalField::Location,
                    &["rural", "suburban", "urban"],
                    UnknownPolicy::Reject,
                ),
            ),
            (
                ModelFamily::Salary,
                Vocabulary::enumerated(
                    CategoricalField::EducationLevel,
                    &["high_school", "bachelor", "master", "phd"],
                    UnknownPolicy::Default(1),
                ),
            ),
            (
                ModelFamily::Salary,
                Vocabulary::enumerated(
                    CategoricalField::JobType,
                    &[
                        "it",
                        "healthcare",
                        "finance",
                        "engineering",
                        "sales",
                        "marketing",
                    ],
                    UnknownPolicy::Default(0),
                ),
            ),
            (
                ModelFamily::CropYield,
                Vocabulary::enumerated(
                    CategoricalField::CropType,
                    &[
                        "rice",
                        "wheat",
                        "cotton",
                        "sugarcane",
                        "maize",
                        "soybean",
                        "potato",
                    ],
                    UnknownPolicy::Default(0),
                ),
            ),
            (
                ModelFamily::CropYield,
                Vocabulary::enumerated(
                    CategoricalField::State,
                    &[
                        "punjab",
                        "haryana",
                        "up",
                        "mp",
                        "maharashtra",
                        "karnataka",
                        "tn",
                        "wb",
                    ],
                    UnknownPolicy::Default(0),
                ),
            ),
        ]
        .into_iter()
        .map(|(family, vocabulary)| ((family, vocabulary.field()), vocabulary))
        .collect();
        Self { vocabularies }
    }

    /// Replaces the codes of an existing vocabulary (e.g. a location map shipped with an
    /// artifact). The field keeps its unknown-key policy.
    pub fn replace_codes(
        &mut self,
        family: ModelFamily,
        field: CategoricalField,
        codes: &IndexMap<String, u32>,
    ) -> Result<(), FeatureError> {
        let current = self.vocabulary(family, field)?;
        let replacement = Vocabulary::new(
            field,
            codes.iter().map(|(key, code)| (key.as_str(), *code)),
            current.unknown_policy(),
        );
        self.vocabularies.insert((family, field), replacement);
        Ok(())
    }

    /// Vocabulary for a family field.
    pub fn vocabulary(
        &self,
        family: ModelFamily,
        field: CategoricalField,
    ) -> Result<&Vocabulary, FeatureError> {
        self.vocabularies
            .get(&(family, field))
            .ok_or(FeatureError::MissingVocabulary { family, field })
    }

    /// Encodes `raw` for the given family field.
    pub fn encode(
        &self,
        family: ModelFamily,
        field: CategoricalField,
        raw: &str,
    ) -> Result<Encoding, FeatureError> {
        self.vocabulary(family, field)?.encode(raw)
    }
}

impl Default for CategoricalEncoder {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_are_stable_and_case_insensitive() {
        let encoder = CategoricalEncoder::standard();
        for _ in 0..3 {
            let mumbai = encoder
                .encode(ModelFamily::HousePrice, CategoricalField::City, "Mumbai")
                .unwrap();
            assert_eq!(mumbai, Encoding { code: 0, recognized: true });
        }
        let phd = encoder
            .encode(ModelFamily::Salary, CategoricalField::EducationLevel, " PhD ")
            .unwrap();
        assert_eq!(phd.code, 3);
    }

    #[test]
    fn unknown_keys_fall_back_to_documented_defaults() {
        let encoder = CategoricalEncoder::standard();
        let cases = [
            (ModelFamily::HousePrice, CategoricalField::City, 6),
            (ModelFamily::Salary, CategoricalField::EducationLevel, 1),
            (ModelFamily::Salary, CategoricalField::JobType, 0),
            (ModelFamily::CropYield, CategoricalField::CropType, 0),
            (ModelFamily::CropYield, CategoricalField::State, 0),
        ];
        for (family, field, expected) in cases {
            let encoding = encoder.encode(family, field, "atlantis").unwrap();
            assert_eq!(encoding.code, expected, "{field}");
            assert!(!encoding.recognized);
        }
    }

    #[test]
    fn location_rejects_unknown_values() {
        let encoder = CategoricalEncoder::standard();
        let err = encoder
            .encode(ModelFamily::HousePrice, CategoricalField::Location, "downtown")
            .unwrap_err();
        match err {
            FeatureError::InvalidCategory { accepted, value, .. } => {
                assert_eq!(value, "downtown");
                assert_eq!(accepted, vec!["rural", "suburban", "urban"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(encoder
            .encode(ModelFamily::HousePrice, CategoricalField::Location, "URBAN")
            .is_ok());
    }

    #[test]
    fn replaced_codes_keep_policy() {
        let mut encoder = CategoricalEncoder::standard();
        let codes: IndexMap<String, u32> =
            [("Metro".to_string(), 0), ("Town".to_string(), 1)].into_iter().collect();
        encoder
            .replace_codes(ModelFamily::HousePrice, CategoricalField::Location, &codes)
            .unwrap();
        assert_eq!(
            encoder
                .encode(ModelFamily::HousePrice, CategoricalField::Location, "town")
                .unwrap()
                .code,
            1
        );
        assert!(encoder
            .encode(ModelFamily::HousePrice, CategoricalField::Location, "rural")
            .is_err());
    }

    #[test]
    fn missing_vocabulary_is_reported() {
        let encoder = CategoricalEncoder::standard();
        assert!(matches!(
            encoder.encode(ModelFamily::Stock, CategoricalField::City, "mumbai"),
            Err(FeatureError::MissingVocabulary { .. })
        ));
    }
}
