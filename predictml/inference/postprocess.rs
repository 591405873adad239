use chrono::{Duration, Utc};
use predictml_features::ModelFamily;
use serde::Serialize;

use crate::scoring::Score;

/// Bonus added to the clamped salary per listed skill.
pub const SKILL_BONUS: f64 = 5000.0;

/// z-score of the two-sided 95% band.
const BAND_Z: f64 = 1.96;

/// Per-family rule that turns a raw score into the returned prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostProcess {
    /// `max(0, raw)`.
    NonNegative,
    /// `max(0, raw) + skill_count * SKILL_BONUS`.
    SalaryBonus,
    /// Prediction with a 95% band derived from the simulator's volatility.
    StockBand {
        /// Daily volatility.
        volatility: f64,
    },
    /// Temperature, humidity and a rule-based outlook.
    WeatherOutlook,
}

/// Values the rule needs from the request besides the score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestFacts {
    /// Number of listed skills (salary).
    pub skill_count: usize,
    /// Current price (stock).
    pub current_price: f64,
    /// Forecast horizon (stock, weather).
    pub days_ahead: u32,
    /// House location code, when one was supplied.
    pub location_code: Option<u32>,
}

/// Sky condition derived from predicted humidity and temperature.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum WeatherCondition {
    /// Humid and warm.
    Rainy,
    /// Humid and cold.
    Snowy,
    /// Moderately humid.
    Cloudy,
    /// Dry.
    Sunny,
}

/// Family-specific fields attached to a result.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PredictionDetail {
    /// House price extras.
    House {
        /// Encoded location tier.
        location_code: u32,
    },
    /// Salary breakdown.
    Salary {
        /// Clamped model output.
        base_prediction: f64,
        /// `skill_count * 5000`.
        skill_bonus: f64,
    },
    /// Stock band.
    Stock {
        /// Lower end of the 95% band.
        lower_bound: f64,
        /// Upper end of the 95% band.
        upper_bound: f64,
        /// Horizon.
        days_ahead: u32,
    },
    /// Weather forecast fields.
    Weather {
        /// Temperature in Celsius.
        predicted_temperature: f64,
        /// Relative humidity.
        predicted_humidity: f64,
        /// Sky condition.
        condition: WeatherCondition,
        /// Chance of precipitation, percent.
        precipitation_chance: f64,
        /// `%Y-%m-%d`, UTC today plus the horizon. Absent when the horizon
        /// runs past the last representable date.
        #[serde(skip_serializing_if = "Option::is_none")]
        forecast_date: Option<String>,
    },
}

/// Post-processed prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Returned prediction.
    pub prediction: f64,
    /// Confidence for simulated families.
    pub confidence: Option<f64>,
    /// Family extras.
    pub detail: Option<PredictionDetail>,
}

impl PostProcess {
    /// Default rule for a family. Stock uses `volatility` for its band.
    #[must_use]
    pub const fn for_family(family: ModelFamily, volatility: f64) -> Self {
        match family {
            ModelFamily::HousePrice | ModelFamily::CropYield => Self::NonNegative,
            ModelFamily::Salary => Self::SalaryBonus,
            ModelFamily::Stock => Self::StockBand { volatility },
            ModelFamily::Weather => Self::WeatherOutlook,
        }
    }

    /// Applies the rule.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn apply(&self, score: Score, facts: &RequestFacts) -> Outcome {
        match *self {
            Self::NonNegative => Outcome {
                prediction: score.value.max(0.0),
                confidence: None,
                detail: facts
                    .location_code
                    .map(|location_code| PredictionDetail::House { location_code }),
            },
            Self::SalaryBonus => {
                let base = score.value.max(0.0);
                let bonus = facts.skill_count as f64 * SKILL_BONUS;
                Outcome {
                    prediction: base + bonus,
                    confidence: None,
                    detail: Some(PredictionDetail::Salary {
                        base_prediction: base,
                        skill_bonus: bonus,
                    }),
                }
            }
            Self::StockBand { volatility } => {
                let days = f64::from(facts.days_ahead);
                let half_width = BAND_Z * volatility.abs() * facts.current_price.abs() * days.sqrt();
                let prediction = round_to(score.value, 2);
                Outcome {
                    prediction,
                    confidence: Some(round_to(stock_confidence(facts.days_ahead), 2)),
                    detail: Some(PredictionDetail::Stock {
                        lower_bound: round_to(score.value - half_width, 2),
                        upper_bound: round_to(score.value + half_width, 2),
                        days_ahead: facts.days_ahead,
                    }),
                }
            }
            Self::WeatherOutlook => {
                let humidity = score.secondary.unwrap_or_default().clamp(0.0, 100.0);
                let (condition, chance) = classify_weather(score.value, humidity);
                let temperature = round_to(score.value, 1);
                Outcome {
                    prediction: temperature,
                    confidence: Some(round_to(weather_confidence(facts.days_ahead), 2)),
                    detail: Some(PredictionDetail::Weather {
                        predicted_temperature: temperature,
                        predicted_humidity: round_to(humidity, 1),
                        condition,
                        precipitation_chance: round_to(chance, 1),
                        forecast_date: forecast_date(facts.days_ahead),
                    }),
                }
            }
        }
    }
}

/// `max(0.5, 1 - 0.05 * days)`.
#[must_use]
pub fn stock_confidence(days_ahead: u32) -> f64 {
    0.05f64.mul_add(-f64::from(days_ahead), 1.0).max(0.5)
}

/// `max(0.4, 0.95 - 0.08 * days)`.
#[must_use]
pub fn weather_confidence(days_ahead: u32) -> f64 {
    0.08f64.mul_add(-f64::from(days_ahead), 0.95).max(0.4)
}

/// First matching row wins; humidity is expected in `0..=100`.
#[must_use]
pub fn classify_weather(temperature: f64, humidity: f64) -> (WeatherCondition, f64) {
    if humidity > 70.0 {
        if temperature > 15.0 {
            (WeatherCondition::Rainy, 0.5f64.mul_add(humidity, 50.0).min(95.0))
        } else {
            (WeatherCondition::Snowy, 0.4f64.mul_add(humidity, 40.0).min(95.0))
        }
    } else if humidity > 50.0 {
        (WeatherCondition::Cloudy, (humidity * 0.6).min(60.0))
    } else {
        (WeatherCondition::Sunny, (humidity * 0.3).max(5.0))
    }
}

fn forecast_date(days_ahead: u32) -> Option<String> {
    Duration::try_days(i64::from(days_ahead))
        .and_then(|horizon| Utc::now().checked_add_signed(horizon))
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// Rounds half away from zero to `decimals` places.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(value: f64) -> Score {
        Score::single(value)
    }

    #[test]
    fn deterministic_families_never_go_negative() {
        let facts = RequestFacts::default();
        for raw in [-1e9, -0.5, 0.0, 12.5] {
            let outcome = PostProcess::NonNegative.apply(single(raw), &facts);
            assert!(outcome.prediction >= 0.0);
            assert!(outcome.confidence.is_none());
        }
    }

    #[test]
    fn salary_bonus_is_added_after_clamping() {
        let facts = RequestFacts {
            skill_count: 3,
            ..RequestFacts::default()
        };
        let negative = PostProcess::SalaryBonus.apply(single(-40_000.0), &facts);
        assert_eq!(negative.prediction, 15_000.0);
        let positive = PostProcess::SalaryBonus.apply(single(500_000.0), &facts);
        assert_eq!(positive.prediction, 515_000.0);
        assert_eq!(
            positive.detail,
            Some(PredictionDetail::Salary {
                base_prediction: 500_000.0,
                skill_bonus: 15_000.0
            })
        );
    }

    #[test]
    fn stock_band_contains_prediction() {
        for days in [0, 1, 5, 30, 365] {
            for volatility in [0.0, 0.02, 0.5] {
                let facts = RequestFacts {
                    current_price: 187.35,
                    days_ahead: days,
                    ..RequestFacts::default()
                };
                let outcome = PostProcess::StockBand { volatility }.apply(single(191.234), &facts);
                match outcome.detail {
                    Some(PredictionDetail::Stock {
                        lower_bound,
                        upper_bound,
                        ..
                    }) => {
                        assert!(lower_bound <= outcome.prediction);
                        assert!(outcome.prediction <= upper_bound);
                    }
                    other => panic!("unexpected {other:?}"),
                }
            }
        }
    }

    #[test]
    fn confidences_decay_to_their_floors() {
        let mut previous_stock = f64::INFINITY;
        let mut previous_weather = f64::INFINITY;
        for days in 0..60 {
            let stock = stock_confidence(days);
            let weather = weather_confidence(days);
            assert!(stock <= previous_stock && stock >= 0.5);
            assert!(weather <= previous_weather && weather >= 0.4);
            previous_stock = stock;
            previous_weather = weather;
        }
        assert_eq!(stock_confidence(30), 0.5);
        assert_eq!(weather_confidence(30), 0.4);
        assert!((stock_confidence(1) - 0.95).abs() < 1e-12);
        assert!((weather_confidence(1) - 0.87).abs() < 1e-12);
    }

    #[test]
    fn weather_table_boundaries() {
        assert_eq!(classify_weather(25.0, 70.0).0, WeatherCondition::Cloudy);
        assert_eq!(classify_weather(10.0, 70.0).0, WeatherCondition::Cloudy);
        let (condition, chance) = classify_weather(16.0, 70.01);
        assert_eq!(condition, WeatherCondition::Rainy);
        assert!((chance - 85.005).abs() < 1e-9);
        assert_eq!(classify_weather(15.0, 80.0), (WeatherCondition::Snowy, 72.0));
        assert_eq!(classify_weather(20.0, 100.0).1, 95.0);
        assert_eq!(classify_weather(20.0, 50.0).0, WeatherCondition::Sunny);
        assert_eq!(classify_weather(20.0, 50.0).1, 15.0);
        assert_eq!(classify_weather(20.0, 10.0).1, 5.0);
        assert_eq!(classify_weather(20.0, 60.0), (WeatherCondition::Cloudy, 36.0));
    }

    #[test]
    fn weather_outlook_rounds_and_dates() {
        let facts = RequestFacts {
            days_ahead: 2,
            ..RequestFacts::default()
        };
        let score = Score {
            value: 21.349,
            secondary: Some(130.0),
        };
        let outcome = PostProcess::WeatherOutlook.apply(score, &facts);
        assert_eq!(outcome.prediction, 21.3);
        assert_eq!(outcome.confidence, Some(0.79));
        match outcome.detail {
            Some(PredictionDetail::Weather {
                predicted_humidity,
                condition,
                precipitation_chance,
                forecast_date,
                ..
            }) => {
                assert_eq!(predicted_humidity, 100.0);
                assert_eq!(condition, WeatherCondition::Rainy);
                assert_eq!(precipitation_chance, 95.0);
                assert_eq!(forecast_date.map(|date| date.len()), Some(10));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn weather_horizon_past_calendar_drops_the_date() {
        let score = Score {
            value: 20.0,
            secondary: Some(60.0),
        };
        for days_ahead in [100_000_000, u32::MAX] {
            let facts = RequestFacts {
                days_ahead,
                ..RequestFacts::default()
            };
            let outcome = PostProcess::WeatherOutlook.apply(score, &facts);
            assert_eq!(outcome.confidence, Some(0.4));
            match outcome.detail {
                Some(PredictionDetail::Weather { forecast_date, .. }) => {
                    assert!(forecast_date.is_none());
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn house_location_code_is_reported() {
        let facts = RequestFacts {
            location_code: Some(2),
            ..RequestFacts::default()
        };
        let outcome = PostProcess::NonNegative.apply(single(1.0), &facts);
        assert_eq!(outcome.detail, Some(PredictionDetail::House { location_code: 2 }));
    }
}
