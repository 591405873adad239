use indexmap::IndexMap;
use predictml_features::ModelFamily;
use serde::Serialize;

/// Offline evaluation metrics reported by the trainer.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Metrics {
    /// Coefficient of determination.
    pub r2: f64,
    /// Root mean squared error, in the family unit.
    pub rmse: f64,
    /// Mean absolute error, in the family unit.
    pub mae: f64,
}

/// Static description of a family for listings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogueEntry {
    /// Family.
    pub model: ModelFamily,
    /// Display name.
    pub name: &'static str,
    /// Short description.
    pub description: &'static str,
    /// Unit of the prediction.
    pub unit: &'static str,
    /// Offline metrics, when the family was fitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    /// Input features in schema order.
    pub features: &'static [&'static str],
}

/// Unit attached to every prediction of a family.
#[must_use]
pub const fn unit(family: ModelFamily) -> &'static str {
    match family {
        ModelFamily::HousePrice | ModelFamily::Salary => "INR",
        ModelFamily::CropYield => "kg",
        ModelFamily::Stock => "price units",
        ModelFamily::Weather => "°C",
    }
}

/// Catalogue entry for one family.
#[must_use]
pub const fn entry(family: ModelFamily) -> CatalogueEntry {
    let (name, description, metrics) = match family {
        ModelFamily::HousePrice => (
            "House Price Prediction",
            "Predicts house prices in Indian cities from size, rooms, age and location",
            Some(Metrics {
                r2: 0.87,
                rmse: 125_000.0,
                mae: 95_000.0,
            }),
        ),
        ModelFamily::Salary => (
            "Salary Prediction",
            "Estimates annual salary from experience, education, job type, city tier and skills",
            Some(Metrics {
                r2: 0.82,
                rmse: 45_000.0,
                mae: 35_000.0,
            }),
        ),
        ModelFamily::CropYield => (
            "Crop Yield Prediction",
            "Predicts crop yield from crop, state, area, rainfall, temperature and inputs",
            Some(Metrics {
                r2: 0.91,
                rmse: 120.0,
                mae: 85.0,
            }),
        ),
        ModelFamily::Stock => (
            "Stock Price Forecast",
            "Simulated price forecast with a 95% band",
            None,
        ),
        ModelFamily::Weather => (
            "Weather Forecast",
            "Simulated temperature, humidity and sky condition forecast",
            None,
        ),
    };
    CatalogueEntry {
        model: family,
        name,
        description,
        unit: unit(family),
        metrics,
        features: family.feature_names(),
    }
}

/// Every family in catalogue order.
#[must_use]
pub fn entries() -> Vec<CatalogueEntry> {
    ModelFamily::ALL.into_iter().map(entry).collect()
}

const HOUSE_PRICE_IMPORTANCE: [f64; 6] = [0.15, 0.35, 0.12, 0.10, 0.08, 0.20];
const SALARY_IMPORTANCE: [f64; 5] = [0.40, 0.18, 0.15, 0.12, 0.15];
const CROP_YIELD_IMPORTANCE: [f64; 7] = [0.12, 0.08, 0.25, 0.20, 0.15, 0.12, 0.08];

/// Feature importance keyed by schema feature name. Simulated families have none.
#[must_use]
pub fn feature_importance(family: ModelFamily) -> Option<IndexMap<&'static str, f64>> {
    let weights: &[f64] = match family {
        ModelFamily::HousePrice => &HOUSE_PRICE_IMPORTANCE,
        ModelFamily::Salary => &SALARY_IMPORTANCE,
        ModelFamily::CropYield => &CROP_YIELD_IMPORTANCE,
        ModelFamily::Stock | ModelFamily::Weather => return None,
    };
    Some(
        family
            .feature_names()
            .iter()
            .copied()
            .zip(weights.iter().copied())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_covers_every_feature_and_sums_to_one() {
        for family in [ModelFamily::HousePrice, ModelFamily::Salary, ModelFamily::CropYield] {
            let importance = feature_importance(family).unwrap();
            assert_eq!(importance.len(), family.dimension());
            let total: f64 = importance.values().sum();
            assert!((total - 1.0).abs() < 1e-9, "{family}: {total}");
        }
        assert_eq!(feature_importance(ModelFamily::HousePrice).unwrap()["area_sqft"], 0.35);
        assert!(feature_importance(ModelFamily::Weather).is_none());
    }

    #[test]
    fn catalogue_lists_every_family() {
        let all = entries();
        assert_eq!(all.len(), 5);
        assert_eq!(all[2].unit, "kg");
        assert_eq!(all[0].metrics.unwrap().r2, 0.87);
        assert!(all[3].metrics.is_none());
    }
}
