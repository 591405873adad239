use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::records::PredictionRecord;

/// Aggregates for one model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelStats {
    /// Number of recorded predictions.
    pub count: usize,
    /// Mean of the recorded predictions.
    pub mean_prediction: f64,
    /// Mean confidence over records that carry one.
    pub mean_confidence: Option<f64>,
    /// Most recent creation time.
    pub last_prediction_at: DateTime<Utc>,
}

/// History summary keyed by model name, in first-seen order.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HistoryStats {
    /// Total records.
    pub total: usize,
    /// Per-model aggregates.
    pub models: IndexMap<String, ModelStats>,
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    prediction_sum: f64,
    confidence_sum: f64,
    confidence_count: usize,
    last: Option<DateTime<Utc>>,
}

impl HistoryStats {
    /// Summarises a slice of records.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_records(records: &[PredictionRecord]) -> Self {
        let mut acc: IndexMap<&str, Accumulator> = IndexMap::new();
        for record in records {
            let entry = acc.entry(record.model_name.as_str()).or_default();
            entry.count += 1;
            entry.prediction_sum += record.prediction;
            if let Some(confidence) = record.confidence {
                entry.confidence_sum += confidence;
                entry.confidence_count += 1;
            }
            entry.last = Some(entry.last.map_or(record.created_at, |t| t.max(record.created_at)));
        }
        let models = acc
            .into_iter()
            .filter_map(|(name, a)| {
                let last_prediction_at = a.last?;
                Some((
                    name.to_string(),
                    ModelStats {
                        count: a.count,
                        mean_prediction: a.prediction_sum / a.count as f64,
                        mean_confidence: (a.confidence_count > 0)
                            .then(|| a.confidence_sum / a.confidence_count as f64),
                        last_prediction_at,
                    },
                ))
            })
            .collect();
        Self {
            total: records.len(),
            models,
        }
    }
}
