//! Weight trainer: learn ensemble weights from historical outcomes.
//!
//! Each observation holds one score per signal (for instance the
//! `signal_sentiments` of a past corpus result) and is paired with a realized
//! outcome such as the next-day price change. An [`ImportanceRegressor`]
//! returns one importance per feature position, and those importances go
//! verbatim into [`EnsembleCombiner::update_weights`], which normalizes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ensemble::EnsembleCombiner;
use crate::error::{TrainError, TrainResult};

/// Signal id → score for one historical observation.
pub type SignalObservation = BTreeMap<String, f64>;

/// A fitting procedure returning one non-negative importance per feature column.
pub trait ImportanceRegressor: Send + Sync {
    /// `features[i][j]` is feature `j` of observation `i`; `targets[i]` its outcome.
    fn fit_importances(&self, features: &[Vec<f64>], targets: &[f64]) -> TrainResult<Vec<f64>>;
}

/// Absolute Pearson correlation of each feature with the outcome.
///
/// Constant columns (and a constant outcome) get importance 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationImportance;

impl ImportanceRegressor for CorrelationImportance {
    fn fit_importances(&self, features: &[Vec<f64>], targets: &[f64]) -> TrainResult<Vec<f64>> {
        if features.is_empty() || features.len() != targets.len() {
            return Err(TrainError::Fit {
                message: format!(
                    "{} feature rows for {} targets",
                    features.len(),
                    targets.len()
                ),
            });
        }
        let width = features[0].len();
        if let Some((i, row)) = features.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(TrainError::Fit {
                message: format!("row {i} has {} features, expected {width}", row.len()),
            });
        }
        let n = targets.len() as f64;
        if features.iter().flatten().chain(targets).any(|v| !v.is_finite()) {
            return Err(TrainError::Fit {
                message: "training data contains non-finite values".into(),
            });
        }

        let y_mean = targets.iter().sum::<f64>() / n;
        let y_var: f64 = targets.iter().map(|y| (y - y_mean).powi(2)).sum();

        let importances = (0..width)
            .map(|j| {
                let x_mean = features.iter().map(|row| row[j]).sum::<f64>() / n;
                let (cov, x_var) = features.iter().zip(targets).fold(
                    (0.0, 0.0),
                    |(cov, var), (row, y)| {
                        let dx = row[j] - x_mean;
                        (cov + dx * (y - y_mean), var + dx * dx)
                    },
                );
                if x_var > 0.0 && y_var > 0.0 {
                    (cov / (x_var * y_var).sqrt()).abs()
                } else {
                    0.0
                }
            })
            .collect();
        Ok(importances)
    }
}

/// A training file: observations and their outcomes, in the same order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSet {
    pub observations: Vec<SignalObservation>,
    pub outcomes: Vec<f64>,
}

/// Fits importances and writes them into an ensemble's weight table.
#[derive(Debug, Clone, Default)]
pub struct WeightTrainer<R = CorrelationImportance> {
    regressor: R,
}

impl<R: ImportanceRegressor> WeightTrainer<R> {
    pub fn new(regressor: R) -> Self {
        Self { regressor }
    }

    /// Fit and apply new weights. Returns the raw importances per signal.
    ///
    /// Precondition violations and fit failures are logged and returned;
    /// the weight table is only touched on success.
    pub fn train(
        &self,
        combiner: &EnsembleCombiner,
        observations: &[SignalObservation],
        outcomes: &[f64],
    ) -> TrainResult<BTreeMap<String, f64>> {
        let result = self.fit_and_apply(combiner, observations, outcomes);
        if let Err(e) = &result {
            tracing::error!(error = %e, "weight training skipped");
        }
        result
    }

    fn fit_and_apply(
        &self,
        combiner: &EnsembleCombiner,
        observations: &[SignalObservation],
        outcomes: &[f64],
    ) -> TrainResult<BTreeMap<String, f64>> {
        if observations.is_empty() || outcomes.is_empty() {
            return Err(TrainError::Empty);
        }
        if observations.len() != outcomes.len() {
            return Err(TrainError::LengthMismatch {
                observations: observations.len(),
                outcomes: outcomes.len(),
            });
        }

        let signals = combiner.active_signals();
        if signals.is_empty() {
            return Err(TrainError::Fit {
                message: "no active signals to train".into(),
            });
        }

        // Signals missing from an observation count as 0.
        let features: Vec<Vec<f64>> = observations
            .iter()
            .map(|obs| {
                signals
                    .iter()
                    .map(|id| obs.get(id).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        let importances = self.regressor.fit_importances(&features, outcomes)?;
        if importances.len() != signals.len() {
            return Err(TrainError::ImportanceShape {
                expected: signals.len(),
                actual: importances.len(),
            });
        }

        let fitted: BTreeMap<String, f64> = signals.into_iter().zip(importances).collect();
        combiner.update_weights(&fitted)?;
        tracing::info!(observations = observations.len(), "ensemble weights trained");
        Ok(fitted)
    }
}
