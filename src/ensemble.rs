//! Ensemble combiner: blend every active signal into one sentiment vector.
//!
//! The persisted [`SignalWeightTable`] decides how much each signal
//! contributes. A weight whose provider is not registered is inert: it
//! contributes nothing and the remaining weights are *not* rescaled, so the
//! compound of a partial ensemble shrinks toward zero.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{EnsembleError, EnsembleResult};
use crate::signal::{ProviderRegistry, SentimentVector, SignalReading};
use crate::signal::valence::LEXICON_SIGNAL_ID;

// ---------------------------------------------------------------------------
// Weight table
// ---------------------------------------------------------------------------

/// Signal id → non-negative weight. Weights sum to 1 after every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalWeightTable {
    weights: BTreeMap<String, f64>,
}

impl Default for SignalWeightTable {
    fn default() -> Self {
        let weights = [
            (LEXICON_SIGNAL_ID, 0.3),
            ("distilbert-base-uncased-finetuned-sst-2-english", 0.2),
            ("ProsusAI/finbert", 0.3),
            ("cardiffnlp/twitter-roberta-base-sentiment-latest", 0.2),
        ]
        .into_iter()
        .map(|(id, w)| (id.to_string(), w))
        .collect();
        Self { weights }
    }
}

impl SignalWeightTable {
    /// Build a table from raw weights, normalizing them to sum 1.
    pub fn from_weights(weights: BTreeMap<String, f64>) -> EnsembleResult<Self> {
        Ok(Self {
            weights: normalize(&weights)?,
        })
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.weights.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Signal ids in stable (sorted) order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(|k| k.as_str())
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    /// Merge `new` into the table.
    ///
    /// `new` is normalized to sum 1 and merged by key; ids it does not name
    /// keep their prior weight, and the merged table is rescaled to sum 1.
    /// A zero-sum, negative or non-finite map is rejected and the table is
    /// left untouched.
    pub fn update(&mut self, new: &BTreeMap<String, f64>) -> EnsembleResult<()> {
        let incoming = normalize(new)?;
        let mut merged = self.weights.clone();
        merged.extend(incoming);
        self.weights = normalize(&merged)?;
        Ok(())
    }

    /// Load from JSON; the stored weights are validated and normalized.
    pub fn load(path: &Path) -> EnsembleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EnsembleError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let raw: BTreeMap<String, f64> =
            serde_json::from_str(&content).map_err(|e| EnsembleError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Self::from_weights(raw)
    }

    /// Load from JSON, or the default table when the file does not exist.
    pub fn load_or_default(path: &Path) -> EnsembleResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> EnsembleResult<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| EnsembleError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EnsembleError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| EnsembleError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

fn normalize(weights: &BTreeMap<String, f64>) -> EnsembleResult<BTreeMap<String, f64>> {
    for (id, &w) in weights {
        if !w.is_finite() || w < 0.0 {
            return Err(EnsembleError::InvalidWeight {
                signal: id.clone(),
                weight: w,
            });
        }
    }
    let total: f64 = weights.values().sum();
    if total <= 0.0 {
        return Err(EnsembleError::ZeroSum);
    }
    Ok(weights
        .iter()
        .map(|(id, w)| (id.clone(), w / total))
        .collect())
}

// ---------------------------------------------------------------------------
// Combiner
// ---------------------------------------------------------------------------

/// The blended vector for one text, plus what each signal said.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedSentiment {
    pub vector: SentimentVector,
    /// Readings of the signals that contributed, keyed by signal id.
    pub signals: BTreeMap<String, SignalReading>,
}

impl CombinedSentiment {
    /// Whether any contributing signal fell back to neutral.
    pub fn is_degraded(&self) -> bool {
        self.signals.values().any(|r| r.is_degraded())
    }

    /// Per-signal compound scores.
    pub fn signal_compounds(&self) -> BTreeMap<String, f64> {
        self.signals
            .iter()
            .map(|(id, r)| (id.clone(), r.vector.compound))
            .collect()
    }
}

/// Blends the active providers under a shared, updatable weight table.
#[derive(Debug)]
pub struct EnsembleCombiner {
    registry: ProviderRegistry,
    weights: RwLock<SignalWeightTable>,
}

impl EnsembleCombiner {
    pub fn new(registry: ProviderRegistry, weights: SignalWeightTable) -> Self {
        Self {
            registry,
            weights: RwLock::new(weights),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Snapshot of the current weight table.
    pub fn weights(&self) -> SignalWeightTable {
        self.weights.read().expect("weight table lock poisoned").clone()
    }

    /// Signal ids present in both the registry and the weight table, in table order.
    pub fn active_signals(&self) -> Vec<String> {
        let weights = self.weights.read().expect("weight table lock poisoned");
        weights
            .ids()
            .filter(|id| self.registry.contains(id))
            .map(str::to_string)
            .collect()
    }

    /// Blend every active signal's reading of `text`.
    ///
    /// `compound` is the plain weighted sum. The three shares are weighted
    /// the same way and then rescaled to sum 1 (left at 0 if they sum to 0).
    pub fn combine(&self, text: &str) -> CombinedSentiment {
        let weights = self.weights();
        let mut blended = SentimentVector::UNSET;
        let mut signals = BTreeMap::new();

        for (id, weight) in weights.iter() {
            let Some(reading) = self.registry.score(id, text) else {
                continue;
            };
            blended.compound += weight * reading.vector.compound;
            blended.positive += weight * reading.vector.positive;
            blended.negative += weight * reading.vector.negative;
            blended.neutral += weight * reading.vector.neutral;
            signals.insert(id.to_string(), reading);
        }

        CombinedSentiment {
            vector: blended.normalized(),
            signals,
        }
    }

    /// Merge new weights into the table (see [`SignalWeightTable::update`]).
    ///
    /// On rejection the error is logged and returned; the table is unchanged.
    pub fn update_weights(&self, new: &BTreeMap<String, f64>) -> EnsembleResult<()> {
        let mut weights = self.weights.write().expect("weight table lock poisoned");
        match weights.update(new) {
            Ok(()) => {
                tracing::info!(signals = weights.len(), "ensemble weights updated");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "ensemble weight update rejected");
                Err(e)
            }
        }
    }
}
