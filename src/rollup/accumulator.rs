//! Running weighted mean used by the corpus fold.

use serde::{Deserialize, Serialize};

/// `Σ compound × weight`, `Σ weight` and the number of contributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedAccumulator {
    pub compound_sum: f64,
    pub weight_sum: f64,
    pub count: usize,
}

impl WeightedAccumulator {
    pub fn add(&mut self, compound: f64, weight: f64) {
        self.compound_sum += compound * weight;
        self.weight_sum += weight;
        self.count += 1;
    }

    /// Weighted mean, or 0 when nothing with positive weight was added.
    pub fn score(&self) -> f64 {
        if self.weight_sum > 0.0 {
            self.compound_sum / self.weight_sum
        } else {
            0.0
        }
    }
}
