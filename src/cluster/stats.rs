//! Running similarity statistics for a cluster.
//!
//! Welford's online algorithm: O(1) per admitted member, no stored
//! similarity history, numerically stable for the short streams this
//! engine sees.

use serde::{Deserialize, Serialize};

/// Running mean and variance of admission similarities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl SimilarityStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one admission similarity into the running statistics.
    pub fn push(&mut self, sample: f64) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = sample - self.mean;
        self.m2 += delta * delta2;
    }

    /// Number of samples observed.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Running mean; 0.0 before any sample.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance; 0.0 below two samples.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Population standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
