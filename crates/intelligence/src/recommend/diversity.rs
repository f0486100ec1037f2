//! Owner-diversity decay over a ranked list.

use super::ScoredRepo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerDiversityConfig {
    pub decay: f64,
    pub floor: f64,
}

impl Default for OwnerDiversityConfig {
    fn default() -> Self {
        Self {
            decay: 0.7,
            floor: 0.1,
        }
    }
}

/// Penalizes repeated owners so one organization cannot fill a list.
#[derive(Debug, Clone, Default)]
pub struct OwnerDiversity {
    config: OwnerDiversityConfig,
}

impl OwnerDiversity {
    pub fn new(config: OwnerDiversityConfig) -> Self {
        Self { config }
    }

    /// Multiplier for an owner's `occurrence`-th appearance (0-based).
    pub fn multiplier(&self, occurrence: usize) -> f64 {
        let decay_factor = self.config.decay.powi(occurrence as i32);
        (1.0 - self.config.floor) * decay_factor + self.config.floor
    }

    /// Rescale `ranked` (best first) and re-sort it.
    pub fn apply(&self, ranked: &mut Vec<ScoredRepo>) {
        let mut owner_counts: HashMap<String, usize> = HashMap::new();
        for item in ranked.iter_mut() {
            let count = owner_counts
                .entry(item.repo.owner.login.to_ascii_lowercase())
                .or_insert(0);
            item.score = item.breakdown.total() * self.multiplier(*count);
            *count += 1;
        }
        ranked.sort_by(ScoredRepo::rank_order);
    }
}
