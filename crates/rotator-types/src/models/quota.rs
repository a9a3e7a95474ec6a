//! Quota data models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Remaining quota for one model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelQuota {
    /// Remaining percentage (0-100)
    pub percentage: f64,
    /// Time when quota resets, as reported by the provider
    #[serde(rename = "resetTime", default)]
    pub reset_time: String,
}

/// Quota data for an account, keyed by model name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CloudQuotaData {
    /// Per-model quota information
    #[serde(default)]
    pub models: BTreeMap<String, ModelQuota>,
}

impl CloudQuotaData {
    /// Create empty quota data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a model quota entry.
    pub fn add_model(&mut self, name: impl Into<String>, percentage: f64, reset_time: impl Into<String>) {
        let _ = self.models.insert(
            name.into(),
            ModelQuota { percentage: percentage.clamp(0.0, 100.0), reset_time: reset_time.into() },
        );
    }

    /// True when no model entries are known.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Check if any model is below the given threshold percentage.
    pub fn any_below_threshold(&self, threshold: f64) -> bool {
        self.models.values().any(|m| m.percentage < threshold)
    }

    /// Get the minimum quota percentage across all models.
    pub fn min_percentage(&self) -> Option<f64> {
        self.models.values().map(|m| m.percentage).reduce(f64::min)
    }

    /// Mean percentage across all models, 0 when there are none.
    pub fn average_percentage(&self) -> f64 {
        if self.models.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.models.values().map(|m| m.percentage).sum();
        sum / self.models.len() as f64
    }

    /// Get quota for a specific model by case-insensitive name fragment.
    pub fn get_model_quota(&self, fragment: &str) -> Option<&ModelQuota> {
        let needle = fragment.to_lowercase();
        self.models.iter().find(|(name, _)| name.to_lowercase().contains(&needle)).map(|(_, q)| q)
    }
}
