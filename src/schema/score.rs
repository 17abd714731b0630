//! Score produced by the rule value function.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Scalar value plus the named losses behind it.
///
/// Serializes flat, e.g. `{"value": -0.31, "growth_loss": 0.2, ...}`, with
/// absent terms omitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Score {
    /// Fitness, higher is better. Range depends on the value mapping.
    pub value: f64,
    /// Set when evaluation was short-circuited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_termination_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub growth_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodicity_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_loss: Option<f64>,
}

impl Score {
    /// A neutral score for input too short to analyse.
    pub fn insufficient(reason: impl Into<String>) -> Self {
        Self {
            value: 0.0,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Named losses present in this score, in a fixed order.
    pub fn breakdown(&self) -> Vec<(&'static str, f64)> {
        [
            ("early_termination_loss", self.early_termination_loss),
            ("growth_loss", self.growth_loss),
            ("periodicity_loss", self.periodicity_loss),
            ("complexity_loss", self.complexity_loss),
            ("total_loss", self.total_loss),
        ]
        .into_iter()
        .filter_map(|(name, loss)| Some((name, loss?)))
        .collect()
    }

    /// Write the score as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        super::write_json(path.as_ref(), self)
    }
}
