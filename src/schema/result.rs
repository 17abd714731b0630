//! Simulation result files produced by the external simulator.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Step budget assumed when a result file omits `maxSteps`.
pub const DEFAULT_MAX_STEPS: u64 = 3000;

fn default_max_steps() -> u64 {
    DEFAULT_MAX_STEPS
}

/// Why the simulator stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndStatus {
    /// Population grew past the simulator's threshold.
    Explosion,
    /// Population decayed past the simulator's threshold.
    Extinction,
    /// Population stopped changing.
    Flatline,
    /// Ran to the step budget.
    Continue,
    /// Any status this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl EndStatus {
    /// Explosion, extinction or flatline.
    pub fn is_abnormal(self) -> bool {
        matches!(
            self,
            EndStatus::Explosion | EndStatus::Extinction | EndStatus::Flatline
        )
    }
}

impl fmt::Display for EndStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EndStatus::Explosion => "explosion",
            EndStatus::Extinction => "extinction",
            EndStatus::Flatline => "flatline",
            EndStatus::Continue => "continue",
            EndStatus::Unknown => "unknown",
        })
    }
}

/// Population statistics for one recorded step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStats {
    /// Non-dead cells at this step.
    #[serde(default)]
    pub num_active_cubes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_live_cubes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_dying_cubes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_non_dead_cubes: Option<u64>,
    /// Cell count per state.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state_counts: Vec<u64>,
}

/// A simulator result file. Read-only input to the value function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    #[serde(default)]
    pub end_status: Option<EndStatus>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
    /// Step -> statistics. JSON keys are decimal step numbers; the map keeps
    /// them in ascending numeric order.
    pub population_record: BTreeMap<u64, StepStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_states: Option<Vec<usize>>,
}

impl SimulationResult {
    /// Build a result from a plain population series, one entry per step.
    pub fn from_population(
        end_status: Option<EndStatus>,
        max_steps: u64,
        population: impl IntoIterator<Item = u64>,
    ) -> Self {
        let population_record = population
            .into_iter()
            .enumerate()
            .map(|(step, n)| {
                (
                    step as u64,
                    StepStats {
                        num_active_cubes: n,
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self {
            end_status,
            max_steps,
            population_record,
            rule_string: None,
            live_states: None,
        }
    }

    /// Active-cell counts in ascending step order. Missing steps are skipped.
    pub fn population_series(&self) -> Vec<f64> {
        self.population_record
            .values()
            .map(|stats| stats.num_active_cubes as f64)
            .collect()
    }

    /// Last recorded step, if any.
    pub fn max_observed_step(&self) -> Option<u64> {
        self.population_record.keys().next_back().copied()
    }

    /// Load a result file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        super::read_json(path.as_ref())
    }
}
