//! Configuration types for rule generation and rule scoring.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{DEFAULT_N_DIMS, StateType, moore_neighbors};
use crate::error::{Error, Result};

/// A bias value per state type.
///
/// Every Beta(1, b) draw in the generator looks up `b` here by the type of
/// the row being built, so the three fields are required.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateBias {
    pub dead: f64,
    pub live: f64,
    pub dying: f64,
}

impl StateBias {
    /// Same bias for all three types.
    pub fn uniform(value: f64) -> Self {
        Self {
            dead: value,
            live: value,
            dying: value,
        }
    }

    #[inline]
    pub fn get(&self, state_type: StateType) -> f64 {
        match state_type {
            StateType::Dead => self.dead,
            StateType::Live => self.live,
            StateType::Dying => self.dying,
        }
    }

    fn get_mut(&mut self, state_type: StateType) -> &mut f64 {
        match state_type {
            StateType::Dead => &mut self.dead,
            StateType::Live => &mut self.live,
            StateType::Dying => &mut self.dying,
        }
    }

    /// Apply `f` to each value in dead, live, dying order.
    pub fn map(&self, mut f: impl FnMut(f64) -> f64) -> Self {
        Self {
            dead: f(self.dead),
            live: f(self.live),
            dying: f(self.dying),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        for state_type in StateType::ALL {
            let value = self.get(state_type);
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::invalid(format!(
                    "{name}.{state_type} must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Parses `"dead:4,live:2,dying:1.5"`.
impl FromStr for StateBias {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut values: [Option<f64>; 3] = [None; 3];
        for pair in s.split(',') {
            let (key, value) = pair
                .split_once(':')
                .ok_or_else(|| Error::invalid(format!("expected 'type:value', got {pair:?}")))?;
            let state_type: StateType = key.parse()?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| Error::invalid(format!("bad bias value in {pair:?}")))?;
            if values[state_type as usize].replace(value).is_some() {
                return Err(Error::invalid(format!(
                    "bias for '{state_type}' given twice in {s:?}"
                )));
            }
        }

        let mut bias = StateBias::uniform(0.0);
        for state_type in StateType::ALL {
            *bias.get_mut(state_type) = values[state_type as usize]
                .ok_or_else(|| Error::invalid(format!("missing bias for '{state_type}' in {s:?}")))?;
        }
        Ok(bias)
    }
}

impl fmt::Display for StateBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dead:{},live:{},dying:{}", self.dead, self.live, self.dying)
    }
}

/// Largest dimensionality the generator accepts (728 neighbour counts).
pub const MAX_N_DIMS: u32 = 6;

fn default_n_dims() -> u32 {
    DEFAULT_N_DIMS
}
fn default_n_states() -> usize {
    5
}
fn default_beta_live() -> f64 {
    2.0
}
fn default_beta_sparse() -> StateBias {
    StateBias {
        dead: 4.0,
        live: 2.0,
        dying: 1.5,
    }
}
fn default_beta_want() -> StateBias {
    StateBias {
        dead: 6.0,
        live: 5.0,
        dying: 2.5,
    }
}
fn default_beta_unused() -> StateBias {
    StateBias {
        dead: 4.0,
        live: 2.0,
        dying: 1.2,
    }
}

/// Rule generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Spatial dimensions.
    #[serde(default = "default_n_dims")]
    pub n_dims: u32,
    /// Total states (>= 3, state 0 is always dead).
    #[serde(default = "default_n_states")]
    pub n_states: usize,
    /// Higher values mean fewer live states.
    #[serde(default = "default_beta_live")]
    pub beta_live: f64,
    /// Higher values mean fewer non-empty targets per row.
    #[serde(default = "default_beta_sparse")]
    pub beta_sparse: StateBias,
    /// Higher values mean fewer neighbour counts per target.
    #[serde(default = "default_beta_want")]
    pub beta_want: StateBias,
    /// Higher values pick earlier pool entries more strongly.
    #[serde(default = "default_beta_unused")]
    pub beta_unused: StateBias,
    /// Base seed; rule `i` of a batch uses `seed + i`.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Std of the multiplicative Gaussian jitter on every bias (0 disables).
    #[serde(default)]
    pub beta_noise: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            n_dims: default_n_dims(),
            n_states: default_n_states(),
            beta_live: default_beta_live(),
            beta_sparse: default_beta_sparse(),
            beta_want: default_beta_want(),
            beta_unused: default_beta_unused(),
            seed: None,
            beta_noise: 0.0,
        }
    }
}

impl GeneratorConfig {
    /// Validate generator parameters.
    pub fn validate(&self) -> Result<()> {
        validate_generator_args(
            self.n_dims,
            self.n_states,
            self.beta_live,
            &self.beta_sparse,
            &self.beta_want,
            &self.beta_unused,
        )?;
        if !(self.beta_noise.is_finite() && self.beta_noise >= 0.0) {
            return Err(Error::invalid(format!(
                "beta_noise must be non-negative, got {}",
                self.beta_noise
            )));
        }
        Ok(())
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = super::read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

/// Shared argument checks for [`GeneratorConfig`] and the free generator entry point.
pub(crate) fn validate_generator_args(
    n_dims: u32,
    n_states: usize,
    beta_live: f64,
    beta_sparse: &StateBias,
    beta_want: &StateBias,
    beta_unused: &StateBias,
) -> Result<u32> {
    if n_states < 3 {
        return Err(Error::invalid(format!(
            "need at least three states, got {n_states}"
        )));
    }
    if n_dims > MAX_N_DIMS {
        return Err(Error::invalid(format!(
            "n_dims must be at most {MAX_N_DIMS}, got {n_dims}"
        )));
    }
    let max_nbrs = moore_neighbors(n_dims)?;
    if !(beta_live.is_finite() && beta_live > 0.0) {
        return Err(Error::invalid(format!(
            "beta_live must be a positive number, got {beta_live}"
        )));
    }
    beta_sparse.validate("beta_sparse")?;
    beta_want.validate("beta_want")?;
    beta_unused.validate("beta_unused")?;
    Ok(max_nbrs)
}

/// How total loss becomes the reported value.
///
/// The two conventions are incompatible; pick one per deployment and do not
/// compare values across them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueMapping {
    /// `value = -total_loss`, 0 is best. Abnormal runs add the weighted
    /// early-termination loss.
    #[default]
    NegatedLoss,
    /// `value = 1 - total_loss / behaviour_weight_sum` in `[0, 1]`, 1 is best.
    /// Abnormal runs score a flat 0.
    UnitInterval,
}

fn default_transient_ratio() -> f64 {
    0.3
}
fn default_early_termination_weight() -> f64 {
    0.5
}
fn default_growth_weight() -> f64 {
    0.2
}
fn default_periodicity_weight() -> f64 {
    0.2
}
fn default_complexity_weight() -> f64 {
    0.1
}
fn default_ideal_growth_exp() -> f64 {
    1.0
}

/// Rule value function configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFunctionConfig {
    /// Leading fraction of the series dropped as transient.
    #[serde(default = "default_transient_ratio")]
    pub transient_ratio: f64,
    #[serde(default = "default_early_termination_weight")]
    pub early_termination_weight: f64,
    #[serde(default = "default_growth_weight")]
    pub growth_weight: f64,
    #[serde(default = "default_periodicity_weight")]
    pub periodicity_weight: f64,
    #[serde(default = "default_complexity_weight")]
    pub complexity_weight: f64,
    /// Preferred power-law exponent (0 constant, 1 linear, 2 quadratic).
    #[serde(default = "default_ideal_growth_exp")]
    pub ideal_growth_exp: f64,
    #[serde(default)]
    pub mapping: ValueMapping,
}

impl Default for ValueFunctionConfig {
    fn default() -> Self {
        Self {
            transient_ratio: default_transient_ratio(),
            early_termination_weight: default_early_termination_weight(),
            growth_weight: default_growth_weight(),
            periodicity_weight: default_periodicity_weight(),
            complexity_weight: default_complexity_weight(),
            ideal_growth_exp: default_ideal_growth_exp(),
            mapping: ValueMapping::default(),
        }
    }
}

impl ValueFunctionConfig {
    /// Sum of the three behavioural weights.
    #[inline]
    pub fn behaviour_weight(&self) -> f64 {
        self.growth_weight + self.periodicity_weight + self.complexity_weight
    }

    /// Validate weights and ratios.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.transient_ratio) {
            return Err(Error::invalid(format!(
                "transient_ratio must be in [0, 1), got {}",
                self.transient_ratio
            )));
        }
        let weights = [
            ("early_termination_weight", self.early_termination_weight),
            ("growth_weight", self.growth_weight),
            ("periodicity_weight", self.periodicity_weight),
            ("complexity_weight", self.complexity_weight),
        ];
        for (name, weight) in weights {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(Error::invalid(format!(
                    "{name} must be non-negative, got {weight}"
                )));
            }
        }
        if !self.ideal_growth_exp.is_finite() {
            return Err(Error::invalid("ideal_growth_exp must be finite"));
        }
        if self.mapping == ValueMapping::UnitInterval && self.behaviour_weight() <= 0.0 {
            return Err(Error::invalid(
                "unit_interval mapping needs a positive behavioural weight sum",
            ));
        }
        Ok(())
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = super::read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_bias_parse() {
        let bias: StateBias = "dead:4, live:2,dying:1.5".parse().unwrap();
        assert_eq!(bias, default_beta_sparse());
        assert_eq!(bias.get(StateType::Live), 2.0);

        let round: StateBias = bias.to_string().parse().unwrap();
        assert_eq!(round, bias);
    }

    #[test]
    fn test_state_bias_rejects_bad_keys() {
        for bad in [
            "dead:4,live:2,zombie:1",
            "dead:4,live:2",
            "dead=4,live:2,dying:1",
            "dead:x,live:2,dying:1",
            "dead:1,dead:9,live:2,dying:1",
        ] {
            assert!(
                matches!(bad.parse::<StateBias>(), Err(Error::InvalidArgument(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_state_bias_json_rejects_unknown_key() {
        let ok: StateBias = serde_json::from_str(r#"{"dead":1,"live":2,"dying":3}"#).unwrap();
        assert_eq!(ok.dying, 3.0);
        assert!(
            serde_json::from_str::<StateBias>(r#"{"dead":1,"live":2,"dying":3,"undead":4}"#)
                .is_err()
        );
    }

    #[test]
    fn test_generator_config_defaults_from_partial_json() {
        let config: GeneratorConfig = serde_json::from_str(r#"{"n_states": 4, "seed": 9}"#).unwrap();
        assert_eq!(config.n_states, 4);
        assert_eq!(config.n_dims, 3);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.beta_want, default_beta_want());
        config.validate().unwrap();
    }

    #[test]
    fn test_generator_config_validation() {
        let config = GeneratorConfig {
            n_states: 2,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));

        let config = GeneratorConfig {
            n_dims: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GeneratorConfig {
            n_dims: MAX_N_DIMS + 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));
        let config = GeneratorConfig {
            n_dims: MAX_N_DIMS,
            ..Default::default()
        };
        config.validate().unwrap();

        let config = GeneratorConfig {
            beta_unused: StateBias {
                dying: 0.0,
                ..default_beta_unused()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GeneratorConfig {
            beta_noise: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_value_config_validation() {
        ValueFunctionConfig::default().validate().unwrap();

        let config = ValueFunctionConfig {
            transient_ratio: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ValueFunctionConfig {
            growth_weight: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ValueFunctionConfig {
            growth_weight: 0.0,
            periodicity_weight: 0.0,
            complexity_weight: 0.0,
            mapping: ValueMapping::UnitInterval,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_value_mapping_json() {
        let config: ValueFunctionConfig =
            serde_json::from_str(r#"{"mapping": "unit_interval"}"#).unwrap();
        assert_eq!(config.mapping, ValueMapping::UnitInterval);
        assert_eq!(config.transient_ratio, 0.3);
    }
}
