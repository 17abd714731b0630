//! Rule value function.
//!
//! Scores a rule from the population trace its simulation produced. The
//! trace is checked for abnormal termination and minimum length, the warm-up
//! transient is dropped, and three losses in `[0, 1]` (1 is worst) are
//! combined with configurable weights:
//!
//! - **growth**: distance of the fitted power-law exponent from the ideal
//! - **periodicity**: spectral concentration (strong periodicity is penalized)
//! - **complexity**: lack of step-to-step variation

use log::{debug, warn};

use super::spectrum::{magnitude_spectrum, peak_excluding_dc};
use crate::error::Result;
use crate::schema::{EndStatus, Score, SimulationResult, ValueFunctionConfig, ValueMapping};

/// Fewest recorded points worth analysing.
pub const MIN_SERIES_LEN: usize = 10;
/// Fewest points left after dropping the transient.
pub const MIN_STEADY_LEN: usize = 5;
/// Floor on the observed fraction of the step budget.
pub const MIN_OBSERVED_FRACTION: f64 = 0.05;

const POPULATION_FLOOR: f64 = 1e-10;
const FLAT_SIGNAL_EPS: f64 = 1e-10;
/// Exponent error that maps to the maximal growth loss.
const MAX_GROWTH_ERROR: f64 = 3.0;
/// Peak-to-norm ratio at which the periodicity score saturates.
const MAX_PEAK_RATIO: f64 = 50.0;

/// Evaluates simulation results.
#[derive(Debug, Clone, Default)]
pub struct RuleValueFunction {
    config: ValueFunctionConfig,
}

impl RuleValueFunction {
    /// Create a value function; fails if the configuration is invalid.
    pub fn new(config: ValueFunctionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ValueFunctionConfig {
        &self.config
    }

    /// Declared `(min, max)` of [`Score::value`] under the configured mapping.
    pub fn value_range(&self) -> (f64, f64) {
        match self.config.mapping {
            ValueMapping::NegatedLoss => {
                let worst_early = early_termination_penalty(MIN_OBSERVED_FRACTION);
                let worst = self.config.early_termination_weight * worst_early
                    + self.config.behaviour_weight();
                (-worst, 0.0)
            }
            ValueMapping::UnitInterval => (0.0, 1.0),
        }
    }

    fn clamp_value(&self, value: f64) -> f64 {
        let (lo, hi) = self.value_range();
        value.clamp(lo, hi)
    }

    /// Score one simulation result. Never fails on well-formed input.
    pub fn evaluate(&self, result: &SimulationResult) -> Score {
        if let Some(status) = result.end_status.filter(|s| s.is_abnormal()) {
            return self.abnormal(status, result);
        }

        let population = result.population_series();
        if population.len() < MIN_SERIES_LEN {
            debug!("{} points recorded, not scoring", population.len());
            return Score::insufficient("Insufficient data points");
        }

        let cutoff = (population.len() as f64 * self.config.transient_ratio) as usize;
        let steady = &population[cutoff..];
        if steady.len() < MIN_STEADY_LEN {
            debug!("{} points after transient, not scoring", steady.len());
            return Score::insufficient("Insufficient steady-state data");
        }

        let growth = growth_loss(steady, self.config.ideal_growth_exp);
        let periodicity = periodicity_loss(steady);
        let complexity = complexity_loss(steady);
        let total = self.config.growth_weight * growth
            + self.config.periodicity_weight * periodicity
            + self.config.complexity_weight * complexity;

        let (value, early_termination_loss) = match self.config.mapping {
            ValueMapping::NegatedLoss => (-total, Some(0.0)),
            ValueMapping::UnitInterval => (1.0 - total / self.config.behaviour_weight(), None),
        };

        Score {
            value: self.clamp_value(value),
            reason: None,
            early_termination_loss,
            growth_loss: Some(growth),
            periodicity_loss: Some(periodicity),
            complexity_loss: Some(complexity),
            total_loss: Some(total),
        }
    }

    /// Score for an explosion, extinction or flatline run.
    fn abnormal(&self, status: EndStatus, result: &SimulationResult) -> Score {
        let behaviour = self.config.behaviour_weight();
        let (value, total, early_termination_loss) = match self.config.mapping {
            ValueMapping::NegatedLoss => {
                let early = early_termination_loss(result);
                let total = self.config.early_termination_weight * early + behaviour;
                (-total, total, Some(early))
            }
            ValueMapping::UnitInterval => (0.0, behaviour, None),
        };
        debug!("early termination ({status}), total loss {total:.3}");

        Score {
            value: self.clamp_value(value),
            reason: Some(format!("Early termination: {status}")),
            early_termination_loss,
            growth_loss: Some(1.0),
            periodicity_loss: Some(1.0),
            complexity_loss: Some(1.0),
            total_loss: Some(total),
        }
    }
}

/// `sqrt(1/f^2 - 1)`: 0 at the full budget, growing as the run stops earlier.
fn early_termination_penalty(observed_fraction: f64) -> f64 {
    let f = observed_fraction.clamp(MIN_OBSERVED_FRACTION, 1.0);
    ((1.0 / f).powi(2) - 1.0).sqrt()
}

/// Early-termination loss for a result, from its last recorded step relative
/// to its step budget. The fraction is floored at 5% of the budget.
pub fn early_termination_loss(result: &SimulationResult) -> f64 {
    let max_steps = result.max_steps.max(1) as f64;
    let observed = result.max_observed_step().unwrap_or(0) as f64;
    early_termination_penalty(observed / max_steps)
}

/// Least-squares slope of `ln(population)` against `ln(t)`, `t = 1..=n`.
///
/// Returns `None` when the fit is undefined (fewer than two points or
/// non-finite values).
pub fn growth_exponent(population: &[f64]) -> Option<f64> {
    let n = population.len();
    if n < 2 {
        return None;
    }

    let xs: Vec<f64> = (1..=n).map(|t| (t as f64).ln()).collect();
    let ys: Vec<f64> = population
        .iter()
        .map(|&p| p.max(POPULATION_FLOOR).ln())
        .collect();

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;
    let (sxx, sxy) = xs
        .iter()
        .zip(&ys)
        .fold((0.0, 0.0), |(sxx, sxy), (&x, &y)| {
            let dx = x - mean_x;
            (sxx + dx * dx, sxy + dx * (y - mean_y))
        });

    let slope = sxy / sxx;
    slope.is_finite().then_some(slope)
}

/// `min(|exponent - ideal| / 3, 1)`. A failed fit counts as exponent 0.
pub fn growth_loss(population: &[f64], ideal_growth_exp: f64) -> f64 {
    let exponent = growth_exponent(population).unwrap_or_else(|| {
        warn!("growth fit failed on {} points, using exponent 0", population.len());
        0.0
    });
    ((exponent - ideal_growth_exp).abs() / MAX_GROWTH_ERROR).min(1.0)
}

/// `log1p(peak / norm) / log1p(50)`, capped at 1, for the zero-mean series.
/// A flat series scores 1.
pub fn periodicity_loss(population: &[f64]) -> f64 {
    if population.is_empty() {
        return 1.0;
    }
    let mean = population.iter().sum::<f64>() / population.len() as f64;
    let centered: Vec<f64> = population.iter().map(|&p| p - mean).collect();
    let norm = centered.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm < FLAT_SIGNAL_EPS || !norm.is_finite() {
        return 1.0;
    }

    let spectrum = magnitude_spectrum(&centered);
    let peak = peak_excluding_dc(&spectrum).map_or(0.0, |(_, m)| m);

    let max_score = MAX_PEAK_RATIO.ln_1p();
    let score = (peak / norm).ln_1p().min(max_score);
    score / max_score
}

/// `1 - min(TV / (n - 1), 1)` of the series scaled by its own maximum.
pub fn complexity_loss(population: &[f64]) -> f64 {
    if population.len() < 2 {
        return 1.0;
    }
    let max = population.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let scale = if max > 0.0 { max } else { 1.0 };

    let total_variation: f64 = population
        .windows(2)
        .map(|w| ((w[1] - w[0]) / scale).abs())
        .sum();
    let scaled = total_variation / (population.len() - 1) as f64;
    1.0 - scaled.min(1.0)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn result(status: Option<EndStatus>, max_steps: u64, population: &[u64]) -> SimulationResult {
        SimulationResult::from_population(status, max_steps, population.iter().copied())
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_growth_recovers_power_law() {
        for a in [0.0, 0.5, 1.0, 2.0, -1.0] {
            let series: Vec<f64> = (1..=200).map(|t| (t as f64).powf(a)).collect();
            let exponent = growth_exponent(&series).unwrap();
            assert!(close(exponent, a), "a={a}, got {exponent}");
            assert!(growth_loss(&series, a) < 1e-9);
            assert!(close(growth_loss(&series, a + 3.0), 1.0));
            assert_eq!(growth_loss(&series, a - 5.0), 1.0);
            assert!(close(growth_loss(&series, a + 1.5), 0.5));
        }
    }

    #[test]
    fn test_growth_fit_failure_falls_back_to_zero() {
        let series = [1.0, 2.0, f64::INFINITY, 4.0, 5.0];
        assert_eq!(growth_exponent(&series), None);
        assert!(close(growth_loss(&series, 1.0), 1.0 / 3.0));
        assert_eq!(growth_loss(&series, 0.0), 0.0);
        assert_eq!(growth_exponent(&[3.0]), None);
    }

    #[test]
    fn test_growth_floors_zero_population() {
        let series = [0.0; 12];
        assert!(close(growth_exponent(&series).unwrap(), 0.0));
    }

    #[test]
    fn test_periodicity_sinusoid_is_maximal() {
        let n = 8192;
        let series: Vec<f64> = (0..n)
            .map(|t| 100.0 + 10.0 * (2.0 * PI * 64.0 * t as f64 / n as f64).sin())
            .collect();
        assert!(periodicity_loss(&series) > 0.99);
    }

    #[test]
    fn test_periodicity_noise_is_lower() {
        let n = 8192;
        let sinusoid: Vec<f64> = (0..n)
            .map(|t| (2.0 * PI * 64.0 * t as f64 / n as f64).sin())
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let noise: Vec<f64> = (0..n).map(|_| rng.r#gen::<f64>()).collect();

        let periodic = periodicity_loss(&sinusoid);
        let aperiodic = periodicity_loss(&noise);
        assert!(aperiodic < 0.6, "noise loss {aperiodic}");
        assert!(periodic - aperiodic > 0.3);
    }

    #[test]
    fn test_periodicity_flat_signal() {
        assert_eq!(periodicity_loss(&[7.0; 20]), 1.0);
        assert_eq!(periodicity_loss(&[]), 1.0);
    }

    #[test]
    fn test_periodicity_bounds() {
        let series: Vec<f64> = (0..50).map(|t| ((t * 7919) % 31) as f64).collect();
        let loss = periodicity_loss(&series);
        assert!((0.0..=1.0).contains(&loss));
    }

    #[test]
    fn test_complexity_bounds() {
        assert_eq!(complexity_loss(&[5.0; 30]), 1.0);
        assert_eq!(complexity_loss(&[0.0; 30]), 1.0);

        let zigzag: Vec<f64> = (0..30).map(|t| (t % 2) as f64).collect();
        assert!(close(complexity_loss(&zigzag), 0.0));
        assert!(close(complexity_loss(&[0.0, 10.0]), 0.0));

        // A long ramp changes little per step relative to its max.
        let ramp: Vec<f64> = (1..=70).map(|t| t as f64).collect();
        assert!(close(complexity_loss(&ramp), 1.0 - 1.0 / 70.0));
    }

    #[test]
    fn test_early_termination_monotonic() {
        let mut last = f64::INFINITY;
        for stop in (300..=3000).step_by(300) {
            let mut r = result(Some(EndStatus::Extinction), 3000, &[10, 10]);
            r.population_record = [(0, Default::default()), (stop, Default::default())]
                .into_iter()
                .collect();
            let loss = early_termination_loss(&r);
            assert!(loss < last, "loss at {stop} = {loss}, previous {last}");
            last = loss;
        }
        assert_eq!(last, 0.0);

        // Below the 5% floor the loss no longer changes.
        let floor = early_termination_penalty(MIN_OBSERVED_FRACTION);
        assert!(close(early_termination_penalty(0.01), floor));
        assert!(close(floor, 399f64.sqrt()));
    }

    #[test]
    fn test_abnormal_negated_loss() {
        let value_fn = RuleValueFunction::default();
        let population: Vec<u64> = vec![10; 1501];
        let score = value_fn.evaluate(&result(Some(EndStatus::Extinction), 3000, &population));

        let early = 3f64.sqrt();
        let total = 0.5 * early + 0.5;
        assert_eq!(score.reason.as_deref(), Some("Early termination: extinction"));
        assert!(close(score.early_termination_loss.unwrap(), early));
        assert_eq!(score.growth_loss, Some(1.0));
        assert_eq!(score.periodicity_loss, Some(1.0));
        assert_eq!(score.complexity_loss, Some(1.0));
        assert!(close(score.total_loss.unwrap(), total));
        assert!(close(score.value, -total));
    }

    #[test]
    fn test_abnormal_unit_interval() {
        let value_fn = RuleValueFunction::new(ValueFunctionConfig {
            mapping: ValueMapping::UnitInterval,
            ..Default::default()
        })
        .unwrap();
        let score = value_fn.evaluate(&result(Some(EndStatus::Explosion), 3000, &[1, 2, 4]));
        assert_eq!(score.value, 0.0);
        assert_eq!(score.early_termination_loss, None);
        assert_eq!(score.reason.as_deref(), Some("Early termination: explosion"));
    }

    #[test]
    fn test_insufficient_data() {
        let value_fn = RuleValueFunction::default();
        let score = value_fn.evaluate(&result(None, 3000, &[1; 9]));
        assert_eq!(score.value, 0.0);
        assert_eq!(score.reason.as_deref(), Some("Insufficient data points"));
        assert!(score.breakdown().is_empty());

        let value_fn = RuleValueFunction::new(ValueFunctionConfig {
            transient_ratio: 0.6,
            ..Default::default()
        })
        .unwrap();
        let score = value_fn.evaluate(&result(None, 3000, &[1; 10]));
        assert_eq!(score.reason.as_deref(), Some("Insufficient steady-state data"));
        assert_eq!(score.value, 0.0);
    }

    #[test]
    fn test_normal_evaluation_breakdown() {
        // 100 points; the first 30 are transient, the rest are 1..=70.
        let population: Vec<u64> = (0..100u64).map(|i| if i < 30 { 500 } else { i - 29 }).collect();
        let r = result(Some(EndStatus::Continue), 3000, &population);
        let value_fn = RuleValueFunction::default();
        let score = value_fn.evaluate(&r);

        let steady: Vec<f64> = (1..=70).map(|t| t as f64).collect();
        let periodicity = periodicity_loss(&steady);
        let complexity = 1.0 - 1.0 / 70.0;

        assert_eq!(score.reason, None);
        assert!(score.growth_loss.unwrap() < 1e-9);
        assert!(close(score.periodicity_loss.unwrap(), periodicity));
        assert!(close(score.complexity_loss.unwrap(), complexity));
        let total = 0.2 * periodicity + 0.1 * complexity;
        assert!((score.total_loss.unwrap() - total).abs() < 1e-9);
        assert!((score.value + total).abs() < 1e-9);
        assert_eq!(score.early_termination_loss, Some(0.0));

        let (lo, hi) = value_fn.value_range();
        assert!(score.value >= lo && score.value <= hi);
        assert_eq!(value_fn.evaluate(&r), score);
    }

    #[test]
    fn test_normal_evaluation_unit_interval() {
        let population: Vec<u64> = (0..100u64).map(|i| if i < 30 { 500 } else { i - 29 }).collect();
        let r = result(None, 3000, &population);
        let negated = RuleValueFunction::default().evaluate(&r);
        let unit = RuleValueFunction::new(ValueFunctionConfig {
            mapping: ValueMapping::UnitInterval,
            ..Default::default()
        })
        .unwrap()
        .evaluate(&r);

        assert_eq!(unit.total_loss, negated.total_loss);
        assert!(close(unit.value, 1.0 - negated.total_loss.unwrap() / 0.5));
        assert!((0.0..=1.0).contains(&unit.value));
        assert_eq!(unit.early_termination_loss, None);
    }

    #[test]
    fn test_degenerate_series_still_scores() {
        let value_fn = RuleValueFunction::default();
        let score = value_fn.evaluate(&result(Some(EndStatus::Continue), 3000, &[0; 20]));
        assert!(close(score.growth_loss.unwrap(), 1.0 / 3.0));
        assert_eq!(score.periodicity_loss, Some(1.0));
        assert_eq!(score.complexity_loss, Some(1.0));
        assert!(score.value.is_finite());
    }

    #[test]
    fn test_unknown_status_is_scored_normally() {
        let value_fn = RuleValueFunction::default();
        let population: Vec<u64> = (1..=40).collect();
        let score = value_fn.evaluate(&result(Some(EndStatus::Unknown), 3000, &population));
        assert_eq!(score.reason, None);
        assert!(score.total_loss.is_some());
    }

    #[test]
    fn test_value_range() {
        let (lo, hi) = RuleValueFunction::default().value_range();
        assert_eq!(hi, 0.0);
        assert!(close(lo, -(0.5 * 399f64.sqrt() + 0.5)));
    }
}
