//! Batch scoring and ranking of simulation results.

use std::cmp::Ordering;
use std::path::Path;

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::value::RuleValueFunction;
use crate::error::Result;
use crate::schema::{Score, SimulationResult};

/// A scored result with its label (usually the result file's stem).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRule {
    pub label: String,
    #[serde(flatten)]
    pub score: Score,
}

/// Best first; equal values fall back to label order.
fn rank_order(a: &RankedRule, b: &RankedRule) -> Ordering {
    b.score
        .value
        .total_cmp(&a.score.value)
        .then_with(|| a.label.cmp(&b.label))
}

/// Score every result in parallel, keeping input order.
pub fn evaluate_all(
    value_fn: &RuleValueFunction,
    results: &[(String, SimulationResult)],
) -> Vec<RankedRule> {
    results
        .par_iter()
        .map(|(label, result)| RankedRule {
            label: label.clone(),
            score: value_fn.evaluate(result),
        })
        .collect()
}

/// Score, filter and sort results, best first.
///
/// Scores below `min_value` are dropped.
pub fn rank(
    value_fn: &RuleValueFunction,
    results: &[(String, SimulationResult)],
    min_value: Option<f64>,
) -> Vec<RankedRule> {
    let mut ranked = evaluate_all(value_fn, results);
    if let Some(min) = min_value {
        ranked.retain(|r| r.score.value >= min);
    }
    ranked.sort_by(rank_order);

    if let Some(best) = ranked.first() {
        info!(
            "ranked {} of {} results, best {} = {:.4}",
            ranked.len(),
            results.len(),
            best.label,
            best.score.value
        );
    }
    ranked
}

/// Write a ranking as a JSON array in rank order.
pub fn save_ranking(path: impl AsRef<Path>, ranked: &[RankedRule]) -> Result<()> {
    crate::schema::write_json(path.as_ref(), &ranked)
}
