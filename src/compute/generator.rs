//! Biased stochastic synthesis of rule tables.
//!
//! Every count that shapes a rule (live states, targets per row, counts per
//! target, which count goes where) is a Beta(1, b) draw scaled onto its
//! range, so each bias `b > 1` skews the choice toward the small end.

use std::collections::BTreeSet;

use log::{debug, info};
use rayon::prelude::*;

use super::rng::RuleRng;
use crate::error::Result;
use crate::schema::{
    Cell, GeneratorConfig, Rule, RuleParams, StateBias, StateType, validate_generator_args,
};

/// Map a Beta draw onto `1 + floor(draw * span)`, clamped to `[1, hi]`.
#[inline]
fn scaled_count(draw: f64, span: usize, hi: usize) -> usize {
    (1 + (draw * span as f64) as usize).clamp(1, hi)
}

/// Generate one rule.
///
/// Requires `n_states >= 3`. All randomness comes from `rng`, so the same
/// seed and arguments always give the same rule.
pub fn generate_rule(
    n_dims: u32,
    n_states: usize,
    beta_live: f64,
    beta_sparse: &StateBias,
    beta_want: &StateBias,
    beta_unused: &StateBias,
    rng: &mut RuleRng,
) -> Result<Rule> {
    let max_nbrs = validate_generator_args(
        n_dims,
        n_states,
        beta_live,
        beta_sparse,
        beta_want,
        beta_unused,
    )?;

    // Live-state set
    let want_live = scaled_count(rng.beta(beta_live)?, n_states - 1, n_states - 1);
    let mut live_pool: Vec<usize> = (1..n_states).collect();
    rng.shuffle(&mut live_pool);
    let live_states: BTreeSet<usize> = live_pool[..want_live].iter().copied().collect();

    // Dead stays dead unless some other column claims the count.
    let mut table = vec![vec![Cell::Empty; n_states]; n_states];
    table[0][0] = Cell::Complement;

    for (cur, row) in table.iter_mut().enumerate() {
        let state_type = StateType::classify(cur, &live_states);
        let biases = RowBiases {
            sparse: beta_sparse.get(state_type),
            want: beta_want.get(state_type),
            unused: beta_unused.get(state_type),
        };
        fill_row(row, cur, max_nbrs, biases, rng)?;
    }

    debug!(
        "generated {}-state rule in {}D: live states {:?}",
        n_states, n_dims, live_states
    );

    Ok(Rule {
        table,
        live_states,
        params: RuleParams {
            n_dims,
            n_states,
            beta_live,
            beta_sparse: *beta_sparse,
            beta_want: *beta_want,
            beta_unused: *beta_unused,
            seed: rng.seed(),
        },
    })
}

/// Bias values for the type of the row being filled.
#[derive(Clone, Copy)]
struct RowBiases {
    sparse: f64,
    want: f64,
    unused: f64,
}

/// Fill row `cur` of the table.
fn fill_row(
    row: &mut [Cell],
    cur: usize,
    max_nbrs: u32,
    biases: RowBiases,
    rng: &mut RuleRng,
) -> Result<()> {
    let n_states = row.len();

    // Row 0 skips column 0, which already holds the complement marker.
    let start_col = usize::from(cur == 0);
    let mut targets: Vec<usize> = (start_col..n_states).collect();
    let max_non_empty = targets.len();
    let non_empty = scaled_count(rng.beta(biases.sparse)?, max_non_empty - 1, max_non_empty);
    rng.shuffle(&mut targets);
    targets.truncate(non_empty);

    // A dead cell with no live neighbours never matters, so row 0 leaves out count 0.
    let mut unused: Vec<u32> = if cur == 0 {
        (1..=max_nbrs).collect()
    } else {
        (0..=max_nbrs).collect()
    };

    // Every target but the last gets a count budget; the last is kept for
    // the complement. Row 0's complement is (0,0), so all its targets fill.
    let columns_to_fill = if cur == 0 {
        &targets[..]
    } else {
        &targets[..targets.len() - 1]
    };

    let mut budgets: Vec<(usize, usize)> = Vec::with_capacity(columns_to_fill.len());
    let mut unused_left = unused.len();
    for &tgt in columns_to_fill {
        if unused_left > 0 {
            let want = scaled_count(rng.beta(biases.want)?, unused_left, unused_left);
            budgets.push((tgt, want));
            unused_left -= want;
        }
    }

    // Round-robin over the budgeted columns in insertion order, popping one
    // biased pick from the shared pool per turn.
    let mut contents: Vec<Vec<u32>> = vec![Vec::new(); budgets.len()];
    let mut active: Vec<usize> = (0..budgets.len()).collect();
    while !active.is_empty() && !unused.is_empty() {
        for slot in active.clone() {
            if unused.is_empty() {
                break;
            }
            let draw = rng.beta(biases.unused)?;
            let index = ((draw * unused.len() as f64) as usize).min(unused.len() - 1);
            contents[slot].push(unused.remove(index));

            if contents[slot].len() >= budgets[slot].1 {
                active.retain(|&s| s != slot);
            }
        }
    }

    for (&(tgt, _), values) in budgets.iter().zip(contents) {
        row[tgt] = Cell::counts(values);
    }

    if cur > 0 {
        let last = targets[targets.len() - 1];
        row[last] = if unused.is_empty() {
            Cell::Empty
        } else {
            Cell::Complement
        };
    }

    Ok(())
}

/// Generates rules from a validated [`GeneratorConfig`].
#[derive(Debug, Clone)]
pub struct RuleGenerator {
    config: GeneratorConfig,
}

impl RuleGenerator {
    /// Create a generator; fails if the configuration is invalid.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate one rule, applying the configured bias jitter first.
    ///
    /// Jitter is drawn from the side stream of `rng`, so the rule's recorded
    /// biases and seed alone regenerate it through [`generate_rule`].
    pub fn generate(&self, rng: &mut RuleRng) -> Result<Rule> {
        let c = &self.config;
        if c.beta_noise > 0.0 {
            let mut noise = rng.side_stream();
            let mut jitter = |b: f64| (b * noise.gaussian(1.0, c.beta_noise)).max(1.0);
            let beta_live = jitter(c.beta_live);
            let beta_sparse = c.beta_sparse.map(&mut jitter);
            let beta_want = c.beta_want.map(&mut jitter);
            let beta_unused = c.beta_unused.map(&mut jitter);
            generate_rule(
                c.n_dims,
                c.n_states,
                beta_live,
                &beta_sparse,
                &beta_want,
                &beta_unused,
                rng,
            )
        } else {
            generate_rule(
                c.n_dims,
                c.n_states,
                c.beta_live,
                &c.beta_sparse,
                &c.beta_want,
                &c.beta_unused,
                rng,
            )
        }
    }

    /// Seed for rule `index` of a batch, if the configuration is seeded.
    pub fn seed_for(&self, index: u64) -> Option<u64> {
        self.config.seed.map(|base| base.wrapping_add(index))
    }

    /// Generate `count` rules in parallel, each from its own random source.
    ///
    /// With a configured seed, rule `i` is seeded with `seed + i`; otherwise
    /// seeds are drawn from entropy up front and recorded in each rule.
    pub fn generate_batch(&self, count: usize) -> Result<Vec<Rule>> {
        let seeds: Vec<u64> = match self.config.seed {
            Some(_) => (0..count as u64).filter_map(|i| self.seed_for(i)).collect(),
            None => {
                let mut master = RuleRng::random();
                (0..count).map(|_| master.next_seed()).collect()
            }
        };

        let rules = seeds
            .into_par_iter()
            .map(|seed| self.generate(&mut RuleRng::new(seed)))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "generated {} rules ({} states, {}D)",
            rules.len(),
            self.config.n_states,
            self.config.n_dims
        );
        Ok(rules)
    }
}
