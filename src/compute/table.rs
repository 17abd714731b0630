//! Rule table resolution.
//!
//! Turns the textual table into a per-state lookup from live-neighbour count
//! to next state, renders the simulator's rule string, and flattens a rule
//! into features for a value network.

use crate::error::Result;
use crate::schema::{Cell, Rule};

/// Resolved transitions: `rows[state][count]` is the next state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    rows: Vec<Vec<Option<usize>>>,
}

impl TransitionTable {
    /// Resolve a validated copy of `rule`.
    ///
    /// `"A"` claims every count, explicit sets claim their counts, then the
    /// row's complement column takes whatever is left. Counts no column
    /// claims resolve to `None`.
    pub fn from_rule(rule: &Rule) -> Result<Self> {
        rule.validate()?;
        let n_counts = rule.max_neighbors()? as usize + 1;

        let rows = rule
            .table
            .iter()
            .map(|row| {
                let mut lookup = vec![None; n_counts];
                let mut complement = None;
                for (next, cell) in row.iter().enumerate() {
                    match cell {
                        Cell::All => lookup.fill(Some(next)),
                        Cell::Complement => complement = Some(next),
                        Cell::Empty => {}
                        Cell::Counts(set) => {
                            for &count in set {
                                lookup[count as usize] = Some(next);
                            }
                        }
                    }
                }
                if let Some(next) = complement {
                    for slot in lookup.iter_mut().filter(|s| s.is_none()) {
                        *slot = Some(next);
                    }
                }
                lookup
            })
            .collect();

        Ok(Self { rows })
    }

    /// Next state for a cell in `state` with `live_neighbors` live neighbours.
    #[inline]
    pub fn next_state(&self, state: usize, live_neighbors: u32) -> Option<usize> {
        self.rows
            .get(state)?
            .get(live_neighbors as usize)
            .copied()
            .flatten()
    }

    pub fn rows(&self) -> &[Vec<Option<usize>>] {
        &self.rows
    }

    /// True if every (state, count) pair has a transition.
    pub fn is_total(&self) -> bool {
        self.rows.iter().flatten().all(Option::is_some)
    }
}

/// Display form used by the simulator, e.g. `{{C/2/-}, {-/2,3/C}, {A/-/-}}`.
pub fn rule_string(rule: &Rule) -> String {
    let rows: Vec<String> = rule
        .table
        .iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(Cell::to_string).collect();
            format!("{{{}}}", cells.join("/"))
        })
        .collect();
    format!("{{{}}}", rows.join(", "))
}

/// Flat features for a value network.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEncoding {
    pub n_states: usize,
    /// Neighbour counts per row (`max_nbrs + 1`).
    pub n_counts: usize,
    /// One-hot `[current][next][count]` transitions followed by a live-state
    /// indicator per state.
    pub features: Vec<f32>,
}

impl RuleEncoding {
    /// Length of the transition block.
    pub fn transition_len(&self) -> usize {
        self.n_states * self.n_states * self.n_counts
    }

    /// Live-state indicator block.
    pub fn live_mask(&self) -> &[f32] {
        &self.features[self.transition_len()..]
    }
}

/// Encode a rule as [`RuleEncoding`].
pub fn encode(rule: &Rule) -> Result<RuleEncoding> {
    let table = TransitionTable::from_rule(rule)?;
    let n_states = rule.n_states();
    let n_counts = rule.max_neighbors()? as usize + 1;

    let mut features = vec![0.0f32; n_states * n_states * n_counts + n_states];
    for (cur, row) in table.rows().iter().enumerate() {
        for (count, next) in row.iter().enumerate() {
            if let Some(next) = next {
                features[(cur * n_states + next) * n_counts + count] = 1.0;
            }
        }
    }
    let offset = n_states * n_states * n_counts;
    for &state in &rule.live_states {
        features[offset + state] = 1.0;
    }

    Ok(RuleEncoding {
        n_states,
        n_counts,
        features,
    })
}
