//! Rule types: the state-transition table of a multi-state Moore-neighbourhood
//! cellular automaton.
//!
//! A rule with `k` states is a `k x k` table. Cell `(i, j)` lists the
//! live-neighbour counts for which a cell in state `i` moves to state `j`.
//! Each row partitions the counts `0..=max_nbrs`, either explicitly or through
//! the complement marker.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::StateBias;
use crate::error::{Error, Result};

/// Dimensionality assumed when a rule file does not record one.
pub const DEFAULT_N_DIMS: u32 = 3;

fn default_n_dims() -> u32 {
    DEFAULT_N_DIMS
}

/// Size of a Moore neighbourhood (centre excluded) in `n_dims` dimensions.
pub fn moore_neighbors(n_dims: u32) -> Result<u32> {
    if n_dims == 0 {
        return Err(Error::invalid("n_dims must be at least 1"));
    }
    3u32.checked_pow(n_dims)
        .map(|cells| cells - 1)
        .ok_or_else(|| Error::invalid(format!("n_dims {n_dims} is too large")))
}

/// Classification of a state for bias lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    /// State 0.
    Dead,
    /// A state counted in neighbour tallies.
    Live,
    /// Any other non-zero state.
    Dying,
}

impl StateType {
    pub const ALL: [StateType; 3] = [StateType::Dead, StateType::Live, StateType::Dying];

    /// Classify `state` against a live-state set.
    pub fn classify(state: usize, live_states: &BTreeSet<usize>) -> Self {
        if state == 0 {
            StateType::Dead
        } else if live_states.contains(&state) {
            StateType::Live
        } else {
            StateType::Dying
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StateType::Dead => "dead",
            StateType::Live => "live",
            StateType::Dying => "dying",
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "dead" => Ok(StateType::Dead),
            "live" => Ok(StateType::Live),
            "dying" => Ok(StateType::Dying),
            other => Err(Error::invalid(format!(
                "invalid state type {other:?}, must be 'dead', 'live', or 'dying'"
            ))),
        }
    }
}

/// One entry of the transition table.
///
/// Serialized as `"A"`, `"C"`, `"-"` or an ascending comma-separated list
/// such as `"2,3,4"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cell {
    /// Every neighbour count.
    All,
    /// Every count not listed elsewhere in the row.
    Complement,
    /// No counts.
    #[default]
    Empty,
    /// An explicit set of counts.
    Counts(BTreeSet<u32>),
}

impl Cell {
    /// Explicit cell from counts; an empty set collapses to [`Cell::Empty`].
    pub fn counts(counts: impl IntoIterator<Item = u32>) -> Self {
        let set: BTreeSet<u32> = counts.into_iter().collect();
        if set.is_empty() {
            Cell::Empty
        } else {
            Cell::Counts(set)
        }
    }

    /// Explicit counts, if any.
    pub fn explicit(&self) -> Option<&BTreeSet<u32>> {
        match self {
            Cell::Counts(set) => Some(set),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::All => f.write_str("A"),
            Cell::Complement => f.write_str("C"),
            Cell::Empty => f.write_str("-"),
            Cell::Counts(set) => {
                for (i, count) in set.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{count}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Cell {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "A" => Ok(Cell::All),
            "C" => Ok(Cell::Complement),
            // Older generators wrote an empty string for a column with no counts.
            "-" | "" => Ok(Cell::Empty),
            list => {
                let mut set = BTreeSet::new();
                for token in list.split(',') {
                    let count: u32 = token.trim().parse().map_err(|_| {
                        Error::invalid(format!("malformed rule cell {s:?}: bad count {token:?}"))
                    })?;
                    if !set.insert(count) {
                        return Err(Error::invalid(format!(
                            "malformed rule cell {s:?}: count {count} listed twice"
                        )));
                    }
                }
                Ok(Cell::Counts(set))
            }
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Parameters a rule was generated with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleParams {
    /// Spatial dimensions (sets the neighbour-count range).
    #[serde(default = "default_n_dims")]
    pub n_dims: u32,
    /// Number of states, including dead state 0. Files that omit it take the
    /// table size.
    #[serde(default)]
    pub n_states: usize,
    pub beta_live: f64,
    pub beta_sparse: StateBias,
    pub beta_want: StateBias,
    pub beta_unused: StateBias,
    /// Seed of the random source, when it was seeded explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// A complete rule: transition table, live-state set and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RuleFile")]
pub struct Rule {
    /// `table[current][next]`.
    pub table: Vec<Vec<Cell>>,
    /// States counted as live neighbours.
    pub live_states: BTreeSet<usize>,
    pub params: RuleParams,
}

/// On-disk form of [`Rule`], before missing parameters are filled in.
#[derive(Deserialize)]
struct RuleFile {
    table: Vec<Vec<Cell>>,
    live_states: BTreeSet<usize>,
    params: RuleParams,
}

impl From<RuleFile> for Rule {
    fn from(file: RuleFile) -> Self {
        let mut params = file.params;
        if params.n_states == 0 {
            params.n_states = file.table.len();
        }
        Self {
            table: file.table,
            live_states: file.live_states,
            params,
        }
    }
}

impl Rule {
    /// Number of states.
    #[inline]
    pub fn n_states(&self) -> usize {
        self.table.len()
    }

    /// Largest neighbour count for this rule's dimensionality.
    pub fn max_neighbors(&self) -> Result<u32> {
        moore_neighbors(self.params.n_dims)
    }

    /// Dead, live or dying.
    pub fn state_type(&self, state: usize) -> StateType {
        StateType::classify(state, &self.live_states)
    }

    /// Check the structural invariants of the table.
    pub fn validate(&self) -> Result<()> {
        let n = self.params.n_states;
        let max_nbrs = self.max_neighbors()?;

        if self.table.len() != n {
            return Err(Error::invalid(format!(
                "table has {} rows, expected {n}",
                self.table.len()
            )));
        }
        if let Some((i, row)) = self.table.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(Error::invalid(format!(
                "table row {i} has {} columns, expected {n}",
                row.len()
            )));
        }
        if self.table.first().and_then(|row| row.first()) != Some(&Cell::Complement) {
            return Err(Error::invalid("cell (0,0) must be the complement marker"));
        }
        if let Some(&bad) = self.live_states.iter().find(|&&s| s == 0 || s >= n) {
            return Err(Error::invalid(format!(
                "live state {bad} outside 1..{n}"
            )));
        }

        for (i, row) in self.table.iter().enumerate() {
            let complements = row.iter().filter(|c| **c == Cell::Complement).count();
            if complements > 1 {
                return Err(Error::invalid(format!(
                    "row {i} has {complements} complement markers"
                )));
            }
            let non_empty = row.iter().filter(|c| **c != Cell::Empty).count();
            if row.contains(&Cell::All) && non_empty > 1 {
                return Err(Error::invalid(format!(
                    "row {i} mixes 'A' with other non-empty cells"
                )));
            }

            let mut seen = BTreeSet::new();
            for (j, set) in row.iter().enumerate().filter_map(|(j, c)| Some((j, c.explicit()?))) {
                for &count in set {
                    if count > max_nbrs {
                        return Err(Error::invalid(format!(
                            "cell ({i},{j}) count {count} exceeds {max_nbrs}"
                        )));
                    }
                    if !seen.insert(count) {
                        return Err(Error::invalid(format!(
                            "row {i} lists count {count} more than once"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Load and validate a rule file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let rule: Rule = super::read_json(path.as_ref())?;
        rule.validate()?;
        Ok(rule)
    }

    /// Write the rule as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        super::write_json(path.as_ref(), self)
    }
}
