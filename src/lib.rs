//! Stochastic rule synthesis and behavioural scoring for multi-state
//! cellular automata.
//!
//! A rule is a square table indexed by (current state, next state) whose
//! cells say which live-neighbour counts trigger the transition. Rules are
//! drawn by a biased generator, handed to an external simulator, and the
//! population trace it writes back is scored by a value function.
//!
//! # Architecture
//!
//! - `schema`: Rule, simulation-result, score and configuration types
//! - `compute`: Generation, table resolution, scoring and ranking
//!
//! # Example
//!
//! ```rust,no_run
//! use ca_rule_search::{
//!     compute::{RuleGenerator, RuleRng, RuleValueFunction, rule_string},
//!     schema::{GeneratorConfig, SimulationResult},
//! };
//!
//! # fn main() -> ca_rule_search::Result<()> {
//! let generator = RuleGenerator::new(GeneratorConfig::default())?;
//! let rule = generator.generate(&mut RuleRng::new(42))?;
//! println!("{}", rule_string(&rule));
//! rule.save("rules/000.json")?;
//!
//! // ... run the simulator on rules/000.json ...
//!
//! let result = SimulationResult::load("results/000.json")?;
//! let score = RuleValueFunction::default().evaluate(&result);
//! println!("value = {:.4}", score.value);
//! # Ok(())
//! # }
//! ```

pub mod compute;
pub mod error;
pub mod schema;

// Re-export commonly used types
pub use compute::{RuleGenerator, RuleRng, RuleValueFunction};
pub use error::{Error, Result};
pub use schema::{
    Cell, GeneratorConfig, Rule, Score, SimulationResult, ValueFunctionConfig, ValueMapping,
};
