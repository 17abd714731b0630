//! Compute module - Rule synthesis, resolution and scoring.

mod generator;
mod ranking;
mod rng;
mod spectrum;
mod table;
mod value;

pub use generator::*;
pub use ranking::*;
pub use rng::*;
pub use spectrum::*;
pub use table::*;
pub use value::*;
