//! Dopant placement search.
//!
//! Searches look for dopant placements whose simulated electrode
//! currents match a battery of (voltage configuration, expected current)
//! tests. Three engines share an evaluator and a staged accuracy ladder:
//!
//! - [`GreedySearch`] - steepest-descent over a shrinking placement lattice
//! - [`AnnealingSearch`] - Metropolis acceptance along a temperature schedule
//! - [`GeneticSearch`] - population search with disparity-biased selection
//!   and uniqueness enforcement
//!
//! Evaluation starts cheap and noisy and is promoted through
//! increasingly accurate strategy tiers as the error shrinks; validation
//! always uses the most accurate tier.

pub mod error;
pub mod evaluate;
pub mod genetic;
pub mod local;
pub mod schedule;
pub mod strategy;

pub use error::{Error, Result};
pub use evaluate::{Evaluator, SearchOutcome, TestCase, ValidationRecord};
pub use genetic::{CrossoverOp, GeneticConfig, GeneticSearch};
pub use local::{AnnealingSearch, GreedySearch, LocalSearchConfig};
pub use schedule::{AnnealingSchedule, AnnealingWaypoint, UniquenessSchedule};
pub use strategy::{StrategyLadder, StrategyTier};
