//! Rejection-free kinetic Monte Carlo for variable-range hopping.
//!
//! The rate model builds Miller-Abrahams transition rates over the
//! combined acceptor/electrode node space; the engine selects realized
//! hops in proportion to their rates and advances simulation time from
//! the total rate. Two simulation kernels report electrode currents:
//! `Record` counts realized carrier exchanges, `Probability` accumulates
//! rate-weighted expected flows.

pub mod backend;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod rates;

pub use backend::{SimulationBackend, SimulationOutcome};
pub use engine::{Hop, KmcEngine, TimePolicy};
pub use error::{Error, Result};
pub use kernel::{SimulationKernel, SimulationRequest};
pub use rates::{RateBranch, TransitionGraph, energy_difference, hop_allowed, hop_rate};
