//! Error types for the search layer.

use thiserror::Error;

/// Errors raised while configuring or running a search.
#[derive(Debug, Error)]
pub enum Error {
    /// A test configures more voltages than the network has electrodes.
    #[error("test sets {voltages} voltages but the network has {electrodes} electrodes")]
    VoltageCount { voltages: usize, electrodes: usize },

    /// A test expects a current at an electrode that does not exist.
    #[error("test target electrode {index} out of range ({count} electrodes)")]
    TargetIndex { index: usize, count: usize },

    /// The strategy ladder needs at least one tier.
    #[error("strategy ladder must contain at least one tier")]
    EmptyLadder,

    /// A schedule needs at least one waypoint, ordered in time.
    #[error("schedule must contain at least one waypoint in increasing order")]
    InvalidSchedule,

    /// The genetic population must leave room for crossover beyond the
    /// preserved elite.
    #[error("population of {0} is too small for elitism plus crossover")]
    PopulationTooSmall(usize),

    /// Network construction or mutation failed.
    #[error(transparent)]
    Network(#[from] dopier_core::Error),

    /// The landscape solver failed.
    #[error(transparent)]
    Solver(#[from] dopier_solver::Error),

    /// The KMC engine failed.
    #[error(transparent)]
    Simulation(#[from] dopier_kmc::Error),
}

/// Result type for search operations.
pub type Result<T> = std::result::Result<T, Error>;
