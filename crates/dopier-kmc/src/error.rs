//! Error types for the KMC engine.

use thiserror::Error;

/// Errors raised while simulating a network.
#[derive(Debug, Error)]
pub enum Error {
    /// Voltages or positions changed since the last solver refresh, so
    /// site energies would be read from stale state.
    #[error("electrostatic landscape is stale; refresh it before simulating")]
    StaleLandscape,

    /// Every transition is forbidden or has zero rate, so no event can
    /// be selected.
    #[error("network is frozen: total transition rate is {0}")]
    FrozenNetwork(f64),

    /// A transition rate overflowed to a non-finite value, usually from
    /// coinciding dopants.
    #[error("non-finite transition rate between nodes {from} and {to}")]
    NonFiniteRate { from: usize, to: usize },

    /// Continuous-mode simulation hit the hop limit before the electrode
    /// currents stabilized.
    #[error("currents did not converge within {hops} hops")]
    NotConverged { hops: u64 },

    /// A batch deadline passed before this network was simulated.
    #[error("batch deadline exceeded before simulation started")]
    DeadlineExceeded,
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, Error>;
