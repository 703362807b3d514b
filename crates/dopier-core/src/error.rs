//! Error types for network construction and mutation.

use thiserror::Error;

/// Errors raised while building or mutating a dopant network.
///
/// All of these indicate caller mistakes and are fatal at construction
/// time; none of them is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// The network has no acceptors to host charges.
    #[error("network needs at least one acceptor")]
    NoAcceptors,

    /// Donors compensate acceptors, so there cannot be more of them.
    #[error("donor count {donors} exceeds acceptor count {acceptors}")]
    TooManyDonors { donors: usize, acceptors: usize },

    /// The network has no electrodes to source or sink carriers.
    #[error("network needs at least one electrode")]
    NoElectrodes,

    /// Domain extents must be positive along x and contiguous: a zero
    /// y extent requires a zero z extent.
    #[error("invalid domain extents ({x}, {y}, {z})")]
    InvalidExtents { x: f64, y: f64, z: f64 },

    /// The potential grid resolution must be positive.
    #[error("grid resolution must be positive, got {0}")]
    InvalidResolution(f64),

    /// An electrode was placed outside the domain.
    #[error("electrode {index} at ({x}, {y}, {z}) lies outside the domain")]
    ElectrodeOutOfBounds { index: usize, x: f64, y: f64, z: f64 },

    /// An electrode index was out of range.
    #[error("electrode index {index} out of range ({count} electrodes)")]
    ElectrodeIndex { index: usize, count: usize },

    /// A dopant index was out of range.
    #[error("dopant index {index} out of range ({count} dopants)")]
    DopantIndex { index: usize, count: usize },

    /// The placement lattice has fewer cells than dopants, so collision-free
    /// placement is impossible.
    #[error("placement lattice of {cells} cells cannot hold {dopants} dopants")]
    PlacementLatticeFull { cells: usize, dopants: usize },
}

/// Result type for network construction and mutation.
pub type Result<T> = std::result::Result<T, Error>;
