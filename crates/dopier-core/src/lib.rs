//! Core data model for Dopier.
//!
//! This crate provides the domain geometry, the dopant network
//! representation (acceptors, donors, electrodes, occupancies), the
//! discretized electrostatic potential grid, and snapshot persistence.
//! Solving and simulation live in `dopier-solver` and `dopier-kmc`.

pub mod error;
pub mod geometry;
pub mod grid;
pub mod network;
pub mod physics;
pub mod snapshot;

pub use error::{Error, Result};
pub use geometry::{Domain, Dimensionality, Point};
pub use grid::PotentialGrid;
pub use network::{Acceptor, Donor, DopantNetwork, Electrode};
pub use physics::Physics;
pub use snapshot::NetworkSnapshot;
