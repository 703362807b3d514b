//! Electrostatic landscape solver.
//!
//! Solves the Laplace equation over the domain grid with electrodes as
//! Dirichlet points, using Gauss-Seidel relaxation with optional
//! over-relaxation. Higher-dimensional solves seed their boundary
//! conditions by first relaxing the lower-dimensional sub-manifolds
//! (edges, then faces, then the interior).

pub mod error;
pub mod landscape;
pub mod relax;

pub use error::{Error, Result};
pub use landscape::{refresh, solve_landscape};
pub use relax::{RelaxConfig, relax_line, relax_plane, relax_volume};
