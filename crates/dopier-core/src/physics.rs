//! Physical constants of the hopping model.

use serde::{Deserialize, Serialize};

/// Constants entering the electrostatics and the Miller-Abrahams rates.
///
/// The defaults are unit-free (charge, permittivity, attempt frequency and
/// thermal energy all 1), matching the convention used throughout the
/// search layers. Localization radius and on-site repulsion keep their
/// conventional magnitudes relative to a unit domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Physics {
    /// Elementary charge.
    pub e: f64,
    /// Permittivity of the host material.
    pub eps: f64,
    /// Attempt frequency prefactor of the hopping rate.
    pub nu: f64,
    /// Thermal energy kT.
    pub kt: f64,
    /// On-site repulsion paid by a doubly occupied acceptor.
    pub u: f64,
    /// Localization radius of the acceptor wavefunction.
    pub ab: f64,
}

impl Default for Physics {
    fn default() -> Self {
        Self {
            e: 1.0,
            eps: 1.0,
            nu: 1.0,
            kt: 1.0,
            u: 100.0,
            ab: 100.0,
        }
    }
}

impl Physics {
    /// Set the thermal energy.
    pub fn with_kt(mut self, kt: f64) -> Self {
        self.kt = kt;
        self
    }

    /// Set the localization radius.
    pub fn with_ab(mut self, ab: f64) -> Self {
        self.ab = ab;
        self
    }

    /// Set the on-site repulsion.
    pub fn with_u(mut self, u: f64) -> Self {
        self.u = u;
        self
    }

    /// Coulomb interaction prefactor e²/4πε.
    pub fn coulomb_prefactor(&self) -> f64 {
        self.e * self.e / (4.0 * std::f64::consts::PI * self.eps)
    }
}
