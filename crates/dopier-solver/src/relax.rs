//! Gauss-Seidel relaxation with over-relaxation.
//!
//! Each sweep updates interior, non-fixed cells in place with
//! `v <- (1 - alpha) * v + alpha * mean(neighbors)` and converges when the
//! change between sweeps satisfies `||A - A_prev|| / ||A|| <= tol`.
//! Boundary cells are never touched; they carry the Dirichlet data set up
//! by the caller.

use dopier_core::PotentialGrid;

use crate::error::{Error, Result};

/// Relaxation parameters.
#[derive(Debug, Clone, Copy)]
pub struct RelaxConfig {
    /// Over-relaxation factor. 1.0 is plain Gauss-Seidel; 1.2-1.5 is a
    /// good range for these grids. Must lie in (0, 2).
    pub alpha: f64,
    /// Relative change between sweeps at which the solve stops.
    pub tol: f64,
    /// Sweep limit before the solve is declared divergent.
    pub max_sweeps: usize,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            tol: 1e-3,
            max_sweeps: 10_000,
        }
    }
}

impl RelaxConfig {
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 2.0) {
            return Err(Error::InvalidAlpha(self.alpha));
        }
        Ok(())
    }
}

fn norms(current: &[f64], previous: &[f64]) -> (f64, f64) {
    let mut diff = 0.0;
    let mut norm = 0.0;
    for (c, p) in current.iter().zip(previous) {
        let d = c - p;
        diff += d * d;
        norm += c * c;
    }
    (diff.sqrt(), norm.sqrt())
}

/// Relax a 1D line. `fixed` lists Dirichlet cell indices. Returns the
/// number of sweeps used.
pub fn relax_line(values: &mut [f64], fixed: &[usize], cfg: &RelaxConfig) -> Result<usize> {
    cfg.validate()?;
    let len = values.len();
    let mut mask = vec![false; len];
    for &i in fixed {
        *mask
            .get_mut(i)
            .ok_or(Error::FixedPointOutOfRange { index: i, len })? = true;
    }
    if len < 3 {
        return Ok(0);
    }

    let mut sweeps = 0;
    loop {
        let previous = values.to_vec();
        for i in 1..len - 1 {
            if mask[i] {
                continue;
            }
            let avg = 0.5 * (values[i - 1] + values[i + 1]);
            values[i] = (1.0 - cfg.alpha) * values[i] + cfg.alpha * avg;
        }
        sweeps += 1;
        let (diff, norm) = norms(values, &previous);
        if diff <= cfg.tol * norm {
            return Ok(sweeps);
        }
        if sweeps >= cfg.max_sweeps {
            return Err(Error::NotConverged { sweeps });
        }
    }
}

/// Relax a 2D plane stored row-major as `nx` rows of `ny` cells. `fixed`
/// lists Dirichlet `(i, j)` cells. Returns the number of sweeps used.
pub fn relax_plane(
    values: &mut [f64],
    nx: usize,
    ny: usize,
    fixed: &[(usize, usize)],
    cfg: &RelaxConfig,
) -> Result<usize> {
    cfg.validate()?;
    debug_assert_eq!(values.len(), nx * ny);
    let mut mask = vec![false; nx * ny];
    for &(i, j) in fixed {
        if i >= nx {
            return Err(Error::FixedPointOutOfRange { index: i, len: nx });
        }
        if j >= ny {
            return Err(Error::FixedPointOutOfRange { index: j, len: ny });
        }
        mask[i * ny + j] = true;
    }
    if nx < 3 || ny < 3 {
        return Ok(0);
    }

    let mut sweeps = 0;
    loop {
        let previous = values.to_vec();
        for i in 1..nx - 1 {
            for j in 1..ny - 1 {
                let idx = i * ny + j;
                if mask[idx] {
                    continue;
                }
                let avg = 0.25
                    * (values[idx - ny] + values[idx + ny] + values[idx - 1] + values[idx + 1]);
                values[idx] = (1.0 - cfg.alpha) * values[idx] + cfg.alpha * avg;
            }
        }
        sweeps += 1;
        let (diff, norm) = norms(values, &previous);
        if diff <= cfg.tol * norm {
            return Ok(sweeps);
        }
        if sweeps >= cfg.max_sweeps {
            return Err(Error::NotConverged { sweeps });
        }
    }
}

/// Relax the full interior of a 3D grid. `fixed` lists Dirichlet
/// `(i, j, k)` cells. Returns the number of sweeps used.
pub fn relax_volume(
    grid: &mut PotentialGrid,
    fixed: &[(usize, usize, usize)],
    cfg: &RelaxConfig,
) -> Result<usize> {
    cfg.validate()?;
    let (nx, ny, nz) = grid.shape();
    let mut mask = vec![false; nx * ny * nz];
    for &(i, j, k) in fixed {
        if i >= nx {
            return Err(Error::FixedPointOutOfRange { index: i, len: nx });
        }
        if j >= ny {
            return Err(Error::FixedPointOutOfRange { index: j, len: ny });
        }
        if k >= nz {
            return Err(Error::FixedPointOutOfRange { index: k, len: nz });
        }
        mask[(i * ny + j) * nz + k] = true;
    }
    if nx < 3 || ny < 3 || nz < 3 {
        return Ok(0);
    }

    let mut sweeps = 0;
    loop {
        let previous = grid.values().to_vec();
        for i in 1..nx - 1 {
            for j in 1..ny - 1 {
                for k in 1..nz - 1 {
                    if mask[(i * ny + j) * nz + k] {
                        continue;
                    }
                    let avg = (grid.get(i - 1, j, k)
                        + grid.get(i + 1, j, k)
                        + grid.get(i, j - 1, k)
                        + grid.get(i, j + 1, k)
                        + grid.get(i, j, k - 1)
                        + grid.get(i, j, k + 1))
                        / 6.0;
                    let v = (1.0 - cfg.alpha) * grid.get(i, j, k) + cfg.alpha * avg;
                    grid.set(i, j, k, v);
                }
            }
        }
        sweeps += 1;
        let (diff, norm) = norms(grid.values(), &previous);
        if diff <= cfg.tol * norm {
            return Ok(sweeps);
        }
        if sweeps >= cfg.max_sweeps {
            return Err(Error::NotConverged { sweeps });
        }
    }
}
