//! Electrostatic landscape construction.
//!
//! Electrode positions are quantized to grid cells and pinned as
//! Dirichlet points. Relaxation then proceeds from low- to
//! high-dimensional sub-manifolds so that every solve sees fully
//! determined boundary data: in 2D the four boundary edges precede the
//! plane; in 3D the twelve edges precede the six faces, which precede the
//! interior.
//!
//! After the potential is solved, each acceptor's constant energy is
//! rebuilt as the local potential plus the compensation sum over all
//! donors.

use dopier_core::geometry::{boundary_index, interior_index};
use dopier_core::{Dimensionality, DopantNetwork, PotentialGrid};

use crate::error::Result;
use crate::relax::{RelaxConfig, relax_line, relax_plane, relax_volume};

/// Recompute the potential grid and the constant energies of a network
/// from its current electrode voltages, then clear the dirty bit.
///
/// Deterministic, so repeated calls with unchanged voltages produce
/// identical state.
pub fn refresh(dn: &mut DopantNetwork, cfg: &RelaxConfig) -> Result<()> {
    dn.potential = solve_landscape(dn, cfg)?;
    update_constant_energies(dn);
    dn.mark_landscape_fresh();
    Ok(())
}

/// Electrode positions quantized onto the grid.
fn electrode_cells(dn: &DopantNetwork) -> Vec<(usize, usize, usize)> {
    let domain = dn.domain();
    let (nx, ny, nz) = domain.grid_shape();
    dn.electrodes()
        .iter()
        .map(|e| {
            let i = boundary_index(e.pos.x, domain.xdim, nx);
            let j = match domain.dimensionality() {
                Dimensionality::One => 0,
                _ => boundary_index(e.pos.y, domain.ydim, ny),
            };
            let k = match domain.dimensionality() {
                Dimensionality::Three => boundary_index(e.pos.z, domain.zdim, nz),
                _ => 0,
            };
            (i, j, k)
        })
        .collect()
}

/// Solve the Laplace equation over the domain with the network's
/// electrodes as Dirichlet points.
pub fn solve_landscape(dn: &DopantNetwork, cfg: &RelaxConfig) -> Result<PotentialGrid> {
    let mut grid = PotentialGrid::for_domain(dn.domain());
    let cells = electrode_cells(dn);
    for (cell, e) in cells.iter().zip(dn.electrodes()) {
        grid.set(cell.0, cell.1, cell.2, e.voltage);
    }

    let sweeps = match dn.domain().dimensionality() {
        Dimensionality::One => solve_1d(&mut grid, &cells, cfg)?,
        Dimensionality::Two => solve_2d(&mut grid, &cells, cfg)?,
        Dimensionality::Three => solve_3d(&mut grid, &cells, cfg)?,
    };
    log::debug!(
        "landscape relaxed in {} sweeps over a {:?} grid",
        sweeps,
        grid.shape()
    );
    Ok(grid)
}

fn solve_1d(
    grid: &mut PotentialGrid,
    cells: &[(usize, usize, usize)],
    cfg: &RelaxConfig,
) -> Result<usize> {
    let fixed: Vec<usize> = cells.iter().map(|c| c.0).collect();
    let mut line = copy_x_line(grid, 0, 0);
    let sweeps = relax_line(&mut line, &fixed, cfg)?;
    write_x_line(grid, 0, 0, &line);
    Ok(sweeps)
}

fn solve_2d(
    grid: &mut PotentialGrid,
    cells: &[(usize, usize, usize)],
    cfg: &RelaxConfig,
) -> Result<usize> {
    let (nx, ny, _) = grid.shape();
    let mut sweeps = 0;

    // Boundary edges, pinned by the electrodes that lie on them.
    for j in [0, ny - 1] {
        let fixed: Vec<usize> = cells.iter().filter(|c| c.1 == j).map(|c| c.0).collect();
        let mut line = copy_x_line(grid, j, 0);
        sweeps += relax_line(&mut line, &fixed, cfg)?;
        write_x_line(grid, j, 0, &line);
    }
    for i in [0, nx - 1] {
        let fixed: Vec<usize> = cells.iter().filter(|c| c.0 == i).map(|c| c.1).collect();
        let mut line = copy_y_line(grid, i, 0);
        sweeps += relax_line(&mut line, &fixed, cfg)?;
        write_y_line(grid, i, 0, &line);
    }

    // Full plane with every electrode pinned.
    let fixed: Vec<(usize, usize)> = cells.iter().map(|c| (c.0, c.1)).collect();
    let mut plane = copy_xy_plane(grid, 0);
    sweeps += relax_plane(&mut plane, nx, ny, &fixed, cfg)?;
    write_xy_plane(grid, 0, &plane);
    Ok(sweeps)
}

fn solve_3d(
    grid: &mut PotentialGrid,
    cells: &[(usize, usize, usize)],
    cfg: &RelaxConfig,
) -> Result<usize> {
    let (nx, ny, nz) = grid.shape();
    let mut sweeps = 0;

    // Edges of the z = 0 and z = max planes.
    for k in [0, nz - 1] {
        for j in [0, ny - 1] {
            let fixed: Vec<usize> = cells
                .iter()
                .filter(|c| c.1 == j && c.2 == k)
                .map(|c| c.0)
                .collect();
            let mut line = copy_x_line(grid, j, k);
            sweeps += relax_line(&mut line, &fixed, cfg)?;
            write_x_line(grid, j, k, &line);
        }
        for i in [0, nx - 1] {
            let fixed: Vec<usize> = cells
                .iter()
                .filter(|c| c.0 == i && c.2 == k)
                .map(|c| c.1)
                .collect();
            let mut line = copy_y_line(grid, i, k);
            sweeps += relax_line(&mut line, &fixed, cfg)?;
            write_y_line(grid, i, k, &line);
        }
    }

    // The four z-parallel corner edges.
    for i in [0, nx - 1] {
        for j in [0, ny - 1] {
            let fixed: Vec<usize> = cells
                .iter()
                .filter(|c| c.0 == i && c.1 == j)
                .map(|c| c.2)
                .collect();
            let mut line = copy_z_line(grid, i, j);
            sweeps += relax_line(&mut line, &fixed, cfg)?;
            write_z_line(grid, i, j, &line);
        }
    }

    // Six faces.
    for k in [0, nz - 1] {
        let fixed: Vec<(usize, usize)> = cells
            .iter()
            .filter(|c| c.2 == k)
            .map(|c| (c.0, c.1))
            .collect();
        let mut plane = copy_xy_plane(grid, k);
        sweeps += relax_plane(&mut plane, nx, ny, &fixed, cfg)?;
        write_xy_plane(grid, k, &plane);
    }
    for i in [0, nx - 1] {
        let fixed: Vec<(usize, usize)> = cells
            .iter()
            .filter(|c| c.0 == i)
            .map(|c| (c.1, c.2))
            .collect();
        let mut plane = copy_yz_plane(grid, i);
        sweeps += relax_plane(&mut plane, ny, nz, &fixed, cfg)?;
        write_yz_plane(grid, i, &plane);
    }
    for j in [0, ny - 1] {
        let fixed: Vec<(usize, usize)> = cells
            .iter()
            .filter(|c| c.1 == j)
            .map(|c| (c.0, c.2))
            .collect();
        let mut plane = copy_xz_plane(grid, j);
        sweeps += relax_plane(&mut plane, nx, nz, &fixed, cfg)?;
        write_xz_plane(grid, j, &plane);
    }

    // Interior volume with every electrode pinned.
    sweeps += relax_volume(grid, cells, cfg)?;
    Ok(sweeps)
}

/// Rebuild per-acceptor constant energies: the local electrostatic
/// potential plus the Coulomb compensation from every donor.
fn update_constant_energies(dn: &mut DopantNetwork) {
    let domain = *dn.domain();
    let (nx, ny, nz) = dn.potential.shape();
    let physics = dn.physics;
    let k_c = physics.coulomb_prefactor();

    let mut energies = Vec::with_capacity(dn.n());
    for a in dn.acceptors() {
        let i = interior_index(a.pos.x, domain.xdim, nx);
        let (j, k) = match domain.dimensionality() {
            Dimensionality::One => (0, 0),
            Dimensionality::Two => (interior_index(a.pos.y, domain.ydim, ny), 0),
            Dimensionality::Three => (
                interior_index(a.pos.y, domain.ydim, ny),
                interior_index(a.pos.z, domain.zdim, nz),
            ),
        };
        let mut e = physics.e * dn.potential.get(i, j, k);
        for d in dn.donors() {
            e -= k_c / a.pos.distance(&d.pos);
        }
        energies.push(e);
    }
    dn.e_constant = energies;
}

fn copy_x_line(grid: &PotentialGrid, j: usize, k: usize) -> Vec<f64> {
    (0..grid.shape().0).map(|i| grid.get(i, j, k)).collect()
}

fn write_x_line(grid: &mut PotentialGrid, j: usize, k: usize, line: &[f64]) {
    for (i, &v) in line.iter().enumerate() {
        grid.set(i, j, k, v);
    }
}

fn copy_y_line(grid: &PotentialGrid, i: usize, k: usize) -> Vec<f64> {
    (0..grid.shape().1).map(|j| grid.get(i, j, k)).collect()
}

fn write_y_line(grid: &mut PotentialGrid, i: usize, k: usize, line: &[f64]) {
    for (j, &v) in line.iter().enumerate() {
        grid.set(i, j, k, v);
    }
}

fn copy_z_line(grid: &PotentialGrid, i: usize, j: usize) -> Vec<f64> {
    (0..grid.shape().2).map(|k| grid.get(i, j, k)).collect()
}

fn write_z_line(grid: &mut PotentialGrid, i: usize, j: usize, line: &[f64]) {
    for (k, &v) in line.iter().enumerate() {
        grid.set(i, j, k, v);
    }
}

fn copy_xy_plane(grid: &PotentialGrid, k: usize) -> Vec<f64> {
    let (nx, ny, _) = grid.shape();
    let mut plane = Vec::with_capacity(nx * ny);
    for i in 0..nx {
        for j in 0..ny {
            plane.push(grid.get(i, j, k));
        }
    }
    plane
}

fn write_xy_plane(grid: &mut PotentialGrid, k: usize, plane: &[f64]) {
    let (nx, ny, _) = grid.shape();
    for i in 0..nx {
        for j in 0..ny {
            grid.set(i, j, k, plane[i * ny + j]);
        }
    }
}

fn copy_yz_plane(grid: &PotentialGrid, i: usize) -> Vec<f64> {
    let (_, ny, nz) = grid.shape();
    let mut plane = Vec::with_capacity(ny * nz);
    for j in 0..ny {
        for k in 0..nz {
            plane.push(grid.get(i, j, k));
        }
    }
    plane
}

fn write_yz_plane(grid: &mut PotentialGrid, i: usize, plane: &[f64]) {
    let (_, ny, nz) = grid.shape();
    for j in 0..ny {
        for k in 0..nz {
            grid.set(i, j, k, plane[j * nz + k]);
        }
    }
}

fn copy_xz_plane(grid: &PotentialGrid, j: usize) -> Vec<f64> {
    let (nx, _, nz) = grid.shape();
    let mut plane = Vec::with_capacity(nx * nz);
    for i in 0..nx {
        for k in 0..nz {
            plane.push(grid.get(i, j, k));
        }
    }
    plane
}

fn write_xz_plane(grid: &mut PotentialGrid, j: usize, plane: &[f64]) {
    let (nx, _, nz) = grid.shape();
    for i in 0..nx {
        for k in 0..nz {
            grid.set(i, j, k, plane[i * nz + k]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dopier_core::{Domain, DopantNetwork, Electrode, Point};

    fn line_network() -> DopantNetwork {
        let domain = Domain::new(1.0, 0.0, 0.0).unwrap().with_res(0.1).unwrap();
        let electrodes = vec![
            Electrode::new(Point::new(0.0, 0.0, 0.0), 1.0),
            Electrode::new(Point::new(1.0, 0.0, 0.0), -1.0),
        ];
        DopantNetwork::new_seeded(2, 0, domain, electrodes, 5).unwrap()
    }

    #[test]
    fn test_1d_landscape_pins_electrodes() {
        let dn = line_network();
        let cfg = RelaxConfig::default().with_tol(1e-7);
        let grid = solve_landscape(&dn, &cfg).unwrap();
        let (nx, _, _) = grid.shape();

        assert_eq!(grid.get(0, 0, 0), 1.0);
        assert_eq!(grid.get(nx - 1, 0, 0), -1.0);
        // interior decreases monotonically between the electrodes
        for i in 1..nx {
            assert!(grid.get(i, 0, 0) <= grid.get(i - 1, 0, 0) + 1e-9);
        }
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let mut dn = line_network();
        let cfg = RelaxConfig::default();
        refresh(&mut dn, &cfg).unwrap();
        let potential = dn.potential.clone();
        let energies = dn.e_constant.clone();
        assert!(!dn.landscape_stale());

        refresh(&mut dn, &cfg).unwrap();
        assert_eq!(dn.potential, potential);
        assert_eq!(dn.e_constant, energies);
    }

    #[test]
    fn test_voltage_change_moves_site_energy() {
        let mut dn = line_network();
        let cfg = RelaxConfig::default();
        refresh(&mut dn, &cfg).unwrap();
        let before = dn.e_constant.clone();

        dn.set_voltage(0, 5.0).unwrap();
        assert!(dn.landscape_stale());
        refresh(&mut dn, &cfg).unwrap();
        // raising the left electrode raises every interior site energy
        for (a, b) in before.iter().zip(&dn.e_constant) {
            assert!(b > a, "site energy did not rise: {} -> {}", a, b);
        }
    }

    #[test]
    fn test_2d_center_between_opposite_electrodes() {
        let domain = Domain::new(1.0, 1.0, 0.0).unwrap().with_res(0.05).unwrap();
        let electrodes = vec![
            Electrode::new(Point::new(0.0, 0.5, 0.0), 1.0),
            Electrode::new(Point::new(1.0, 0.5, 0.0), -1.0),
        ];
        let dn = DopantNetwork::new_seeded(2, 0, domain, electrodes, 5).unwrap();
        let cfg = RelaxConfig::default().with_alpha(1.4).with_tol(1e-7);
        let grid = solve_landscape(&dn, &cfg).unwrap();

        let (nx, ny, _) = grid.shape();
        let left = grid.get(0, ny / 2, 0);
        let right = grid.get(nx - 1, ny / 2, 0);
        assert_eq!(left, 1.0);
        assert_eq!(right, -1.0);
        // the potential midway between symmetric electrodes is near zero
        assert!(grid.get(nx / 2, ny / 2, 0).abs() < 0.05);
    }

    #[test]
    fn test_3d_landscape_bounded_by_electrode_voltages() {
        let domain = Domain::new(1.0, 1.0, 1.0).unwrap().with_res(0.2).unwrap();
        let electrodes = vec![
            Electrode::new(Point::new(0.0, 0.5, 0.5), 2.0),
            Electrode::new(Point::new(1.0, 0.5, 0.5), 0.0),
        ];
        let dn = DopantNetwork::new_seeded(2, 0, domain, electrodes, 5).unwrap();
        let grid = solve_landscape(&dn, &RelaxConfig::default()).unwrap();

        // discrete maximum principle: every cell lies within the pinned range
        for &v in grid.values() {
            assert!((-1e-9..=2.0 + 1e-9).contains(&v), "cell at {}", v);
        }
    }

    #[test]
    fn test_donor_compensation_is_attractive() {
        let domain = Domain::new(1.0, 0.0, 0.0).unwrap().with_res(0.1).unwrap();
        let electrodes = vec![
            Electrode::new(Point::new(0.0, 0.0, 0.0), 0.0),
            Electrode::new(Point::new(1.0, 0.0, 0.0), 0.0),
        ];
        let mut dn = DopantNetwork::new_seeded(1, 1, domain, electrodes, 5).unwrap();
        dn.set_acceptor_position(0, Point::new(0.25, 0.0, 0.0))
            .unwrap();
        dn.set_donor_position(0, Point::new(0.75, 0.0, 0.0)).unwrap();
        refresh(&mut dn, &RelaxConfig::default()).unwrap();

        // zero applied field leaves only the donor term, which is negative
        let expected = -dn.physics.coulomb_prefactor() / 0.5;
        assert!((dn.e_constant[0] - expected).abs() < 1e-12);
    }
}
