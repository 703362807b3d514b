//! Hop feasibility, energy differences and Miller-Abrahams rates.
//!
//! Nodes `0..N` are acceptors, `N..N+P` electrodes. A hop moves one
//! carrier between two nodes; its rate combines a tunneling factor
//! `exp(-2 rho / a_B)` with a Boltzmann factor on one branch of the
//! energy difference.

use nalgebra::DMatrix;

use dopier_core::DopantNetwork;

use crate::error::{Error, Result};

/// Which branch of the energy difference carries the Boltzmann factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateBranch {
    /// Uphill hops pay `exp(-dE/kT)`; downhill hops tunnel freely. The
    /// physically standard Miller-Abrahams form and the default.
    #[default]
    PenalizeUphill,
    /// The Boltzmann factor is applied to downhill hops instead,
    /// reproducing the historical solver's conditional.
    PenalizeDownhill,
}

/// Whether a carrier may hop from node `i` to node `j`.
///
/// Forbidden: electrode-to-electrode exchange, self-hops, hops into a
/// doubly occupied acceptor, and hops out of an empty acceptor.
pub fn hop_allowed(dn: &DopantNetwork, i: usize, j: usize) -> bool {
    let n = dn.n();
    if i == j {
        return false;
    }
    match (i < n, j < n) {
        (false, false) => false,
        (false, true) => dn.occupancy(j) < 2,
        (true, false) => dn.occupancy(i) > 0,
        (true, true) => dn.occupancy(i) > 0 && dn.occupancy(j) < 2,
    }
}

/// Coulomb energy of an acceptor in the current occupancy state,
/// excluding any on-site term.
fn coulomb_energy(dn: &DopantNetwork, site: usize) -> f64 {
    let pos = dn.acceptors()[site].pos;
    let mut interaction = 0.0;
    for (k, a) in dn.acceptors().iter().enumerate() {
        if k != site {
            interaction += (1.0 - a.occupancy as f64) / pos.distance(&a.pos);
        }
    }
    dn.physics.coulomb_prefactor() * interaction + dn.e_constant[site]
}

/// Energy difference of the hop `i -> j`.
///
/// Electrode endpoints contribute zero. The source side pays the on-site
/// repulsion when it is doubly occupied; the destination side pays it
/// when it is singly occupied, since the arriving carrier would make it
/// doubly occupied. For acceptor-to-acceptor hops the interaction of the
/// created hole with the moved charge adds `k_C / d(i, j)`.
pub fn energy_difference(dn: &DopantNetwork, i: usize, j: usize) -> f64 {
    let n = dn.n();
    let u = dn.physics.u;

    let ei = if i >= n {
        0.0
    } else {
        let mut e = coulomb_energy(dn, i);
        if dn.occupancy(i) == 2 {
            e += u;
        }
        e
    };
    let ej = if j >= n {
        0.0
    } else {
        let mut e = coulomb_energy(dn, j);
        if dn.occupancy(j) == 1 {
            e += u;
        }
        e
    };

    let mut de = ej - ei;
    if i < n && j < n {
        let d = dn.acceptors()[i].pos.distance(&dn.acceptors()[j].pos);
        de += dn.physics.coulomb_prefactor() / d;
    }
    de
}

/// Miller-Abrahams rate for the hop `i -> j` with energy difference `de`.
pub fn hop_rate(dn: &DopantNetwork, i: usize, j: usize, de: f64, branch: RateBranch) -> f64 {
    let rho = dn.node_position(i).distance(&dn.node_position(j));
    let mut exponent = -2.0 * rho / dn.physics.ab;
    let penalized = match branch {
        RateBranch::PenalizeUphill => de > 0.0,
        RateBranch::PenalizeDownhill => de < 0.0,
    };
    if penalized {
        exponent -= de / dn.physics.kt;
    }
    dn.physics.nu * exponent.exp()
}

/// Dense transition-rate matrix over the node space.
///
/// Owned and refreshed by the engine; rates depend on the occupancy
/// state and must be rebuilt after every hop.
#[derive(Debug, Clone)]
pub struct TransitionGraph {
    rates: DMatrix<f64>,
}

impl TransitionGraph {
    pub fn new(nodes: usize) -> Self {
        Self {
            rates: DMatrix::zeros(nodes, nodes),
        }
    }

    pub fn nodes(&self) -> usize {
        self.rates.nrows()
    }

    #[inline]
    pub fn rate(&self, from: usize, to: usize) -> f64 {
        self.rates[(from, to)]
    }

    /// Rebuild every edge rate from the network's occupancy state.
    pub fn refresh(&mut self, dn: &DopantNetwork, branch: RateBranch) -> Result<()> {
        let nodes = dn.node_count();
        if self.rates.nrows() != nodes {
            self.rates = DMatrix::zeros(nodes, nodes);
        }
        for i in 0..nodes {
            for j in 0..nodes {
                let r = if hop_allowed(dn, i, j) {
                    let de = energy_difference(dn, i, j);
                    hop_rate(dn, i, j, de, branch)
                } else {
                    0.0
                };
                if !r.is_finite() {
                    return Err(Error::NonFiniteRate { from: i, to: j });
                }
                self.rates[(i, j)] = r;
            }
        }
        Ok(())
    }

    /// Sum of all edge rates.
    pub fn total(&self) -> f64 {
        self.rates.sum()
    }

    /// Total rate into node `to`.
    pub fn inflow(&self, to: usize) -> f64 {
        self.rates.column(to).sum()
    }

    /// Total rate out of node `from`.
    pub fn outflow(&self, from: usize) -> f64 {
        self.rates.row(from).sum()
    }

    /// Select the first edge, in row-major cumulative order, whose
    /// normalized cumulative rate reaches `u`. `u` must lie in [0, 1).
    pub fn pick(&self, u: f64) -> Option<(usize, usize)> {
        let total = self.total();
        if !(total > 0.0) {
            return None;
        }
        let threshold = u * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for i in 0..self.rates.nrows() {
            for j in 0..self.rates.ncols() {
                let r = self.rates[(i, j)];
                if r > 0.0 {
                    cumulative += r;
                    last_positive = Some((i, j));
                    if cumulative >= threshold {
                        return Some((i, j));
                    }
                }
            }
        }
        // rounding can leave the last cumulative fractionally short
        last_positive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dopier_core::{Domain, DopantNetwork, Electrode, Point};
    use dopier_solver::{RelaxConfig, refresh};

    fn chain_network() -> DopantNetwork {
        let domain = Domain::new(1.0, 0.0, 0.0).unwrap().with_res(0.05).unwrap();
        let electrodes = vec![
            Electrode::new(Point::new(0.0, 0.0, 0.0), 0.0),
            Electrode::new(Point::new(1.0, 0.0, 0.0), 0.0),
        ];
        let mut dn = DopantNetwork::new_seeded(3, 0, domain, electrodes, 17).unwrap();
        dn.physics = dn.physics.with_ab(0.1);
        for (i, x) in [0.25, 0.5, 0.75].into_iter().enumerate() {
            dn.set_acceptor_position(i, Point::new(x, 0.0, 0.0)).unwrap();
        }
        refresh(&mut dn, &RelaxConfig::default()).unwrap();
        dn
    }

    #[test]
    fn test_forbidden_hops_have_zero_rate() {
        let dn = chain_network();
        let n = dn.n();
        let mut graph = TransitionGraph::new(dn.node_count());
        graph.refresh(&dn, RateBranch::default()).unwrap();

        for i in 0..dn.node_count() {
            // self-hops
            assert_eq!(graph.rate(i, i), 0.0);
            for j in 0..dn.node_count() {
                if i >= n && j >= n {
                    assert_eq!(graph.rate(i, j), 0.0, "electrode pair {} -> {}", i, j);
                }
                if i < n && dn.occupancy(i) == 0 {
                    assert_eq!(graph.rate(i, j), 0.0, "empty source {} -> {}", i, j);
                }
                if j < n && dn.occupancy(j) == 2 {
                    assert_eq!(graph.rate(i, j), 0.0, "full destination {} -> {}", i, j);
                }
            }
        }
    }

    #[test]
    fn test_rate_branch_policies() {
        let dn = chain_network();
        let uphill = 2.5;
        let tunneling = dn.physics.nu * (-2.0 * 0.25 / dn.physics.ab).exp();

        // standard branch: uphill pays, downhill tunnels freely
        let r = hop_rate(&dn, 0, 1, uphill, RateBranch::PenalizeUphill);
        assert!((r - tunneling * (-uphill).exp()).abs() < 1e-12);
        let r = hop_rate(&dn, 0, 1, -uphill, RateBranch::PenalizeUphill);
        assert!((r - tunneling).abs() < 1e-12);

        // historical branch: the factor lands on downhill hops instead
        let r = hop_rate(&dn, 0, 1, uphill, RateBranch::PenalizeDownhill);
        assert!((r - tunneling).abs() < 1e-12);
        let r = hop_rate(&dn, 0, 1, -uphill, RateBranch::PenalizeDownhill);
        assert!((r - tunneling * uphill.exp()).abs() < 1e-12);
    }

    #[test]
    fn test_energy_difference_is_antisymmetric_between_acceptors() {
        let dn = chain_network();
        // between two singly occupied sites the endpoint energies mirror,
        // while the hole interaction and the destination-side repulsion
        // appear in both directions
        let occupied: Vec<usize> = (0..dn.n()).filter(|&i| dn.occupancy(i) == 1).collect();
        if occupied.len() >= 2 {
            let (a, b) = (occupied[0], occupied[1]);
            let fwd = energy_difference(&dn, a, b);
            let bwd = energy_difference(&dn, b, a);
            let d = dn.acceptors()[a].pos.distance(&dn.acceptors()[b].pos);
            let shared = dn.physics.coulomb_prefactor() / d + dn.physics.u;
            assert!(
                (fwd + bwd - 2.0 * shared).abs() < 1e-9,
                "fwd = {}, bwd = {}",
                fwd,
                bwd
            );
        }
    }

    #[test]
    fn test_pick_walks_cumulative_order() {
        let mut graph = TransitionGraph::new(3);
        // hand-build rates via refresh-free access is not exposed; use a
        // network-free check through a tiny synthetic matrix instead
        graph.rates[(0, 1)] = 1.0;
        graph.rates[(1, 2)] = 3.0;
        assert_eq!(graph.pick(0.0), Some((0, 1)));
        assert_eq!(graph.pick(0.2), Some((0, 1)));
        assert_eq!(graph.pick(0.3), Some((1, 2)));
        assert_eq!(graph.pick(0.999), Some((1, 2)));
        let empty = TransitionGraph::new(2);
        assert_eq!(empty.pick(0.5), None);
    }

    #[test]
    fn test_voltage_inversion_mirrors_rates() {
        // mirroring the network about the domain center and inverting
        // the electrode voltages must reproduce the same rates with the
        // two electrodes swapped
        let domain = Domain::new(1.0, 0.0, 0.0).unwrap().with_res(0.05).unwrap();
        let cfg = RelaxConfig::default().with_tol(1e-9);

        let electrodes = vec![
            Electrode::new(Point::new(0.0, 0.0, 0.0), 2.0),
            Electrode::new(Point::new(1.0, 0.0, 0.0), -2.0),
        ];
        let mut a = DopantNetwork::new_seeded(2, 0, domain, electrodes, 3).unwrap();
        a.physics = a.physics.with_ab(0.1);
        a.set_acceptor_position(0, Point::new(0.3, 0.0, 0.0)).unwrap();
        a.set_acceptor_position(1, Point::new(0.6, 0.0, 0.0)).unwrap();
        refresh(&mut a, &cfg).unwrap();

        let electrodes = vec![
            Electrode::new(Point::new(0.0, 0.0, 0.0), -2.0),
            Electrode::new(Point::new(1.0, 0.0, 0.0), 2.0),
        ];
        let mut b = DopantNetwork::new_seeded(2, 0, domain, electrodes, 3).unwrap();
        b.physics = b.physics.with_ab(0.1);
        b.set_acceptor_position(0, Point::new(0.7, 0.0, 0.0)).unwrap();
        b.set_acceptor_position(1, Point::new(0.4, 0.0, 0.0)).unwrap();
        refresh(&mut b, &cfg).unwrap();

        // force identical occupancy patterns through a full charge fill
        assert_eq!(a.occupancy(0) + a.occupancy(1), 2);
        assert_eq!(b.occupancy(0) + b.occupancy(1), 2);

        let mut ga = TransitionGraph::new(a.node_count());
        ga.refresh(&a, RateBranch::default()).unwrap();
        let mut gb = TransitionGraph::new(b.node_count());
        gb.refresh(&b, RateBranch::default()).unwrap();

        // node map: acceptors keep their index, electrodes swap
        let map = [0usize, 1, 3, 2];
        for i in 0..4 {
            for j in 0..4 {
                let ra = ga.rate(i, j);
                let rb = gb.rate(map[i], map[j]);
                assert!(
                    (ra - rb).abs() <= 1e-4 * ra.abs().max(rb.abs()).max(1e-12),
                    "rate {} -> {}: {} vs {}",
                    i,
                    j,
                    ra,
                    rb
                );
            }
        }
    }
}
