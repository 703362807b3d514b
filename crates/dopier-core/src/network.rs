//! The dopant network: sites, charges and electrodes.
//!
//! A network owns N acceptors (each hosting 0, 1 or 2 charges), M fixed
//! donors and P electrodes. Acceptors and electrodes together form the
//! hopping node space: indices `0..N` address acceptors, `N..N+P` address
//! electrodes. Charge neutrality with the compensating donors means N - M
//! charges circulate through the acceptors.
//!
//! The electrostatic landscape (`potential`, `e_constant`) is derived
//! state maintained by `dopier-solver`; any voltage or position mutation
//! marks it stale and observers must refresh before reading energies.

use nalgebra::DVector;
use rand::Rng;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Domain, Point};
use crate::grid::PotentialGrid;
use crate::physics::Physics;

/// A charge-hosting impurity. Occupancy 0 is an empty acceptor (a hole),
/// 1 is neutral, 2 is doubly occupied and pays the on-site repulsion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Acceptor {
    pub pos: Point,
    pub occupancy: u8,
}

/// A fixed compensating impurity. Donors carry no dynamics; they only
/// contribute a constant Coulomb term to every acceptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Donor {
    pub pos: Point,
}

/// A carrier reservoir pinned to an applied voltage.
///
/// `count` is the running signed number of carriers exchanged with the
/// network: +1 for every carrier sinked into the electrode, -1 for every
/// carrier sourced from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Electrode {
    pub pos: Point,
    pub voltage: f64,
    pub count: i64,
}

impl Electrode {
    pub fn new(pos: Point, voltage: f64) -> Self {
        Self {
            pos,
            voltage,
            count: 0,
        }
    }
}

/// A dopant network with its derived electrostatic state.
#[derive(Debug, Clone)]
pub struct DopantNetwork {
    domain: Domain,
    /// Physical constants of the hopping model.
    pub physics: Physics,
    acceptors: Vec<Acceptor>,
    donors: Vec<Donor>,
    electrodes: Vec<Electrode>,
    /// Relaxed electrostatic potential. Maintained by the solver.
    pub potential: PotentialGrid,
    /// Per-acceptor constant energy (local potential plus donor
    /// compensation). Maintained by the solver.
    pub e_constant: Vec<f64>,
    /// Per-electrode current from the most recent simulation.
    pub current: DVector<f64>,
    landscape_stale: bool,
}

impl DopantNetwork {
    /// Build a network with `n` acceptors and `m` donors placed uniformly
    /// at random, and `n - m` charges distributed over the acceptors.
    ///
    /// The electrostatic landscape starts stale; run the solver before
    /// reading site energies.
    pub fn new(n: usize, m: usize, domain: Domain, electrodes: Vec<Electrode>) -> Result<Self> {
        Self::build(n, m, domain, electrodes, &mut rand::rng())
    }

    /// Like [`DopantNetwork::new`], with a deterministic placement stream.
    pub fn new_seeded(
        n: usize,
        m: usize,
        domain: Domain,
        electrodes: Vec<Electrode>,
        seed: u64,
    ) -> Result<Self> {
        Self::build(n, m, domain, electrodes, &mut SmallRng::seed_from_u64(seed))
    }

    fn build<R: Rng>(
        n: usize,
        m: usize,
        domain: Domain,
        electrodes: Vec<Electrode>,
        rng: &mut R,
    ) -> Result<Self> {
        if n == 0 {
            return Err(Error::NoAcceptors);
        }
        if m > n {
            return Err(Error::TooManyDonors {
                donors: m,
                acceptors: n,
            });
        }
        if electrodes.is_empty() {
            return Err(Error::NoElectrodes);
        }
        for (index, e) in electrodes.iter().enumerate() {
            if !domain.contains(&e.pos) {
                return Err(Error::ElectrodeOutOfBounds {
                    index,
                    x: e.pos.x,
                    y: e.pos.y,
                    z: e.pos.z,
                });
            }
        }

        let p = electrodes.len();
        let mut network = Self {
            domain,
            physics: Physics::default(),
            acceptors: vec![
                Acceptor {
                    pos: Point::ORIGIN,
                    occupancy: 0,
                };
                n
            ],
            donors: vec![Donor { pos: Point::ORIGIN }; m],
            electrodes,
            potential: PotentialGrid::for_domain(&domain),
            e_constant: vec![0.0; n],
            current: DVector::zeros(p),
            landscape_stale: true,
        };
        network.place_dopants(rng);
        network.place_charges(rng);
        Ok(network)
    }

    /// Scatter all dopants uniformly over the domain.
    pub fn place_dopants<R: Rng>(&mut self, rng: &mut R) {
        let d = self.domain;
        for a in &mut self.acceptors {
            a.pos = Point::new(
                rng.random::<f64>() * d.xdim,
                rng.random::<f64>() * d.ydim,
                rng.random::<f64>() * d.zdim,
            );
        }
        for don in &mut self.donors {
            don.pos = Point::new(
                rng.random::<f64>() * d.xdim,
                rng.random::<f64>() * d.ydim,
                rng.random::<f64>() * d.zdim,
            );
        }
        self.landscape_stale = true;
    }

    /// Redistribute the N - M charges over the acceptors, resetting any
    /// previous occupancies.
    pub fn place_charges<R: Rng>(&mut self, rng: &mut R) {
        for a in &mut self.acceptors {
            a.occupancy = 0;
        }
        let mut placed = 0;
        while placed < self.acceptors.len() - self.donors.len() {
            let trial = rng.random_range(0..self.acceptors.len());
            if self.acceptors[trial].occupancy < 2 {
                self.acceptors[trial].occupancy += 1;
                placed += 1;
            }
        }
    }

    /// Snap all dopants onto an `x_res` by `y_res` lattice, drawing
    /// collision-free cells at random. Positions compare exactly on the
    /// lattice, so coincident dopants (and the divergent Coulomb terms
    /// they would cause) are impossible.
    pub fn place_on_lattice<R: Rng>(&mut self, x_res: f64, y_res: f64, rng: &mut R) -> Result<()> {
        if x_res <= 0.0 {
            return Err(Error::InvalidResolution(x_res));
        }
        if y_res <= 0.0 && self.domain.ydim > 0.0 {
            return Err(Error::InvalidResolution(y_res));
        }
        let x_cells = (self.domain.xdim / x_res) as usize;
        let y_cells = if self.domain.ydim > 0.0 {
            (self.domain.ydim / y_res) as usize
        } else {
            1
        };
        let dopants = self.acceptors.len() + self.donors.len();
        if x_cells * y_cells < dopants {
            return Err(Error::PlacementLatticeFull {
                cells: x_cells * y_cells,
                dopants,
            });
        }

        let mut taken: Vec<(usize, usize)> = Vec::with_capacity(dopants);
        let draw = |rng: &mut R, taken: &mut Vec<(usize, usize)>| {
            loop {
                let cell = (rng.random_range(0..x_cells), rng.random_range(0..y_cells));
                if !taken.contains(&cell) {
                    taken.push(cell);
                    return cell;
                }
            }
        };
        for i in 0..self.acceptors.len() {
            let (cx, cy) = draw(rng, &mut taken);
            self.acceptors[i].pos = Point::new(cx as f64 * x_res, cy as f64 * y_res, 0.0);
        }
        for i in 0..self.donors.len() {
            let (cx, cy) = draw(rng, &mut taken);
            self.donors[i].pos = Point::new(cx as f64 * x_res, cy as f64 * y_res, 0.0);
        }
        self.landscape_stale = true;
        Ok(())
    }

    pub fn n(&self) -> usize {
        self.acceptors.len()
    }

    pub fn m(&self) -> usize {
        self.donors.len()
    }

    pub fn num_electrodes(&self) -> usize {
        self.electrodes.len()
    }

    /// Size of the hopping node space: acceptors plus electrodes.
    pub fn node_count(&self) -> usize {
        self.acceptors.len() + self.electrodes.len()
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn acceptors(&self) -> &[Acceptor] {
        &self.acceptors
    }

    pub fn donors(&self) -> &[Donor] {
        &self.donors
    }

    pub fn electrodes(&self) -> &[Electrode] {
        &self.electrodes
    }

    /// Whether a node index addresses an electrode.
    pub fn is_electrode_node(&self, node: usize) -> bool {
        node >= self.acceptors.len()
    }

    /// Position of a node (acceptor or electrode).
    pub fn node_position(&self, node: usize) -> Point {
        if node < self.acceptors.len() {
            self.acceptors[node].pos
        } else {
            self.electrodes[node - self.acceptors.len()].pos
        }
    }

    pub fn occupancy(&self, acceptor: usize) -> u8 {
        self.acceptors[acceptor].occupancy
    }

    pub(crate) fn set_occupancy(&mut self, acceptor: usize, occupancy: u8) {
        debug_assert!(occupancy <= 2);
        self.acceptors[acceptor].occupancy = occupancy;
    }

    /// Apply one voltage, marking the landscape stale only on change.
    pub fn set_voltage(&mut self, electrode: usize, voltage: f64) -> Result<()> {
        let count = self.electrodes.len();
        let e = self
            .electrodes
            .get_mut(electrode)
            .ok_or(Error::ElectrodeIndex {
                index: electrode,
                count,
            })?;
        if e.voltage != voltage {
            e.voltage = voltage;
            self.landscape_stale = true;
        }
        Ok(())
    }

    pub fn voltage(&self, electrode: usize) -> f64 {
        self.electrodes[electrode].voltage
    }

    /// Move one acceptor. Charges stay where they are; the landscape
    /// goes stale.
    pub fn set_acceptor_position(&mut self, index: usize, pos: Point) -> Result<()> {
        let count = self.acceptors.len();
        let a = self
            .acceptors
            .get_mut(index)
            .ok_or(Error::DopantIndex { index, count })?;
        a.pos = pos;
        self.landscape_stale = true;
        Ok(())
    }

    /// Move one donor. The landscape goes stale.
    pub fn set_donor_position(&mut self, index: usize, pos: Point) -> Result<()> {
        let count = self.donors.len();
        let d = self
            .donors
            .get_mut(index)
            .ok_or(Error::DopantIndex { index, count })?;
        d.pos = pos;
        self.landscape_stale = true;
        Ok(())
    }

    /// Move a carrier between two nodes of the hopping space.
    pub fn apply_hop(&mut self, from: usize, to: usize) {
        let n = self.acceptors.len();
        if from < n {
            debug_assert!(self.acceptors[from].occupancy > 0);
            self.acceptors[from].occupancy -= 1;
        } else {
            self.electrodes[from - n].count -= 1;
        }
        if to < n {
            debug_assert!(self.acceptors[to].occupancy < 2);
            self.acceptors[to].occupancy += 1;
        } else {
            self.electrodes[to - n].count += 1;
        }
    }

    /// Zero all electrode exchange counters.
    pub fn reset_counters(&mut self) {
        for e in &mut self.electrodes {
            e.count = 0;
        }
    }

    pub fn total_occupancy(&self) -> i64 {
        self.acceptors.iter().map(|a| a.occupancy as i64).sum()
    }

    pub fn electrode_count_sum(&self) -> i64 {
        self.electrodes.iter().map(|e| e.count).sum()
    }

    /// Deviation from the conservation law
    /// `total occupancy + electrode counts = N - M`. Zero on any network
    /// that has only been mutated through [`DopantNetwork::apply_hop`].
    pub fn charge_imbalance(&self) -> i64 {
        self.total_occupancy() + self.electrode_count_sum()
            - (self.acceptors.len() as i64 - self.donors.len() as i64)
    }

    /// Whether derived energies are out of date with positions/voltages.
    pub fn landscape_stale(&self) -> bool {
        self.landscape_stale
    }

    /// Mark derived energies up to date. Called by the solver after a
    /// refresh.
    pub fn mark_landscape_fresh(&mut self) {
        self.landscape_stale = false;
    }
}
