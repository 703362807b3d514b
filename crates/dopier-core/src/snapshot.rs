//! Snapshot persistence for dopant networks.
//!
//! A snapshot captures everything needed to rebuild a network bit-exactly:
//! counts, domain, electrodes, dopant positions and occupancies. The
//! derived electrostatic state is not stored; a restored network starts
//! with a stale landscape and must be refreshed before simulating.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::Domain;
use crate::network::{Acceptor, Donor, DopantNetwork, Electrode};
use crate::physics::Physics;

/// Serializable state of a [`DopantNetwork`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub domain: Domain,
    pub physics: Physics,
    pub electrodes: Vec<Electrode>,
    pub acceptors: Vec<Acceptor>,
    pub donors: Vec<Donor>,
}

impl NetworkSnapshot {
    /// Capture the persistent state of a network.
    pub fn capture(network: &DopantNetwork) -> Self {
        Self {
            domain: *network.domain(),
            physics: network.physics,
            electrodes: network.electrodes().to_vec(),
            acceptors: network.acceptors().to_vec(),
            donors: network.donors().to_vec(),
        }
    }

    /// Rebuild a network from this snapshot. Positions and occupancies
    /// are restored exactly; the landscape starts stale.
    pub fn restore(&self) -> Result<DopantNetwork> {
        let mut network = DopantNetwork::new_seeded(
            self.acceptors.len(),
            self.donors.len(),
            self.domain,
            self.electrodes.clone(),
            0,
        )?;
        network.physics = self.physics;
        for (i, a) in self.acceptors.iter().enumerate() {
            network.set_acceptor_position(i, a.pos)?;
        }
        for (i, d) in self.donors.iter().enumerate() {
            network.set_donor_position(i, d.pos)?;
        }
        network.restore_occupancies(&self.acceptors);
        Ok(network)
    }
}

impl DopantNetwork {
    pub(crate) fn restore_occupancies(&mut self, acceptors: &[Acceptor]) {
        for (i, a) in acceptors.iter().enumerate() {
            self.set_occupancy(i, a.occupancy);
        }
    }
}
