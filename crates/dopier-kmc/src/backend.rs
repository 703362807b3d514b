//! Backend contract for accelerated simulation.
//!
//! A backend executes fixed-hop simulation requests, one network at a
//! time or as a batch. Batch semantics: input ordering is preserved, no
//! state is shared between networks, every network gets its own seeded
//! random stream, and a deadline causes the remaining work to be
//! discarded rather than partially applied.

use std::time::Instant;

use nalgebra::DVector;

use dopier_core::DopantNetwork;

use crate::error::Result;
use crate::kernel::SimulationRequest;

/// Final state reported by a backend run.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    /// Occupancy of every acceptor after the run.
    pub occupancies: Vec<u8>,
    /// Per-electrode currents.
    pub currents: DVector<f64>,
}

/// A simulation executor.
///
/// Implementations must be deterministic in `(network, request, seed)`
/// so that engine-level and batched evaluation agree at matched seeds.
pub trait SimulationBackend: Send + Sync {
    /// Run one request against one network, updating its occupancies and
    /// `current` vector in place.
    fn simulate(
        &self,
        dn: &mut DopantNetwork,
        request: &SimulationRequest,
        seed: u64,
    ) -> Result<SimulationOutcome>;

    /// Run one request against every network in the batch.
    ///
    /// Outcomes are returned in input order. A failed network yields its
    /// own `Err` without poisoning the rest of the batch. When `deadline`
    /// passes, networks not yet started report `DeadlineExceeded`; work
    /// is never partially applied.
    fn simulate_batch(
        &self,
        dns: &mut [DopantNetwork],
        request: &SimulationRequest,
        deadline: Option<Instant>,
    ) -> Vec<Result<SimulationOutcome>>;
}
