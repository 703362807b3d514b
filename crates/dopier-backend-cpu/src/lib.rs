//! CPU implementation of the simulation backend contract.
//!
//! Runs fixed-hop requests through the in-process KMC engine. Batches
//! can fan out over a rayon thread pool; every network gets an
//! independent random stream derived from the backend's base seed and
//! its position in the batch, so batched and one-at-a-time evaluation
//! agree exactly.

use std::time::Instant;

use rayon::prelude::*;

use dopier_core::DopantNetwork;
use dopier_kmc::{
    Error, KmcEngine, RateBranch, Result, SimulationBackend, SimulationOutcome,
    SimulationRequest, TimePolicy,
};

/// CPU backend. Sequential by default; `with_parallel` fans batches out
/// over rayon.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    branch: RateBranch,
    time_policy: TimePolicy,
    parallel: bool,
    base_seed: u64,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self {
            branch: RateBranch::default(),
            time_policy: TimePolicy::default(),
            parallel: false,
            base_seed: 0,
        }
    }
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(mut self, branch: RateBranch) -> Self {
        self.branch = branch;
        self
    }

    pub fn with_time_policy(mut self, policy: TimePolicy) -> Self {
        self.time_policy = policy;
        self
    }

    /// Evaluate batches on the rayon thread pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Base seed from which per-network streams are derived.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    fn engine(&self, seed: u64) -> KmcEngine {
        KmcEngine::new(seed)
            .with_branch(self.branch)
            .with_time_policy(self.time_policy)
    }

    fn run_one(
        &self,
        dn: &mut DopantNetwork,
        request: &SimulationRequest,
        seed: u64,
        deadline: Option<Instant>,
    ) -> Result<SimulationOutcome> {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded);
            }
        }
        let mut engine = self.engine(seed);
        let currents = engine.run(dn, request)?;
        Ok(SimulationOutcome {
            occupancies: dn.acceptors().iter().map(|a| a.occupancy).collect(),
            currents,
        })
    }
}

impl SimulationBackend for CpuBackend {
    fn simulate(
        &self,
        dn: &mut DopantNetwork,
        request: &SimulationRequest,
        seed: u64,
    ) -> Result<SimulationOutcome> {
        self.run_one(dn, request, seed, None)
    }

    fn simulate_batch(
        &self,
        dns: &mut [DopantNetwork],
        request: &SimulationRequest,
        deadline: Option<Instant>,
    ) -> Vec<Result<SimulationOutcome>> {
        let base = self.base_seed;
        if self.parallel {
            log::debug!("evaluating batch of {} networks on rayon", dns.len());
            dns.par_iter_mut()
                .enumerate()
                .map(|(i, dn)| self.run_one(dn, request, base.wrapping_add(i as u64), deadline))
                .collect()
        } else {
            dns.iter_mut()
                .enumerate()
                .map(|(i, dn)| self.run_one(dn, request, base.wrapping_add(i as u64), deadline))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use dopier_core::{Domain, Electrode, Point};
    use dopier_solver::{RelaxConfig, refresh};

    fn network(seed: u64) -> DopantNetwork {
        let domain = Domain::new(1.0, 0.0, 0.0).unwrap().with_res(0.1).unwrap();
        let electrodes = vec![
            Electrode::new(Point::new(0.0, 0.0, 0.0), 2.0),
            Electrode::new(Point::new(1.0, 0.0, 0.0), -2.0),
        ];
        let mut dn = DopantNetwork::new_seeded(4, 1, domain, electrodes, seed).unwrap();
        dn.physics = dn.physics.with_ab(0.1);
        refresh(&mut dn, &RelaxConfig::default()).unwrap();
        dn
    }

    #[test]
    fn test_batch_matches_single_runs_at_matched_seeds() {
        let backend = CpuBackend::new().with_seed(40);
        let request = SimulationRequest::record(600);

        let mut batch: Vec<DopantNetwork> = (0..3).map(|s| network(s)).collect();
        let outcomes = backend.simulate_batch(&mut batch, &request, None);

        for (i, outcome) in outcomes.iter().enumerate() {
            let mut solo = network(i as u64);
            let expected = backend.simulate(&mut solo, &request, 40 + i as u64).unwrap();
            let got = outcome.as_ref().unwrap();
            assert_eq!(got.currents, expected.currents, "network {}", i);
            assert_eq!(got.occupancies, expected.occupancies, "network {}", i);
        }
    }

    #[test]
    fn test_parallel_batch_is_deterministic() {
        let request = SimulationRequest::record(600);

        let mut sequential: Vec<DopantNetwork> = (0..4).map(|s| network(s)).collect();
        let seq = CpuBackend::new().with_seed(7).simulate_batch(&mut sequential, &request, None);

        let mut parallel: Vec<DopantNetwork> = (0..4).map(|s| network(s)).collect();
        let par = CpuBackend::new()
            .with_seed(7)
            .with_parallel(true)
            .simulate_batch(&mut parallel, &request, None);

        for (a, b) in seq.iter().zip(&par) {
            assert_eq!(a.as_ref().unwrap().currents, b.as_ref().unwrap().currents);
        }
    }

    #[test]
    fn test_expired_deadline_discards_batch() {
        let backend = CpuBackend::new();
        let request = SimulationRequest::record(600);
        let mut batch: Vec<DopantNetwork> = (0..2).map(|s| network(s)).collect();

        let deadline = Instant::now() - Duration::from_millis(1);
        let outcomes = backend.simulate_batch(&mut batch, &request, Some(deadline));
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o, Err(Error::DeadlineExceeded)))
        );
    }

    #[test]
    fn test_stale_network_fails_alone() {
        let backend = CpuBackend::new();
        let request = SimulationRequest::record(200);
        let mut batch: Vec<DopantNetwork> = (0..2).map(|s| network(s)).collect();
        batch[1].set_voltage(0, 9.0).unwrap(); // stale, never refreshed

        let outcomes = backend.simulate_batch(&mut batch, &request, None);
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1], Err(Error::StaleLandscape)));
    }
}
