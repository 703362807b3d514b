//! Simulation kernels and backend request types.

/// How electrode currents are measured during a fixed-hop run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationKernel {
    /// Count realized carrier exchanges; current = count / elapsed time.
    #[default]
    Record,
    /// Accumulate the rate-weighted expected net flow of each electrode
    /// over every dwell interval. Converges to the same mean as `Record`
    /// with lower variance at small hop counts.
    Probability,
}

/// A fixed-hop simulation order handed to an engine or backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationRequest {
    /// Recorded hops.
    pub hops: u64,
    /// Equilibration hops executed first; counters and time reset after.
    pub prehops: u64,
    pub kernel: SimulationKernel,
}

impl SimulationRequest {
    /// A counting run of `hops` steps.
    pub fn record(hops: u64) -> Self {
        Self {
            hops,
            prehops: 0,
            kernel: SimulationKernel::Record,
        }
    }

    /// An expected-flow run of `hops` steps.
    pub fn probability(hops: u64) -> Self {
        Self {
            hops,
            prehops: 0,
            kernel: SimulationKernel::Probability,
        }
    }

    pub fn with_prehops(mut self, prehops: u64) -> Self {
        self.prehops = prehops;
        self
    }
}
