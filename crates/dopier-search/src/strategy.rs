//! Staged accuracy ladder for search evaluation.
//!
//! Searching spends most evaluations on placements that are quickly
//! discarded, so evaluation starts on a cheap, noisy tier and promotes
//! to slower, more accurate tiers as the best error shrinks below each
//! tier's promotion threshold. Validation always runs the final tier.

use dopier_kmc::{SimulationKernel, SimulationRequest};

use crate::error::{Error, Result};

/// One rung of the accuracy ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyTier {
    /// Hops per simulation at this tier.
    pub hops: u64,
    /// Kernel used to measure currents.
    pub kernel: SimulationKernel,
    /// Statistical noise expected of this tier; error below it is not
    /// penalized.
    pub expected_err: f64,
    /// Per-point error under which the search promotes past this tier.
    pub threshold_err: f64,
}

impl StrategyTier {
    /// The simulation order this tier issues.
    pub fn request(&self) -> SimulationRequest {
        SimulationRequest {
            hops: self.hops,
            prehops: 0,
            kernel: self.kernel,
        }
    }
}

/// The default four-tier ladder.
pub fn default_tiers() -> Vec<StrategyTier> {
    vec![
        StrategyTier {
            hops: 1_000,
            kernel: SimulationKernel::Probability,
            expected_err: 0.040,
            threshold_err: 0.005,
        },
        StrategyTier {
            hops: 5_000,
            kernel: SimulationKernel::Record,
            expected_err: 0.025,
            threshold_err: 0.005,
        },
        StrategyTier {
            hops: 50_000,
            kernel: SimulationKernel::Record,
            expected_err: 0.010,
            threshold_err: 0.002,
        },
        StrategyTier {
            hops: 250_000,
            kernel: SimulationKernel::Record,
            expected_err: 0.002,
            threshold_err: 0.0,
        },
    ]
}

/// The ladder with its current position.
#[derive(Debug, Clone)]
pub struct StrategyLadder {
    tiers: Vec<StrategyTier>,
    current: usize,
}

impl Default for StrategyLadder {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            current: 0,
        }
    }
}

impl StrategyLadder {
    /// Build a ladder from custom tiers, starting at the first.
    pub fn new(tiers: Vec<StrategyTier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(Error::EmptyLadder);
        }
        Ok(Self { tiers, current: 0 })
    }

    pub fn current(&self) -> &StrategyTier {
        &self.tiers[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 == self.tiers.len()
    }

    /// The most accurate tier, used for validation.
    pub fn final_tier(&self) -> &StrategyTier {
        self.tiers.last().expect("ladder is never empty")
    }

    /// Whether `error` clears the current tier's promotion bar for a
    /// battery of `points` expected currents.
    pub fn clears_threshold(&self, error: f64, points: usize) -> bool {
        error < self.current().threshold_err * points as f64
    }

    /// Step to the next tier. Returns false when already at the last.
    pub fn promote(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.current += 1;
        log::info!("strategy promoted to tier {}", self.current);
        true
    }

    /// Raise the ladder to at least `tier`, clamped to the last rung.
    pub fn raise_to(&mut self, tier: usize) -> bool {
        let tier = tier.min(self.tiers.len() - 1);
        if tier > self.current {
            self.current = tier;
            log::info!("strategy raised to tier {}", self.current);
            true
        } else {
            false
        }
    }
}
