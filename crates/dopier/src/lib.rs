//! Dopier: kinetic Monte Carlo simulation of charge transport through
//! disordered dopant networks, and search over dopant placements that
//! realize target current/voltage behavior.
//!
//! The workspace splits into layers, re-exported here:
//!
//! - [`dopier_core`] - geometry, the network data model, snapshots
//! - [`dopier_solver`] - SOR Laplace relaxation of the electrostatic
//!   landscape
//! - [`dopier_kmc`] - Miller-Abrahams rates and the rejection-free KMC
//!   engine
//! - [`dopier_backend_cpu`] - the CPU batch backend
//! - [`dopier_search`] - greedy, annealing and genetic placement search
//!
//! # Example
//!
//! ```
//! use dopier::{Domain, DopantNetwork, Electrode, KmcEngine, Point, RelaxConfig};
//!
//! let domain = Domain::new(1.0, 0.0, 0.0)?.with_res(0.1)?;
//! let electrodes = vec![
//!     Electrode::new(Point::new(0.0, 0.0, 0.0), 1.0),
//!     Electrode::new(Point::new(1.0, 0.0, 0.0), -1.0),
//! ];
//! let mut dn = DopantNetwork::new_seeded(5, 1, domain, electrodes, 42)?;
//! dopier::refresh(&mut dn, &RelaxConfig::default())?;
//!
//! let mut engine = KmcEngine::new(42);
//! let currents = engine.simulate_discrete(&mut dn, 1_000)?;
//! assert_eq!(currents.len(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use dopier_backend_cpu::CpuBackend;
pub use dopier_core::{
    Acceptor, Dimensionality, Domain, Donor, DopantNetwork, Electrode, NetworkSnapshot, Physics,
    Point, PotentialGrid,
};
pub use dopier_kmc::{
    KmcEngine, RateBranch, SimulationBackend, SimulationKernel, SimulationOutcome,
    SimulationRequest, TimePolicy, TransitionGraph,
};
pub use dopier_search::{
    AnnealingSchedule, AnnealingSearch, AnnealingWaypoint, CrossoverOp, Evaluator, GeneticConfig,
    GeneticSearch, GreedySearch, LocalSearchConfig, SearchOutcome, StrategyLadder, StrategyTier,
    TestCase, UniquenessSchedule, ValidationRecord,
};
pub use dopier_solver::{RelaxConfig, refresh, solve_landscape};
