//! Greedy and simulated-annealing placement search.
//!
//! Both engines walk the same neighborhood: one dopant shifted by one of
//! the eight lattice directions at the current `(x_res, y_res)`
//! resolution. Positions live on the lattice, so collision checks
//! compare integer cells instead of floats. When a state has no
//! acceptable neighbor the lattice is refined by halving both
//! resolutions until a configured floor.

use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use dopier_core::{DopantNetwork, NetworkSnapshot, Point};

use crate::error::{Error, Result};
use crate::evaluate::{Evaluator, SearchOutcome, ValidationRecord};
use crate::schedule::AnnealingSchedule;
use crate::strategy::StrategyLadder;

/// Errors this close to zero stop a search outright.
const ERROR_FLOOR: f64 = 1e-3;

/// Shared configuration of the lattice-walking searches.
#[derive(Debug, Clone, Copy)]
pub struct LocalSearchConfig {
    /// Starting lattice spacing along x.
    pub x_res: f64,
    /// Starting lattice spacing along y.
    pub y_res: f64,
    /// Refinement stops once the x spacing reaches this value.
    pub min_res: f64,
    /// Wall-clock budget for the whole search.
    pub budget: Duration,
    /// Seed of the search's random stream.
    pub seed: u64,
    /// Scatter the dopants over the lattice before searching. Disable
    /// to descend from the placement the caller provides.
    pub randomize: bool,
}

impl LocalSearchConfig {
    pub fn new(x_res: f64, y_res: f64, budget: Duration) -> Self {
        Self {
            x_res,
            y_res,
            min_res: 0.01,
            budget,
            seed: 0,
            randomize: true,
        }
    }

    pub fn with_min_res(mut self, min_res: f64) -> Self {
        self.min_res = min_res;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }
}

fn cell(p: &Point, x_res: f64, y_res: f64) -> (i64, i64) {
    ((p.x / x_res).round() as i64, (p.y / y_res).round() as i64)
}

/// Candidate single-dopant moves at the given lattice resolution:
/// `(dopant index, new position)` with acceptors first, then donors.
/// Off-domain targets and occupied cells are excluded.
pub(crate) fn lattice_neighbors(
    dn: &DopantNetwork,
    x_res: f64,
    y_res: f64,
) -> Vec<(usize, Point)> {
    let domain = dn.domain();
    let shifts = [
        (x_res, 0.0),
        (-x_res, 0.0),
        (0.0, y_res),
        (0.0, -y_res),
        (x_res, y_res),
        (-x_res, y_res),
        (-x_res, -y_res),
        (x_res, -y_res),
    ];
    let occupied: Vec<(i64, i64)> = dn
        .acceptors()
        .iter()
        .map(|a| cell(&a.pos, x_res, y_res))
        .chain(dn.donors().iter().map(|d| cell(&d.pos, x_res, y_res)))
        .collect();

    let positions = dn
        .acceptors()
        .iter()
        .map(|a| a.pos)
        .chain(dn.donors().iter().map(|d| d.pos));

    let mut moves = Vec::new();
    for (index, pos) in positions.enumerate() {
        for (dx, dy) in shifts {
            let target = Point::new(pos.x + dx, pos.y + dy, pos.z);
            if !domain.contains(&target) {
                continue;
            }
            if occupied.contains(&cell(&target, x_res, y_res)) {
                continue;
            }
            moves.push((index, target));
        }
    }
    moves
}

fn moved(dn: &DopantNetwork, index: usize, pos: Point) -> Result<DopantNetwork> {
    let mut candidate = dn.clone();
    if index < dn.n() {
        candidate.set_acceptor_position(index, pos)?;
    } else {
        candidate.set_donor_position(index - dn.n(), pos)?;
    }
    Ok(candidate)
}

/// Metropolis acceptance: improvements always pass; at meaningful
/// temperature, regressions pass with probability `exp(-dE/T)`. A
/// schedule pinned at zero temperature reduces to greedy descent.
pub(crate) fn metropolis_accept<R: Rng>(
    error: f64,
    best: f64,
    temperature: f64,
    rng: &mut R,
) -> bool {
    if error < best {
        true
    } else if temperature <= 1e-3 {
        false
    } else {
        rng.random::<f64>() < (-(error - best) / temperature).exp()
    }
}

/// Steepest-descent search over the placement lattice.
pub struct GreedySearch {
    evaluator: Evaluator,
    ladder: StrategyLadder,
    cfg: LocalSearchConfig,
}

impl GreedySearch {
    pub fn new(evaluator: Evaluator, cfg: LocalSearchConfig) -> Self {
        Self {
            evaluator,
            ladder: StrategyLadder::default(),
            cfg,
        }
    }

    pub fn with_ladder(mut self, ladder: StrategyLadder) -> Self {
        self.ladder = ladder;
        self
    }

    /// Descend from (a randomized re-placement of) `dn` until no
    /// neighbor improves at the finest resolution, the error floor is
    /// reached, or the budget runs out.
    pub fn run(&mut self, mut dn: DopantNetwork) -> Result<SearchOutcome> {
        let start = Instant::now();
        let mut rng = SmallRng::seed_from_u64(self.cfg.seed);
        let (mut x_res, mut y_res) = (self.cfg.x_res, self.cfg.y_res);
        if self.cfg.randomize {
            dn.place_on_lattice(x_res, y_res, &mut rng)?;
            dn.place_charges(&mut rng);
        }
        let points = self.evaluator.total_points();
        let mut best = self.evaluator.evaluate(&mut dn, self.ladder.current())?;

        'outer: loop {
            if start.elapsed() > self.cfg.budget {
                log::info!("greedy search stopped on budget at error {:.4}", best);
                break;
            }
            let mut found = false;
            let mut options = lattice_neighbors(&dn, x_res, y_res);
            options.shuffle(&mut rng);
            for (index, pos) in options {
                if start.elapsed() > self.cfg.budget {
                    break 'outer;
                }
                if best < ERROR_FLOOR {
                    break 'outer;
                }
                let mut candidate = moved(&dn, index, pos)?;
                let error = match self.evaluator.evaluate(&mut candidate, self.ladder.current()) {
                    Ok(error) => error,
                    Err(Error::Simulation(e)) => {
                        log::debug!("neighbor rejected: {}", e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                if error < best {
                    log::debug!("greedy step to error {:.4}", error);
                    dn = candidate;
                    best = error;
                    found = true;
                    break;
                }
            }
            if best < ERROR_FLOOR {
                break;
            }
            if !found {
                if x_res <= self.cfg.min_res {
                    break;
                }
                if self.ladder.clears_threshold(best, points) {
                    if !self.ladder.promote() {
                        break;
                    }
                    best = self.evaluator.evaluate(&mut dn, self.ladder.current())?;
                } else {
                    x_res /= 2.0;
                    y_res /= 2.0;
                    log::debug!("lattice refined to {:.5}", x_res);
                }
            }
        }

        let validation = self.evaluator.validate(&mut dn, self.ladder.final_tier())?;
        Ok(SearchOutcome {
            best_error: best,
            final_tier: self.ladder.current_index(),
            validations: vec![ValidationRecord {
                validation,
                training: best,
                elapsed: start.elapsed(),
            }],
            best: NetworkSnapshot::capture(&dn),
        })
    }
}

/// Metropolis search along a temperature schedule.
pub struct AnnealingSearch {
    evaluator: Evaluator,
    ladder: StrategyLadder,
    cfg: LocalSearchConfig,
    schedule: AnnealingSchedule,
    validation_timestep: Duration,
}

impl AnnealingSearch {
    pub fn new(
        evaluator: Evaluator,
        cfg: LocalSearchConfig,
        schedule: AnnealingSchedule,
        validation_timestep: Duration,
    ) -> Self {
        Self {
            evaluator,
            ladder: StrategyLadder::default(),
            cfg,
            schedule,
            validation_timestep,
        }
    }

    pub fn with_ladder(mut self, ladder: StrategyLadder) -> Self {
        self.ladder = ladder;
        self
    }

    /// Anneal until the schedule or the budget runs out.
    pub fn run(&mut self, mut dn: DopantNetwork) -> Result<SearchOutcome> {
        let start = Instant::now();
        let mut rng = SmallRng::seed_from_u64(self.cfg.seed);
        let (mut x_res, mut y_res) = (self.cfg.x_res, self.cfg.y_res);
        if self.cfg.randomize {
            dn.place_on_lattice(x_res, y_res, &mut rng)?;
            dn.place_charges(&mut rng);
        }
        let points = self.evaluator.total_points();
        let mut error = self.evaluator.evaluate(&mut dn, self.ladder.current())?;
        let mut champion = (error, dn.clone());
        let mut validations = Vec::new();
        let mut next_validation = self.validation_timestep;
        let horizon = self.schedule.end().min(self.cfg.budget);

        'outer: while start.elapsed() <= horizon {
            let mut found = false;
            let mut options = lattice_neighbors(&dn, x_res, y_res);
            options.shuffle(&mut rng);
            for (index, pos) in options {
                let elapsed = start.elapsed();
                if elapsed > horizon {
                    break 'outer;
                }
                if elapsed >= next_validation {
                    let mut probe = champion.1.clone();
                    let validation = self.evaluator.validate(&mut probe, self.ladder.final_tier())?;
                    validations.push(ValidationRecord {
                        validation,
                        training: error,
                        elapsed,
                    });
                    next_validation += self.validation_timestep;
                }
                if self.ladder.raise_to(self.schedule.tier_floor_at(elapsed)) {
                    error = self.evaluator.evaluate(&mut dn, self.ladder.current())?;
                }
                if error < ERROR_FLOOR {
                    break 'outer;
                }
                let temperature = self.schedule.temperature_at(elapsed);

                let mut candidate = moved(&dn, index, pos)?;
                let trial = match self.evaluator.evaluate(&mut candidate, self.ladder.current()) {
                    Ok(trial) => trial,
                    Err(Error::Simulation(e)) => {
                        log::debug!("neighbor rejected: {}", e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                if metropolis_accept(trial, error, temperature, &mut rng) {
                    dn = candidate;
                    error = trial;
                    if error < champion.0 {
                        champion = (error, dn.clone());
                    }
                    if self.ladder.clears_threshold(error, points) && self.ladder.promote() {
                        error = self.evaluator.evaluate(&mut dn, self.ladder.current())?;
                        if error < champion.0 {
                            champion = (error, dn.clone());
                        }
                    }
                    found = true;
                    break;
                }
            }
            if !found {
                if x_res <= self.cfg.min_res {
                    break;
                }
                x_res /= 2.0;
                y_res /= 2.0;
                log::debug!("lattice refined to {:.5}", x_res);
            }
        }

        let (best_error, mut best_dn) = champion;
        let validation = self.evaluator.validate(&mut best_dn, self.ladder.final_tier())?;
        validations.push(ValidationRecord {
            validation,
            training: best_error,
            elapsed: start.elapsed(),
        });
        Ok(SearchOutcome {
            best_error,
            final_tier: self.ladder.current_index(),
            validations,
            best: NetworkSnapshot::capture(&best_dn),
        })
    }
}
