//! Genetic placement search.
//!
//! Individuals are dopant placements encoded as packed u16 gene vectors:
//! acceptor (x, y) pairs followed by donor (x, y) pairs, each coordinate
//! scaled onto the full u16 range. Selection is rank-based with a
//! disparity exponent and a preserved elite; crossover pairs adjacent
//! entries of a shuffled parent pool; mutation flips one power-biased
//! bit. Offspring must keep their dopants apart and differ from their
//! siblings by a minimum L1 gene distance, repaired by mutation.

use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use dopier_core::{DopantNetwork, NetworkSnapshot, Point};

use crate::error::{Error, Result};
use crate::evaluate::{Evaluator, SearchOutcome, ValidationRecord};
use crate::schedule::UniquenessSchedule;
use crate::strategy::StrategyLadder;

/// How two parents combine into an offspring gene vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossoverOp {
    /// One cut anywhere in the vector.
    #[default]
    SinglePoint,
    /// One cut inside the acceptor genes and one inside the donor genes,
    /// so each species mixes independently.
    TwoPointSpecies,
}

/// Genetic search parameters.
#[derive(Debug, Clone)]
pub struct GeneticConfig {
    /// Individuals per generation.
    pub gen_size: usize,
    /// Wall-clock budget.
    pub budget: Duration,
    /// Rank-selection exponent; 1 is uniform, larger concentrates on the
    /// best individuals.
    pub disparity: f64,
    /// Minimum L1 gene distance between offspring of one generation.
    pub uniqueness: u64,
    pub crossover: CrossoverOp,
    /// Bit-flip bias; larger powers favor high-order bits.
    pub mut_power: f64,
    /// Probability of one mutation after each crossover.
    pub mut_rate: f64,
    /// Optional generation-dependent uniqueness.
    pub u_schedule: Option<UniquenessSchedule>,
    pub max_generations: Option<u64>,
    /// Minimum u16 separation of two dopants in one individual.
    pub allowed_overlap: u16,
    pub seed: u64,
}

impl GeneticConfig {
    pub fn new(gen_size: usize, budget: Duration) -> Self {
        Self {
            gen_size,
            budget,
            disparity: 2.0,
            uniqueness: 0,
            crossover: CrossoverOp::default(),
            mut_power: 1.0,
            mut_rate: 0.0,
            u_schedule: None,
            max_generations: None,
            allowed_overlap: 65,
            seed: 0,
        }
    }

    pub fn with_disparity(mut self, disparity: f64) -> Self {
        self.disparity = disparity;
        self
    }

    pub fn with_uniqueness(mut self, uniqueness: u64) -> Self {
        self.uniqueness = uniqueness;
        self
    }

    pub fn with_crossover(mut self, crossover: CrossoverOp) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn with_mutation(mut self, mut_rate: f64, mut_power: f64) -> Self {
        self.mut_rate = mut_rate;
        self.mut_power = mut_power;
        self
    }

    pub fn with_u_schedule(mut self, schedule: UniquenessSchedule) -> Self {
        self.u_schedule = Some(schedule);
        self
    }

    pub fn with_max_generations(mut self, generations: u64) -> Self {
        self.max_generations = Some(generations);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Encode a placement as u16 genes: acceptor (x, y) pairs, then donors.
pub fn encode_genes(dn: &DopantNetwork) -> Vec<u16> {
    let domain = dn.domain();
    let enc = |c: f64, extent: f64| {
        if extent > 0.0 {
            (c / extent * 65535.0).round() as u16
        } else {
            0
        }
    };
    let mut genes = Vec::with_capacity(2 * (dn.n() + dn.m()));
    for a in dn.acceptors() {
        genes.push(enc(a.pos.x, domain.xdim));
        genes.push(enc(a.pos.y, domain.ydim));
    }
    for d in dn.donors() {
        genes.push(enc(d.pos.x, domain.xdim));
        genes.push(enc(d.pos.y, domain.ydim));
    }
    genes
}

/// Write a gene vector back into a network: positions are decoded and
/// the charges redistributed, leaving the landscape stale for the next
/// evaluation.
pub fn decode_genes<R: Rng>(genes: &[u16], dn: &mut DopantNetwork, rng: &mut R) -> Result<()> {
    let domain = *dn.domain();
    let dec = |g: u16, extent: f64| g as f64 / 65535.0 * extent;
    for i in 0..dn.n() {
        let pos = Point::new(
            dec(genes[2 * i], domain.xdim),
            dec(genes[2 * i + 1], domain.ydim),
            0.0,
        );
        dn.set_acceptor_position(i, pos)?;
    }
    let offset = 2 * dn.n();
    for i in 0..dn.m() {
        let pos = Point::new(
            dec(genes[offset + 2 * i], domain.xdim),
            dec(genes[offset + 2 * i + 1], domain.ydim),
            0.0,
        );
        dn.set_donor_position(i, pos)?;
    }
    dn.place_charges(rng);
    Ok(())
}

/// Flip one bit of `gene`. The bit index is `floor(r^(1/power) * 16)`,
/// so powers above 1 favor high-order bits and drastic moves.
pub fn mutate_gene<R: Rng>(gene: u16, mut_power: f64, rng: &mut R) -> u16 {
    let r: f64 = rng.random();
    let bit = ((r.powf(1.0 / mut_power) * 16.0) as u32).min(15);
    gene ^ (1u16 << bit)
}

/// Rank weights for the crossover pool: `|d * (1 - (i + 0.5)/c)^(d-1)|`
/// shifted so they sum to `c`.
pub(crate) fn disparity_weights(c: usize, disparity: f64) -> Vec<f64> {
    let raw: Vec<f64> = (0..c)
        .map(|i| {
            let rank = 1.0 - (i as f64 + 0.5) / c as f64;
            (disparity * rank.powf(disparity - 1.0)).abs()
        })
        .collect();
    let offset = (c as f64 - raw.iter().sum::<f64>()) / c as f64;
    raw.into_iter().map(|w| w + offset).collect()
}

fn l1_distance(a: &[u16], b: &[u16]) -> u64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum()
}

enum Violation {
    /// Two dopants of the individual share a lattice cell; carries the
    /// offending gene index.
    Overlap(usize),
    /// The individual is too close to an already accepted sibling.
    TooSimilar,
}

fn check_genes(
    accepted: &[Vec<u16>],
    genes: &[u16],
    uniqueness: u64,
    allowed_overlap: u16,
) -> Option<Violation> {
    for a in (0..genes.len()).step_by(2) {
        for b in (0..genes.len()).step_by(2) {
            if a == b {
                continue;
            }
            if genes[a].abs_diff(genes[b]) < allowed_overlap
                && genes[a + 1].abs_diff(genes[b + 1]) < allowed_overlap
            {
                return Some(Violation::Overlap(a));
            }
        }
    }
    for sibling in accepted {
        if l1_distance(sibling, genes) < uniqueness {
            return Some(Violation::TooSimilar);
        }
    }
    None
}

fn crossover<R: Rng>(
    op: CrossoverOp,
    p1: &[u16],
    p2: &[u16],
    acceptors: usize,
    donors: usize,
    rng: &mut R,
) -> Vec<u16> {
    let len = p1.len();
    match op {
        CrossoverOp::SinglePoint => {
            let k = ((rng.random::<f64>() * len as f64).round() as usize).min(len);
            let mut child = Vec::with_capacity(len);
            child.extend_from_slice(&p1[..k]);
            child.extend_from_slice(&p2[k..]);
            child
        }
        CrossoverOp::TwoPointSpecies => {
            let k1 = ((rng.random::<f64>() * (2 * acceptors) as f64).round() as usize)
                .min(2 * acceptors);
            let k2 = ((rng.random::<f64>() * (2 * donors) as f64).round() as usize)
                .min(2 * donors)
                + 2 * acceptors;
            let mut child = Vec::with_capacity(len);
            child.extend_from_slice(&p1[..k1]);
            child.extend_from_slice(&p2[k1..k2]);
            child.extend_from_slice(&p1[k2..]);
            child
        }
    }
}

/// Population search over gene-encoded placements.
pub struct GeneticSearch {
    evaluator: Evaluator,
    ladder: StrategyLadder,
    config: GeneticConfig,
}

impl GeneticSearch {
    pub fn new(evaluator: Evaluator, config: GeneticConfig) -> Self {
        Self {
            evaluator,
            ladder: StrategyLadder::default(),
            config,
        }
    }

    pub fn with_ladder(mut self, ladder: StrategyLadder) -> Self {
        self.ladder = ladder;
        self
    }

    /// Breed the next generation's gene vectors from the shuffled parent
    /// pool, enforcing uniqueness by repair mutations.
    fn breed<R: Rng>(
        &self,
        pool: &[Vec<u16>],
        uniqueness: u64,
        acceptors: usize,
        donors: usize,
        rng: &mut R,
    ) -> Vec<Vec<u16>> {
        let cfg = &self.config;
        let mut children: Vec<Vec<u16>> = Vec::with_capacity(pool.len());
        for i in 0..pool.len() {
            let j = if i % 2 == 0 { i + 1 } else { i - 1 };
            if j >= pool.len() {
                break;
            }
            let mut child = crossover(cfg.crossover, &pool[i], &pool[j], acceptors, donors, rng);
            if cfg.mut_rate > 0.0 && rng.random::<f64>() < cfg.mut_rate {
                let g = rng.random_range(0..child.len());
                child[g] = mutate_gene(child[g], cfg.mut_power, rng);
            }
            let mut tries = 0;
            while let Some(violation) =
                check_genes(&children, &child, uniqueness, cfg.allowed_overlap)
            {
                let target = match violation {
                    Violation::Overlap(g) => g,
                    Violation::TooSimilar => rng.random_range(0..child.len()),
                };
                child[target] = mutate_gene(child[target], cfg.mut_power, rng);
                tries += 1;
                if tries == 100 {
                    log::warn!("offspring accepted after 100 failed uniqueness repairs");
                    break;
                }
            }
            children.push(child);
        }
        children
    }

    /// Evolve a population seeded from `template` (or from `initial`
    /// placements) until the budget, the generation cap or the final
    /// accuracy tier's threshold is reached.
    pub fn run(
        &mut self,
        template: &DopantNetwork,
        initial: Option<&[DopantNetwork]>,
    ) -> Result<SearchOutcome> {
        let cfg = self.config.clone();
        let preserved = 4 - (cfg.gen_size % 2);
        if cfg.gen_size < preserved + 2 {
            return Err(Error::PopulationTooSmall(cfg.gen_size));
        }
        let cross_count = cfg.gen_size - preserved;
        let (acceptors, donors) = (template.n(), template.m());
        let points = self.evaluator.total_points();

        let start = Instant::now();
        let deadline = start + cfg.budget;
        let validation_timestep = cfg.budget / 10;
        let mut rng = SmallRng::seed_from_u64(cfg.seed);

        // population setup
        let mut population: Vec<DopantNetwork> = (0..cfg.gen_size)
            .map(|i| match initial {
                Some(init) if i < init.len() => init[i].clone(),
                _ => {
                    let mut dn = template.clone();
                    dn.place_dopants(&mut rng);
                    dn.place_charges(&mut rng);
                    dn
                }
            })
            .collect();
        let mut genes: Vec<Vec<u16>> = population.iter().map(encode_genes).collect();

        let mut uniqueness = cfg.uniqueness;
        let mut validations = Vec::new();
        let mut next_validation = validation_timestep;
        let mut champion: Option<(f64, DopantNetwork)> = None;
        let mut generation = 0u64;

        loop {
            generation += 1;
            let scores =
                self.evaluator
                    .evaluate_batch(&mut population, self.ladder.current(), Some(deadline));

            let mut best_error = f64::INFINITY;
            let mut best_index = 0;
            for (i, &score) in scores.iter().enumerate() {
                if score < best_error {
                    best_error = score;
                    best_index = i;
                }
            }
            if champion.as_ref().is_none_or(|(e, _)| best_error < *e) {
                champion = Some((best_error, population[best_index].clone()));
            }
            log::info!(
                "generation {}: best error {:.4} at tier {}",
                generation,
                best_error,
                self.ladder.current_index()
            );

            let elapsed = start.elapsed();
            if let Some(schedule) = &cfg.u_schedule {
                uniqueness = schedule.value_at(generation, cfg.uniqueness);
            }
            if elapsed >= next_validation {
                if let Some((_, dn)) = &champion {
                    let mut probe = dn.clone();
                    let validation = self.evaluator.validate(&mut probe, self.ladder.final_tier())?;
                    validations.push(ValidationRecord {
                        validation,
                        training: best_error,
                        elapsed,
                    });
                }
                next_validation += validation_timestep;
            }

            if elapsed > cfg.budget {
                log::info!("genetic search stopped on budget");
                break;
            }
            if cfg.max_generations.is_some_and(|max| generation >= max) {
                log::info!("genetic search stopped at generation cap");
                break;
            }
            if self.ladder.clears_threshold(best_error, points) {
                if !self.ladder.promote() {
                    break;
                }
            }

            // rank, preserve the elite, breed the rest
            let mut order: Vec<usize> = (0..cfg.gen_size).collect();
            order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

            let mut next_genes: Vec<Vec<u16>> = order
                .iter()
                .take(preserved)
                .map(|&i| genes[i].clone())
                .collect();

            let weights = disparity_weights(cross_count, cfg.disparity);
            let mut pool: Vec<Vec<u16>> = Vec::with_capacity(cross_count);
            let mut space = 0.0;
            for (rank, &idx) in order.iter().take(cross_count).enumerate() {
                space += weights[rank];
                while space >= 1.0 {
                    pool.push(genes[idx].clone());
                    space -= 1.0;
                }
                if rng.random::<f64>() < space {
                    pool.push(genes[idx].clone());
                    space -= 1.0;
                }
            }
            pool.shuffle(&mut rng);
            next_genes.extend(self.breed(&pool, uniqueness, acceptors, donors, &mut rng));

            // the stochastic pool rounding can leave the generation a few
            // individuals short or long
            next_genes.truncate(cfg.gen_size);
            while next_genes.len() < cfg.gen_size {
                let mut filler = next_genes[rng.random_range(0..preserved)].clone();
                let g = rng.random_range(0..filler.len());
                filler[g] = mutate_gene(filler[g], cfg.mut_power, &mut rng);
                next_genes.push(filler);
            }

            for (dn, g) in population.iter_mut().zip(&next_genes) {
                decode_genes(g, dn, &mut rng)?;
            }
            genes = next_genes;
        }

        let (champion_error, mut champion_dn) = champion.expect("at least one generation ran");
        let validation = self.evaluator.validate(&mut champion_dn, self.ladder.final_tier())?;
        validations.push(ValidationRecord {
            validation,
            training: champion_error,
            elapsed: start.elapsed(),
        });
        Ok(SearchOutcome {
            best_error: champion_error,
            final_tier: self.ladder.current_index(),
            validations,
            best: NetworkSnapshot::capture(&champion_dn),
        })
    }
}
