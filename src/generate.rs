use std::{fs, path::PathBuf, time::{SystemTime, UNIX_EPOCH}};

use anyhow::Context;
use clap::{Args, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use rand_distr::{Distribution, Uniform};
use serde::Serialize;
use tracing::*;

use crate::error::{Error, Result};
use crate::format::{save_instance, Statistics};
use crate::instance::{euclidean, round_to, DispersionInstance, DistanceMatrix, FlpInstance, Instance, Point};

/// Upper bound on capacity resampling rounds before giving up.
pub const MAX_CAPACITY_ROUNDS: usize = 10_000;

/// Client counts are drawn from the client range in steps of this size.
pub const CLIENT_STEP: usize = 10;

/// Draws per benchmark instance before a group is abandoned.
pub const MAX_INSTANCE_ATTEMPTS: usize = 100;

/// Sampling ranges (inclusive) for a facility location instance.
#[derive(Debug, Clone, PartialEq)]
pub struct FlpRanges {
    pub facilities: (usize, usize),
    pub clients: (usize, usize),
    pub capacity: Option<(u32, u32)>,
    pub fixed_cost: (f64, f64),
}

/// Sampling ranges (inclusive) for a dispersion instance.
#[derive(Debug, Clone, PartialEq)]
pub struct DispersionRanges {
    pub locations: (usize, usize),
    pub p: (usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Family {
    Flp,
    Dispersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Group {
    Small,
    Medium,
    Large,
}

impl Group {
    pub const ALL: [Group; 3] = [Group::Small, Group::Medium, Group::Large];

    pub fn name(self) -> &'static str {
        match self {
            Group::Small => "Small",
            Group::Medium => "Medium",
            Group::Large => "Large",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Group::Small => "SMALL",
            Group::Medium => "MEDIUM",
            Group::Large => "LARGE",
        }
    }

    pub fn flp_ranges(self) -> FlpRanges {
        match self {
            Group::Small => FlpRanges { facilities: (10, 15), clients: (20, 100), capacity: Some((5, 10)), fixed_cost: (5.0, 10.0) },
            Group::Medium => FlpRanges { facilities: (20, 40), clients: (100, 300), capacity: Some((8, 12)), fixed_cost: (50.0, 100.0) },
            Group::Large => FlpRanges { facilities: (40, 60), clients: (350, 450), capacity: Some((12, 16)), fixed_cost: (200.0, 400.0) },
        }
    }

    pub fn dispersion_ranges(self) -> DispersionRanges {
        match self {
            Group::Small => DispersionRanges { locations: (8, 12), p: (3, 7) },
            Group::Medium => DispersionRanges { locations: (13, 18), p: (7, 12) },
            Group::Large => DispersionRanges { locations: (18, 25), p: (10, 15) },
        }
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InstanceGeneration(msg.into())
}

fn check_range<T: PartialOrd + std::fmt::Debug>(name: &str, (lo, hi): (T, T)) -> Result<()> {
    if lo > hi {
        return Err(invalid(format!("{name} range [{lo:?}, {hi:?}] is empty")));
    }
    Ok(())
}

/// Builds a ChaCha generator from a 128-bit seed, or from the clock when absent.
pub fn seeded_rng(seed: Option<u128>) -> ChaChaRng {
    let init = seed.unwrap_or_else(|| {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or_default()
    });
    let mut seed = [0_u8; 32];
    seed.iter_mut().zip(init.to_be_bytes().into_iter()).for_each(|(s, i)| *s = i);
    seed.iter_mut().rev().zip(init.to_le_bytes().into_iter()).for_each(|(s, i)| *s = i);
    ChaChaRng::from_seed(seed)
}

/// Random, invariant-respecting instance generator.
pub struct InstanceGenerator<R> {
    rng: R,
    max_capacity_rounds: usize,
}

impl InstanceGenerator<ChaChaRng> {
    pub fn from_seed(seed: Option<u128>) -> Self {
        Self::new(seeded_rng(seed))
    }
}

impl<R: Rng> InstanceGenerator<R> {
    pub fn new(rng: R) -> Self {
        InstanceGenerator { rng, max_capacity_rounds: MAX_CAPACITY_ROUNDS }
    }

    pub fn with_max_capacity_rounds(mut self, rounds: usize) -> Self {
        self.max_capacity_rounds = rounds;
        self
    }

    /// Samples a facility location instance. Costs are Euclidean distances
    /// rounded to 4 decimals, fixed costs are rounded to 2 decimals. With a
    /// capacity range, capacities are resampled until they cover every client.
    pub fn generate_flp_instance(&mut self, id: &str, group: &str, ranges: &FlpRanges) -> Result<FlpInstance> {
        check_range("facility", ranges.facilities)?;
        check_range("client", ranges.clients)?;
        check_range("fixed cost", ranges.fixed_cost)?;
        if ranges.facilities.0 == 0 {
            return Err(invalid("at least one facility is required"));
        }
        if !(ranges.fixed_cost.0 >= 0.0 && ranges.fixed_cost.1.is_finite()) {
            return Err(invalid(format!("fixed cost range {:?} must be finite and non-negative", ranges.fixed_cost)));
        }
        if let Some(capacity) = ranges.capacity {
            check_range("capacity", capacity)?;
        }

        let n_fac = Uniform::new_inclusive(ranges.facilities.0, ranges.facilities.1).sample(&mut self.rng);
        let steps = (ranges.clients.1 - ranges.clients.0) / CLIENT_STEP;
        let n_cli = ranges.clients.0 + CLIENT_STEP * self.rng.gen_range(0..=steps);
        debug!(id, facilities = n_fac, clients = n_cli, "sampled sizes");

        let facilities = self.sample_points(n_fac);
        let clients = self.sample_points(n_cli);
        let cost = facilities
            .iter()
            .map(|&f| clients.iter().map(|&c| round_to(euclidean(f, c), 4)).collect())
            .collect();

        let rand_fixed = Uniform::new_inclusive(ranges.fixed_cost.0, ranges.fixed_cost.1);
        let fixed_cost = (0..n_fac).map(|_| round_to(rand_fixed.sample(&mut self.rng), 2)).collect();

        let capacity = match ranges.capacity {
            Some(range) => Some(self.sample_capacities(n_fac, n_cli, range)?),
            None => None,
        };

        FlpInstance::new(id, group, facilities, clients, cost, fixed_cost, capacity)
    }

    /// Samples a dispersion instance. Fails when the drawn p exceeds the drawn
    /// number of locations.
    pub fn generate_dispersion_instance(&mut self, id: &str, group: &str, ranges: &DispersionRanges) -> Result<DispersionInstance> {
        check_range("location", ranges.locations)?;
        check_range("p", ranges.p)?;
        if ranges.p.0 == 0 {
            return Err(invalid("p must be at least 1"));
        }

        let n = Uniform::new_inclusive(ranges.locations.0, ranges.locations.1).sample(&mut self.rng);
        let locations = self.sample_points(n);
        let distances = DistanceMatrix::from_points(&locations);
        let p = Uniform::new_inclusive(ranges.p.0, ranges.p.1).sample(&mut self.rng);
        if p > n {
            return Err(invalid(format!("{id}: drew p = {p} for only {n} locations")));
        }
        debug!(id, locations = n, p, "sampled sizes");

        DispersionInstance::new(id, group, locations, distances, p).map_err(|e| invalid(e.to_string()))
    }

    fn sample_points(&mut self, n: usize) -> Vec<Point> {
        let unit = Uniform::new(0.0, 1.0);
        (0..n).map(|_| (unit.sample(&mut self.rng), unit.sample(&mut self.rng))).collect()
    }

    fn sample_capacities(&mut self, n_fac: usize, n_cli: usize, (lo, hi): (u32, u32)) -> Result<Vec<u32>> {
        if (hi as u64) * (n_fac as u64) < n_cli as u64 {
            return Err(invalid(format!(
                "{n_fac} facilities of capacity at most {hi} can never serve {n_cli} clients"
            )));
        }
        let rand_capacity = Uniform::new_inclusive(lo, hi);
        for round in 1..=self.max_capacity_rounds {
            let capacity: Vec<u32> = (0..n_fac).map(|_| rand_capacity.sample(&mut self.rng)).collect();
            let total: u64 = capacity.iter().map(|&c| c as u64).sum();
            if total >= n_cli as u64 {
                debug!(round, total, "capacities accepted");
                return Ok(capacity);
            }
        }
        Err(invalid(format!(
            "no capacity vector covering {n_cli} clients after {} rounds",
            self.max_capacity_rounds
        )))
    }
}

/// Generates `per_group` instances for each of `groups`, with ids such as `SMALL_01`.
///
/// Some draws of a preset cannot be made feasible (too many clients for the
/// drawn facilities, or p above the drawn location count); those are redrawn
/// up to [`MAX_INSTANCE_ATTEMPTS`] times.
pub fn generate_benchmark<R: Rng>(
    generator: &mut InstanceGenerator<R>,
    family: Family,
    groups: &[Group],
    per_group: usize,
) -> Result<Vec<Instance>> {
    let mut instances = Vec::with_capacity(groups.len() * per_group);
    for &group in groups {
        for k in 0..per_group {
            let id = format!("{}_{:02}", group.key(), k + 1);
            instances.push(generator.draw_until_valid(&id, family, group)?);
        }
    }
    Ok(instances)
}

impl<R: Rng> InstanceGenerator<R> {
    fn draw_until_valid(&mut self, id: &str, family: Family, group: Group) -> Result<Instance> {
        let mut attempt = 1;
        loop {
            let drawn = match family {
                Family::Flp => self.generate_flp_instance(id, group.name(), &group.flp_ranges()).map(Instance::Flp),
                Family::Dispersion => self
                    .generate_dispersion_instance(id, group.name(), &group.dispersion_ranges())
                    .map(Instance::Dispersion),
            };
            match drawn {
                Err(Error::InstanceGeneration(msg)) if attempt < MAX_INSTANCE_ATTEMPTS => {
                    warn!(id, attempt, "redrawing: {msg}");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryEntry {
    pub instance_id: String,
    pub group: String,
    #[serde(rename = "I")]
    pub n_facilities: usize,
    #[serde(rename = "J", skip_serializing_if = "Option::is_none")]
    pub n_clients: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<usize>,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSummary {
    pub total_instances: usize,
    pub instances_per_group: usize,
    pub instances: Vec<SummaryEntry>,
}

impl BenchmarkSummary {
    pub fn new(instances: &[Instance], per_group: usize) -> Self {
        let instances = instances
            .iter()
            .map(|inst| match inst {
                Instance::Flp(f) => SummaryEntry {
                    instance_id: f.id().to_string(),
                    group: f.group().to_string(),
                    n_facilities: f.n_facilities(),
                    n_clients: Some(f.n_clients()),
                    p: None,
                    statistics: Statistics::of_flp(f),
                },
                Instance::Dispersion(d) => SummaryEntry {
                    instance_id: d.id().to_string(),
                    group: d.group().to_string(),
                    n_facilities: d.n_locations(),
                    n_clients: None,
                    p: Some(d.p()),
                    statistics: Statistics::of_dispersion(d),
                },
            })
            .collect::<Vec<_>>();
        BenchmarkSummary { total_instances: instances.len(), instances_per_group: per_group, instances }
    }
}

#[derive(Debug, Args)]
pub struct Generate {
    /// Which family of instances to generate
    #[clap(short, long, value_enum)]
    pub family: Family,
    /// An optional seed to kickstart the instance generation
    #[clap(short = 's', long)]
    pub seed: Option<u128>,
    /// The number of instances generated in each size group
    #[clap(short = 'n', long, default_value = "10")]
    pub per_group: usize,
    /// Restrict generation to a single size group
    #[clap(short, long, value_enum)]
    pub group: Option<Group>,
    /// Directory where the instances and the summary are written
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

impl Generate {
    pub fn generate(&self) -> anyhow::Result<()> {
        let dir = self.output.clone().unwrap_or_else(|| match self.family {
            Family::Flp => PathBuf::from("benchmark_instances/FLP"),
            Family::Dispersion => PathBuf::from("benchmark_instances/P_dispersion"),
        });
        fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;

        let groups = match self.group {
            Some(g) => vec![g],
            None => Group::ALL.to_vec(),
        };
        let mut generator = InstanceGenerator::from_seed(self.seed);
        let instances = generate_benchmark(&mut generator, self.family, &groups, self.per_group)?;

        for inst in &instances {
            let path = dir.join(format!("{}.json", inst.id()));
            save_instance(inst, &path)?;
            info!(path = %path.display(), "instance written");
        }

        let summary_path = dir.join("benchmark_summary.json");
        let summary = serde_json::to_string_pretty(&BenchmarkSummary::new(&instances, self.per_group))?;
        fs::write(&summary_path, summary).with_context(|| format!("cannot write {}", summary_path.display()))?;
        info!(count = instances.len(), dir = %dir.display(), "generation finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flp_sizes_follow_ranges() {
        let mut generator = InstanceGenerator::from_seed(Some(7));
        let ranges = Group::Small.flp_ranges();
        // a few draws (10 facilities for 100 clients) may exhaust the capacity rounds
        let drawn: Vec<_> = (0..20)
            .filter_map(|k| generator.generate_flp_instance(&format!("T{k}"), "Small", &ranges).ok())
            .collect();
        assert!(!drawn.is_empty());
        for inst in drawn {
            assert!((10..=15).contains(&inst.n_facilities()));
            assert!((20..=100).contains(&inst.n_clients()));
            assert_eq!(inst.n_clients() % 10, 0);
            assert!(inst.fixed_cost().iter().all(|&f| (5.0..=10.0).contains(&f)));
            assert!(inst.total_capacity().unwrap() >= inst.n_clients() as u64);
            for (i, row) in inst.cost_rows().iter().enumerate() {
                for (j, &c) in row.iter().enumerate() {
                    assert_eq!(c, round_to(euclidean(inst.facilities()[i], inst.clients()[j]), 4));
                }
            }
        }
    }

    #[test]
    fn same_seed_same_instance() {
        let ranges = Group::Medium.dispersion_ranges();
        let a = InstanceGenerator::from_seed(Some(42)).generate_dispersion_instance("A", "Medium", &ranges).unwrap();
        let b = InstanceGenerator::from_seed(Some(42)).generate_dispersion_instance("A", "Medium", &ranges).unwrap();
        assert_eq!(a.locations(), b.locations());
        assert_eq!(a.p(), b.p());
    }

    #[test]
    fn uncapacitated_ranges_yield_no_capacities() {
        let ranges = FlpRanges { capacity: None, ..Group::Small.flp_ranges() };
        let inst = InstanceGenerator::from_seed(Some(1)).generate_flp_instance("U", "Small", &ranges).unwrap();
        assert!(inst.capacity().is_none());
    }

    #[test]
    fn capacity_sampling_is_bounded() {
        // 10 facilities of capacity 1..=2 against at least 20 clients: only the
        // all-twos vector succeeds, which one round is very unlikely to draw.
        let ranges = FlpRanges { facilities: (10, 10), clients: (20, 20), capacity: Some((1, 2)), fixed_cost: (1.0, 1.0) };
        let mut generator = InstanceGenerator::from_seed(Some(3)).with_max_capacity_rounds(1);
        let outcomes: Vec<_> = (0..5).map(|k| generator.generate_flp_instance(&format!("C{k}"), "g", &ranges)).collect();
        assert!(outcomes.iter().any(|r| matches!(r, Err(Error::InstanceGeneration(_)))));
        for inst in outcomes.into_iter().flatten() {
            assert!(inst.total_capacity().unwrap() >= 20);
        }
    }

    #[test]
    fn hopeless_capacity_fails_fast() {
        let ranges = FlpRanges { facilities: (2, 2), clients: (30, 30), capacity: Some((1, 5)), fixed_cost: (1.0, 2.0) };
        let err = InstanceGenerator::from_seed(Some(0)).generate_flp_instance("H", "g", &ranges).unwrap_err();
        assert!(matches!(err, Error::InstanceGeneration(_)));
    }

    #[test]
    fn p_above_location_count_is_rejected() {
        let ranges = DispersionRanges { locations: (3, 3), p: (4, 5) };
        let err = InstanceGenerator::from_seed(Some(0)).generate_dispersion_instance("P", "g", &ranges).unwrap_err();
        assert!(matches!(err, Error::InstanceGeneration(_)));
    }

    #[test]
    fn empty_ranges_are_rejected() {
        let ranges = DispersionRanges { locations: (5, 3), p: (1, 2) };
        assert!(InstanceGenerator::from_seed(None).generate_dispersion_instance("E", "g", &ranges).is_err());
    }

    #[test]
    fn benchmark_ids() {
        let mut generator = InstanceGenerator::from_seed(Some(11));
        let instances = generate_benchmark(&mut generator, Family::Dispersion, &Group::ALL, 2).unwrap();
        let ids: Vec<_> = instances.iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, ["SMALL_01", "SMALL_02", "MEDIUM_01", "MEDIUM_02", "LARGE_01", "LARGE_02"]);
        let summary = BenchmarkSummary::new(&instances, 2);
        assert_eq!(summary.total_instances, 6);
    }

    #[test]
    fn benchmark_redraws_unfit_flp_draws() {
        let mut generator = InstanceGenerator::from_seed(Some(5));
        let instances = generate_benchmark(&mut generator, Family::Flp, &[Group::Medium], 10).unwrap();
        assert_eq!(instances.len(), 10);
        for inst in &instances {
            let Instance::Flp(inst) = inst else { panic!("wrong family") };
            assert!(inst.total_capacity().unwrap() >= inst.n_clients() as u64);
        }
    }
}
