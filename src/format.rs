//! Persisted JSON form of an instance.
//!
//! Matrices are stored as objects keyed by a pair of indices. The key encoding
//! is `"i,j"` (two decimal integers separated by a comma). Keys written by the
//! earlier tool look like `"(i, j)"`; a single surrounding pair of parentheses
//! and blanks around the integers are accepted on read, nothing else is.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{model_build, Error, Result};
use crate::instance::{round_to, DispersionInstance, DistanceMatrix, FlpInstance, Instance, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(pub usize, pub usize);

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.0, self.1)
    }
}

impl FromStr for PairKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || model_build(format!("invalid pair key {s:?}, expected \"i,j\""));
        let trimmed = s.trim();
        let inner = match trimmed.strip_prefix('(') {
            Some(rest) => rest.strip_suffix(')').ok_or_else(bad)?,
            None => trimmed,
        };
        let (a, b) = inner.split_once(',').ok_or_else(bad)?;
        let index = |part: &str| {
            let part = part.trim();
            if part.is_empty() || !part.bytes().all(|c| c.is_ascii_digit()) {
                return Err(bad());
            }
            part.parse::<usize>().map_err(|_| bad())
        };
        Ok(PairKey(index(a)?, index(b)?))
    }
}

impl Serialize for PairKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PairKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Summary figures stored alongside the instance data. Ignored on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_capacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_fixed_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_capacity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f64>,
}

impl Statistics {
    pub fn of_flp(inst: &FlpInstance) -> Self {
        let mut stats = Statistics {
            avg_fixed_cost: Some(round_to(inst.avg_fixed_cost(), 2)),
            ..Default::default()
        };
        if let Some(capacity) = inst.capacity() {
            stats.total_capacity = inst.total_capacity();
            stats.avg_capacity = stats.total_capacity.map(|t| round_to(t as f64 / capacity.len() as f64, 2));
            stats.min_capacity = capacity.iter().copied().min();
            stats.max_capacity = capacity.iter().copied().max();
        }
        stats
    }

    pub fn of_dispersion(inst: &DispersionInstance) -> Self {
        let dist = inst.distances();
        let (sum, count) = dist.pairs().fold((0.0, 0usize), |(s, c), (_, _, d)| (s + d, c + 1));
        Statistics {
            avg_distance: (count > 0).then(|| round_to(sum / count as f64, 2)),
            min_distance: dist.min(),
            max_distance: (count > 0).then(|| dist.max()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(rename = "I", default, skip_serializing_if = "Option::is_none")]
    pub n_facilities: Option<usize>,
    #[serde(rename = "J", default, skip_serializing_if = "Option::is_none")]
    pub n_clients: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilities: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<Point>>,
    #[serde(rename = "costMatrix", default, skip_serializing_if = "Option::is_none")]
    pub cost_matrix: Option<BTreeMap<PairKey, f64>>,
    #[serde(rename = "distanceMatrix", default, skip_serializing_if = "Option::is_none")]
    pub distance_matrix: Option<BTreeMap<PairKey, f64>>,
    #[serde(rename = "fixedCosts", default, skip_serializing_if = "Option::is_none")]
    pub fixed_costs: Option<BTreeMap<usize, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacities: Option<BTreeMap<usize, u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

fn required<T>(field: Option<T>, name: &str) -> Result<T> {
    field.ok_or_else(|| model_build(format!("missing field `{name}`")))
}

/// Turns an index-keyed map into a dense vector covering `0..len` exactly.
fn dense<T: Copy>(map: &BTreeMap<usize, T>, len: usize, name: &str) -> Result<Vec<T>> {
    if map.len() != len {
        return Err(model_build(format!("`{name}` has {} entries, expected {len}", map.len())));
    }
    (0..len)
        .map(|k| map.get(&k).copied().ok_or_else(|| model_build(format!("missing `{name}[{k}]`"))))
        .collect()
}

fn check_count(declared: usize, actual: usize, name: &str) -> Result<()> {
    if declared != actual {
        return Err(model_build(format!("declared {name} = {declared} but {actual} coordinates given")));
    }
    Ok(())
}

impl InstanceFile {
    pub fn from_flp(inst: &FlpInstance) -> Self {
        let mut cost_matrix = BTreeMap::new();
        for (i, row) in inst.cost_rows().iter().enumerate() {
            for (j, &c) in row.iter().enumerate() {
                cost_matrix.insert(PairKey(i, j), c);
            }
        }
        InstanceFile {
            instance_id: Some(inst.id().to_string()),
            group: Some(inst.group().to_string()),
            n_facilities: Some(inst.n_facilities()),
            n_clients: Some(inst.n_clients()),
            facilities: Some(inst.facilities().to_vec()),
            clients: Some(inst.clients().to_vec()),
            cost_matrix: Some(cost_matrix),
            fixed_costs: Some(inst.fixed_cost().iter().copied().enumerate().collect()),
            capacities: inst.capacity().map(|c| c.iter().copied().enumerate().collect()),
            statistics: Some(Statistics::of_flp(inst)),
            ..Default::default()
        }
    }

    pub fn from_dispersion(inst: &DispersionInstance) -> Self {
        let mut distance_matrix = BTreeMap::new();
        for (i, j, d) in inst.distances().pairs() {
            distance_matrix.insert(PairKey(i, j), d);
            distance_matrix.insert(PairKey(j, i), d);
        }
        InstanceFile {
            instance_id: Some(inst.id().to_string()),
            group: Some(inst.group().to_string()),
            n_facilities: Some(inst.n_locations()),
            p: Some(inst.p()),
            facilities: Some(inst.locations().to_vec()),
            distance_matrix: Some(distance_matrix),
            statistics: Some(Statistics::of_dispersion(inst)),
            ..Default::default()
        }
    }

    pub fn from_instance(inst: &Instance) -> Self {
        match inst {
            Instance::Flp(inst) => Self::from_flp(inst),
            Instance::Dispersion(inst) => Self::from_dispersion(inst),
        }
    }

    /// Validates the file contents and builds the instance. The family is told
    /// apart by the presence of `J` (facility location) or `p` (dispersion).
    pub fn into_instance(self) -> Result<Instance> {
        match (self.n_clients, self.p) {
            (Some(_), None) => self.into_flp().map(Instance::Flp),
            (None, Some(_)) => self.into_dispersion().map(Instance::Dispersion),
            (Some(_), Some(_)) => Err(model_build("both `J` and `p` present")),
            (None, None) => Err(model_build("missing field `J` or `p`")),
        }
    }

    fn into_flp(self) -> Result<FlpInstance> {
        let id = required(self.instance_id, "instance_id")?;
        let group = required(self.group, "group")?;
        let n_fac = required(self.n_facilities, "I")?;
        let n_cli = required(self.n_clients, "J")?;
        let facilities = required(self.facilities, "facilities")?;
        let clients = required(self.clients, "clients")?;
        check_count(n_fac, facilities.len(), "I")?;
        check_count(n_cli, clients.len(), "J")?;

        let cost_matrix = required(self.cost_matrix, "costMatrix")?;
        let mut cost = vec![vec![f64::NAN; n_cli]; n_fac];
        for (&PairKey(i, j), &c) in &cost_matrix {
            if i >= n_fac || j >= n_cli {
                return Err(model_build(format!("costMatrix key ({i},{j}) out of range")));
            }
            cost[i][j] = c;
        }
        if let Some((i, j)) = (0..n_fac).flat_map(|i| (0..n_cli).map(move |j| (i, j))).find(|&(i, j)| cost[i][j].is_nan()) {
            return Err(model_build(format!("missing `costMatrix[{i},{j}]`")));
        }

        let fixed_cost = dense(&required(self.fixed_costs, "fixedCosts")?, n_fac, "fixedCosts")?;
        let capacity = match &self.capacities {
            Some(map) => Some(dense(map, n_fac, "capacities")?),
            None => None,
        };

        FlpInstance::new(id, group, facilities, clients, cost, fixed_cost, capacity)
    }

    fn into_dispersion(self) -> Result<DispersionInstance> {
        let id = required(self.instance_id, "instance_id")?;
        let group = required(self.group, "group")?;
        let n = required(self.n_facilities, "I")?;
        let p = required(self.p, "p")?;
        let locations = required(self.facilities, "facilities")?;
        check_count(n, locations.len(), "I")?;
        let matrix = required(self.distance_matrix, "distanceMatrix")?;
        let distances = DistanceMatrix::from_entries(n, matrix.into_iter().map(|(PairKey(i, j), d)| (i, j, d)))?;
        DispersionInstance::new(id, group, locations, distances, p)
    }
}

pub fn save_instance(inst: &Instance, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &InstanceFile::from_instance(inst))?;
    writer.flush()?;
    Ok(())
}

pub fn load_instance(path: impl AsRef<Path>) -> anyhow::Result<Instance> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let raw: InstanceFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("cannot parse {}", path.display()))?;
    Ok(raw.into_instance()?)
}
