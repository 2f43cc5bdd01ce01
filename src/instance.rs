//! This module defines an abstract representation of facility location and
//! dispersion instances. Instances are validated on construction and never
//! mutated afterwards.

use crate::error::{model_build, Result};

/// Planar coordinates in the unit square.
pub type Point = (f64, f64);

pub fn euclidean(a: Point, b: Point) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn check_finite_non_negative<'a>(what: &str, values: impl IntoIterator<Item = &'a f64>) -> Result<()> {
    for (k, v) in values.into_iter().enumerate() {
        if !v.is_finite() || *v < 0.0 {
            return Err(model_build(format!("{what}[{k}] = {v} is not a non-negative number")));
        }
    }
    Ok(())
}

/// A facility location instance, shared by UFLP and CFLP.
#[derive(Debug, Clone)]
pub struct FlpInstance {
    id: String,
    group: String,
    facilities: Vec<Point>,
    clients: Vec<Point>,
    cost: Vec<Vec<f64>>,
    fixed_cost: Vec<f64>,
    capacity: Option<Vec<u32>>,
}

impl FlpInstance {
    /// Builds an instance from explicit data. `cost[i][j]` is the cost of serving
    /// client `j` from facility `i`.
    pub fn new(
        id: impl Into<String>,
        group: impl Into<String>,
        facilities: Vec<Point>,
        clients: Vec<Point>,
        cost: Vec<Vec<f64>>,
        fixed_cost: Vec<f64>,
        capacity: Option<Vec<u32>>,
    ) -> Result<Self> {
        let (n_fac, n_cli) = (facilities.len(), clients.len());
        if n_fac == 0 {
            return Err(model_build("at least one facility is required"));
        }
        if cost.len() != n_fac {
            return Err(model_build(format!("cost matrix has {} rows for {} facilities", cost.len(), n_fac)));
        }
        for (i, row) in cost.iter().enumerate() {
            if row.len() != n_cli {
                return Err(model_build(format!("cost row {i} has {} entries for {n_cli} clients", row.len())));
            }
            check_finite_non_negative(&format!("cost[{i}]"), row)?;
        }
        if fixed_cost.len() != n_fac {
            return Err(model_build(format!("{} fixed costs for {} facilities", fixed_cost.len(), n_fac)));
        }
        check_finite_non_negative("fixedCost", &fixed_cost)?;
        if let Some(capacity) = &capacity {
            if capacity.len() != n_fac {
                return Err(model_build(format!("{} capacities for {} facilities", capacity.len(), n_fac)));
            }
        }

        Ok(FlpInstance {
            id: id.into(),
            group: group.into(),
            facilities,
            clients,
            cost,
            fixed_cost,
            capacity,
        })
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn group(&self) -> &str { &self.group }
    pub fn facilities(&self) -> &[Point] { &self.facilities }
    pub fn clients(&self) -> &[Point] { &self.clients }
    pub fn n_facilities(&self) -> usize { self.facilities.len() }
    pub fn n_clients(&self) -> usize { self.clients.len() }
    pub fn cost(&self, i: usize, j: usize) -> f64 { self.cost[i][j] }
    pub fn cost_rows(&self) -> &[Vec<f64>] { &self.cost }
    pub fn fixed_cost(&self) -> &[f64] { &self.fixed_cost }
    pub fn capacity(&self) -> Option<&[u32]> { self.capacity.as_deref() }

    pub fn total_capacity(&self) -> Option<u64> {
        self.capacity.as_ref().map(|c| c.iter().map(|&x| x as u64).sum())
    }

    pub fn avg_fixed_cost(&self) -> f64 {
        self.fixed_cost.iter().sum::<f64>() / self.fixed_cost.len() as f64
    }

    /// Average over every facility-client pair; 0 without clients.
    pub fn avg_cost(&self) -> f64 {
        let count = self.n_facilities() * self.n_clients();
        if count == 0 {
            return 0.0;
        }
        self.cost.iter().flatten().sum::<f64>() / count as f64
    }
}

const SYMMETRY_TOL: f64 = 1e-9;

/// Dense symmetric matrix of pairwise distances. The diagonal is undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    data: Vec<f64>,
    size: usize,
}

impl DistanceMatrix {
    /// Computes `d(i,j)` for `i < j` and mirrors it to `d(j,i)`.
    pub fn from_points(points: &[Point]) -> Self {
        let size = points.len();
        let mut data = vec![f64::NAN; size * size];
        for i in 0..size {
            for j in (i + 1)..size {
                let d = euclidean(points[i], points[j]);
                data[i * size + j] = d;
                data[j * size + i] = d;
            }
        }
        DistanceMatrix { data, size }
    }

    /// Builds a matrix from `(i, j, d)` entries. Either orientation of a pair
    /// may be given; when both are, they must agree. Every off-diagonal pair
    /// must be covered.
    pub fn from_entries(size: usize, entries: impl IntoIterator<Item = (usize, usize, f64)>) -> Result<Self> {
        let mut data = vec![f64::NAN; size * size];
        for (i, j, d) in entries {
            if i >= size || j >= size {
                return Err(model_build(format!("distance key ({i},{j}) out of range for {size} locations")));
            }
            if i == j {
                return Err(model_build(format!("distance key ({i},{j}) lies on the diagonal")));
            }
            if !d.is_finite() || d < 0.0 {
                return Err(model_build(format!("distance ({i},{j}) = {d} is not a non-negative number")));
            }
            let (a, b) = (i.min(j), i.max(j));
            let known = data[a * size + b];
            if !known.is_nan() && (known - d).abs() > SYMMETRY_TOL {
                return Err(model_build(format!("asymmetric distance ({a},{b}): {known} vs {d}")));
            }
            data[a * size + b] = d;
            data[b * size + a] = d;
        }
        for i in 0..size {
            for j in (i + 1)..size {
                if data[i * size + j].is_nan() {
                    return Err(model_build(format!("missing distance ({i},{j})")));
                }
            }
        }
        Ok(DistanceMatrix { data, size })
    }

    pub fn size(&self) -> usize { self.size }

    /// `None` on the diagonal.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i == j {
            None
        } else {
            Some(self.data[i * self.size + j])
        }
    }

    /// Every unordered pair `i < j` with its distance.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.size).flat_map(move |i| {
            ((i + 1)..self.size).map(move |j| (i, j, self.data[i * self.size + j]))
        })
    }

    /// Largest pairwise distance, 0 with fewer than two locations.
    pub fn max(&self) -> f64 {
        self.pairs().map(|(_, _, d)| d).fold(0.0, f64::max)
    }

    pub fn min(&self) -> Option<f64> {
        self.pairs().map(|(_, _, d)| d).reduce(f64::min)
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        self.pairs().all(|(i, j, d)| (d - self.data[j * self.size + i]).abs() <= tol)
    }
}

/// A p-dispersion / max-sum dispersion instance.
#[derive(Debug, Clone)]
pub struct DispersionInstance {
    id: String,
    group: String,
    locations: Vec<Point>,
    distances: DistanceMatrix,
    p: usize,
}

impl DispersionInstance {
    pub fn new(
        id: impl Into<String>,
        group: impl Into<String>,
        locations: Vec<Point>,
        distances: DistanceMatrix,
        p: usize,
    ) -> Result<Self> {
        if distances.size() != locations.len() {
            return Err(model_build(format!(
                "distance matrix covers {} locations, {} given",
                distances.size(),
                locations.len()
            )));
        }
        if p == 0 || p > locations.len() {
            return Err(model_build(format!("p = {p} must lie in 1..={}", locations.len())));
        }
        Ok(DispersionInstance { id: id.into(), group: group.into(), locations, distances, p })
    }

    /// Distances are computed from the coordinates.
    pub fn from_points(id: impl Into<String>, group: impl Into<String>, locations: Vec<Point>, p: usize) -> Result<Self> {
        let distances = DistanceMatrix::from_points(&locations);
        Self::new(id, group, locations, distances, p)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn group(&self) -> &str { &self.group }
    pub fn locations(&self) -> &[Point] { &self.locations }
    pub fn n_locations(&self) -> usize { self.locations.len() }
    pub fn distances(&self) -> &DistanceMatrix { &self.distances }
    pub fn p(&self) -> usize { self.p }
}

/// Either family of instance, as read from disk.
#[derive(Debug, Clone)]
pub enum Instance {
    Flp(FlpInstance),
    Dispersion(DispersionInstance),
}

impl Instance {
    pub fn id(&self) -> &str {
        match self {
            Instance::Flp(inst) => inst.id(),
            Instance::Dispersion(inst) => inst.id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Vec<Point> {
        vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]
    }

    #[test]
    fn distances_are_symmetric_with_undefined_diagonal() {
        let dm = DistanceMatrix::from_points(&triangle());
        assert_eq!(dm.get(0, 0), None);
        assert_eq!(dm.get(0, 1), Some(1.0));
        assert_eq!(dm.get(2, 1), dm.get(1, 2));
        assert!((dm.max() - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(dm.pairs().count(), 3);
        assert!(dm.is_symmetric(0.0));
    }

    #[test]
    fn entries_accept_either_orientation() {
        let s = 2f64.sqrt();
        let dm = DistanceMatrix::from_entries(3, vec![(0, 1, 1.0), (2, 0, 1.0), (1, 2, s), (2, 1, s)]).unwrap();
        assert_eq!(dm, DistanceMatrix::from_points(&triangle()));
        assert!(DistanceMatrix::from_entries(3, vec![(0, 1, 1.0), (0, 2, 1.0)]).is_err());
        assert!(DistanceMatrix::from_entries(3, vec![(0, 1, 1.0), (0, 2, 1.0), (1, 2, s), (2, 1, 1.0)]).is_err());
        assert!(DistanceMatrix::from_entries(2, vec![(0, 1, -1.0)]).is_err());
        assert!(DistanceMatrix::from_entries(2, vec![(1, 1, 0.0)]).is_err());
    }

    #[test]
    fn dispersion_rejects_bad_p() {
        assert!(DispersionInstance::from_points("t", "g", triangle(), 0).is_err());
        assert!(DispersionInstance::from_points("t", "g", triangle(), 4).is_err());
        assert!(DispersionInstance::from_points("t", "g", triangle(), 3).is_ok());
    }

    #[test]
    fn flp_rejects_malformed_data() {
        let fac = vec![(0.0, 0.0), (1.0, 1.0)];
        let cli = vec![(0.5, 0.5)];
        let ok = FlpInstance::new("t", "g", fac.clone(), cli.clone(), vec![vec![0.7], vec![0.7]], vec![1.0, 2.0], None);
        assert!(ok.is_ok());
        let short_row = FlpInstance::new("t", "g", fac.clone(), cli.clone(), vec![vec![0.7], vec![]], vec![1.0, 2.0], None);
        assert!(short_row.is_err());
        let negative = FlpInstance::new("t", "g", fac.clone(), cli.clone(), vec![vec![0.7], vec![0.7]], vec![1.0, -2.0], None);
        assert!(negative.is_err());
        let caps = FlpInstance::new("t", "g", fac, cli, vec![vec![0.7], vec![0.7]], vec![1.0, 2.0], Some(vec![3]));
        assert!(caps.is_err());
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(7.005001, 2), 7.01);
    }
}
