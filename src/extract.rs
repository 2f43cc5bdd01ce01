//! Reading solver assignments back into domain terms.
//!
//! Every metric is recomputed from the instance data, never from the solver's
//! objective, and the assignment is checked against the structural rules of
//! its family before anything is reported.

use crate::error::{Error, Result};
use crate::formulation::{Built, FacilityVars, Formulation, OpenVars};
use crate::instance::{DispersionInstance, FlpInstance};
use crate::model::VarId;
use crate::resolution::{Solution, Status};

/// Binary values above this are read as 1.
pub const SELECTION_THRESHOLD: f64 = 0.5;

/// Outcome of reading one solution.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<M> {
    /// The solver proved there is nothing to read.
    StatusOnly(Status),
    Solved {
        status: Status,
        objective: f64,
        /// Indices of the open facilities or selected locations.
        selected: Vec<usize>,
        metrics: M,
    },
}

impl<M> Extraction<M> {
    pub fn status(&self) -> Status {
        match self {
            Extraction::StatusOnly(status) => *status,
            Extraction::Solved { status, .. } => *status,
        }
    }

    pub fn objective(&self) -> Option<f64> {
        match self {
            Extraction::StatusOnly(_) => None,
            Extraction::Solved { objective, .. } => Some(*objective),
        }
    }

    pub fn selected(&self) -> Option<&[usize]> {
        match self {
            Extraction::StatusOnly(_) => None,
            Extraction::Solved { selected, .. } => Some(selected),
        }
    }

    pub fn metrics(&self) -> Result<&M> {
        match self {
            Extraction::StatusOnly(status) => {
                Err(Error::Extraction(format!("no metrics for a solve that ended {status}")))
            }
            Extraction::Solved { metrics, .. } => Ok(metrics),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FacilityMetrics {
    /// `assignment[j]` is the open facility serving client `j`.
    pub assignment: Vec<usize>,
    /// Clients served by each facility, 0 for closed ones.
    pub load: Vec<usize>,
    pub fixed_cost: f64,
    pub assignment_cost: f64,
    pub total_cost: f64,
    /// Mean capacity over the open facilities, capacitated models only.
    pub avg_open_capacity: Option<f64>,
}

/// Min, max, mean and population standard deviation of a set of distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub std: f64,
}

impl PairStats {
    pub fn of(distances: &[f64]) -> Option<PairStats> {
        if distances.is_empty() {
            return None;
        }
        let n = distances.len() as f64;
        let avg = distances.iter().sum::<f64>() / n;
        let var = distances.iter().map(|d| (d - avg).powi(2)).sum::<f64>() / n;
        Some(PairStats {
            min: distances.iter().copied().fold(f64::INFINITY, f64::min),
            max: distances.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            avg,
            std: var.sqrt(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispersionMetrics {
    /// `None` when fewer than two locations are selected.
    pub pairs: Option<PairStats>,
    pub sum_distance: f64,
}

/// Values of a solution that is expected to carry an assignment, or `None`
/// when its status rules one out or a limit stopped the search before any
/// assignment was found.
fn assigned_values<'a, V>(built: &Built<V>, solution: &'a Solution) -> Result<Option<&'a [f64]>> {
    if solution.status.is_terminal_without_solution() {
        return Ok(None);
    }
    if solution.values.is_none() && matches!(solution.status, Status::TimeLimit | Status::NodeLimit) {
        return Ok(None);
    }
    let values = solution.values.as_deref().ok_or_else(|| {
        Error::Extraction(format!("{} solve ended {} without an assignment", built.kind.tag(), solution.status))
    })?;
    let expected = built.model.variables().len();
    if values.len() != expected {
        return Err(Error::Extraction(format!(
            "assignment has {} values for {expected} variables",
            values.len()
        )));
    }
    Ok(Some(values))
}

fn is_set(values: &[f64], var: VarId) -> bool {
    values[var.index()] > SELECTION_THRESHOLD
}

fn selected(values: &[f64], open: &[VarId]) -> Vec<usize> {
    open.iter().enumerate().filter(|&(_, &y)| is_set(values, y)).map(|(i, _)| i).collect()
}

fn objective_of(solution: &Solution) -> Result<f64> {
    solution
        .objective
        .ok_or_else(|| Error::Extraction(format!("solve ended {} without an objective", solution.status)))
}

/// Reads an UFLP or CFLP solution.
///
/// Fails when a client is not served by exactly one open facility, or when a
/// capacitated model overloads a facility.
pub fn extract_facility(
    instance: &FlpInstance,
    built: &Built<FacilityVars>,
    solution: &Solution,
) -> Result<Extraction<FacilityMetrics>> {
    let Some(values) = assigned_values(built, solution)? else {
        return Ok(Extraction::StatusOnly(solution.status));
    };
    let vars = &built.vars;
    let open = selected(values, vars.open());
    let is_open = |i: usize| is_set(values, vars.open[i]);

    let mut assignment = Vec::with_capacity(instance.n_clients());
    let mut load = vec![0usize; instance.n_facilities()];
    for j in 0..instance.n_clients() {
        let serving: Vec<usize> = (0..instance.n_facilities()).filter(|&i| is_set(values, vars.assign[i][j])).collect();
        match serving.as_slice() {
            [i] if is_open(*i) => {
                assignment.push(*i);
                load[*i] += 1;
            }
            [i] => {
                return Err(Error::Extraction(format!("client {j} is assigned to closed facility {i}")));
            }
            _ => {
                return Err(Error::Extraction(format!(
                    "client {j} is served by {} facilities",
                    serving.len()
                )));
            }
        }
    }

    let capacitated = built.kind == Formulation::Cflp;
    let mut avg_open_capacity = None;
    if capacitated {
        let capacity = instance
            .capacity()
            .ok_or_else(|| Error::Extraction("capacitated solution for an instance without capacities".into()))?;
        if let Some(i) = (0..instance.n_facilities()).find(|&i| load[i] > capacity[i] as usize) {
            return Err(Error::Extraction(format!(
                "facility {i} serves {} clients over its capacity {}",
                load[i], capacity[i]
            )));
        }
        if !open.is_empty() {
            let sum: f64 = open.iter().map(|&i| capacity[i] as f64).sum();
            avg_open_capacity = Some(sum / open.len() as f64);
        }
    }

    let fixed_cost: f64 = open.iter().map(|&i| instance.fixed_cost()[i]).sum();
    let assignment_cost: f64 = assignment.iter().enumerate().map(|(j, &i)| instance.cost(i, j)).sum();
    let metrics = FacilityMetrics {
        assignment,
        load,
        fixed_cost,
        assignment_cost,
        total_cost: fixed_cost + assignment_cost,
        avg_open_capacity,
    };
    Ok(Extraction::Solved { status: solution.status, objective: objective_of(solution)?, selected: open, metrics })
}

/// Reads a MaxSum or p-dispersion solution. Fails unless exactly p locations
/// are selected.
pub fn extract_dispersion<V: OpenVars>(
    instance: &DispersionInstance,
    built: &Built<V>,
    solution: &Solution,
) -> Result<Extraction<DispersionMetrics>> {
    let Some(values) = assigned_values(built, solution)? else {
        return Ok(Extraction::StatusOnly(solution.status));
    };
    let chosen = selected(values, built.vars.open());
    if chosen.len() != instance.p() {
        return Err(Error::Extraction(format!(
            "{} locations selected, {} required",
            chosen.len(),
            instance.p()
        )));
    }

    let dist = instance.distances();
    let sel = chosen.as_slice();
    let distances: Vec<f64> = sel
        .iter()
        .enumerate()
        .flat_map(move |(k, &i)| sel[k + 1..].iter().filter_map(move |&j| dist.get(i, j)))
        .collect();
    let metrics = DispersionMetrics { pairs: PairStats::of(&distances), sum_distance: distances.iter().sum() };
    Ok(Extraction::Solved { status: solution.status, objective: objective_of(solution)?, selected: chosen, metrics })
}
