//! One flat record per solved instance, written as a JSON line.

use serde::Serialize;

use crate::extract::{DispersionMetrics, Extraction, FacilityMetrics};
use crate::formulation::{Built, FacilityVars, OpenVars, PDispersionVars};
use crate::instance::{DispersionInstance, FlpInstance};
use crate::resolution::{Solution, Status};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub instance: String,
    pub model: &'static str,
    /// Facilities or candidate locations.
    #[serde(rename = "I")]
    pub n_locations: usize,
    #[serde(rename = "J", skip_serializing_if = "Option::is_none")]
    pub n_clients: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<usize>,
    pub status: Status,
    pub objective_value: Option<f64>,
    pub num_open_facilities: Option<usize>,
    pub runtime_s: f64,
    pub nodes_explored: u64,
    /// Serialized as `null` when unbounded.
    pub gap: f64,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub facility: Option<FacilityRow>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub dispersion: Option<DispersionRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityRow {
    pub avg_fixed_costs: f64,
    pub avg_cost_matrix: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_capacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DispersionRow {
    /// The big-M of the p-dispersion model.
    #[serde(rename = "M", skip_serializing_if = "Option::is_none")]
    pub big_m: Option<f64>,
    /// Value of the model's `min_distance` variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_distance_var: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum_distance: Option<f64>,
}

impl ResultRow {
    fn base<M>(id: &str, model: &'static str, n_locations: usize, solution: &Solution, res: &Extraction<M>) -> Self {
        ResultRow {
            instance: id.to_string(),
            model,
            n_locations,
            n_clients: None,
            p: None,
            status: res.status(),
            objective_value: res.objective(),
            num_open_facilities: res.selected().map(<[usize]>::len),
            runtime_s: solution.elapsed.as_secs_f64(),
            nodes_explored: solution.nodes,
            gap: solution.gap,
            facility: None,
            dispersion: None,
        }
    }

    pub fn facility(
        instance: &FlpInstance,
        built: &Built<FacilityVars>,
        solution: &Solution,
        res: &Extraction<FacilityMetrics>,
    ) -> Self {
        let metrics = res.metrics().ok();
        ResultRow {
            n_clients: Some(instance.n_clients()),
            facility: Some(FacilityRow {
                avg_fixed_costs: instance.avg_fixed_cost(),
                avg_cost_matrix: instance.avg_cost(),
                avg_capacity: metrics.and_then(|m| m.avg_open_capacity),
                fixed_cost: metrics.map(|m| m.fixed_cost),
                assignment_cost: metrics.map(|m| m.assignment_cost),
                total_cost: metrics.map(|m| m.total_cost),
            }),
            ..Self::base(instance.id(), built.kind.tag(), instance.n_facilities(), solution, res)
        }
    }

    /// `pdisp` carries the p-dispersion variables when the model has them.
    pub fn dispersion<V: OpenVars>(
        instance: &DispersionInstance,
        built: &Built<V>,
        pdisp: Option<&PDispersionVars>,
        solution: &Solution,
        res: &Extraction<DispersionMetrics>,
    ) -> Self {
        let metrics = res.metrics().ok();
        let pairs = metrics.and_then(|m| m.pairs);
        let row = DispersionRow {
            big_m: pdisp.map(|v| v.big_m),
            min_distance_var: pdisp.and_then(|v| solution.value(v.min_distance)),
            min_distance: pairs.map(|s| s.min),
            max_distance: pairs.map(|s| s.max),
            avg_distance: pairs.map(|s| s.avg),
            std_distance: pairs.map(|s| s.std),
            sum_distance: metrics.map(|m| m.sum_distance),
        };
        ResultRow {
            p: Some(instance.p()),
            dispersion: Some(row),
            ..Self::base(instance.id(), built.kind.tag(), instance.n_locations(), solution, res)
        }
    }
}
