//! The boundary with the MILP engine, and the batch driver built on top of it.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::model::{Model, VarId};

mod branch_bound;
mod solve;

pub use branch_bound::BranchAndBound;
pub use solve::{run_instance, Solve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Optimal,
    Feasible,
    Infeasible,
    TimeLimit,
    NodeLimit,
    Unbounded,
}

impl Status {
    /// No assignment can exist for these.
    pub fn is_terminal_without_solution(self) -> bool {
        matches!(self, Status::Infeasible | Status::Unbounded)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Optimal => "optimal",
            Status::Feasible => "feasible",
            Status::Infeasible => "infeasible",
            Status::TimeLimit => "timeLimit",
            Status::NodeLimit => "nodeLimit",
            Status::Unbounded => "unbounded",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveLimits {
    pub time: Option<Duration>,
    pub nodes: Option<u64>,
}

/// What the engine reports back for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: Status,
    pub objective: Option<f64>,
    /// One value per model variable, when an assignment was found.
    pub values: Option<Vec<f64>>,
    pub nodes: u64,
    pub gap: f64,
    pub elapsed: Duration,
}

impl Solution {
    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.as_ref().and_then(|v| v.get(var.index()).copied())
    }
}

/// A MILP engine. Implementations solve the model once, blocking, and treat a
/// hit limit as a normal outcome.
pub trait Solver {
    fn solve(&self, model: &Model, limits: &SolveLimits) -> Result<Solution>;
}

/// `|primal - dual| / min(|primal|, |dual|)`: 0 when both agree, infinite
/// when the ratio is undefined.
pub fn relative_gap(primal: f64, dual: f64) -> f64 {
    if primal == dual {
        return 0.0;
    }
    if !primal.is_finite() || !dual.is_finite() || primal * dual <= 0.0 {
        return f64::INFINITY;
    }
    (primal - dual).abs() / primal.abs().min(dual.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaps() {
        assert_eq!(relative_gap(3.0, 3.0), 0.0);
        assert_eq!(relative_gap(0.0, 0.0), 0.0);
        assert!((relative_gap(10.0, 12.0) - 0.2).abs() < 1e-12);
        assert!((relative_gap(-10.0, -12.0) - 0.2).abs() < 1e-12);
        assert_eq!(relative_gap(0.0, 1.0), f64::INFINITY);
        assert_eq!(relative_gap(-1.0, 1.0), f64::INFINITY);
        assert_eq!(relative_gap(5.0, f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn status_names() {
        assert_eq!(Status::TimeLimit.to_string(), "timeLimit");
        assert_eq!(serde_json::to_value(Status::NodeLimit).unwrap(), "nodeLimit");
    }
}
