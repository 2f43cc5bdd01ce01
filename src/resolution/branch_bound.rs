use std::time::Instant;

use microlp::{ComparisonOp, OptimizationDirection, Problem};
use tracing::*;

use super::{relative_gap, Solution, SolveLimits, Solver, Status};
use crate::error::{Error, Result};
use crate::model::{Cmp, Model, Sense, VarKind};

const PRUNE_TOL: f64 = 1e-9;

/// Depth-first branch and bound over the binary variables, with every node
/// relaxation solved as an LP by `microlp`.
///
/// Internally objectives are compared as scores (the objective for a
/// maximization, its negation for a minimization) so that larger is better.
#[derive(Debug, Clone, Copy)]
pub struct BranchAndBound {
    pub integrality_tol: f64,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        BranchAndBound { integrality_tol: 1e-6 }
    }
}

struct Node {
    lower: Vec<f64>,
    upper: Vec<f64>,
    /// Score of the parent relaxation, an upper bound for the subtree.
    bound: f64,
}

enum Relaxation {
    Infeasible,
    Unbounded,
    Solved { score: f64, values: Vec<f64> },
}

fn score(sense: Sense, objective: f64) -> f64 {
    match sense {
        Sense::Maximize => objective,
        Sense::Minimize => -objective,
    }
}

impl BranchAndBound {
    fn relax(&self, model: &Model, node: &Node) -> Result<Relaxation> {
        let direction = match model.sense() {
            Sense::Minimize => OptimizationDirection::Minimize,
            Sense::Maximize => OptimizationDirection::Maximize,
        };
        let mut problem = Problem::new(direction);

        let mut obj_coeffs = vec![0.0; model.variables().len()];
        for &(v, c) in model.objective().terms() {
            obj_coeffs[v.index()] += c;
        }
        let vars: Vec<_> = obj_coeffs
            .iter()
            .enumerate()
            .map(|(k, &c)| problem.add_var(c, (node.lower[k], node.upper[k])))
            .collect();

        for row in model.constraints() {
            let terms: Vec<_> = row.lhs.terms().iter().map(|&(v, c)| (vars[v.index()], c)).collect();
            let op = match row.cmp {
                Cmp::Le => ComparisonOp::Le,
                Cmp::Ge => ComparisonOp::Ge,
                Cmp::Eq => ComparisonOp::Eq,
            };
            problem.add_constraint(terms, op, row.rhs);
        }

        match problem.solve() {
            Ok(solution) => Ok(Relaxation::Solved {
                score: score(model.sense(), solution.objective()),
                values: vars.iter().map(|&v| *solution.var_value(v)).collect(),
            }),
            Err(microlp::Error::Infeasible) => Ok(Relaxation::Infeasible),
            Err(microlp::Error::Unbounded) => Ok(Relaxation::Unbounded),
            Err(e) => Err(Error::Solve(format!("{}: {e}", model.name()))),
        }
    }

    /// The binary variable whose relaxed value is farthest from integral.
    fn branching_var(&self, binaries: &[usize], values: &[f64]) -> Option<usize> {
        binaries
            .iter()
            .map(|&k| (k, (values[k] - values[k].round()).abs()))
            .filter(|&(_, frac)| frac > self.integrality_tol)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(k, _)| k)
    }
}

impl Solver for BranchAndBound {
    fn solve(&self, model: &Model, limits: &SolveLimits) -> Result<Solution> {
        let start = Instant::now();
        let sense = model.sense();
        let binaries: Vec<usize> = (0..model.variables().len())
            .filter(|&k| model.variables()[k].kind == VarKind::Binary)
            .collect();
        let (lower, upper) = model.variables().iter().map(|v| v.kind.bounds()).unzip();

        let mut stack = vec![Node { lower, upper, bound: f64::INFINITY }];
        let mut incumbent: Option<(f64, Vec<f64>)> = None;
        let mut nodes = 0u64;
        let mut stopped = None;

        while let Some(node) = stack.pop() {
            let best = incumbent.as_ref().map(|(s, _)| *s);
            if best.map_or(false, |b| node.bound <= b + PRUNE_TOL * (1.0 + b.abs())) {
                continue;
            }
            if limits.time.map_or(false, |t| start.elapsed() >= t) {
                stack.push(node);
                stopped = Some(Status::TimeLimit);
                break;
            }
            if limits.nodes.map_or(false, |n| nodes >= n) {
                stack.push(node);
                stopped = Some(Status::NodeLimit);
                break;
            }
            nodes += 1;

            let (node_score, values) = match self.relax(model, &node)? {
                Relaxation::Infeasible => continue,
                Relaxation::Unbounded => {
                    debug!(model = model.name(), nodes, "relaxation unbounded");
                    return Ok(Solution {
                        status: Status::Unbounded,
                        objective: None,
                        values: None,
                        nodes,
                        gap: f64::INFINITY,
                        elapsed: start.elapsed(),
                    });
                }
                Relaxation::Solved { score, values } => (score, values),
            };
            if best.map_or(false, |b| node_score <= b + PRUNE_TOL * (1.0 + b.abs())) {
                continue;
            }

            match self.branching_var(&binaries, &values) {
                None => {
                    let mut values = values;
                    for &k in &binaries {
                        values[k] = values[k].round();
                    }
                    let s = score(sense, model.objective_value(&values));
                    trace!(nodes, score = s, "new incumbent");
                    incumbent = Some((s, values));
                }
                Some(k) => {
                    let mut down = Node { lower: node.lower.clone(), upper: node.upper.clone(), bound: node_score };
                    down.upper[k] = 0.0;
                    let mut up = Node { lower: node.lower, upper: node.upper, bound: node_score };
                    up.lower[k] = 1.0;
                    // the side the relaxation leans towards is explored first
                    if values[k] >= 0.5 {
                        stack.push(down);
                        stack.push(up);
                    } else {
                        stack.push(up);
                        stack.push(down);
                    }
                }
            }
        }

        let elapsed = start.elapsed();
        let open_bound = stack.iter().map(|n| n.bound).fold(f64::NEG_INFINITY, f64::max);
        let status = match (stopped, &incumbent) {
            (Some(limit), _) => limit,
            (None, Some(_)) => Status::Optimal,
            (None, None) => Status::Infeasible,
        };
        let (objective, values, gap) = match incumbent {
            Some((s, values)) => {
                let dual = s.max(open_bound);
                let objective = score(sense, s);
                (Some(objective), Some(values), relative_gap(objective, score(sense, dual)))
            }
            None => (None, None, f64::INFINITY),
        };
        debug!(model = model.name(), %status, nodes, ?objective, gap, "branch and bound finished");

        Ok(Solution { status, objective, values, nodes, gap, elapsed })
    }
}
