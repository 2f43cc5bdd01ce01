use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::*;

use super::{BranchAndBound, SolveLimits, Solver};
use crate::error::{Error, Result};
use crate::extract::{extract_dispersion, extract_facility};
use crate::format::load_instance;
use crate::formulation::{Cflp, Formulation, MaxSumDispersion, PDispersion, ProblemFormulation, Uflp};
use crate::instance::Instance;
use crate::report::ResultRow;

#[derive(Debug, Args)]
pub struct Solve {
    /// The instance files to solve, in order
    #[clap(required = true)]
    pub instances: Vec<PathBuf>,
    /// The formulation applied to every instance
    #[clap(short, long, value_enum)]
    pub formulation: Formulation,
    /// Time limit per instance, in seconds
    #[clap(short, long)]
    pub timeout: Option<u64>,
    /// Maximum number of branch and bound nodes per instance
    #[clap(short, long)]
    pub node_limit: Option<u64>,
    /// If present, the file result rows are appended to (one JSON object per line)
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

impl Solve {
    pub fn limits(&self) -> SolveLimits {
        SolveLimits { time: self.timeout.map(Duration::from_secs), nodes: self.node_limit }
    }

    /// Solves every instance in turn. A failing instance is logged and skipped.
    pub fn solve(&self) -> anyhow::Result<()> {
        let mut out: Box<dyn Write> = match &self.output {
            Some(path) => Box::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("cannot open {}", path.display()))?,
            ),
            None => Box::new(io::stdout().lock()),
        };

        let solver = BranchAndBound::default();
        let limits = self.limits();
        let (mut solved, mut failed) = (0usize, 0usize);
        for path in &self.instances {
            let row = load_instance(path)
                .and_then(|inst| Ok(run_instance(self.formulation, &inst, &solver, &limits)?))
                .with_context(|| format!("{} on {}", self.formulation.tag(), path.display()));
            match row {
                Ok(row) => {
                    info!(instance = %row.instance, status = %row.status, objective = ?row.objective_value, "solved");
                    writeln!(out, "{}", serde_json::to_string(&row)?)?;
                    solved += 1;
                }
                Err(e) => {
                    error!("{e:#}");
                    failed += 1;
                }
            }
        }
        out.flush()?;
        info!(solved, failed, "batch finished");
        Ok(())
    }
}

/// Builds, solves and reads back one instance.
pub fn run_instance<S: Solver + ?Sized>(
    formulation: Formulation,
    instance: &Instance,
    solver: &S,
    limits: &SolveLimits,
) -> Result<ResultRow> {
    match (formulation, instance) {
        (Formulation::Uflp | Formulation::Cflp, Instance::Flp(inst)) => {
            let built = match formulation {
                Formulation::Cflp => Cflp.build(inst)?,
                _ => Uflp.build(inst)?,
            };
            debug!(
                instance = inst.id(),
                vars = built.model.variables().len(),
                rows = built.model.constraints().len(),
                "model built"
            );
            let solution = solver.solve(&built.model, limits)?;
            let res = extract_facility(inst, &built, &solution)?;
            Ok(ResultRow::facility(inst, &built, &solution, &res))
        }
        (Formulation::MaxSum, Instance::Dispersion(inst)) => {
            let built = MaxSumDispersion.build(inst)?;
            let solution = solver.solve(&built.model, limits)?;
            let res = extract_dispersion(inst, &built, &solution)?;
            Ok(ResultRow::dispersion(inst, &built, None, &solution, &res))
        }
        (Formulation::PDispersion, Instance::Dispersion(inst)) => {
            let built = PDispersion.build(inst)?;
            let solution = solver.solve(&built.model, limits)?;
            let res = extract_dispersion(inst, &built, &solution)?;
            Ok(ResultRow::dispersion(inst, &built, Some(&built.vars), &solution, &res))
        }
        (f, inst) => Err(Error::ModelBuild(format!("{} cannot be applied to instance {}", f.tag(), inst.id()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{DispersionInstance, FlpInstance};
    use crate::resolution::Status;

    fn flp() -> Instance {
        Instance::Flp(
            FlpInstance::new(
                "F",
                "test",
                vec![(0.0, 0.0), (4.0, 0.0)],
                vec![(0.0, 0.0), (4.0, 0.0), (1.0, 0.0)],
                vec![vec![0.0, 4.0, 1.0], vec![4.0, 0.0, 3.0]],
                vec![1.0, 1.0],
                Some(vec![2, 2]),
            )
            .unwrap(),
        )
    }

    #[test]
    fn uncapacitated_and_capacitated_agree_when_capacity_is_loose() {
        let solver = BranchAndBound::default();
        let limits = SolveLimits::default();
        let u = run_instance(Formulation::Uflp, &flp(), &solver, &limits).unwrap();
        let c = run_instance(Formulation::Cflp, &flp(), &solver, &limits).unwrap();
        assert_eq!(u.status, Status::Optimal);
        assert_eq!(c.status, Status::Optimal);
        // both facilities open: 2 fixed + 1 for the client at x = 1
        assert!((u.objective_value.unwrap() - 3.0).abs() < 1e-6);
        assert!((c.objective_value.unwrap() - 3.0).abs() < 1e-6);
        assert_eq!(c.num_open_facilities, Some(2));
        assert_eq!(c.model, "CFLP");
        assert_eq!(c.facility.unwrap().avg_capacity, Some(2.0));
    }

    #[test]
    fn limit_without_incumbent_still_yields_a_row() {
        let timed_out = SolveLimits { time: Some(Duration::ZERO), nodes: None };
        let row = run_instance(Formulation::Uflp, &flp(), &BranchAndBound::default(), &timed_out).unwrap();
        assert_eq!(row.status, Status::TimeLimit);
        assert_eq!(row.nodes_explored, 0);
        assert!(row.objective_value.is_none());
        assert!(row.num_open_facilities.is_none());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["status"], "timeLimit");
        assert!(json["gap"].is_null());
        assert!(json.get("total_cost").is_none());

        let disp = Instance::Dispersion(
            DispersionInstance::from_points("D", "test", vec![(0.0, 0.0), (3.0, 0.0), (0.0, 4.0)], 2).unwrap(),
        );
        let no_nodes = SolveLimits { time: None, nodes: Some(0) };
        let row = run_instance(Formulation::PDispersion, &disp, &BranchAndBound::default(), &no_nodes).unwrap();
        assert_eq!(row.status, Status::NodeLimit);
        assert_eq!(row.dispersion.unwrap().big_m, Some(5.0));
    }

    #[test]
    fn family_mismatch_is_rejected() {
        let solver = BranchAndBound::default();
        let err = run_instance(Formulation::MaxSum, &flp(), &solver, &SolveLimits::default()).unwrap_err();
        assert!(matches!(err, Error::ModelBuild(_)));

        let disp = Instance::Dispersion(
            DispersionInstance::from_points("D", "test", vec![(0.0, 0.0), (1.0, 0.0)], 1).unwrap(),
        );
        let err = run_instance(Formulation::Cflp, &disp, &solver, &SolveLimits::default()).unwrap_err();
        assert!(matches!(err, Error::ModelBuild(_)));
    }

    #[test]
    fn p_dispersion_reports_its_big_m() {
        let disp = Instance::Dispersion(
            DispersionInstance::from_points("D", "test", vec![(0.0, 0.0), (3.0, 0.0), (0.0, 4.0)], 2).unwrap(),
        );
        let row = run_instance(Formulation::PDispersion, &disp, &BranchAndBound::default(), &SolveLimits::default())
            .unwrap();
        assert_eq!(row.status, Status::Optimal);
        assert!((row.objective_value.unwrap() - 5.0).abs() < 1e-6);
        let d = row.dispersion.unwrap();
        assert_eq!(d.big_m, Some(5.0));
        assert!((d.min_distance.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(row.p, Some(2));
    }
}
