use super::{FacilityVars, Formulation, ProblemFormulation, Uflp};
use crate::error::{model_build, Error, Result};
use crate::instance::FlpInstance;
use crate::model::{Cmp, LinearExpr, Model, Sense};

/// Capacitated facility location: the UFLP model plus one capacity row per facility.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cflp;

impl ProblemFormulation for Cflp {
    type Instance = FlpInstance;
    type Vars = FacilityVars;

    fn kind(&self) -> Formulation {
        Formulation::Cflp
    }

    fn sense(&self) -> Sense {
        Sense::Minimize
    }

    fn check(&self, instance: &FlpInstance) -> Result<()> {
        let total_capacity = instance
            .total_capacity()
            .ok_or_else(|| model_build(format!("{}: CFLP requires facility capacities", instance.id())))?;
        if total_capacity < instance.n_clients() as u64 {
            return Err(Error::InstanceInfeasible { total_capacity, clients: instance.n_clients() });
        }
        Ok(())
    }

    fn build_variables(&self, instance: &FlpInstance, model: &mut Model) -> FacilityVars {
        Uflp.build_variables(instance, model)
    }

    fn build_constraints(&self, instance: &FlpInstance, vars: &FacilityVars, model: &mut Model) {
        Uflp.build_constraints(instance, vars, model);
        let capacity = instance.capacity().unwrap_or_default();
        for (i, (row, &cap)) in vars.assign.iter().zip(capacity).enumerate() {
            let mut lhs: LinearExpr = row.iter().map(|&x| (x, 1.0)).collect();
            lhs.add(vars.open[i], -(cap as f64));
            model.add_constraint(format!("capacity_{i}"), lhs, Cmp::Le, 0.0);
        }
    }

    fn build_objective(&self, instance: &FlpInstance, vars: &FacilityVars) -> LinearExpr {
        Uflp.build_objective(instance, vars)
    }
}
