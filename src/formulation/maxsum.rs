use super::{add_open_vars, select_exactly, Formulation, OpenVars, ProblemFormulation};
use crate::instance::DispersionInstance;
use crate::model::{Cmp, LinearExpr, Model, Sense, VarId};

#[derive(Debug, Clone)]
pub struct MaxSumVars {
    pub open: Vec<VarId>,
    /// `(i, j, link[i,j])` for every pair `i < j`.
    pub link: Vec<(usize, usize, VarId)>,
}

impl OpenVars for MaxSumVars {
    fn open(&self) -> &[VarId] {
        &self.open
    }
}

/// Select p locations maximizing the sum of their pairwise distances.
///
/// `link[i,j]` stands for `open[i] AND open[j]` through the usual three
/// inequalities. Distances are non-negative and the objective maximizes, so at
/// an optimum every link between two open locations is raised to 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxSumDispersion;

impl ProblemFormulation for MaxSumDispersion {
    type Instance = DispersionInstance;
    type Vars = MaxSumVars;

    fn kind(&self) -> Formulation {
        Formulation::MaxSum
    }

    fn sense(&self) -> Sense {
        Sense::Maximize
    }

    fn build_variables(&self, instance: &DispersionInstance, model: &mut Model) -> MaxSumVars {
        let open = add_open_vars(model, instance.n_locations());
        let link = instance
            .distances()
            .pairs()
            .map(|(i, j, _)| (i, j, model.add_binary(format!("link_{i}_{j}"))))
            .collect();
        MaxSumVars { open, link }
    }

    fn build_constraints(&self, instance: &DispersionInstance, vars: &MaxSumVars, model: &mut Model) {
        select_exactly(model, &vars.open, instance.p());
        for &(i, j, z) in &vars.link {
            let (yi, yj) = (vars.open[i], vars.open[j]);
            model.add_constraint(format!("link_first_{i}_{j}"), LinearExpr::new().with(z, 1.0).with(yi, -1.0), Cmp::Le, 0.0);
            model.add_constraint(format!("link_second_{i}_{j}"), LinearExpr::new().with(z, 1.0).with(yj, -1.0), Cmp::Le, 0.0);
            // z >= yi + yj - 1
            let both = LinearExpr::new().with(z, 1.0).with(yi, -1.0).with(yj, -1.0);
            model.add_constraint(format!("link_both_{i}_{j}"), both, Cmp::Ge, -1.0);
        }
    }

    fn build_objective(&self, instance: &DispersionInstance, vars: &MaxSumVars) -> LinearExpr {
        let dist = instance.distances();
        vars.link
            .iter()
            .filter_map(|&(i, j, z)| dist.get(i, j).map(|d| (z, d)))
            .collect()
    }
}
