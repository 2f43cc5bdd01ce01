use super::{add_open_vars, select_exactly, Formulation, OpenVars, ProblemFormulation};
use crate::instance::DispersionInstance;
use crate::model::{Cmp, LinearExpr, Model, Sense, VarId};

#[derive(Debug, Clone)]
pub struct PDispersionVars {
    pub open: Vec<VarId>,
    pub min_distance: VarId,
    /// The largest pairwise distance of the instance.
    pub big_m: f64,
}

impl OpenVars for PDispersionVars {
    fn open(&self) -> &[VarId] {
        &self.open
    }
}

/// Select p locations maximizing the smallest distance between two of them.
///
/// For each pair, `min_distance <= d(i,j) + M(1 - open[i]) + M(1 - open[j])`
/// with a single M equal to the largest distance, so the row only binds when
/// both ends are open.
#[derive(Debug, Clone, Copy, Default)]
pub struct PDispersion;

impl ProblemFormulation for PDispersion {
    type Instance = DispersionInstance;
    type Vars = PDispersionVars;

    fn kind(&self) -> Formulation {
        Formulation::PDispersion
    }

    fn sense(&self) -> Sense {
        Sense::Maximize
    }

    fn build_variables(&self, instance: &DispersionInstance, model: &mut Model) -> PDispersionVars {
        let open = add_open_vars(model, instance.n_locations());
        let big_m = instance.distances().max();
        let min_distance = model.add_continuous("min_distance", 0.0, big_m);
        PDispersionVars { open, min_distance, big_m }
    }

    fn build_constraints(&self, instance: &DispersionInstance, vars: &PDispersionVars, model: &mut Model) {
        select_exactly(model, &vars.open, instance.p());
        let m = vars.big_m;
        for (i, j, d) in instance.distances().pairs() {
            // moved to the left: D + M y_i + M y_j <= d + 2M
            let lhs = LinearExpr::new().with(vars.min_distance, 1.0).with(vars.open[i], m).with(vars.open[j], m);
            model.add_constraint(format!("min_distance_{i}_{j}"), lhs, Cmp::Le, d + 2.0 * m);
        }
    }

    fn build_objective(&self, _instance: &DispersionInstance, vars: &PDispersionVars) -> LinearExpr {
        LinearExpr::new().with(vars.min_distance, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(p: usize) -> DispersionInstance {
        DispersionInstance::from_points("P", "test", vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)], p).unwrap()
    }

    #[test]
    fn shape() {
        let built = PDispersion.build(&instance(2)).unwrap();
        assert_eq!(built.model.variables().len(), 3 + 1);
        assert_eq!(built.model.constraints().len(), 1 + 3);
        assert!((built.vars.big_m - 2f64.sqrt()).abs() < 1e-12);
        let row = built.model.constraint("min_distance_0_1").unwrap();
        assert!((row.rhs - (1.0 + 2.0 * built.vars.big_m)).abs() < 1e-12);
    }

    #[test]
    fn rows_bind_only_between_open_pairs() {
        let built = PDispersion.build(&instance(2)).unwrap();
        let v = &built.vars;
        let s = 2f64.sqrt();
        let mut values = vec![0.0; built.model.variables().len()];
        values[v.open[1].index()] = 1.0;
        values[v.open[2].index()] = 1.0;
        values[v.min_distance.index()] = s;
        assert!(built.model.violations(&values, 1e-9).is_empty());
        assert_eq!(built.model.objective_value(&values), s);

        // selecting {0, 1} caps the minimum at d(0,1) = 1
        values[v.open[2].index()] = 0.0;
        values[v.open[0].index()] = 1.0;
        assert_eq!(built.model.violations(&values, 1e-9), vec!["min_distance_0_1".to_string()]);
        values[v.min_distance.index()] = 1.0;
        assert!(built.model.violations(&values, 1e-9).is_empty());
    }
}
